#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod config;
mod console;
mod log;

use crate::{
  config::{ConfigToml, HarnessSettings, parse_opts},
  console::{ConsoleCommand, HELP},
  log::*,
};
use netconn_lib::*;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

fn main() {
  let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
  runtime_builder.enable_all();
  runtime_builder.thread_name("netconn");
  let runtime = match runtime_builder.build() {
    Ok(runtime) => runtime,
    Err(e) => {
      eprintln!("Failed to build tokio runtime: {e}");
      std::process::exit(1);
    }
  };

  init_logger();

  runtime.block_on(async {
    if let Err(e) = run_harness(runtime.handle().clone()).await {
      error!("netconn harness exited with error: {e}");
      std::process::exit(1);
    }
  });
}

/// Simulated collaborators the console drives by hand
struct Harness {
  transport: Arc<SimulatedTransport>,
  directory: Arc<LocalSessionDirectory>,
  profile: PlayerProfile,
  handle: ConnectionHandle,
}

async fn run_harness(runtime_handle: tokio::runtime::Handle) -> Result<(), anyhow::Error> {
  let opts = parse_opts()?;
  let config_toml = match opts.config_file_path.as_deref() {
    Some(path) => ConfigToml::new(path)?,
    None => ConfigToml::default(),
  };
  let settings = HarnessSettings::try_from(config_toml)?;
  info!(
    "Starting netconn harness as player {} ({} reconnect attempts, up to {} players)",
    settings.profile.player_id, settings.connection.reconnect_attempts, settings.connection.max_connected_players
  );

  let transport = Arc::new(SimulatedTransport::new());
  let directory = Arc::new(LocalSessionDirectory::new());
  let manager = ConnectionManagerBuilder::default()
    .transport(transport.clone())
    .session_directory(directory.clone())
    .config(settings.connection)
    .profile(settings.profile.clone())
    .runtime_handle(runtime_handle.clone())
    .build()?;

  let harness = Harness {
    transport,
    directory,
    profile: settings.profile,
    handle: manager.handle(),
  };

  let cancel_token = tokio_util::sync::CancellationToken::new();
  let manager_task = runtime_handle.spawn(manager.run(cancel_token.child_token()));
  runtime_handle.spawn(print_events(harness.handle.subscribe(), cancel_token.child_token()));

  println!("{HELP}");
  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  loop {
    let line = tokio::select! {
      line = lines.next_line() => line?,
      _ = cancel_token.cancelled() => break,
    };
    let Some(line) = line else {
      break;
    };
    if line.trim().is_empty() {
      continue;
    }
    let command = match line.parse::<ConsoleCommand>() {
      Ok(command) => command,
      Err(e) => {
        println!("{e}");
        continue;
      }
    };
    if command == ConsoleCommand::Quit {
      break;
    }
    if let Err(e) = harness.execute(command).await {
      println!("{e}");
    }
  }

  cancel_token.cancel();
  manager_task.await?;
  info!("netconn harness stopped");
  Ok(())
}

impl Harness {
  async fn execute(&self, command: ConsoleCommand) -> Result<(), anyhow::Error> {
    match command {
      ConsoleCommand::HostIp { address, port } => {
        self.handle.start_host_ip(address, port).await?;
        self.complete_host_start().await?;
      }
      ConsoleCommand::HostSession => {
        self.handle.start_host_session().await?;
        self.complete_host_start().await?;
      }
      ConsoleCommand::JoinIp { address, port } => self.handle.start_client_ip(address, port).await?,
      ConsoleCommand::JoinSession => self.handle.start_client_session().await?,
      ConsoleCommand::Shutdown => self.handle.request_shutdown().await?,
      ConsoleCommand::Connected(client_id) => {
        self.transport.add_connected_client(client_id);
        if !self.is_host().await? {
          self.transport.set_connected_client(true);
        }
        self.handle.client_connected(client_id).await?;
      }
      ConsoleCommand::Disconnected { client_id, reason } => {
        self.transport.set_disconnect_reason(reason.to_reason_string());
        self.transport.remove_connected_client(client_id);
        if !self.is_host().await? {
          self.transport.set_connected_client(false);
        }
        self.handle.client_disconnected(client_id).await?;
      }
      ConsoleCommand::Approve {
        client_id,
        player_id,
        player_name,
      } => {
        let mut payload = ConnectionPayload::new(player_id);
        if let Some(name) = player_name {
          payload = payload.with_player_name(name);
        }
        if let Some(build_type) = self.profile.build_type.as_deref() {
          payload = payload.with_build_type(build_type);
        }
        let response = self
          .handle
          .approval_check(ApprovalRequest::new(client_id, payload.encode()?))
          .await?;
        match response.reason.as_deref() {
          _ if response.approved => println!("client {client_id} approved"),
          Some(reason) => println!("client {client_id} denied: {reason}"),
          None => println!("client {client_id} denied"),
        }
      }
      ConsoleCommand::ServerStarted => self.handle.server_started().await?,
      ConsoleCommand::ServerStopped => self.handle.server_stopped().await?,
      ConsoleCommand::TransportFailure => self.handle.transport_failure().await?,
      ConsoleCommand::SessionCreate { id, is_host } => {
        let session = SessionHandle::new(id.as_str(), is_host).with_join_code(id.to_uppercase());
        match (session.is_host, session.join_code.as_deref()) {
          (true, Some(code)) => println!("hosting session {id}, join code {code}"),
          _ => println!("member of session {id}"),
        }
        self.directory.set_session(Some(session));
        self.directory.add_player(self.profile.player_id.as_str());
      }
      ConsoleCommand::SessionDrop => self.directory.set_session(None),
      ConsoleCommand::GameStarted => self.handle.start_game().await?,
      ConsoleCommand::GameEnded => self.handle.end_game().await?,
      ConsoleCommand::Rejoin(available) => self.directory.set_rejoin_available(available),
      ConsoleCommand::State => println!("state: {}", self.handle.current_state().await?),
      ConsoleCommand::Help => println!("{HELP}"),
      ConsoleCommand::Quit => {}
    }
    Ok(())
  }

  /// Play the transport's part of a host start: approve the local client, then report the server up
  async fn complete_host_start(&self) -> Result<(), anyhow::Error> {
    if self.handle.current_state().await? != StateKind::StartingHost {
      return Ok(());
    }
    let local = ApprovalRequest::new(self.transport.local_client_id(), self.profile.encoded_payload()?);
    let response = self.handle.approval_check(local).await?;
    if !response.approved {
      warn!("Local client was not approved");
      return Ok(());
    }
    self.handle.server_started().await?;
    Ok(())
  }

  async fn is_host(&self) -> Result<bool, anyhow::Error> {
    let state = self.handle.current_state().await?;
    Ok(matches!(state, StateKind::StartingHost | StateKind::Hosting))
  }
}

async fn print_events(mut rx: tokio::sync::broadcast::Receiver<ConnectionEvent>, cancel_token: CancellationToken) {
  use tokio::sync::broadcast::error::RecvError;
  loop {
    let event = tokio::select! {
      event = rx.recv() => event,
      _ = cancel_token.cancelled() => break,
    };
    match event {
      Ok(event) => println!("event: {event}"),
      Err(RecvError::Lagged(n)) => warn!("Event printer lagged behind, {n} events dropped"),
      Err(RecvError::Closed) => break,
    }
  }
}
