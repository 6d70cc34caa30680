use crate::{
  config::{ConnectionConfig, PlayerProfile},
  constants::{COMMAND_CHANNEL_CAPACITY, log_event_names},
  context::ManagerContext,
  error::{ConnectionBuildError, ConnectionError},
  event::{ConnectionEvent, EventBus},
  player_session::PlayerSessions,
  session_directory::SessionDirectory,
  state::{RoundMessage, StateKind, States, Transition},
  trace::*,
  transport::{ApprovalRequest, ApprovalResponse, ClientId, Transport},
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/* ---------------------------------------------------------- */
#[derive(Clone, derive_builder::Builder)]
#[builder(
  name = "ConnectionManagerBuilder",
  build_fn(private, name = "build_settings", error = "ConnectionBuildError")
)]
/// Collaborators and settings of a connection manager, assembled by [`ConnectionManagerBuilder`]
pub struct ManagerSettings {
  /// Real-time transport, shared with the rest of the game
  transport: Arc<dyn Transport>,

  /// Session directory used for relay connections and session tracking
  session_directory: Arc<dyn SessionDirectory>,

  #[builder(default)]
  /// Behavior settings, defaults if not given
  config: ConnectionConfig,

  /// Identity of the local player
  profile: PlayerProfile,

  #[builder(default)]
  /// Outward event bus, set a shared bus if events must reach existing subscribers
  event_bus: EventBus,

  /// Tokio runtime handle
  runtime_handle: tokio::runtime::Handle,
}

impl ConnectionManagerBuilder {
  /// Build the manager, it starts in the offline state
  pub fn build(&self) -> Result<ConnectionManager, ConnectionBuildError> {
    let settings = self.build_settings()?;
    settings.config.validate()?;
    settings.profile.validate()?;
    Ok(ConnectionManager::new(settings))
  }
}

/* ---------------------------------------------------------- */
/// Command sent to a running manager through a [`ConnectionHandle`]
#[derive(Debug)]
pub enum ManagerCommand {
  /* transport callbacks */
  ClientConnected(ClientId),
  ClientDisconnected(ClientId),
  ServerStarted,
  ServerStopped,
  TransportFailure,
  ApprovalRequest {
    request: ApprovalRequest,
    reply: oneshot::Sender<ApprovalResponse>,
  },
  /* public control surface */
  StartClientIp {
    address: String,
    port: u16,
  },
  StartClientSession,
  StartHostIp {
    address: String,
    port: u16,
    reply: oneshot::Sender<Result<(), ConnectionError>>,
  },
  StartHostSession {
    reply: oneshot::Sender<Result<(), ConnectionError>>,
  },
  RequestShutdown,
  GameStarted,
  GameEnded,
  CurrentState {
    reply: oneshot::Sender<StateKind>,
  },
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleStep {
  Exit(StateKind),
  Enter(StateKind),
}

/// Connection lifecycle state machine.
/// Exactly one connection state is current; every operation is forwarded to it and the transition it
/// returns is applied before the operation returns.
///
/// Reconnection rounds run on spawned tasks and report back over a channel. [`ConnectionManager::run`]
/// applies those reports; a manager driven only through its sync methods must feed them with
/// [`ConnectionManager::step_reconnection`] or [`ConnectionManager::poll_reconnection`].
pub struct ConnectionManager {
  ctx: ManagerContext,
  states: States,
  current: StateKind,
  command_tx: mpsc::Sender<ManagerCommand>,
  command_rx: mpsc::Receiver<ManagerCommand>,
  round_rx: mpsc::UnboundedReceiver<RoundMessage>,
  #[cfg(test)]
  lifecycle: Vec<LifecycleStep>,
}

impl ConnectionManager {
  fn new(settings: ManagerSettings) -> Self {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (round_tx, round_rx) = mpsc::unbounded_channel();
    let ctx = ManagerContext {
      transport: settings.transport,
      session_directory: settings.session_directory,
      player_sessions: PlayerSessions::default(),
      config: settings.config,
      profile: settings.profile,
      events: settings.event_bus,
      runtime_handle: settings.runtime_handle,
      round_tx,
    };
    Self {
      ctx,
      states: States::default(),
      // initial state is set without entering it
      current: StateKind::Offline,
      command_tx,
      command_rx,
      round_rx,
      #[cfg(test)]
      lifecycle: Vec::new(),
    }
  }

  /// Apply a transition and every transition the entered states yield in turn
  fn apply(&mut self, mut transition: Option<Transition>) {
    while let Some(next) = transition.take() {
      let next = self.states.configure(next);
      info!(
        name: log_event_names::STATE_CHANGE,
        "Changed connection state from {} to {}", self.current, next
      );
      self.states.get_mut(self.current).exit(&self.ctx);
      #[cfg(test)]
      self.lifecycle.push(LifecycleStep::Exit(self.current));

      self.current = next;
      #[cfg(test)]
      self.lifecycle.push(LifecycleStep::Enter(next));
      transition = self.states.get_mut(next).enter(&self.ctx);
    }
  }

  /* ---------------------------------------------------------- */
  /* transport callbacks */

  pub fn on_client_connected(&mut self, client_id: ClientId) {
    debug!("Client {client_id} connected");
    let transition = self.states.get_mut(self.current).on_client_connected(&self.ctx, client_id);
    self.apply(transition);
  }

  pub fn on_client_disconnect(&mut self, client_id: ClientId) {
    debug!("Client {client_id} disconnected");
    let transition = self.states.get_mut(self.current).on_client_disconnect(&self.ctx, client_id);
    self.apply(transition);
  }

  pub fn on_server_started(&mut self) {
    let transition = self.states.get_mut(self.current).on_server_started(&self.ctx);
    self.apply(transition);
  }

  pub fn on_server_stopped(&mut self) {
    let transition = self.states.get_mut(self.current).on_server_stopped(&self.ctx);
    self.apply(transition);
  }

  pub fn on_transport_failure(&mut self) {
    let transition = self.states.get_mut(self.current).on_transport_failure(&self.ctx);
    self.apply(transition);
  }

  /// Decide on a connection request, denied unless the current state accepts it
  pub fn approval_check(&mut self, request: &ApprovalRequest) -> ApprovalResponse {
    self.states.get_mut(self.current).approval_check(&self.ctx, request)
  }

  /* ---------------------------------------------------------- */
  /* public control surface */

  /// Connect as a client to a host's address and port
  pub fn start_client_ip(&mut self, address: &str, port: u16) {
    let transition = self.states.get_mut(self.current).start_client_ip(&self.ctx, address, port);
    self.apply(transition);
  }

  /// Connect as a client through the relay of the current session
  pub fn start_client_session(&mut self) {
    let transition = self.states.get_mut(self.current).start_client_session(&self.ctx);
    self.apply(transition);
  }

  /// Host on an address and port.
  /// Setup failures are also returned to the caller, the manager is back offline in that case.
  pub fn start_host_ip(&mut self, address: &str, port: u16) -> Result<(), ConnectionError> {
    let transition = self
      .states
      .get_mut(self.current)
      .start_host_ip(&self.ctx, address, port)?;
    self.start_host(transition)
  }

  /// Host through the relay of the current session
  pub fn start_host_session(&mut self) -> Result<(), ConnectionError> {
    let transition = self.states.get_mut(self.current).start_host_session(&self.ctx)?;
    self.start_host(transition)
  }

  fn start_host(&mut self, transition: Option<Transition>) -> Result<(), ConnectionError> {
    let starting = transition.is_some();
    self.apply(transition);
    match self.states.starting_host.take_start_error() {
      Some(e) if starting => Err(e),
      _ => Ok(()),
    }
  }

  /// Leave the current session, whatever the role
  pub fn request_shutdown(&mut self) {
    let transition = self.states.get_mut(self.current).on_user_requested_shutdown(&self.ctx);
    self.apply(transition);
  }

  /// A game starts inside the hosted session, players who leave from now on may come back
  pub fn start_game(&mut self) {
    self.states.get_mut(self.current).on_game_started(&self.ctx);
  }

  /// The game inside the hosted session is over
  pub fn end_game(&mut self) {
    self.states.get_mut(self.current).on_game_ended(&self.ctx);
  }

  /* ---------------------------------------------------------- */

  pub fn current_state(&self) -> StateKind {
    self.current
  }

  pub fn config(&self) -> &ConnectionConfig {
    &self.ctx.config
  }

  /// Receive every outward event published from now on
  pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
    self.ctx.events.subscribe()
  }

  /// Directory of the players known to this host
  pub fn player_sessions(&self) -> &PlayerSessions {
    &self.ctx.player_sessions
  }

  /// Cloneable control surface of this manager, effective once [`ConnectionManager::run`] is running
  pub fn handle(&self) -> ConnectionHandle {
    ConnectionHandle {
      tx: self.command_tx.clone(),
      events: self.ctx.events.clone(),
    }
  }

  fn on_round_message(&mut self, message: RoundMessage) {
    let transition = self.states.get_mut(self.current).on_round_message(&self.ctx, message);
    self.apply(transition);
  }

  fn dispatch(&mut self, command: ManagerCommand) {
    match command {
      ManagerCommand::ClientConnected(client_id) => self.on_client_connected(client_id),
      ManagerCommand::ClientDisconnected(client_id) => self.on_client_disconnect(client_id),
      ManagerCommand::ServerStarted => self.on_server_started(),
      ManagerCommand::ServerStopped => self.on_server_stopped(),
      ManagerCommand::TransportFailure => self.on_transport_failure(),
      ManagerCommand::ApprovalRequest { request, reply } => {
        let response = self.approval_check(&request);
        if reply.send(response).is_err() {
          warn!("Approval requester for client {} has gone away", request.client_id);
        }
      }
      ManagerCommand::StartClientIp { address, port } => self.start_client_ip(&address, port),
      ManagerCommand::StartClientSession => self.start_client_session(),
      ManagerCommand::StartHostIp { address, port, reply } => {
        let _ = reply.send(self.start_host_ip(&address, port));
      }
      ManagerCommand::StartHostSession { reply } => {
        let _ = reply.send(self.start_host_session());
      }
      ManagerCommand::RequestShutdown => self.request_shutdown(),
      ManagerCommand::GameStarted => self.start_game(),
      ManagerCommand::GameEnded => self.end_game(),
      ManagerCommand::CurrentState { reply } => {
        let _ = reply.send(self.current);
      }
    }
  }

  /// Serve commands and reconnection reports on the current task until cancelled.
  /// On cancellation the manager goes offline, shutting the transport down.
  pub async fn run(mut self, cancel_token: CancellationToken) {
    info!("Connection manager started");
    loop {
      tokio::select! {
        Some(command) = self.command_rx.recv() => self.dispatch(command),
        Some(message) = self.round_rx.recv() => self.on_round_message(message),
        _ = cancel_token.cancelled() => {
          warn!("Connection manager cancelled");
          break;
        }
      }
    }
    if self.current != StateKind::Offline {
      self.apply(Some(Transition::Offline));
    }
  }

  /// Wait for the next report of a running reconnection round and apply it.
  /// Only for callers driving the manager through its sync methods instead of [`ConnectionManager::run`];
  /// pends until a round reports.
  pub async fn step_reconnection(&mut self) {
    if let Some(message) = self.round_rx.recv().await {
      self.on_round_message(message);
    }
  }

  /// Apply every reconnection report already received without waiting, returns how many were applied
  pub fn poll_reconnection(&mut self) -> usize {
    let mut applied = 0;
    while let Ok(message) = self.round_rx.try_recv() {
      self.on_round_message(message);
      applied += 1;
    }
    applied
  }
}

/* ---------------------------------------------------------- */
#[derive(Debug, Clone)]
/// Channel-backed control surface of a running [`ConnectionManager`], used by game code and transport adapters
pub struct ConnectionHandle {
  tx: mpsc::Sender<ManagerCommand>,
  events: EventBus,
}

impl ConnectionHandle {
  async fn send(&self, command: ManagerCommand) -> Result<(), ConnectionError> {
    self.tx.send(command).await.map_err(|_| ConnectionError::ManagerClosed)
  }

  /// Receive every outward event published from now on
  pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
    self.events.subscribe()
  }

  pub async fn client_connected(&self, client_id: ClientId) -> Result<(), ConnectionError> {
    self.send(ManagerCommand::ClientConnected(client_id)).await
  }

  pub async fn client_disconnected(&self, client_id: ClientId) -> Result<(), ConnectionError> {
    self.send(ManagerCommand::ClientDisconnected(client_id)).await
  }

  pub async fn server_started(&self) -> Result<(), ConnectionError> {
    self.send(ManagerCommand::ServerStarted).await
  }

  pub async fn server_stopped(&self) -> Result<(), ConnectionError> {
    self.send(ManagerCommand::ServerStopped).await
  }

  pub async fn transport_failure(&self) -> Result<(), ConnectionError> {
    self.send(ManagerCommand::TransportFailure).await
  }

  pub async fn approval_check(&self, request: ApprovalRequest) -> Result<ApprovalResponse, ConnectionError> {
    let (reply, rx) = oneshot::channel();
    self.send(ManagerCommand::ApprovalRequest { request, reply }).await?;
    rx.await.map_err(|_| ConnectionError::ManagerClosed)
  }

  pub async fn start_client_ip(&self, address: impl Into<String>, port: u16) -> Result<(), ConnectionError> {
    self
      .send(ManagerCommand::StartClientIp {
        address: address.into(),
        port,
      })
      .await
  }

  pub async fn start_client_session(&self) -> Result<(), ConnectionError> {
    self.send(ManagerCommand::StartClientSession).await
  }

  pub async fn start_host_ip(&self, address: impl Into<String>, port: u16) -> Result<(), ConnectionError> {
    let (reply, rx) = oneshot::channel();
    self
      .send(ManagerCommand::StartHostIp {
        address: address.into(),
        port,
        reply,
      })
      .await?;
    rx.await.map_err(|_| ConnectionError::ManagerClosed)?
  }

  pub async fn start_host_session(&self) -> Result<(), ConnectionError> {
    let (reply, rx) = oneshot::channel();
    self.send(ManagerCommand::StartHostSession { reply }).await?;
    rx.await.map_err(|_| ConnectionError::ManagerClosed)?
  }

  pub async fn request_shutdown(&self) -> Result<(), ConnectionError> {
    self.send(ManagerCommand::RequestShutdown).await
  }

  pub async fn start_game(&self) -> Result<(), ConnectionError> {
    self.send(ManagerCommand::GameStarted).await
  }

  pub async fn end_game(&self) -> Result<(), ConnectionError> {
    self.send(ManagerCommand::GameEnded).await
  }

  pub async fn current_state(&self) -> Result<StateKind, ConnectionError> {
    let (reply, rx) = oneshot::channel();
    self.send(ManagerCommand::CurrentState { reply }).await?;
    rx.await.map_err(|_| ConnectionError::ManagerClosed)
  }
}

/* ---------------------------------------------------------- */
#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    config::PlayerProfileBuilder,
    session_directory::LocalSessionDirectory,
    transport::{SimulatedTransport, TransportCall},
  };
  use netconn_wire::{ConnectStatus, ConnectionPayload, HOST_SHUTDOWN_REASON};
  use std::time::Duration;

  struct Harness {
    manager: ConnectionManager,
    transport: Arc<SimulatedTransport>,
    events: broadcast::Receiver<ConnectionEvent>,
  }

  impl Harness {
    fn new() -> Self {
      crate::state::test_support::init_logger();
      let transport = Arc::new(SimulatedTransport::new());
      let profile = PlayerProfileBuilder::new()
        .with_player_id("local-player")
        .unwrap()
        .build()
        .unwrap();
      let manager = ConnectionManagerBuilder::default()
        .transport(transport.clone())
        .session_directory(Arc::new(LocalSessionDirectory::new()))
        .profile(profile)
        .runtime_handle(tokio::runtime::Handle::current())
        .build()
        .unwrap();
      let events = manager.subscribe();
      Self {
        manager,
        transport,
        events,
      }
    }

    fn drain_events(&mut self) -> Vec<ConnectionEvent> {
      let mut events = Vec::new();
      while let Ok(event) = self.events.try_recv() {
        events.push(event);
      }
      events
    }

    fn start_client_calls(&self) -> usize {
      self.transport.count_calls(|c| *c == TransportCall::StartClient)
    }
  }

  fn status(status: ConnectStatus) -> ConnectionEvent {
    ConnectionEvent::Connection { status }
  }

  fn progress(current_attempt: u32, max_attempt: u32) -> ConnectionEvent {
    ConnectionEvent::Reconnect {
      current_attempt,
      max_attempt,
    }
  }

  fn approval(client_id: ClientId, player_id: &str) -> ApprovalRequest {
    ApprovalRequest::new(client_id, ConnectionPayload::new(player_id).encode().unwrap())
  }

  #[tokio::test]
  async fn test_builder_requires_collaborators() {
    let result = ConnectionManagerBuilder::default()
      .runtime_handle(tokio::runtime::Handle::current())
      .build();
    assert!(matches!(result, Err(ConnectionBuildError::UninitializedField(_))));
  }

  #[tokio::test]
  async fn test_starts_offline_without_entering() {
    let h = Harness::new();
    assert_eq!(h.manager.current_state(), StateKind::Offline);
    assert!(h.manager.lifecycle.is_empty());
    assert!(h.transport.calls().is_empty());
  }

  #[tokio::test]
  async fn test_ip_client_connects() {
    let mut h = Harness::new();
    h.manager.start_client_ip("127.0.0.1", 7777);
    assert_eq!(h.manager.current_state(), StateKind::ClientConnecting);
    let calls = h.transport.calls();
    assert!(matches!(calls[0], TransportCall::SetConnectionData(_)));
    assert_eq!(
      calls[1..],
      [
        TransportCall::SetConnectionEndpoint("127.0.0.1:7777".parse().unwrap()),
        TransportCall::StartClient,
      ]
    );

    h.manager.on_client_connected(1);
    assert_eq!(h.manager.current_state(), StateKind::ClientConnected);
    assert_eq!(h.drain_events(), vec![status(ConnectStatus::Success)]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_reconnection_budget() {
    let mut h = Harness::new();
    h.manager.start_client_ip("127.0.0.1", 7777);
    h.manager.on_client_connected(1);
    h.transport.set_connected_client(true);

    // connection lost without a reason
    h.manager.on_client_disconnect(1);
    assert_eq!(h.manager.current_state(), StateKind::ClientReconnecting);

    for _ in 0..2 {
      h.manager.step_reconnection().await;
      h.manager.step_reconnection().await;
      assert_eq!(h.manager.current_state(), StateKind::ClientReconnecting);
      // the attempt fails again
      h.manager.on_client_disconnect(1);
    }

    assert_eq!(h.manager.current_state(), StateKind::Offline);
    assert_eq!(h.start_client_calls(), 3);
    assert_eq!(
      h.drain_events(),
      vec![
        status(ConnectStatus::Success),
        status(ConnectStatus::Reconnecting),
        progress(0, 2),
        progress(1, 2),
        status(ConnectStatus::GenericDisconnect),
        progress(2, 2),
      ]
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_poll_reconnection_applies_received_reports() {
    let mut h = Harness::new();
    h.manager.start_client_ip("127.0.0.1", 7777);
    h.manager.on_client_connected(1);
    h.manager.on_client_disconnect(1);
    assert_eq!(h.manager.poll_reconnection(), 0);

    // round reports ready, then its setup once the grace delay is over
    tokio::time::sleep(h.manager.config().first_attempt_delay * 2).await;
    assert_eq!(h.manager.poll_reconnection(), 2);
    assert_eq!(h.manager.current_state(), StateKind::ClientReconnecting);
    assert_eq!(h.start_client_calls(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_host_shutdown_reason_reconnects_and_success_cancels() {
    let mut h = Harness::new();
    h.manager.start_client_ip("127.0.0.1", 7777);
    h.manager.on_client_connected(1);
    h.drain_events();

    h.transport.set_disconnect_reason(HOST_SHUTDOWN_REASON);
    h.manager.on_client_disconnect(1);
    assert_eq!(h.manager.current_state(), StateKind::ClientReconnecting);
    assert_eq!(h.drain_events(), vec![status(ConnectStatus::Reconnecting)]);

    h.manager.step_reconnection().await;
    h.manager.on_client_connected(1);
    assert_eq!(h.manager.current_state(), StateKind::ClientConnected);
    // reconnected during the grace delay, no attempt was counted
    assert_eq!(h.drain_events(), vec![progress(0, 2), progress(0, 2)]);

    // the cancelled round never reports its setup
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(h.manager.round_rx.try_recv().is_err());
    assert_eq!(h.start_client_calls(), 1);
  }

  #[tokio::test]
  async fn test_host_shutdown_disconnects_clients() {
    let mut h = Harness::new();
    h.transport.set_local_client_id(0);
    h.manager.start_host_ip("0.0.0.0", 7777).unwrap();
    assert_eq!(h.manager.current_state(), StateKind::StartingHost);

    let own = h.manager.profile_payload();
    assert!(h.manager.approval_check(&ApprovalRequest::new(0, own)).approved);
    h.manager.on_server_started();
    assert_eq!(h.manager.current_state(), StateKind::Hosting);

    for id in 1..=3 {
      let response = h.manager.approval_check(&approval(id, &format!("player-{id}")));
      assert!(response.approved);
      h.transport.add_connected_client(id);
      h.manager.on_client_connected(id);
    }
    assert_eq!(h.drain_events(), vec![status(ConnectStatus::Success); 4]);
    h.transport.clear_calls();

    h.manager.request_shutdown();
    assert_eq!(h.manager.current_state(), StateKind::Offline);
    let reason = ConnectStatus::HostEndedSession.encode();
    let disconnects = h
      .transport
      .count_calls(|c| matches!(c, TransportCall::DisconnectClient(_, r) if *r == reason));
    assert_eq!(disconnects, 3);
    assert_eq!(h.transport.calls().last(), Some(&TransportCall::Shutdown));
    assert!(h.manager.player_sessions().is_empty());
  }

  #[tokio::test]
  async fn test_duplicate_login() {
    let mut h = Harness::new();
    h.manager.start_host_ip("0.0.0.0", 7777).unwrap();
    h.manager.on_server_started();

    assert!(h.manager.approval_check(&approval(1, "p1")).approved);
    h.transport.add_connected_client(1);
    let response = h.manager.approval_check(&approval(2, "p1"));
    assert!(!response.approved);
    assert_eq!(response.reason, Some(ConnectStatus::LoggedInAgain.encode()));
  }

  #[tokio::test]
  async fn test_game_end_drops_departed_players() {
    let mut h = Harness::new();
    // ignored outside of hosting
    h.manager.end_game();
    assert_eq!(h.manager.current_state(), StateKind::Offline);

    h.manager.start_host_ip("0.0.0.0", 7777).unwrap();
    h.manager.on_server_started();
    assert!(h.manager.approval_check(&approval(1, "p1")).approved);
    h.manager.on_client_disconnect(1);
    assert!(h.manager.player_sessions().player_data("p1").is_some());

    h.manager.end_game();
    assert!(h.manager.player_sessions().player_data("p1").is_none());
    assert_eq!(h.manager.current_state(), StateKind::Hosting);
  }

  #[tokio::test]
  async fn test_host_start_failure_is_returned() {
    let mut h = Harness::new();
    let result = h.manager.start_host_ip("nowhere", 7777);
    assert!(matches!(result, Err(ConnectionError::MethodSetup(_))));
    assert_eq!(h.manager.current_state(), StateKind::Offline);
    assert_eq!(h.drain_events(), vec![status(ConnectStatus::StartHostFailed)]);
    assert_eq!(
      h.manager.lifecycle,
      vec![
        LifecycleStep::Exit(StateKind::Offline),
        LifecycleStep::Enter(StateKind::StartingHost),
        LifecycleStep::Exit(StateKind::StartingHost),
        LifecycleStep::Enter(StateKind::Offline),
      ]
    );

    // relay hosting without a session
    assert!(h.manager.start_host_session().is_err());
    assert_eq!(h.manager.current_state(), StateKind::Offline);
  }

  #[tokio::test]
  async fn test_exit_enter_alternate() {
    let mut h = Harness::new();
    h.manager.start_client_ip("127.0.0.1", 7777);
    h.manager.on_client_connected(1);
    h.transport.set_disconnect_reason(ConnectStatus::HostEndedSession.encode());
    h.manager.on_client_disconnect(1);
    assert_eq!(h.manager.current_state(), StateKind::Offline);

    let steps = &h.manager.lifecycle;
    assert_eq!(steps.len(), 6);
    let mut current = StateKind::Offline;
    for pair in steps.chunks(2) {
      let [LifecycleStep::Exit(exited), LifecycleStep::Enter(entered)] = pair else {
        panic!("unexpected lifecycle {pair:?}");
      };
      assert_eq!(*exited, current);
      current = *entered;
    }
    assert_eq!(current, StateKind::Offline);
  }

  #[tokio::test]
  async fn test_operations_ignored_in_wrong_state() {
    let mut h = Harness::new();
    h.manager.on_client_connected(1);
    h.manager.on_server_started();
    assert_eq!(h.manager.current_state(), StateKind::Offline);
    assert!(!h.manager.approval_check(&approval(1, "p1")).approved);

    h.manager.start_client_ip("127.0.0.1", 7777);
    h.manager.start_host_ip("0.0.0.0", 7777).unwrap();
    assert_eq!(h.manager.current_state(), StateKind::ClientConnecting);
    assert!(h.drain_events().is_empty());
  }

  #[tokio::test]
  async fn test_run_with_handle() {
    let h = Harness::new();
    let transport = h.transport.clone();
    let handle = h.manager.handle();
    let mut events = handle.subscribe();
    let cancel_token = CancellationToken::new();
    let task = tokio::spawn(h.manager.run(cancel_token.clone()));

    handle.start_host_ip("0.0.0.0", 7777).await.unwrap();
    handle.server_started().await.unwrap();
    let response = handle.approval_check(approval(1, "p1")).await.unwrap();
    assert!(response.approved);
    assert_eq!(handle.current_state().await.unwrap(), StateKind::Hosting);
    assert_eq!(events.recv().await.unwrap(), status(ConnectStatus::Success));

    cancel_token.cancel();
    task.await.unwrap();
    assert_eq!(transport.calls().last(), Some(&TransportCall::Shutdown));
    assert!(matches!(
      handle.request_shutdown().await,
      Err(ConnectionError::ManagerClosed)
    ));
  }

  impl ConnectionManager {
    fn profile_payload(&self) -> bytes::Bytes {
      self.ctx.profile.encoded_payload().unwrap()
    }
  }
}
