use super::{ConnectionState, StateKind, Transition, client_connecting::ClientConnector, online};
use crate::{
  context::ManagerContext,
  method::{ConnectionMethod, ReconnectionSetup},
  trace::*,
  transport::{ClientId, Transport},
};
use netconn_wire::{ConnectStatus, DisconnectReason};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Report sent by a spawned reconnection round to the manager task.
/// Every report carries the id of the round that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoundMessage {
  /// Transport is shut down, the attempt is about to be made
  RoundReady { round: u64 },
  /// Connection method finished preparing the attempt
  SetupFinished { round: u64, setup: ReconnectionSetup },
}

impl RoundMessage {
  fn round(&self) -> u64 {
    match self {
      Self::RoundReady { round } | Self::SetupFinished { round, .. } => *round,
    }
  }
}

/// Client lost its connection and retries a bounded number of times
#[derive(Default)]
pub(crate) struct ClientReconnectingState {
  connector: ClientConnector,
  attempts: u32,
  /// Id of the latest spawned round
  round: u64,
  /// A round is running and has not reported its setup outcome yet
  round_pending: bool,
  /// Scoped to the state's lifetime, each round runs on a child token
  cancel_token: Option<CancellationToken>,
}

/// Timing and collaborators of one reconnection round
struct Round {
  id: u64,
  attempts: u32,
  transport: Arc<dyn Transport>,
  method: Arc<dyn ConnectionMethod>,
  first_attempt_delay: Duration,
  between_attempts_delay: Duration,
  shutdown_poll_interval: Duration,
  tx: mpsc::UnboundedSender<RoundMessage>,
  cancel_token: CancellationToken,
}

impl Round {
  /// Run the round until its setup outcome is reported, or until cancelled.
  /// The token is checked again after every await, the transport may already belong to another state.
  async fn run(self) {
    if self.attempts > 0 {
      tokio::time::sleep(self.between_attempts_delay).await;
    }

    if self.cancel_token.is_cancelled() {
      return;
    }
    info!("Lost connection to host, trying to reconnect...");
    self.transport.shutdown();
    while self.transport.shutdown_in_progress() {
      tokio::time::sleep(self.shutdown_poll_interval).await;
    }
    if !self.report(RoundMessage::RoundReady { round: self.id }) {
      return;
    }

    // give the session directory time to drop a session whose host vanished
    if self.attempts == 0 {
      tokio::time::sleep(self.first_attempt_delay).await;
    }

    if self.cancel_token.is_cancelled() {
      return;
    }
    let setup = self.method.setup_client_reconnection().await;
    self.report(RoundMessage::SetupFinished { round: self.id, setup });
  }

  /// Send a report unless cancelled, false if the round must stop
  fn report(&self, message: RoundMessage) -> bool {
    !self.cancel_token.is_cancelled() && self.tx.send(message).is_ok()
  }
}

impl ClientReconnectingState {
  pub(crate) fn configure(&mut self, method: Arc<dyn ConnectionMethod>) {
    self.connector.configure(method);
  }

  /// Spawn the next reconnection round
  fn schedule_round(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    let Some(method) = self.connector.method().cloned() else {
      error!("No connection method to reconnect with");
      ctx.events.publish_status(ConnectStatus::GenericDisconnect);
      return Some(Transition::Offline);
    };
    let Some(parent) = self.cancel_token.as_ref() else {
      error!("Reconnection round requested outside of the reconnecting state");
      return None;
    };

    self.round += 1;
    self.round_pending = true;
    let cancel_token = parent.child_token();
    let round = Round {
      id: self.round,
      attempts: self.attempts,
      transport: ctx.transport.clone(),
      method,
      first_attempt_delay: ctx.config.first_attempt_delay,
      between_attempts_delay: ctx.config.between_attempts_delay,
      shutdown_poll_interval: ctx.config.shutdown_poll_interval,
      tx: ctx.round_tx.clone(),
      cancel_token: cancel_token.clone(),
    };
    ctx.runtime_handle.spawn(async move {
      tokio::select! {
        biased;
        _ = cancel_token.cancelled() => {
          debug!("Reconnection round cancelled");
        }
        _ = round.run() => {}
      }
    });
    None
  }

  /// Decide what to do after losing the connection, or failing to re-establish it
  fn handle_disconnect(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    let max_attempts = ctx.config.reconnect_attempts;
    let reason = DisconnectReason::parse(&ctx.transport.disconnect_reason());

    if self.attempts < max_attempts {
      return match reason {
        DisconnectReason::Status(status) => {
          ctx.events.publish_status(status);
          match status {
            ConnectStatus::UserRequestedDisconnect
            | ConnectStatus::HostEndedSession
            | ConnectStatus::ServerFull
            | ConnectStatus::IncompatibleBuildType => Some(Transition::Offline),
            _ => self.schedule_round(ctx),
          }
        }
        _ => self.schedule_round(ctx),
      };
    }

    info!("Reconnection budget of {max_attempts} attempts exhausted");
    ctx.events.publish_status(reason.status());
    Some(Transition::Offline)
  }
}

impl ConnectionState for ClientReconnectingState {
  fn kind(&self) -> StateKind {
    StateKind::ClientReconnecting
  }

  fn enter(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    self.attempts = 0;
    self.round_pending = false;
    self.cancel_token = Some(CancellationToken::new());
    self.schedule_round(ctx)
  }

  fn exit(&mut self, ctx: &ManagerContext) {
    if let Some(cancel_token) = self.cancel_token.take() {
      cancel_token.cancel();
    }
    self.round_pending = false;
    ctx.events.publish_reconnect(self.attempts, ctx.config.reconnect_attempts);
  }

  fn on_client_connected(&mut self, _ctx: &ManagerContext, _client_id: ClientId) -> Option<Transition> {
    Some(Transition::ClientConnected)
  }

  fn on_client_disconnect(&mut self, ctx: &ManagerContext, _client_id: ClientId) -> Option<Transition> {
    if self.round_pending {
      // raised by the round's own shutdown, or by a superseded attempt
      debug!("Ignoring disconnect while a reconnection round is preparing");
      return None;
    }
    self.handle_disconnect(ctx)
  }

  fn on_user_requested_shutdown(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    online::user_requested_shutdown(ctx)
  }

  fn on_transport_failure(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    online::transport_failure(ctx)
  }

  fn on_round_message(&mut self, ctx: &ManagerContext, message: RoundMessage) -> Option<Transition> {
    if !self.round_pending || message.round() != self.round {
      debug!("Ignoring stale reconnection report {message:?}");
      return None;
    }

    match message {
      RoundMessage::RoundReady { .. } => {
        let max_attempts = ctx.config.reconnect_attempts;
        info!("Reconnecting attempt {}/{max_attempts}...", self.attempts + 1);
        ctx.events.publish_reconnect(self.attempts, max_attempts);
        None
      }
      RoundMessage::SetupFinished { setup, .. } => {
        // counted once the grace delay is over and the setup has run
        self.attempts += 1;
        self.round_pending = false;
        if setup.success {
          // a failed connection surfaces later as a disconnect callback
          match self.connector.connect_client(ctx) {
            Ok(()) => None,
            Err(e) => {
              error!("Error reconnecting client: {e}");
              self.handle_disconnect(ctx)
            }
          }
        } else {
          if !setup.should_try_again {
            self.attempts = ctx.config.reconnect_attempts;
          }
          self.handle_disconnect(ctx)
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    event::ConnectionEvent,
    method::{IpConnectionMethod, RelayConnectionMethod},
    session_directory::SessionHandle,
    state::test_support::Fixture,
    transport::TransportCall,
  };
  use bytes::Bytes;

  fn reconnecting(method: Arc<dyn ConnectionMethod>) -> ClientReconnectingState {
    let mut state = ClientReconnectingState::default();
    state.configure(method);
    state
  }

  fn ip() -> Arc<dyn ConnectionMethod> {
    Arc::new(IpConnectionMethod::new("127.0.0.1", 7777, Bytes::from_static(b"{}")))
  }

  fn progress(current_attempt: u32, max_attempt: u32) -> ConnectionEvent {
    ConnectionEvent::Reconnect {
      current_attempt,
      max_attempt,
    }
  }

  async fn next_round(fx: &mut Fixture, state: &mut ClientReconnectingState) -> Option<Transition> {
    let message = fx.rounds.recv().await.unwrap();
    state.on_round_message(&fx.ctx, message)
  }

  #[tokio::test(start_paused = true)]
  async fn test_round_reports_progress_then_connects() {
    let mut fx = Fixture::new(None);
    let mut state = reconnecting(ip());
    assert!(state.enter(&fx.ctx).is_none());

    assert!(next_round(&mut fx, &mut state).await.is_none());
    assert_eq!(fx.drain_events(), vec![progress(0, 2)]);
    assert_eq!(fx.transport.calls(), vec![TransportCall::Shutdown]);

    let start = tokio::time::Instant::now();
    assert!(next_round(&mut fx, &mut state).await.is_none());
    assert!(start.elapsed() >= fx.ctx.config.first_attempt_delay);
    assert_eq!(fx.transport.count_calls(|c| *c == TransportCall::StartClient), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_waits_for_shutdown_to_complete() {
    let mut fx = Fixture::new(None);
    fx.transport.set_shutdown_in_progress(true);
    let mut state = reconnecting(ip());
    state.enter(&fx.ctx);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(fx.rounds.try_recv().is_err());

    fx.transport.set_shutdown_in_progress(false);
    assert!(next_round(&mut fx, &mut state).await.is_none());
    assert_eq!(fx.drain_events(), vec![progress(0, 2)]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_disconnect_ignored_while_round_pending() {
    let mut fx = Fixture::new(None);
    let mut state = reconnecting(ip());
    state.enter(&fx.ctx);
    assert!(state.on_client_disconnect(&fx.ctx, 0).is_none());
    assert!(fx.drain_events().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_terminal_reason_goes_offline() {
    let mut fx = Fixture::new(None);
    let mut state = reconnecting(ip());
    state.enter(&fx.ctx);
    next_round(&mut fx, &mut state).await;
    next_round(&mut fx, &mut state).await;
    fx.drain_events();

    fx.transport.set_disconnect_reason(ConnectStatus::ServerFull.encode());
    assert!(matches!(state.on_client_disconnect(&fx.ctx, 0), Some(Transition::Offline)));
    assert_eq!(
      fx.drain_events(),
      vec![ConnectionEvent::Connection {
        status: ConnectStatus::ServerFull
      }]
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_other_reason_retries() {
    let mut fx = Fixture::new(None);
    let mut state = reconnecting(ip());
    state.enter(&fx.ctx);
    next_round(&mut fx, &mut state).await;
    next_round(&mut fx, &mut state).await;
    fx.drain_events();

    fx.transport.set_disconnect_reason(ConnectStatus::LoggedInAgain.encode());
    assert!(state.on_client_disconnect(&fx.ctx, 0).is_none());
    assert_eq!(
      fx.drain_events(),
      vec![ConnectionEvent::Connection {
        status: ConnectStatus::LoggedInAgain
      }]
    );

    // second round waits the between-attempts delay first
    let start = tokio::time::Instant::now();
    assert!(next_round(&mut fx, &mut state).await.is_none());
    assert!(start.elapsed() >= fx.ctx.config.between_attempts_delay);
    assert_eq!(fx.drain_events(), vec![progress(1, 2)]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_abort_clamps_budget() {
    let mut fx = Fixture::new(None);
    // relay without a session: setup says do not try again
    let mut state = reconnecting(Arc::new(RelayConnectionMethod::new(
      fx.directory.clone(),
      Bytes::from_static(b"{}"),
    )));
    state.enter(&fx.ctx);
    assert!(next_round(&mut fx, &mut state).await.is_none());
    assert!(matches!(
      next_round(&mut fx, &mut state).await,
      Some(Transition::Offline)
    ));
    assert_eq!(
      fx.drain_events(),
      vec![
        progress(0, 2),
        ConnectionEvent::Connection {
          status: ConnectStatus::GenericDisconnect
        }
      ]
    );

    state.exit(&fx.ctx);
    assert_eq!(fx.drain_events(), vec![progress(2, 2)]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_rejoin_failure_retries() {
    let mut fx = Fixture::new(None);
    fx.directory.set_session(Some(SessionHandle::new("s1", false)));
    fx.directory.set_rejoin_available(false);
    let mut state = reconnecting(Arc::new(RelayConnectionMethod::new(
      fx.directory.clone(),
      Bytes::from_static(b"{}"),
    )));
    state.enter(&fx.ctx);
    next_round(&mut fx, &mut state).await;
    assert!(next_round(&mut fx, &mut state).await.is_none());
    // a new round was scheduled
    assert!(next_round(&mut fx, &mut state).await.is_none());
    assert_eq!(fx.drain_events(), vec![progress(0, 2), progress(1, 2)]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_exit_cancels_round() {
    let mut fx = Fixture::new(None);
    let mut state = reconnecting(ip());
    state.enter(&fx.ctx);
    next_round(&mut fx, &mut state).await;
    // left during the grace delay, the attempt was not made yet
    state.exit(&fx.ctx);
    assert_eq!(fx.drain_events(), vec![progress(0, 2), progress(0, 2)]);

    // the cancelled round never reports its setup
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(fx.rounds.try_recv().is_err());
    assert_eq!(fx.transport.count_calls(|c| *c == TransportCall::StartClient), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_exit_before_round_starts_leaves_transport_alone() {
    for _ in 0..50 {
      let mut fx = Fixture::new(None);
      let mut state = reconnecting(ip());
      state.enter(&fx.ctx);
      state.exit(&fx.ctx);
      tokio::task::yield_now().await;
      tokio::time::sleep(Duration::from_secs(10)).await;

      assert!(fx.transport.calls().is_empty());
      assert!(fx.rounds.try_recv().is_err());
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_round_cancelled_during_delay_stops() {
    let fx = Fixture::new(None);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel_token = CancellationToken::new();
    let round = Round {
      id: 1,
      attempts: 1,
      transport: fx.ctx.transport.clone(),
      method: ip(),
      first_attempt_delay: fx.ctx.config.first_attempt_delay,
      between_attempts_delay: fx.ctx.config.between_attempts_delay,
      shutdown_poll_interval: fx.ctx.config.shutdown_poll_interval,
      tx,
      cancel_token: cancel_token.clone(),
    };
    let task = tokio::spawn(round.run());
    tokio::time::sleep(fx.ctx.config.between_attempts_delay / 2).await;
    cancel_token.cancel();
    task.await.unwrap();

    assert!(fx.transport.calls().is_empty());
    assert!(rx.try_recv().is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn test_round_cancelled_during_grace_delay_skips_setup() {
    let fx = Fixture::new(None);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel_token = CancellationToken::new();
    let round = Round {
      id: 1,
      attempts: 0,
      transport: fx.ctx.transport.clone(),
      method: ip(),
      first_attempt_delay: fx.ctx.config.first_attempt_delay,
      between_attempts_delay: fx.ctx.config.between_attempts_delay,
      shutdown_poll_interval: fx.ctx.config.shutdown_poll_interval,
      tx,
      cancel_token: cancel_token.clone(),
    };
    let task = tokio::spawn(round.run());
    assert_eq!(rx.recv().await, Some(RoundMessage::RoundReady { round: 1 }));
    cancel_token.cancel();
    task.await.unwrap();

    assert_eq!(fx.transport.calls(), vec![TransportCall::Shutdown]);
    assert!(rx.try_recv().is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn test_stale_round_is_ignored() {
    let mut fx = Fixture::new(None);
    let mut state = reconnecting(ip());
    state.enter(&fx.ctx);
    let stale = RoundMessage::SetupFinished {
      round: state.round + 7,
      setup: ReconnectionSetup::ready(),
    };
    assert!(state.on_round_message(&fx.ctx, stale).is_none());
    assert_eq!(fx.transport.count_calls(|c| *c == TransportCall::StartClient), 0);
  }
}
