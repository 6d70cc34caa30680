use super::{ConnectionState, StateKind, Transition, online};
use crate::{context::ManagerContext, trace::*, transport::ClientId};
use netconn_wire::{ConnectStatus, DisconnectReason};

/// Client is connected to a host
pub(crate) struct ClientConnectedState;

impl ConnectionState for ClientConnectedState {
  fn kind(&self) -> StateKind {
    StateKind::ClientConnected
  }

  fn enter(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    if ctx.session_directory.current_session().is_some() {
      ctx.session_directory.begin_tracking();
    }
    None
  }

  fn on_client_disconnect(&mut self, ctx: &ManagerContext, _client_id: ClientId) -> Option<Transition> {
    match DisconnectReason::parse(&ctx.transport.disconnect_reason()) {
      DisconnectReason::Unspecified | DisconnectReason::HostShuttingDown => {
        info!("Lost connection to host");
        ctx.events.publish_status(ConnectStatus::Reconnecting);
        Some(Transition::ClientReconnecting)
      }
      reason => {
        ctx.events.publish_status(reason.status());
        Some(Transition::Offline)
      }
    }
  }

  fn on_user_requested_shutdown(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    online::user_requested_shutdown(ctx)
  }

  fn on_transport_failure(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    online::transport_failure(ctx)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    event::ConnectionEvent,
    session_directory::{SessionDirectory, SessionHandle},
    state::test_support::Fixture,
  };
  use netconn_wire::HOST_SHUTDOWN_REASON;

  fn status(status: ConnectStatus) -> ConnectionEvent {
    ConnectionEvent::Connection { status }
  }

  #[tokio::test]
  async fn test_enter_tracks_session() {
    let fx = Fixture::new(None);
    ClientConnectedState.enter(&fx.ctx);
    assert!(!fx.directory.is_tracking());

    fx.directory.set_session(Some(SessionHandle::new("s1", false)));
    ClientConnectedState.enter(&fx.ctx);
    assert!(fx.directory.is_tracking());
    assert!(fx.directory.current_session().is_some());
  }

  #[tokio::test]
  async fn test_unspecified_and_host_shutdown_reconnect() {
    let mut fx = Fixture::new(None);
    for reason in ["", HOST_SHUTDOWN_REASON] {
      fx.transport.set_disconnect_reason(reason);
      assert!(matches!(
        ClientConnectedState.on_client_disconnect(&fx.ctx, 0),
        Some(Transition::ClientReconnecting)
      ));
      assert_eq!(fx.drain_events(), vec![status(ConnectStatus::Reconnecting)]);
    }
  }

  #[tokio::test]
  async fn test_explicit_reason_goes_offline() {
    let mut fx = Fixture::new(None);
    fx.transport.set_disconnect_reason(ConnectStatus::HostEndedSession.encode());
    assert!(matches!(
      ClientConnectedState.on_client_disconnect(&fx.ctx, 0),
      Some(Transition::Offline)
    ));
    assert_eq!(fx.drain_events(), vec![status(ConnectStatus::HostEndedSession)]);

    fx.transport.set_disconnect_reason("not a status");
    assert!(matches!(
      ClientConnectedState.on_client_disconnect(&fx.ctx, 0),
      Some(Transition::Offline)
    ));
    assert_eq!(fx.drain_events(), vec![status(ConnectStatus::GenericDisconnect)]);
  }

  #[tokio::test]
  async fn test_user_requested_shutdown() {
    let mut fx = Fixture::new(None);
    assert!(matches!(
      ClientConnectedState.on_user_requested_shutdown(&fx.ctx),
      Some(Transition::Offline)
    ));
    assert_eq!(fx.drain_events(), vec![status(ConnectStatus::UserRequestedDisconnect)]);
    assert!(matches!(
      ClientConnectedState.on_transport_failure(&fx.ctx),
      Some(Transition::Offline)
    ));
    assert!(fx.drain_events().is_empty());
  }
}
