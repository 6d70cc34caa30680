use super::{ConnectionState, StateKind, Transition, online};
use crate::{
  context::ManagerContext, error::ConnectionError, method::ConnectionMethod, trace::*, transport::ClientId,
};
use netconn_wire::{ConnectStatus, DisconnectReason};
use std::sync::Arc;

/// Client side connection routine, shared by the connecting and reconnecting states
#[derive(Debug, Default)]
pub(super) struct ClientConnector {
  method: Option<Arc<dyn ConnectionMethod>>,
}

impl ClientConnector {
  pub(super) fn configure(&mut self, method: Arc<dyn ConnectionMethod>) {
    self.method = Some(method);
  }

  pub(super) fn method(&self) -> Option<&Arc<dyn ConnectionMethod>> {
    self.method.as_ref()
  }

  /// Set up the transport through the connection method and start the client.
  /// The outcome of the connection itself arrives later as a transport callback.
  pub(super) fn connect_client(&self, ctx: &ManagerContext) -> Result<(), ConnectionError> {
    let method = self.method.as_ref().ok_or(ConnectionError::NoConnectionMethod)?;
    method.setup_client_connection(ctx.transport.as_ref())?;
    if !method.starts_transport() && !ctx.transport.start_client() {
      return Err(ConnectionError::StartClientFailed);
    }
    debug!("Client started through {} connection", method.name());
    Ok(())
  }
}

/// Client is attempting to connect to a host
#[derive(Default)]
pub(crate) struct ClientConnectingState {
  connector: ClientConnector,
}

impl ClientConnectingState {
  pub(crate) fn configure(&mut self, method: Arc<dyn ConnectionMethod>) {
    self.connector.configure(method);
  }

  fn client_failed(&self, ctx: &ManagerContext) -> Option<Transition> {
    let reason = DisconnectReason::parse(&ctx.transport.disconnect_reason());
    if reason.is_unspecified() {
      ctx.events.publish_status(ConnectStatus::StartClientFailed);
      return Some(Transition::ClientReconnecting);
    }
    ctx.events.publish_status(reason.status());
    Some(Transition::Offline)
  }
}

impl ConnectionState for ClientConnectingState {
  fn kind(&self) -> StateKind {
    StateKind::ClientConnecting
  }

  fn enter(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    match self.connector.connect_client(ctx) {
      Ok(()) => None,
      Err(e) => {
        error!("Error connecting client: {e}");
        self.client_failed(ctx)
      }
    }
  }

  fn on_client_connected(&mut self, ctx: &ManagerContext, _client_id: ClientId) -> Option<Transition> {
    ctx.events.publish_status(ConnectStatus::Success);
    Some(Transition::ClientConnected)
  }

  fn on_client_disconnect(&mut self, ctx: &ManagerContext, _client_id: ClientId) -> Option<Transition> {
    // the id can only be ours here
    self.client_failed(ctx)
  }

  fn on_user_requested_shutdown(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    online::user_requested_shutdown(ctx)
  }

  fn on_transport_failure(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    online::transport_failure(ctx)
  }
}
