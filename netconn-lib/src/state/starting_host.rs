use super::{ConnectionState, StateKind, Transition, online};
use crate::{
  context::ManagerContext,
  error::ConnectionError,
  method::ConnectionMethod,
  player_session::SessionPlayerData,
  trace::*,
  transport::{ApprovalRequest, ApprovalResponse},
};
use netconn_wire::{ConnectStatus, ConnectionPayload};
use std::sync::Arc;

/// Host is starting up
#[derive(Default)]
pub(crate) struct StartingHostState {
  method: Option<Arc<dyn ConnectionMethod>>,
  /// Why the last start failed, handed to the caller of the start operation
  start_error: Option<ConnectionError>,
}

impl StartingHostState {
  pub(crate) fn configure(&mut self, method: Arc<dyn ConnectionMethod>) {
    self.method = Some(method);
  }

  pub(crate) fn take_start_error(&mut self) -> Option<ConnectionError> {
    self.start_error.take()
  }

  fn start_host(&self, ctx: &ManagerContext) -> Result<(), ConnectionError> {
    let method = self.method.as_ref().ok_or(ConnectionError::NoConnectionMethod)?;
    method.setup_host_connection(ctx.transport.as_ref())?;
    // otherwise the session service starts everything
    if !method.starts_transport() && !ctx.transport.start_host() {
      return Err(ConnectionError::StartHostFailed);
    }
    debug!("Host started through {} connection", method.name());
    Ok(())
  }

  fn start_host_failed(&self, ctx: &ManagerContext) -> Option<Transition> {
    ctx.events.publish_status(ConnectStatus::StartHostFailed);
    Some(Transition::Offline)
  }
}

impl ConnectionState for StartingHostState {
  fn kind(&self) -> StateKind {
    StateKind::StartingHost
  }

  fn enter(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    self.start_error = None;
    match self.start_host(ctx) {
      Ok(()) => None,
      Err(e) => {
        error!("Error starting host: {e}");
        self.start_error = Some(e);
        self.start_host_failed(ctx)
      }
    }
  }

  fn on_server_started(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    ctx.events.publish_status(ConnectStatus::Success);
    Some(Transition::Hosting)
  }

  fn on_server_stopped(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    self.start_host_failed(ctx)
  }

  /// Only the host's own client connects before the server is up, it approves itself
  fn approval_check(&mut self, ctx: &ManagerContext, request: &ApprovalRequest) -> ApprovalResponse {
    if request.client_id != ctx.transport.local_client_id() {
      return ApprovalResponse::deny();
    }
    match ConnectionPayload::decode(&request.payload) {
      Ok(payload) => {
        ctx.player_sessions.setup_connecting_player(
          request.client_id,
          &payload.player_id,
          SessionPlayerData::new(request.client_id, payload.player_name.as_deref()),
        );
        ApprovalResponse::approve()
      }
      Err(e) => {
        error!("Invalid payload from the host's own client: {e}");
        ApprovalResponse::deny()
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
