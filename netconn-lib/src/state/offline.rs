use super::{ConnectionState, StateKind, Transition};
use crate::{
  context::ManagerContext,
  error::ConnectionError,
  method::{ConnectionMethod, IpConnectionMethod, RelayConnectionMethod},
  trace::*,
};
use bytes::Bytes;
use netconn_wire::{ConnectStatus, WireError};
use std::sync::Arc;

/// Transport is shut down. Starting point of every client or host session.
pub(crate) struct OfflineState;

impl OfflineState {
  fn payload(ctx: &ManagerContext) -> Result<Bytes, WireError> {
    ctx.profile.encoded_payload()
  }

  fn start_client(&self, ctx: &ManagerContext, method: Result<Arc<dyn ConnectionMethod>, WireError>) -> Option<Transition> {
    match method {
      Ok(method) => Some(Transition::ClientConnecting(method)),
      Err(e) => {
        error!("Cannot encode the connection payload: {e}");
        ctx.events.publish_status(ConnectStatus::StartClientFailed);
        None
      }
    }
  }

  fn start_host(
    &self,
    ctx: &ManagerContext,
    method: Result<Arc<dyn ConnectionMethod>, WireError>,
  ) -> Result<Option<Transition>, ConnectionError> {
    match method {
      Ok(method) => Ok(Some(Transition::StartingHost(method))),
      Err(e) => {
        error!("Cannot encode the connection payload: {e}");
        ctx.events.publish_status(ConnectStatus::StartHostFailed);
        Err(ConnectionError::MethodSetup(e.into()))
      }
    }
  }

  fn ip_method(ctx: &ManagerContext, address: &str, port: u16) -> Result<Arc<dyn ConnectionMethod>, WireError> {
    let payload = Self::payload(ctx)?;
    Ok(Arc::new(IpConnectionMethod::new(address, port, payload)))
  }

  fn relay_method(ctx: &ManagerContext) -> Result<Arc<dyn ConnectionMethod>, WireError> {
    let payload = Self::payload(ctx)?;
    Ok(Arc::new(RelayConnectionMethod::new(ctx.session_directory.clone(), payload)))
  }
}

impl ConnectionState for OfflineState {
  fn kind(&self) -> StateKind {
    StateKind::Offline
  }

  fn enter(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    ctx.session_directory.end_tracking();
    if ctx.transport.is_connected_client() {
      ctx.transport.shutdown();
    }
    None
  }

  fn start_client_ip(&mut self, ctx: &ManagerContext, address: &str, port: u16) -> Option<Transition> {
    self.start_client(ctx, Self::ip_method(ctx, address, port))
  }

  fn start_client_session(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    self.start_client(ctx, Self::relay_method(ctx))
  }

  fn start_host_ip(
    &mut self,
    ctx: &ManagerContext,
    address: &str,
    port: u16,
  ) -> Result<Option<Transition>, ConnectionError> {
    self.start_host(ctx, Self::ip_method(ctx, address, port))
  }

  fn start_host_session(&mut self, ctx: &ManagerContext) -> Result<Option<Transition>, ConnectionError> {
    self.start_host(ctx, Self::relay_method(ctx))
  }
}
