//! Behavior shared by every state with an active transport

use super::Transition;
use crate::{context::ManagerContext, trace::*};
use netconn_wire::ConnectStatus;

/// The user asked to leave
pub(super) fn user_requested_shutdown(ctx: &ManagerContext) -> Option<Transition> {
  ctx.events.publish_status(ConnectStatus::UserRequestedDisconnect);
  Some(Transition::Offline)
}

/// The transport died underneath us
pub(super) fn transport_failure(_ctx: &ManagerContext) -> Option<Transition> {
  warn!("Transport failure, going offline");
  Some(Transition::Offline)
}
