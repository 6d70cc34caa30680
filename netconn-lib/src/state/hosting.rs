use super::{ConnectionState, StateKind, Transition, online};
use crate::{
  context::ManagerContext,
  player_session::SessionPlayerData,
  trace::*,
  transport::{ApprovalRequest, ApprovalResponse, ClientId},
};
use netconn_wire::{ConnectStatus, ConnectionPayload};

/// Host is listening and handles incoming clients
pub(crate) struct HostingState;

impl HostingState {
  fn connect_status(ctx: &ManagerContext, payload: &ConnectionPayload) -> ConnectStatus {
    if ctx.transport.connected_client_ids().len() >= ctx.config.max_connected_players {
      return ConnectStatus::ServerFull;
    }
    if ctx.player_sessions.is_duplicate_connection(&payload.player_id) {
      return ConnectStatus::LoggedInAgain;
    }
    if let Some(host_build) = ctx.profile.build_type.as_deref() {
      if payload.build_type.as_deref() != Some(host_build) {
        return ConnectStatus::IncompatibleBuildType;
      }
    }
    ConnectStatus::Success
  }
}

impl ConnectionState for HostingState {
  fn kind(&self) -> StateKind {
    StateKind::Hosting
  }

  fn enter(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    ctx.player_sessions.on_session_started();
    if ctx.session_directory.current_session().is_some() {
      ctx.session_directory.begin_tracking();
    }
    None
  }

  fn exit(&mut self, ctx: &ManagerContext) {
    ctx.player_sessions.on_server_ended();
  }

  fn on_client_connected(&mut self, ctx: &ManagerContext, client_id: ClientId) -> Option<Transition> {
    if ctx.player_sessions.player_data_by_client(client_id).is_some() {
      ctx.events.publish_status(ConnectStatus::Success);
    } else {
      // session data is registered during approval
      error!("No player data associated with client {client_id}");
      ctx
        .transport
        .disconnect_client(client_id, &ConnectStatus::GenericDisconnect.encode());
    }
    None
  }

  fn on_client_disconnect(&mut self, ctx: &ManagerContext, client_id: ClientId) -> Option<Transition> {
    if client_id == ctx.transport.local_client_id() {
      return None;
    }
    if let Some(player_id) = ctx.player_sessions.player_id(client_id) {
      if ctx.player_sessions.player_data(&player_id).is_some() {
        ctx.events.publish_status(ConnectStatus::GenericDisconnect);
      }
      ctx.player_sessions.disconnect_client(client_id);
    }
    None
  }

  fn on_user_requested_shutdown(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    let reason = ConnectStatus::HostEndedSession.encode();
    let local = ctx.transport.local_client_id();
    // disconnecting shrinks the transport's list, walk it from the end
    for client_id in ctx.transport.connected_client_ids().into_iter().rev() {
      if client_id != local {
        ctx.transport.disconnect_client(client_id, &reason);
      }
    }
    Some(Transition::Offline)
  }

  fn on_server_stopped(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    ctx.events.publish_status(ConnectStatus::GenericDisconnect);
    Some(Transition::Offline)
  }

  fn on_transport_failure(&mut self, ctx: &ManagerContext) -> Option<Transition> {
    online::transport_failure(ctx)
  }

  fn on_game_started(&mut self, ctx: &ManagerContext) {
    ctx.player_sessions.on_session_started();
  }

  /// Players who left during the game are forgotten, the others stay for the next one
  fn on_game_ended(&mut self, ctx: &ManagerContext) {
    ctx.player_sessions.on_session_ended();
  }

  fn approval_check(&mut self, ctx: &ManagerContext, request: &ApprovalRequest) -> ApprovalResponse {
    let client_id = request.client_id;
    debug!("Approval check for client {client_id}");

    // oversized buffers are refused without looking at them
    if let Err(e) = ConnectionPayload::check_size(&request.payload) {
      warn!("Connection from client {client_id} denied: {e}");
      return ApprovalResponse::deny();
    }
    let payload = match ConnectionPayload::decode(&request.payload) {
      Ok(payload) => payload,
      Err(e) => {
        warn!("Connection from client {client_id} denied, invalid payload: {e}");
        return ApprovalResponse::deny();
      }
    };

    let status = Self::connect_status(ctx, &payload);
    if status == ConnectStatus::Success {
      ctx.player_sessions.setup_connecting_player(
        client_id,
        &payload.player_id,
        SessionPlayerData::new(client_id, payload.player_name.as_deref()),
      );
      return ApprovalResponse::approve();
    }

    info!("Connection from client {client_id} denied: {status}");
    if ctx.session_directory.current_session().is_some() {
      let session_directory = ctx.session_directory.clone();
      let player_id = payload.player_id;
      ctx.runtime_handle.spawn(async move {
        if let Err(e) = session_directory.remove_player_from_session(&player_id).await {
          warn!("Failed to remove player {player_id} from session: {e}");
        }
      });
    }
    ApprovalResponse::deny_with(status)
  }
}
