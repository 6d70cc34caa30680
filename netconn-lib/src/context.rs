use crate::{
  config::{ConnectionConfig, PlayerProfile},
  event::EventBus,
  player_session::PlayerSessions,
  session_directory::SessionDirectory,
  state::RoundMessage,
  transport::Transport,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything a connection state may touch besides its own fields.
/// Owned by the manager and lent to the current state for each operation.
pub(crate) struct ManagerContext {
  pub(crate) transport: Arc<dyn Transport>,
  pub(crate) session_directory: Arc<dyn SessionDirectory>,
  pub(crate) player_sessions: PlayerSessions,
  pub(crate) config: ConnectionConfig,
  pub(crate) profile: PlayerProfile,
  pub(crate) events: EventBus,
  /// Runtime on which background work of the states is spawned
  pub(crate) runtime_handle: tokio::runtime::Handle,
  /// Reports of spawned reconnection rounds, drained by the manager task
  pub(crate) round_tx: mpsc::UnboundedSender<RoundMessage>,
}
