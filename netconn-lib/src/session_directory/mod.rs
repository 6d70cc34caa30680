//! Boundary with the lobby/session directory service used by relay connections

mod local;

use crate::error::SessionDirectoryError;
use async_trait::async_trait;

pub use local::LocalSessionDirectory;

/// Lobby-like session the local player currently belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
  pub id: String,
  /// Code used by other players to join through the relay
  pub join_code: Option<String>,
  /// True when the local player created the session
  pub is_host: bool,
}

impl SessionHandle {
  pub fn new(id: impl Into<String>, is_host: bool) -> Self {
    Self {
      id: id.into(),
      join_code: None,
      is_host,
    }
  }

  pub fn with_join_code(mut self, join_code: impl Into<String>) -> Self {
    self.join_code = Some(join_code.into());
    self
  }
}

#[async_trait]
/// Session directory, only reachable through this trait from the connection states
pub trait SessionDirectory: Send + Sync {
  /// Keep the current session alive while hosting
  fn begin_tracking(&self);

  /// Stop keeping the session alive and forget it
  fn end_tracking(&self);

  /// Session the local player currently belongs to
  fn current_session(&self) -> Option<SessionHandle>;

  /// Host side removal of a player, fire-and-forget from the caller's view
  async fn remove_player_from_session(&self, player_id: &str) -> Result<(), SessionDirectoryError>;

  /// Rejoin the current session after a lost connection
  async fn reconnect_to_session(&self) -> Result<SessionHandle, SessionDirectoryError>;
}
