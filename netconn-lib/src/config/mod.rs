pub mod builder;
pub mod validation;

use crate::constants::*;
use netconn_wire::{ConnectionPayload, WireError};
use std::time::Duration;

pub use builder::{ConnectionConfigBuilder, PlayerProfileBuilder};
pub use validation::{ConfigValidationError, ValidationResult};

/// Behavior settings of the connection manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
  /// Reconnection attempts before giving up (default: 2)
  pub reconnect_attempts: u32,
  /// Host capacity, the host's own client included (default: 8)
  pub max_connected_players: usize,
  /// Delay before the first reconnection attempt (default: 1 second)
  pub first_attempt_delay: Duration,
  /// Delay between two reconnection attempts (default: 5 seconds)
  pub between_attempts_delay: Duration,
  /// Poll interval while waiting for the transport to finish shutting down
  pub shutdown_poll_interval: Duration,
}

impl Default for ConnectionConfig {
  fn default() -> Self {
    Self {
      reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
      max_connected_players: DEFAULT_MAX_CONNECTED_PLAYERS,
      first_attempt_delay: Duration::from_millis(FIRST_ATTEMPT_DELAY_MSEC),
      between_attempts_delay: Duration::from_millis(BETWEEN_ATTEMPTS_DELAY_MSEC),
      shutdown_poll_interval: Duration::from_millis(SHUTDOWN_POLL_INTERVAL_MSEC),
    }
  }
}

impl ConnectionConfig {
  /// Check every field, used when the config was assembled by hand
  pub fn validate(&self) -> ValidationResult<()> {
    use validation::ConnectionConfigValidator as V;
    V::validate_reconnect_attempts(self.reconnect_attempts)?;
    V::validate_max_connected_players(self.max_connected_players)?;
    V::validate_shutdown_poll_interval(self.shutdown_poll_interval)?;
    V::validate_reconnect_delays(self.first_attempt_delay, self.between_attempts_delay)?;
    Ok(())
  }
}

/// Identity of the local player, sent to the host with every connection request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProfile {
  /// Stable id, kept across reconnections
  pub player_id: String,
  pub player_name: Option<String>,
  /// Build flavor compared by the host, if both sides set one
  pub build_type: Option<String>,
}

impl PlayerProfile {
  /// Join credential of this player
  pub fn connection_payload(&self) -> ConnectionPayload {
    ConnectionPayload {
      player_id: self.player_id.clone(),
      player_name: self.player_name.clone(),
      build_type: self.build_type.clone(),
    }
  }

  /// Encoded join credential
  pub fn encoded_payload(&self) -> Result<bytes::Bytes, WireError> {
    self.connection_payload().encode()
  }

  pub fn validate(&self) -> ValidationResult<()> {
    use validation::PlayerProfileValidator as V;
    V::validate_player_id(&self.player_id)?;
    if let Some(name) = self.player_name.as_deref() {
      V::validate_player_name(name)?;
    }
    V::validate_payload(&self.connection_payload())?;
    Ok(())
  }
}
