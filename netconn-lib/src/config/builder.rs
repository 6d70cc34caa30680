use crate::config::{ConnectionConfig, PlayerProfile, validation::*};
use std::time::Duration;

/// Builder for creating connection configurations with validation
#[derive(Debug, Default)]
pub struct ConnectionConfigBuilder {
  reconnect_attempts: Option<u32>,
  max_connected_players: Option<usize>,
  first_attempt_delay: Option<Duration>,
  between_attempts_delay: Option<Duration>,
  shutdown_poll_interval: Option<Duration>,
}

impl ConnectionConfigBuilder {
  /// Create a new configuration builder, unset fields take their defaults
  pub fn new() -> Self {
    Self::default()
  }

  /// Set the reconnection budget
  pub fn with_reconnect_attempts(mut self, attempts: u32) -> Result<Self, ConfigValidationError> {
    ConnectionConfigValidator::validate_reconnect_attempts(attempts)?;
    self.reconnect_attempts = Some(attempts);
    Ok(self)
  }

  /// Set the host capacity
  pub fn with_max_connected_players(mut self, max: usize) -> Result<Self, ConfigValidationError> {
    ConnectionConfigValidator::validate_max_connected_players(max)?;
    self.max_connected_players = Some(max);
    Ok(self)
  }

  /// Set the reconnection delays
  pub fn with_reconnect_delays(mut self, first: Duration, between: Duration) -> Result<Self, ConfigValidationError> {
    ConnectionConfigValidator::validate_reconnect_delays(first, between)?;
    self.first_attempt_delay = Some(first);
    self.between_attempts_delay = Some(between);
    Ok(self)
  }

  /// Set the shutdown poll interval
  pub fn with_shutdown_poll_interval(mut self, interval: Duration) -> Result<Self, ConfigValidationError> {
    ConnectionConfigValidator::validate_shutdown_poll_interval(interval)?;
    self.shutdown_poll_interval = Some(interval);
    Ok(self)
  }

  /// Build the final configuration
  pub fn build(self) -> Result<ConnectionConfig, ConfigValidationError> {
    let default = ConnectionConfig::default();
    let config = ConnectionConfig {
      reconnect_attempts: self.reconnect_attempts.unwrap_or(default.reconnect_attempts),
      max_connected_players: self.max_connected_players.unwrap_or(default.max_connected_players),
      first_attempt_delay: self.first_attempt_delay.unwrap_or(default.first_attempt_delay),
      between_attempts_delay: self.between_attempts_delay.unwrap_or(default.between_attempts_delay),
      shutdown_poll_interval: self.shutdown_poll_interval.unwrap_or(default.shutdown_poll_interval),
    };
    // Final validation
    config.validate()?;
    Ok(config)
  }
}

/// Builder for the local player's profile
#[derive(Debug, Default)]
pub struct PlayerProfileBuilder {
  player_id: Option<String>,
  player_name: Option<String>,
  build_type: Option<String>,
}

impl PlayerProfileBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Set the stable player id (required)
  pub fn with_player_id(mut self, player_id: impl Into<String>) -> Result<Self, ConfigValidationError> {
    let player_id = player_id.into();
    PlayerProfileValidator::validate_player_id(&player_id)?;
    self.player_id = Some(player_id);
    Ok(self)
  }

  /// Set the display name
  pub fn with_player_name(mut self, player_name: impl Into<String>) -> Result<Self, ConfigValidationError> {
    let player_name = player_name.into();
    PlayerProfileValidator::validate_player_name(&player_name)?;
    self.player_name = Some(player_name);
    Ok(self)
  }

  /// Set the build flavor
  pub fn with_build_type(mut self, build_type: impl Into<String>) -> Self {
    self.build_type = Some(build_type.into());
    self
  }

  pub fn build(self) -> Result<PlayerProfile, ConfigValidationError> {
    let player_id = self.player_id.ok_or(ConfigValidationError::MissingRequiredField {
      field: "player_id".to_string(),
    })?;
    let profile = PlayerProfile {
      player_id,
      player_name: self.player_name,
      build_type: self.build_type,
    };
    profile.validate()?;
    Ok(profile)
  }
}
