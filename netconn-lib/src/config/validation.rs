use crate::constants::{MAX_PLAYER_NAME_LEN, MAX_RECONNECT_ATTEMPTS};
use netconn_wire::{ConnectionPayload, WireError};
use std::time::Duration;

/// Validation errors specific to configuration
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
  #[error("Missing required field: {field}")]
  MissingRequiredField { field: String },

  #[error("Invalid value for field {field}: {value}. {reason}")]
  InvalidFieldValue { field: String, value: String, reason: String },

  #[error("Conflicting configuration: {reason}")]
  ConflictingConfiguration { reason: String },
}

/// Result type for configuration validation
pub type ValidationResult<T> = Result<T, ConfigValidationError>;

/// Validator for connection behavior settings
pub struct ConnectionConfigValidator;

impl ConnectionConfigValidator {
  /// Validate the reconnection budget
  pub fn validate_reconnect_attempts(attempts: u32) -> ValidationResult<()> {
    if attempts == 0 {
      return Err(ConfigValidationError::InvalidFieldValue {
        field: "reconnect_attempts".to_string(),
        value: attempts.to_string(),
        reason: "At least one reconnection attempt is required".to_string(),
      });
    }
    if attempts > MAX_RECONNECT_ATTEMPTS {
      return Err(ConfigValidationError::InvalidFieldValue {
        field: "reconnect_attempts".to_string(),
        value: attempts.to_string(),
        reason: format!("Reconnection attempts is too large (max {MAX_RECONNECT_ATTEMPTS})"),
      });
    }
    Ok(())
  }

  /// Validate the host capacity, the host's own client included
  pub fn validate_max_connected_players(max: usize) -> ValidationResult<()> {
    if max == 0 {
      return Err(ConfigValidationError::InvalidFieldValue {
        field: "max_connected_players".to_string(),
        value: max.to_string(),
        reason: "Max connected players cannot be 0".to_string(),
      });
    }
    Ok(())
  }

  /// Validate the interval used while waiting for a transport shutdown
  pub fn validate_shutdown_poll_interval(interval: Duration) -> ValidationResult<()> {
    if interval.is_zero() {
      return Err(ConfigValidationError::InvalidFieldValue {
        field: "shutdown_poll_interval".to_string(),
        value: format!("{interval:?}"),
        reason: "Shutdown poll interval cannot be 0".to_string(),
      });
    }
    Ok(())
  }

  /// Validate the delays of the reconnection loop
  pub fn validate_reconnect_delays(first: Duration, between: Duration) -> ValidationResult<()> {
    if first > between {
      return Err(ConfigValidationError::ConflictingConfiguration {
        reason: format!("First attempt delay ({first:?}) cannot be longer than the delay between attempts ({between:?})"),
      });
    }
    Ok(())
  }
}

/// Validator for the local player's identity
pub struct PlayerProfileValidator;

impl PlayerProfileValidator {
  /// Validate the stable player id
  pub fn validate_player_id(player_id: &str) -> ValidationResult<()> {
    if player_id.trim().is_empty() {
      return Err(ConfigValidationError::InvalidFieldValue {
        field: "player_id".to_string(),
        value: player_id.to_string(),
        reason: "Player id cannot be empty".to_string(),
      });
    }
    Ok(())
  }

  /// Validate the display name
  pub fn validate_player_name(player_name: &str) -> ValidationResult<()> {
    if player_name.len() > MAX_PLAYER_NAME_LEN {
      crate::trace::warn!("Player name longer than {MAX_PLAYER_NAME_LEN} bytes will be truncated by the host");
    }
    Ok(())
  }

  /// Validate that the encoded join credential fits in a connection request
  pub fn validate_payload(payload: &ConnectionPayload) -> ValidationResult<()> {
    match payload.encode() {
      Ok(_) => Ok(()),
      Err(WireError::PayloadTooLarge { len, max }) => Err(ConfigValidationError::InvalidFieldValue {
        field: "profile".to_string(),
        value: format!("{len} bytes"),
        reason: format!("Connection payload must not exceed {max} bytes"),
      }),
      Err(e) => Err(ConfigValidationError::InvalidFieldValue {
        field: "profile".to_string(),
        value: payload.player_id.clone(),
        reason: e.to_string(),
      }),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_reconnect_attempts() {
    assert!(ConnectionConfigValidator::validate_reconnect_attempts(2).is_ok());
    assert!(ConnectionConfigValidator::validate_reconnect_attempts(MAX_RECONNECT_ATTEMPTS).is_ok());
    assert!(ConnectionConfigValidator::validate_reconnect_attempts(0).is_err());
    assert!(ConnectionConfigValidator::validate_reconnect_attempts(MAX_RECONNECT_ATTEMPTS + 1).is_err());
  }

  #[test]
  fn test_delays() {
    assert!(
      ConnectionConfigValidator::validate_reconnect_delays(Duration::from_secs(1), Duration::from_secs(5)).is_ok()
    );
    assert!(matches!(
      ConnectionConfigValidator::validate_reconnect_delays(Duration::from_secs(6), Duration::from_secs(5)),
      Err(ConfigValidationError::ConflictingConfiguration { .. })
    ));
    assert!(ConnectionConfigValidator::validate_shutdown_poll_interval(Duration::ZERO).is_err());
  }

  #[test]
  fn test_player_profile() {
    assert!(PlayerProfileValidator::validate_player_id("p1").is_ok());
    assert!(PlayerProfileValidator::validate_player_id("  ").is_err());
    assert!(PlayerProfileValidator::validate_payload(&ConnectionPayload::new("p1")).is_ok());
    assert!(PlayerProfileValidator::validate_payload(&ConnectionPayload::new("x".repeat(2000))).is_err());
  }
}
