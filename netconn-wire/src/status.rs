use crate::error::WireError;
use serde::{Deserialize, Serialize};

/// Outcome of a connection attempt, or the cause of a disconnection.
/// It crosses the network as the transport's free-form disconnect reason string,
/// so the encoding relies only on variant names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectStatus {
  #[default]
  Undefined,
  /// Client successfully connected, also used for a successful reconnection
  Success,
  /// Host is already at capacity
  ServerFull,
  /// Logged in on another client, this one is kicked out
  LoggedInAgain,
  /// Intentional disconnection triggered by the user
  UserRequestedDisconnect,
  /// Disconnected without a specific reason
  GenericDisconnect,
  /// Connection lost, trying to reconnect
  Reconnecting,
  /// Client build type does not match the host
  IncompatibleBuildType,
  /// Host intentionally ended the session
  HostEndedSession,
  /// Host failed to bind or start
  StartHostFailed,
  /// Failed to connect to the host, or invalid endpoint
  StartClientFailed,
}

impl ConnectStatus {
  /// Every variant, in declaration order
  pub const ALL: [ConnectStatus; 11] = [
    ConnectStatus::Undefined,
    ConnectStatus::Success,
    ConnectStatus::ServerFull,
    ConnectStatus::LoggedInAgain,
    ConnectStatus::UserRequestedDisconnect,
    ConnectStatus::GenericDisconnect,
    ConnectStatus::Reconnecting,
    ConnectStatus::IncompatibleBuildType,
    ConnectStatus::HostEndedSession,
    ConnectStatus::StartHostFailed,
    ConnectStatus::StartClientFailed,
  ];

  /// Variant name, identical to the serialized form without quotes
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Undefined => "Undefined",
      Self::Success => "Success",
      Self::ServerFull => "ServerFull",
      Self::LoggedInAgain => "LoggedInAgain",
      Self::UserRequestedDisconnect => "UserRequestedDisconnect",
      Self::GenericDisconnect => "GenericDisconnect",
      Self::Reconnecting => "Reconnecting",
      Self::IncompatibleBuildType => "IncompatibleBuildType",
      Self::HostEndedSession => "HostEndedSession",
      Self::StartHostFailed => "StartHostFailed",
      Self::StartClientFailed => "StartClientFailed",
    }
  }

  /// Encode into the disconnect reason string, a JSON string literal like `"ServerFull"`.
  /// Never empty, so it cannot be mistaken for the "no reason" sentinel.
  pub fn encode(&self) -> String {
    serde_json::Value::String(self.as_str().to_owned()).to_string()
  }

  /// Decode a disconnect reason string produced by [`ConnectStatus::encode`]
  pub fn decode(reason: &str) -> Result<Self, WireError> {
    let reason = reason.trim();
    if reason.is_empty() {
      return Err(WireError::EmptyReason);
    }
    Ok(serde_json::from_str(reason)?)
  }
}

impl std::fmt::Display for ConnectStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl TryFrom<&str> for ConnectStatus {
  type Error = WireError;
  fn try_from(value: &str) -> Result<Self, Self::Error> {
    Self::ALL
      .into_iter()
      .find(|s| s.as_str().eq_ignore_ascii_case(value))
      .ok_or_else(|| WireError::UnknownStatus(value.to_string()))
  }
}
