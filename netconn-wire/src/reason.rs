use crate::{status::ConnectStatus, trace::*};

/// Reason text the transport itself attaches when the host shuts down
pub const HOST_SHUTDOWN_REASON: &str = "Disconnected due to host shutting down.";

/// Classification of the transport's last disconnect reason string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
  /// Empty string: no reason was given, the failure is ambiguous
  Unspecified,
  /// The transport's own host-shutdown text
  HostShuttingDown,
  /// A status encoded by the remote peer
  Status(ConnectStatus),
  /// Anything that failed to decode
  Malformed(String),
}

impl DisconnectReason {
  /// Classify a raw reason string, never fails
  pub fn parse(reason: &str) -> Self {
    if reason.is_empty() {
      return Self::Unspecified;
    }
    if reason == HOST_SHUTDOWN_REASON {
      return Self::HostShuttingDown;
    }
    match ConnectStatus::decode(reason) {
      Ok(status) => Self::Status(status),
      Err(e) => {
        warn!("Malformed disconnect reason {reason:?}: {e}");
        Self::Malformed(reason.to_owned())
      }
    }
  }

  /// True when no reason string was given at all
  pub fn is_unspecified(&self) -> bool {
    matches!(self, Self::Unspecified)
  }

  /// Status to surface for this reason.
  /// Anything that is not an explicit status is reported as a generic disconnect.
  pub fn status(&self) -> ConnectStatus {
    match self {
      Self::Status(status) => *status,
      _ => ConnectStatus::GenericDisconnect,
    }
  }
}

impl From<&str> for DisconnectReason {
  fn from(value: &str) -> Self {
    Self::parse(value)
  }
}
