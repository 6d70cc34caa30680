use crate::config::ConfigValidationError;

/// Errors that happen while driving the connection state machine
#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
  /* --------------------------------------- */
  #[error("Connection method setup failed: {0}")]
  MethodSetup(#[from] ConnectionMethodError),

  #[error("No connection method configured")]
  NoConnectionMethod,

  #[error("Transport refused to start the host")]
  StartHostFailed,

  #[error("Transport refused to start the client")]
  StartClientFailed,

  /* --------------------------------------- */
  #[error("Connection manager is not running")]
  ManagerClosed,
}

/// Errors raised by a connection method while configuring the transport
#[derive(thiserror::Error, Debug)]
pub enum ConnectionMethodError {
  #[error("Invalid address: {0}")]
  InvalidAddress(String),

  #[error("Invalid port: {0}")]
  InvalidPort(u16),

  #[error("No session attached to the session directory")]
  NoSession,

  #[error("Session {0} is hosted by another player")]
  NotSessionHost(String),

  #[error("Invalid connection payload: {0}")]
  Payload(#[from] netconn_wire::WireError),
}

/// Errors of the remote session directory
#[derive(thiserror::Error, Debug)]
pub enum SessionDirectoryError {
  #[error("No current session")]
  NoSession,

  #[error("Failed to rejoin session {session_id}: {reason}")]
  RejoinFailed { session_id: String, reason: String },

  #[error("Player {0} is not in the session")]
  PlayerNotFound(String),
}

/// Errors that happen during building the connection manager
#[derive(thiserror::Error, Debug)]
pub enum ConnectionBuildError {
  /// Required builder field not set
  #[error("Missing required field: {0}")]
  UninitializedField(&'static str),

  #[error("Invalid configuration: {0}")]
  Config(#[from] ConfigValidationError),
}

impl From<derive_builder::UninitializedFieldError> for ConnectionBuildError {
  fn from(e: derive_builder::UninitializedFieldError) -> Self {
    Self::UninitializedField(e.field_name())
  }
}
