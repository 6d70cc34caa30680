/// Errors while encoding or decoding values exchanged between host and client
#[derive(Debug, thiserror::Error)]
pub enum WireError {
  #[error("Empty disconnect reason")]
  EmptyReason,

  #[error("Unknown connect status: {0}")]
  UnknownStatus(String),

  /* --------------------------------------- */
  /// Checked before any deserialization is attempted
  #[error("Connection payload too large: {len} bytes (max {max})")]
  PayloadTooLarge { len: usize, max: usize },

  #[error("Invalid connection payload: {0}")]
  InvalidPayload(String),

  /* --------------------------------------- */
  #[error("Json error: {0}")]
  Json(#[from] serde_json::Error),
}
