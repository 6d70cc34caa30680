use crate::error::WireError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Maximum size of the join credential in bytes.
/// Bigger buffers are refused before deserialization as a light protection against
/// garbage-flooding connection attempts.
pub const MAX_CONNECT_PAYLOAD: usize = 1024;

/// Join credential sent by a client as opaque bytes with its connection request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPayload {
  /// Stable player id, survives reconnection
  pub player_id: String,
  /// Display name
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub player_name: Option<String>,
  /// Build flavor of the client, compared against the host's when both are set
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build_type: Option<String>,
}

impl ConnectionPayload {
  pub fn new(player_id: impl Into<String>) -> Self {
    Self {
      player_id: player_id.into(),
      ..Default::default()
    }
  }

  pub fn with_player_name(mut self, player_name: impl Into<String>) -> Self {
    self.player_name = Some(player_name.into());
    self
  }

  pub fn with_build_type(mut self, build_type: impl Into<String>) -> Self {
    self.build_type = Some(build_type.into());
    self
  }

  /// Check only the length of a raw payload
  pub fn check_size(buf: &[u8]) -> Result<(), WireError> {
    if buf.len() > MAX_CONNECT_PAYLOAD {
      return Err(WireError::PayloadTooLarge {
        len: buf.len(),
        max: MAX_CONNECT_PAYLOAD,
      });
    }
    Ok(())
  }

  /// Serialize into the bytes handed to the transport
  pub fn encode(&self) -> Result<Bytes, WireError> {
    let buf = serde_json::to_vec(self)?;
    Self::check_size(&buf)?;
    Ok(Bytes::from(buf))
  }

  /// Deserialize a payload received with a connection request.
  /// The size is checked first, oversized input is never parsed.
  pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
    Self::check_size(buf)?;
    let payload: Self = serde_json::from_slice(buf)?;
    if payload.player_id.is_empty() {
      return Err(WireError::InvalidPayload("empty player id".to_string()));
    }
    Ok(payload)
  }
}
