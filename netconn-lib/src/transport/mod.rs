//! Boundary with the real-time transport
//!
//! The transport establishes and tears down host/client connections. It is owned by the embedding
//! game and only referenced here; its callbacks are forwarded to the connection manager.

mod simulated;

use bytes::Bytes;
use netconn_wire::ConnectStatus;
use std::net::SocketAddr;

pub use simulated::{SimulatedTransport, TransportCall};

/// Transient numeric id assigned by the transport to a connection
pub type ClientId = u64;

/// Commands the connection states issue to the transport
pub trait Transport: Send + Sync {
  /// Start connecting as a client, false if the transport refused
  fn start_client(&self) -> bool;

  /// Start listening as a host, false if the transport refused
  fn start_host(&self) -> bool;

  /// Shut down client or host, may complete asynchronously
  fn shutdown(&self);

  /// Host only: disconnect a remote client, `reason` is delivered to it as its disconnect reason
  fn disconnect_client(&self, client_id: ClientId, reason: &str);

  /// True while the local client, or the host's local client, is connected
  fn is_connected_client(&self) -> bool;

  /// True until a previous shutdown has fully completed
  fn shutdown_in_progress(&self) -> bool;

  /// Reason attached to the last disconnection, empty if none was given
  fn disconnect_reason(&self) -> String;

  /// Id of the local client, also the host's own id when hosting
  fn local_client_id(&self) -> ClientId;

  /// Ids of every connected client, the host's own included
  fn connected_client_ids(&self) -> Vec<ClientId>;

  /// Join credential sent with the next connection request
  fn set_connection_data(&self, payload: Bytes);

  /// Endpoint to connect to, or to listen on when hosting
  fn set_connection_endpoint(&self, endpoint: SocketAddr);
}

/// Connection request received by the host
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
  pub client_id: ClientId,
  /// Raw join credential
  pub payload: Bytes,
}

impl ApprovalRequest {
  pub fn new(client_id: ClientId, payload: impl Into<Bytes>) -> Self {
    Self {
      client_id,
      payload: payload.into(),
    }
  }
}

/// Host's answer to a connection request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovalResponse {
  pub approved: bool,
  /// Encoded [`ConnectStatus`] delivered to a denied client
  pub reason: Option<String>,
}

impl ApprovalResponse {
  pub fn approve() -> Self {
    Self {
      approved: true,
      reason: None,
    }
  }

  /// Deny without telling the client why
  pub fn deny() -> Self {
    Self::default()
  }

  /// Deny with an encoded status as the reason
  pub fn deny_with(status: ConnectStatus) -> Self {
    Self {
      approved: false,
      reason: Some(status.encode()),
    }
  }
}
