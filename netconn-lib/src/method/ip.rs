use super::{ConnectionMethod, ReconnectionSetup};
use crate::{error::ConnectionMethodError, trace::*, transport::Transport};
use async_trait::async_trait;
use bytes::Bytes;
use std::net::{IpAddr, SocketAddr};

/// Direct connection to a host's address and port
#[derive(Debug, Clone)]
pub struct IpConnectionMethod {
  address: String,
  port: u16,
  payload: Bytes,
}

impl IpConnectionMethod {
  pub fn new(address: impl Into<String>, port: u16, payload: Bytes) -> Self {
    Self {
      address: address.into(),
      port,
      payload,
    }
  }

  /// Parse and check the configured endpoint
  pub fn endpoint(&self) -> Result<SocketAddr, ConnectionMethodError> {
    let ip = self
      .address
      .trim()
      .parse::<IpAddr>()
      .map_err(|_| ConnectionMethodError::InvalidAddress(self.address.clone()))?;
    if self.port == 0 {
      return Err(ConnectionMethodError::InvalidPort(self.port));
    }
    Ok(SocketAddr::new(ip, self.port))
  }

  fn configure(&self, transport: &dyn Transport) -> Result<(), ConnectionMethodError> {
    let endpoint = self.endpoint()?;
    debug!("Using endpoint {endpoint}");
    transport.set_connection_data(self.payload.clone());
    transport.set_connection_endpoint(endpoint);
    Ok(())
  }
}

#[async_trait]
impl ConnectionMethod for IpConnectionMethod {
  fn name(&self) -> &'static str {
    "ip"
  }

  fn setup_client_connection(&self, transport: &dyn Transport) -> Result<(), ConnectionMethodError> {
    self.configure(transport)
  }

  fn setup_host_connection(&self, transport: &dyn Transport) -> Result<(), ConnectionMethodError> {
    self.configure(transport)
  }

  async fn setup_client_reconnection(&self) -> ReconnectionSetup {
    // nothing to prepare, the endpoint stays the same
    ReconnectionSetup::ready()
  }
}
