//! Ways of reaching a host: a direct IP endpoint, or a relay resolved through the session directory

mod ip;
mod relay;

use crate::{error::ConnectionMethodError, transport::Transport};
use async_trait::async_trait;

pub use ip::IpConnectionMethod;
pub use relay::RelayConnectionMethod;

/// Outcome of preparing a reconnection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectionSetup {
  /// The transport can be started now
  pub success: bool,
  /// A failed setup may succeed on a later attempt
  pub should_try_again: bool,
}

impl ReconnectionSetup {
  pub fn ready() -> Self {
    Self {
      success: true,
      should_try_again: true,
    }
  }

  pub fn retry_later() -> Self {
    Self {
      success: false,
      should_try_again: true,
    }
  }

  pub fn abort() -> Self {
    Self {
      success: false,
      should_try_again: false,
    }
  }
}

#[async_trait]
/// Configures the transport for one way of connecting
pub trait ConnectionMethod: Send + Sync + std::fmt::Debug {
  /// Short name for logs
  fn name(&self) -> &'static str;

  /// Prepare the transport for connecting as a client
  fn setup_client_connection(&self, transport: &dyn Transport) -> Result<(), ConnectionMethodError>;

  /// Prepare the transport for hosting
  fn setup_host_connection(&self, transport: &dyn Transport) -> Result<(), ConnectionMethodError>;

  /// Prepare a reconnection attempt, may wait on remote services
  async fn setup_client_reconnection(&self) -> ReconnectionSetup;

  /// True when the method's session service starts the transport itself
  fn starts_transport(&self) -> bool {
    false
  }
}
