mod error;
mod payload;
mod reason;
mod status;

#[allow(unused)]
pub(crate) mod trace {
  pub(crate) use tracing::{debug, error, info, trace, warn};
}

pub use error::WireError;
pub use payload::{ConnectionPayload, MAX_CONNECT_PAYLOAD};
pub use reason::{DisconnectReason, HOST_SHUTDOWN_REASON};
pub use status::ConnectStatus;
