pub mod config;
mod constants;
mod context;
mod error;
mod event;
mod manager;
mod method;
mod player_session;
mod session_directory;
mod state;
mod transport;

mod trace {
  #![allow(unused)]
  pub(crate) use tracing::{debug, error, info, trace, warn};
}

pub use config::{ConfigValidationError, ConnectionConfig, ConnectionConfigBuilder, PlayerProfile, PlayerProfileBuilder};
pub use constants::{DEFAULT_MAX_CONNECTED_PLAYERS, DEFAULT_RECONNECT_ATTEMPTS, MAX_PLAYER_NAME_LEN};
pub use error::{ConnectionBuildError, ConnectionError, ConnectionMethodError, SessionDirectoryError};
pub use event::{ConnectionEvent, EventBus};
pub use manager::{ConnectionHandle, ConnectionManager, ConnectionManagerBuilder, ManagerCommand, ManagerSettings};
pub use method::{ConnectionMethod, IpConnectionMethod, RelayConnectionMethod, ReconnectionSetup};
pub use player_session::{PlayerSessions, SessionPlayer, SessionPlayerData};
pub use session_directory::{LocalSessionDirectory, SessionDirectory, SessionHandle};
pub use state::StateKind;
pub use transport::{ApprovalRequest, ApprovalResponse, ClientId, SimulatedTransport, Transport, TransportCall};

pub use netconn_wire::{
  ConnectStatus, ConnectionPayload, DisconnectReason, HOST_SHUTDOWN_REASON, MAX_CONNECT_PAYLOAD, WireError,
};
pub use tokio_util::sync::CancellationToken;
