/// Default number of reconnection attempts before giving up
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 2;

/// Upper bound accepted for the reconnection budget
pub const MAX_RECONNECT_ATTEMPTS: u32 = 32;

/// Default maximum number of connected clients on a host, the host itself included
pub const DEFAULT_MAX_CONNECTED_PLAYERS: usize = 8;

/// Wait before the first reconnection attempt in milliseconds.
/// If the host vanished unexpectedly, this gives the session directory time to drop the session
/// so that we don't reconnect into an empty one.
pub const FIRST_ATTEMPT_DELAY_MSEC: u64 = 1000;

/// Wait between two reconnection attempts in milliseconds
pub const BETWEEN_ATTEMPTS_DELAY_MSEC: u64 = 5000;

/// Polling interval while waiting for the transport to finish shutting down
pub const SHUTDOWN_POLL_INTERVAL_MSEC: u64 = 50;

/// Capacity of the outward event bus, slow subscribers beyond this lag
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Capacity of the command channel feeding the manager task
pub const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Max player name length in bytes kept in session data
pub const MAX_PLAYER_NAME_LEN: usize = 32;

pub mod log_event_names {
  /// Every state change of the connection manager
  pub const STATE_CHANGE: &str = "netconn::state_change";
}
