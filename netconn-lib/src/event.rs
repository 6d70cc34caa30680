use crate::{constants::EVENT_CHANNEL_CAPACITY, trace::*};
use netconn_wire::ConnectStatus;
use tokio::sync::broadcast;

/// Events raised outward for UI and game logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
  /// Connection status changed
  Connection { status: ConnectStatus },
  /// Reconnection progress, also raised once when the reconnection loop ends
  Reconnect { current_attempt: u32, max_attempt: u32 },
}

impl std::fmt::Display for ConnectionEvent {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Connection { status } => write!(f, "connection: {status}"),
      Self::Reconnect {
        current_attempt,
        max_attempt,
      } => write!(f, "reconnect: {current_attempt}/{max_attempt}"),
    }
  }
}

#[derive(Debug, Clone)]
/// Publish/subscribe bus for connection events.
/// Every subscriber receives each event once.
pub struct EventBus {
  tx: broadcast::Sender<ConnectionEvent>,
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new(EVENT_CHANNEL_CAPACITY)
  }
}

impl EventBus {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity.max(1));
    Self { tx }
  }

  /// Subscribe to every event published from now on
  pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
    self.tx.subscribe()
  }

  pub(crate) fn publish(&self, event: ConnectionEvent) {
    debug!("Publishing {event}");
    // No subscriber is not an error
    let _ = self.tx.send(event);
  }

  pub(crate) fn publish_status(&self, status: ConnectStatus) {
    self.publish(ConnectionEvent::Connection { status });
  }

  pub(crate) fn publish_reconnect(&self, current_attempt: u32, max_attempt: u32) {
    self.publish(ConnectionEvent::Reconnect {
      current_attempt,
      max_attempt,
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_publish_without_subscriber() {
    let bus = EventBus::default();
    bus.publish_status(ConnectStatus::Success);
  }

  #[test]
  fn test_every_subscriber_receives_once() {
    let bus = EventBus::default();
    let mut rx1 = bus.subscribe();
    let mut rx2 = bus.subscribe();

    bus.publish_status(ConnectStatus::ServerFull);
    bus.publish_reconnect(1, 2);

    for rx in [&mut rx1, &mut rx2] {
      assert_eq!(
        rx.try_recv().unwrap(),
        ConnectionEvent::Connection {
          status: ConnectStatus::ServerFull
        }
      );
      assert_eq!(
        rx.try_recv().unwrap(),
        ConnectionEvent::Reconnect {
          current_attempt: 1,
          max_attempt: 2
        }
      );
      assert!(rx.try_recv().is_err());
    }
  }

  #[test]
  fn test_display() {
    let event = ConnectionEvent::Reconnect {
      current_attempt: 1,
      max_attempt: 2,
    };
    assert_eq!(event.to_string(), "reconnect: 1/2");
  }
}
