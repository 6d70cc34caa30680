use crate::{constants::MAX_PLAYER_NAME_LEN, trace::*, transport::ClientId};
use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

/// DashMap type alias, uses ahash::RandomState as hashbuilder
type DashMap<K, V> = dashmap::DashMap<K, V, ahash::RandomState>;

/// Per-player record kept by [`PlayerSessions`]
pub trait SessionPlayer: Clone + Send + Sync + 'static {
  fn client_id(&self) -> ClientId;
  fn set_client_id(&mut self, client_id: ClientId);
  fn is_connected(&self) -> bool;
  fn set_connected(&mut self, connected: bool);
  /// Reset the per-game part of the record when a game session ends
  fn reinitialize(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Session record of a player, survives reconnection under the same player id
pub struct SessionPlayerData {
  pub client_id: ClientId,
  pub is_connected: bool,
  player_name: String,
  /// Slot index assigned by the game, -1 when unassigned
  pub player_index: i32,
}

impl SessionPlayerData {
  pub fn new(client_id: ClientId, player_name: Option<&str>) -> Self {
    let mut data = Self {
      client_id,
      is_connected: true,
      player_name: String::new(),
      player_index: -1,
    };
    if let Some(name) = player_name {
      data.set_player_name(name);
    }
    data
  }

  pub fn player_name(&self) -> &str {
    &self.player_name
  }

  /// Store the name, truncated to at most 32 bytes on a char boundary
  pub fn set_player_name(&mut self, name: &str) {
    let mut end = name.len().min(MAX_PLAYER_NAME_LEN);
    while !name.is_char_boundary(end) {
      end -= 1;
    }
    self.player_name = name[..end].to_owned();
  }
}

impl SessionPlayer for SessionPlayerData {
  fn client_id(&self) -> ClientId {
    self.client_id
  }
  fn set_client_id(&mut self, client_id: ClientId) {
    self.client_id = client_id;
  }
  fn is_connected(&self) -> bool {
    self.is_connected
  }
  fn set_connected(&mut self, connected: bool) {
    self.is_connected = connected;
  }
  fn reinitialize(&mut self) {
    self.player_name.clear();
    self.player_index = -1;
  }
}

#[derive(Debug)]
struct PlayerSessionsInner<T> {
  /// transient client id -> stable player id
  client_to_player: DashMap<ClientId, String>,
  /// stable player id -> record
  players: DashMap<String, T>,
  session_started: AtomicBool,
}

#[derive(Debug, Clone)]
/// Directory mapping transient client ids to stable player ids and their session records.
/// At most one connected record exists per player id.
pub struct PlayerSessions<T = SessionPlayerData>
where
  T: SessionPlayer,
{
  inner: Arc<PlayerSessionsInner<T>>,
}

impl<T> Default for PlayerSessions<T>
where
  T: SessionPlayer,
{
  fn default() -> Self {
    Self {
      inner: Arc::new(PlayerSessionsInner {
        client_to_player: DashMap::default(),
        players: DashMap::default(),
        session_started: AtomicBool::new(false),
      }),
    }
  }
}

impl<T> PlayerSessions<T>
where
  T: SessionPlayer,
{
  /// True if a connected record already exists for this player id
  pub fn is_duplicate_connection(&self, player_id: &str) -> bool {
    self.inner.players.get(player_id).is_some_and(|p| p.is_connected())
  }

  /// Register a connecting client.
  /// A disconnected record for the same player id is reused and rebound to the new client id.
  pub fn setup_connecting_player(&self, client_id: ClientId, player_id: &str, data: T) {
    if self.is_duplicate_connection(player_id) {
      error!("Player id {player_id} already has a connected client");
      return;
    }

    // clone out before inserting, the entry guard must not be held across insert
    let previous = self.inner.players.get(player_id).map(|p| p.value().clone());
    let data = match previous {
      Some(mut previous) if !previous.is_connected() => {
        debug!("Player {player_id} reconnected as client {client_id}");
        previous.set_client_id(client_id);
        previous.set_connected(true);
        previous
      }
      _ => data,
    };

    self.inner.client_to_player.insert(client_id, player_id.to_owned());
    self.inner.players.insert(player_id.to_owned(), data);
  }

  pub fn player_id(&self, client_id: ClientId) -> Option<String> {
    self.inner.client_to_player.get(&client_id).map(|p| p.value().clone())
  }

  pub fn player_data(&self, player_id: &str) -> Option<T> {
    self.inner.players.get(player_id).map(|p| p.value().clone())
  }

  pub fn player_data_by_client(&self, client_id: ClientId) -> Option<T> {
    let player_id = self.player_id(client_id)?;
    self.player_data(&player_id)
  }

  /// Overwrite the record bound to a client id, no-op for unknown clients
  pub fn set_player_data(&self, client_id: ClientId, data: T) {
    match self.player_id(client_id) {
      Some(player_id) => {
        self.inner.players.insert(player_id, data);
      }
      None => error!("No player id bound to client {client_id}"),
    }
  }

  /// Forget a disconnected client.
  /// Once a game session has started the record is kept, marked disconnected, so the player can
  /// come back; before that it is removed.
  pub fn disconnect_client(&self, client_id: ClientId) {
    let Some(player_id) = self.player_id(client_id) else {
      return;
    };
    let bound = self
      .inner
      .players
      .get(&player_id)
      .is_some_and(|p| p.client_id() == client_id);

    if self.inner.session_started.load(Ordering::Relaxed) {
      if bound {
        if let Some(mut record) = self.inner.players.get_mut(&player_id) {
          record.set_connected(false);
        }
      }
    } else {
      self.inner.client_to_player.remove(&client_id);
      if bound {
        self.inner.players.remove(&player_id);
      }
    }
  }

  pub fn on_session_started(&self) {
    self.inner.session_started.store(true, Ordering::Relaxed);
  }

  /// Drop disconnected records and reset the per-game part of the others
  pub fn on_session_ended(&self) {
    self.clear_disconnected();
    self.inner.players.iter_mut().for_each(|mut p| p.reinitialize());
    self.inner.session_started.store(false, Ordering::Relaxed);
  }

  /// Forget everything, the hosting server is gone
  pub fn on_server_ended(&self) {
    self.inner.client_to_player.clear();
    self.inner.players.clear();
    self.inner.session_started.store(false, Ordering::Relaxed);
  }

  pub fn connected_count(&self) -> usize {
    self.inner.players.iter().filter(|p| p.is_connected()).count()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.players.is_empty()
  }

  fn clear_disconnected(&self) {
    let disconnected = self
      .inner
      .players
      .iter()
      .filter(|p| !p.is_connected())
      .map(|p| (p.key().clone(), p.client_id()))
      .collect::<Vec<_>>();
    for (player_id, client_id) in disconnected {
      self.inner.players.remove(&player_id);
      self
        .inner
        .client_to_player
        .remove_if(&client_id, |_, bound| *bound == player_id);
    }
  }
}
