use super::{ClientId, Transport};
use bytes::Bytes;
use std::{
  net::SocketAddr,
  sync::{Mutex, MutexGuard},
};

/// Command recorded by [`SimulatedTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
  StartClient,
  StartHost,
  Shutdown,
  DisconnectClient(ClientId, String),
  SetConnectionData(Bytes),
  SetConnectionEndpoint(SocketAddr),
}

#[derive(Debug, Default)]
struct SimulatedState {
  calls: Vec<TransportCall>,
  refuse_start: bool,
  connected: bool,
  shutdown_in_progress: bool,
  disconnect_reason: String,
  local_client_id: ClientId,
  connected_client_ids: Vec<ClientId>,
}

/// In-memory transport that records every command and lets the caller drive its observable state.
/// Used by tests and by the interactive harness in place of a real network stack.
#[derive(Debug, Default)]
pub struct SimulatedTransport {
  inner: Mutex<SimulatedState>,
}

impl SimulatedTransport {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, SimulatedState> {
    // a panic while holding the lock leaves plain data behind, keep using it
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Commands issued so far
  pub fn calls(&self) -> Vec<TransportCall> {
    self.lock().calls.clone()
  }

  pub fn clear_calls(&self) {
    self.lock().calls.clear();
  }

  /// Count recorded commands matching a predicate
  pub fn count_calls(&self, f: impl Fn(&TransportCall) -> bool) -> usize {
    self.lock().calls.iter().filter(|c| f(c)).count()
  }

  /// Make the next start_client / start_host calls return false
  pub fn set_refuse_start(&self, refuse: bool) {
    self.lock().refuse_start = refuse;
  }

  pub fn set_disconnect_reason(&self, reason: impl Into<String>) {
    self.lock().disconnect_reason = reason.into();
  }

  pub fn set_connected_client(&self, connected: bool) {
    self.lock().connected = connected;
  }

  pub fn set_shutdown_in_progress(&self, in_progress: bool) {
    self.lock().shutdown_in_progress = in_progress;
  }

  pub fn set_local_client_id(&self, client_id: ClientId) {
    self.lock().local_client_id = client_id;
  }

  pub fn add_connected_client(&self, client_id: ClientId) {
    let mut state = self.lock();
    if !state.connected_client_ids.contains(&client_id) {
      state.connected_client_ids.push(client_id);
    }
  }

  pub fn remove_connected_client(&self, client_id: ClientId) {
    self.lock().connected_client_ids.retain(|id| *id != client_id);
  }

  pub fn set_connected_client_ids(&self, ids: Vec<ClientId>) {
    self.lock().connected_client_ids = ids;
  }
}

impl Transport for SimulatedTransport {
  fn start_client(&self) -> bool {
    let mut state = self.lock();
    state.calls.push(TransportCall::StartClient);
    !state.refuse_start
  }

  fn start_host(&self) -> bool {
    let mut state = self.lock();
    state.calls.push(TransportCall::StartHost);
    if state.refuse_start {
      return false;
    }
    state.connected = true;
    let local = state.local_client_id;
    if !state.connected_client_ids.contains(&local) {
      state.connected_client_ids.push(local);
    }
    true
  }

  fn shutdown(&self) {
    let mut state = self.lock();
    state.calls.push(TransportCall::Shutdown);
    state.connected = false;
    state.connected_client_ids.clear();
  }

  fn disconnect_client(&self, client_id: ClientId, reason: &str) {
    let mut state = self.lock();
    state.calls.push(TransportCall::DisconnectClient(client_id, reason.to_owned()));
    state.connected_client_ids.retain(|id| *id != client_id);
  }

  fn is_connected_client(&self) -> bool {
    self.lock().connected
  }

  fn shutdown_in_progress(&self) -> bool {
    self.lock().shutdown_in_progress
  }

  fn disconnect_reason(&self) -> String {
    self.lock().disconnect_reason.clone()
  }

  fn local_client_id(&self) -> ClientId {
    self.lock().local_client_id
  }

  fn connected_client_ids(&self) -> Vec<ClientId> {
    self.lock().connected_client_ids.clone()
  }

  fn set_connection_data(&self, payload: Bytes) {
    self.lock().calls.push(TransportCall::SetConnectionData(payload));
  }

  fn set_connection_endpoint(&self, endpoint: SocketAddr) {
    self.lock().calls.push(TransportCall::SetConnectionEndpoint(endpoint));
  }
}
