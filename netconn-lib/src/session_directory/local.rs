use super::{SessionDirectory, SessionHandle};
use crate::{error::SessionDirectoryError, trace::*};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct LocalState {
  session: Option<SessionHandle>,
  players: Vec<String>,
  tracking: bool,
  rejoin_available: bool,
}

impl Default for LocalState {
  fn default() -> Self {
    Self {
      session: None,
      players: Vec::new(),
      tracking: false,
      rejoin_available: true,
    }
  }
}

/// In-process session directory.
/// Holds at most one session and its player list; used by tests and the interactive harness.
#[derive(Debug, Default)]
pub struct LocalSessionDirectory {
  inner: Mutex<LocalState>,
}

impl LocalSessionDirectory {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, LocalState> {
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Replace the current session, `None` leaves the session
  pub fn set_session(&self, session: Option<SessionHandle>) {
    let mut state = self.lock();
    state.session = session;
    state.players.clear();
  }

  pub fn add_player(&self, player_id: impl Into<String>) {
    self.lock().players.push(player_id.into());
  }

  pub fn players(&self) -> Vec<String> {
    self.lock().players.clone()
  }

  pub fn is_tracking(&self) -> bool {
    self.lock().tracking
  }

  /// Whether a rejoin attempt succeeds
  pub fn set_rejoin_available(&self, available: bool) {
    self.lock().rejoin_available = available;
  }
}

#[async_trait]
impl SessionDirectory for LocalSessionDirectory {
  fn begin_tracking(&self) {
    let mut state = self.lock();
    if let Some(session) = state.session.as_ref() {
      debug!("Tracking session {}", session.id);
      state.tracking = true;
    }
  }

  fn end_tracking(&self) {
    let mut state = self.lock();
    if let Some(session) = state.session.take() {
      debug!("Stopped tracking session {}", session.id);
    }
    state.tracking = false;
    state.players.clear();
  }

  fn current_session(&self) -> Option<SessionHandle> {
    self.lock().session.clone()
  }

  async fn remove_player_from_session(&self, player_id: &str) -> Result<(), SessionDirectoryError> {
    let mut state = self.lock();
    if state.session.is_none() {
      return Err(SessionDirectoryError::NoSession);
    }
    let before = state.players.len();
    state.players.retain(|p| p != player_id);
    if state.players.len() == before {
      return Err(SessionDirectoryError::PlayerNotFound(player_id.to_owned()));
    }
    Ok(())
  }

  async fn reconnect_to_session(&self) -> Result<SessionHandle, SessionDirectoryError> {
    let state = self.lock();
    let Some(session) = state.session.clone() else {
      return Err(SessionDirectoryError::NoSession);
    };
    if !state.rejoin_available {
      return Err(SessionDirectoryError::RejoinFailed {
        session_id: session.id,
        reason: "session is not reachable".to_string(),
      });
    }
    Ok(session)
  }
}
