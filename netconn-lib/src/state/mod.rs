//! Connection states
//!
//! Exactly one state is current at any time. Each operation of the current state may return a
//! [`Transition`], which the manager applies by calling `exit` on the old state and `enter` on the new one.

mod client_connected;
mod client_connecting;
mod client_reconnecting;
mod hosting;
mod offline;
mod online;
mod starting_host;

use crate::{
  context::ManagerContext,
  error::ConnectionError,
  method::ConnectionMethod,
  trace::*,
  transport::{ApprovalRequest, ApprovalResponse, ClientId},
};
use std::sync::Arc;

pub(crate) use client_connected::ClientConnectedState;
pub(crate) use client_connecting::ClientConnectingState;
pub(crate) use client_reconnecting::{ClientReconnectingState, RoundMessage};
pub(crate) use hosting::HostingState;
pub(crate) use offline::OfflineState;
pub(crate) use starting_host::StartingHostState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Tag of a connection state
pub enum StateKind {
  Offline,
  ClientConnecting,
  ClientConnected,
  ClientReconnecting,
  StartingHost,
  Hosting,
}

impl std::fmt::Display for StateKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Self::Offline => "Offline",
      Self::ClientConnecting => "ClientConnecting",
      Self::ClientConnected => "ClientConnected",
      Self::ClientReconnecting => "ClientReconnecting",
      Self::StartingHost => "StartingHost",
      Self::Hosting => "Hosting",
    };
    write!(f, "{name}")
  }
}

/// Request to change the current state.
/// Variants carrying a connection method configure the target state before it is entered.
#[derive(Debug, Clone)]
pub(crate) enum Transition {
  Offline,
  /// Configures both the connecting and the reconnecting state
  ClientConnecting(Arc<dyn ConnectionMethod>),
  ClientConnected,
  ClientReconnecting,
  StartingHost(Arc<dyn ConnectionMethod>),
  Hosting,
}

/// Behavior of one connection state.
/// Every operation defaults to doing nothing.
pub(crate) trait ConnectionState: Send {
  fn kind(&self) -> StateKind;

  fn enter(&mut self, _ctx: &ManagerContext) -> Option<Transition> {
    None
  }

  fn exit(&mut self, _ctx: &ManagerContext) {}

  fn on_client_connected(&mut self, _ctx: &ManagerContext, _client_id: ClientId) -> Option<Transition> {
    None
  }

  fn on_client_disconnect(&mut self, _ctx: &ManagerContext, _client_id: ClientId) -> Option<Transition> {
    None
  }

  fn on_server_started(&mut self, _ctx: &ManagerContext) -> Option<Transition> {
    None
  }

  fn on_server_stopped(&mut self, _ctx: &ManagerContext) -> Option<Transition> {
    None
  }

  fn on_transport_failure(&mut self, _ctx: &ManagerContext) -> Option<Transition> {
    None
  }

  fn approval_check(&mut self, _ctx: &ManagerContext, _request: &ApprovalRequest) -> ApprovalResponse {
    ApprovalResponse::default()
  }

  fn on_user_requested_shutdown(&mut self, _ctx: &ManagerContext) -> Option<Transition> {
    None
  }

  fn start_client_ip(&mut self, _ctx: &ManagerContext, _address: &str, _port: u16) -> Option<Transition> {
    warn!("Cannot start a client while {}", self.kind());
    None
  }

  fn start_client_session(&mut self, _ctx: &ManagerContext) -> Option<Transition> {
    warn!("Cannot start a client while {}", self.kind());
    None
  }

  fn start_host_ip(
    &mut self,
    _ctx: &ManagerContext,
    _address: &str,
    _port: u16,
  ) -> Result<Option<Transition>, ConnectionError> {
    warn!("Cannot start a host while {}", self.kind());
    Ok(None)
  }

  fn start_host_session(&mut self, _ctx: &ManagerContext) -> Result<Option<Transition>, ConnectionError> {
    warn!("Cannot start a host while {}", self.kind());
    Ok(None)
  }

  /// A game started inside the hosted session
  fn on_game_started(&mut self, _ctx: &ManagerContext) {
    debug!("No game session to start while {}", self.kind());
  }

  /// The game inside the hosted session is over
  fn on_game_ended(&mut self, _ctx: &ManagerContext) {
    debug!("No game session to end while {}", self.kind());
  }

  /// Report of a spawned reconnection round
  fn on_round_message(&mut self, _ctx: &ManagerContext, message: RoundMessage) -> Option<Transition> {
    debug!("Ignoring reconnection report {message:?} while {}", self.kind());
    None
  }
}

/// One instance of every state, alive for the manager's lifetime
pub(crate) struct States {
  pub(crate) offline: OfflineState,
  pub(crate) client_connecting: ClientConnectingState,
  pub(crate) client_connected: ClientConnectedState,
  pub(crate) client_reconnecting: ClientReconnectingState,
  pub(crate) starting_host: StartingHostState,
  pub(crate) hosting: HostingState,
}

impl Default for States {
  fn default() -> Self {
    Self {
      offline: OfflineState,
      client_connecting: ClientConnectingState::default(),
      client_connected: ClientConnectedState,
      client_reconnecting: ClientReconnectingState::default(),
      starting_host: StartingHostState::default(),
      hosting: HostingState,
    }
  }
}

impl States {
  pub(crate) fn get_mut(&mut self, kind: StateKind) -> &mut dyn ConnectionState {
    match kind {
      StateKind::Offline => &mut self.offline,
      StateKind::ClientConnecting => &mut self.client_connecting,
      StateKind::ClientConnected => &mut self.client_connected,
      StateKind::ClientReconnecting => &mut self.client_reconnecting,
      StateKind::StartingHost => &mut self.starting_host,
      StateKind::Hosting => &mut self.hosting,
    }
  }

  /// Hand the transition's connection method to its target states and return the target
  pub(crate) fn configure(&mut self, transition: Transition) -> StateKind {
    match transition {
      Transition::Offline => StateKind::Offline,
      Transition::ClientConnecting(method) => {
        self.client_reconnecting.configure(method.clone());
        self.client_connecting.configure(method);
        StateKind::ClientConnecting
      }
      Transition::ClientConnected => StateKind::ClientConnected,
      Transition::ClientReconnecting => StateKind::ClientReconnecting,
      Transition::StartingHost(method) => {
        self.starting_host.configure(method);
        StateKind::StartingHost
      }
      Transition::Hosting => StateKind::Hosting,
    }
  }
}
