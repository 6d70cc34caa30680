use super::{ConnectionMethod, ReconnectionSetup};
use crate::{
  error::ConnectionMethodError,
  session_directory::{SessionDirectory, SessionHandle},
  trace::*,
  transport::Transport,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Connection through a relay, resolved from the session the player belongs to.
/// The session service starts the transport once the relay is allocated.
#[derive(Clone)]
pub struct RelayConnectionMethod {
  session_directory: Arc<dyn SessionDirectory>,
  payload: Bytes,
}

impl std::fmt::Debug for RelayConnectionMethod {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RelayConnectionMethod")
      .field("session", &self.session_directory.current_session())
      .finish()
  }
}

impl RelayConnectionMethod {
  pub fn new(session_directory: Arc<dyn SessionDirectory>, payload: Bytes) -> Self {
    Self {
      session_directory,
      payload,
    }
  }

  fn session(&self) -> Result<SessionHandle, ConnectionMethodError> {
    self
      .session_directory
      .current_session()
      .ok_or(ConnectionMethodError::NoSession)
  }
}

#[async_trait]
impl ConnectionMethod for RelayConnectionMethod {
  fn name(&self) -> &'static str {
    "relay"
  }

  fn setup_client_connection(&self, transport: &dyn Transport) -> Result<(), ConnectionMethodError> {
    let session = self.session()?;
    match session.join_code.as_deref() {
      Some(join_code) => debug!("Joining relay of session {} with code {join_code}", session.id),
      None => debug!("Joining relay of session {}", session.id),
    }
    transport.set_connection_data(self.payload.clone());
    Ok(())
  }

  fn setup_host_connection(&self, transport: &dyn Transport) -> Result<(), ConnectionMethodError> {
    let session = self.session()?;
    if !session.is_host {
      return Err(ConnectionMethodError::NotSessionHost(session.id));
    }
    debug!("Hosting relay of session {}", session.id);
    transport.set_connection_data(self.payload.clone());
    Ok(())
  }

  async fn setup_client_reconnection(&self) -> ReconnectionSetup {
    if self.session_directory.current_session().is_none() {
      warn!("Session no longer exists, not trying to reconnect");
      return ReconnectionSetup::abort();
    }
    match self.session_directory.reconnect_to_session().await {
      Ok(session) => {
        info!("Rejoined session {}", session.id);
        ReconnectionSetup::ready()
      }
      Err(e) => {
        warn!("Failed to rejoin session: {e}");
        ReconnectionSetup::retry_later()
      }
    }
  }

  fn starts_transport(&self) -> bool {
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    session_directory::{LocalSessionDirectory, SessionHandle},
    transport::{SimulatedTransport, TransportCall},
  };

  fn method(directory: &Arc<LocalSessionDirectory>) -> RelayConnectionMethod {
    RelayConnectionMethod::new(directory.clone(), Bytes::from_static(b"payload"))
  }

  #[test]
  fn test_requires_session() {
    let directory = Arc::new(LocalSessionDirectory::new());
    let transport = SimulatedTransport::new();
    assert!(matches!(
      method(&directory).setup_client_connection(&transport),
      Err(ConnectionMethodError::NoSession)
    ));

    directory.set_session(Some(SessionHandle::new("s1", false)));
    method(&directory).setup_client_connection(&transport).unwrap();
    assert_eq!(
      transport.calls(),
      vec![TransportCall::SetConnectionData(Bytes::from_static(b"payload"))]
    );
    assert!(method(&directory).starts_transport());
  }

  #[test]
  fn test_host_requires_own_session() {
    let directory = Arc::new(LocalSessionDirectory::new());
    let transport = SimulatedTransport::new();
    assert!(matches!(
      method(&directory).setup_host_connection(&transport),
      Err(ConnectionMethodError::NoSession)
    ));

    directory.set_session(Some(SessionHandle::new("s1", false).with_join_code("S1")));
    assert!(matches!(
      method(&directory).setup_host_connection(&transport),
      Err(ConnectionMethodError::NotSessionHost(id)) if id == "s1"
    ));
    assert!(transport.calls().is_empty());

    directory.set_session(Some(SessionHandle::new("s1", true)));
    method(&directory).setup_host_connection(&transport).unwrap();
    assert_eq!(
      transport.calls(),
      vec![TransportCall::SetConnectionData(Bytes::from_static(b"payload"))]
    );
  }

  #[tokio::test]
  async fn test_reconnection_setup() {
    let directory = Arc::new(LocalSessionDirectory::new());
    assert_eq!(
      method(&directory).setup_client_reconnection().await,
      ReconnectionSetup::abort()
    );

    directory.set_session(Some(SessionHandle::new("s1", false)));
    assert_eq!(
      method(&directory).setup_client_reconnection().await,
      ReconnectionSetup::ready()
    );

    directory.set_rejoin_available(false);
    assert_eq!(
      method(&directory).setup_client_reconnection().await,
      ReconnectionSetup::retry_later()
    );
  }
}
