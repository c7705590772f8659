//! Transport Session
//!
//! Connection lifecycle for one authenticated principal. The session owns
//! its [`Transport`] and is the only writer of its connection state.
//! It never retries on its own: a supervising policy re-invokes [`TransportSession::open`].

use serde_json::Value;

use super::{LinkId, Transport, TransportEvent};
use crate::domain::{ConnectionState, Credential};
use crate::infrastructure::metrics;
use crate::shared::error::{SyncError, TransportFailure};

/// What the event loop should do with a transport event
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSignal {
    /// Session reached `connected`
    Connected,
    /// Session dropped to `disconnected` after a failure
    Failed(TransportFailure),
    /// Raw named event for the router
    Inbound { name: String, payload: Value },
    /// Stale or out-of-state event, already logged
    Ignored,
}

/// Transport session state machine
pub struct TransportSession<T> {
    transport: T,
    state: ConnectionState,
    credential: Option<Credential>,
    attempts: u32,
    link: LinkId,
}

impl<T: Transport> TransportSession<T> {
    pub fn new(transport: T) -> Self {
        metrics::set_connection_state(ConnectionState::Disconnected);
        Self {
            transport,
            state: ConnectionState::Disconnected,
            credential: None,
            attempts: 0,
            link: 0,
        }
    }

    /// Start connecting with `credential`.
    ///
    /// A no-op returning the current link while connecting or connected.
    /// Without a credential nothing is attempted.
    pub fn open(&mut self, credential: Option<&Credential>) -> Result<LinkId, SyncError> {
        let Some(credential) = credential else {
            tracing::warn!("Refusing to open transport session without a credential");
            return Err(SyncError::Unauthenticated);
        };

        if self.state != ConnectionState::Disconnected {
            tracing::debug!(link = self.link, state = %self.state, "Session already open");
            return Ok(self.link);
        }

        self.link += 1;
        self.credential = Some(credential.clone());
        self.set_state(ConnectionState::Connecting);
        tracing::info!(link = self.link, attempt = self.attempts + 1, "Opening transport session");

        if let Err(failure) = self.transport.connect(self.link, credential) {
            self.fail(&failure);
            return Err(SyncError::Transport(failure));
        }

        Ok(self.link)
    }

    /// Tear down the link and reset to `disconnected`. Safe when already closed.
    pub fn close(&mut self) {
        if self.state != ConnectionState::Disconnected {
            self.transport.disconnect(self.link);
            tracing::info!(link = self.link, "Transport session closed");
        }
        self.attempts = 0;
        self.set_state(ConnectionState::Disconnected);
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Failed attempts since the last successful connect or explicit close
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Credential used for the most recent handshake
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn link(&self) -> LinkId {
        self.link
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Apply a transport event to the session state.
    pub fn handle(&mut self, event: TransportEvent) -> SessionSignal {
        if event.link() != self.link {
            tracing::trace!(link = event.link(), current = self.link, "Dropping event from stale link");
            return SessionSignal::Ignored;
        }

        match event {
            TransportEvent::Connected { link } => {
                if self.state != ConnectionState::Connecting {
                    tracing::debug!(link, state = %self.state, "Unexpected connect acknowledgement");
                    return SessionSignal::Ignored;
                }
                self.attempts = 0;
                self.set_state(ConnectionState::Connected);
                tracing::info!(link, "Transport session connected");
                SessionSignal::Connected
            }
            TransportEvent::ConnectFailed { failure, .. } | TransportEvent::Closed { failure, .. } => {
                if self.state == ConnectionState::Disconnected {
                    return SessionSignal::Ignored;
                }
                self.fail(&failure);
                SessionSignal::Failed(failure)
            }
            TransportEvent::Event { name, payload, .. } => {
                if self.state != ConnectionState::Connected {
                    tracing::debug!(event = %name, state = %self.state, "Dropping event outside connected state");
                    return SessionSignal::Ignored;
                }
                SessionSignal::Inbound { name, payload }
            }
        }
    }

    /// Push a named event. Only valid while connected.
    pub fn send(&mut self, name: &str, payload: &Value) -> Result<(), SyncError> {
        if self.state != ConnectionState::Connected {
            return Err(SyncError::Transport(TransportFailure::Closed(
                "session is not connected".to_string(),
            )));
        }
        if let Err(failure) = self.transport.send(self.link, name, payload) {
            self.fail(&failure);
            return Err(SyncError::Transport(failure));
        }
        Ok(())
    }

    fn fail(&mut self, failure: &TransportFailure) {
        self.transport.disconnect(self.link);
        self.attempts += 1;
        self.set_state(ConnectionState::Disconnected);
        tracing::warn!(
            link = self.link,
            attempts = self.attempts,
            error = %failure,
            "Transport session failed"
        );
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        metrics::set_connection_state(state);
    }
}
