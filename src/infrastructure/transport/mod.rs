//! Transport
//!
//! The duplex event-stream seam. A [`Transport`] starts and stops links and
//! pushes frames; everything it observes comes back to the event loop as a
//! [`TransportEvent`] tagged with the link it belongs to.

pub mod codec;
pub mod session;
pub mod websocket;

use serde_json::Value;

use crate::domain::Credential;
use crate::shared::error::TransportFailure;

pub use session::{SessionSignal, TransportSession};
pub use websocket::WebSocketTransport;

/// Identifies one connection attempt. Events from an older link are stale.
pub type LinkId = u64;

/// Something the transport observed on a link
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Handshake finished; the server accepted the credential
    Connected { link: LinkId },
    /// Handshake failed
    ConnectFailed { link: LinkId, failure: TransportFailure },
    /// An established link went away
    Closed { link: LinkId, failure: TransportFailure },
    /// Inbound named event
    Event {
        link: LinkId,
        name: String,
        payload: Value,
    },
}

impl TransportEvent {
    pub fn link(&self) -> LinkId {
        match self {
            TransportEvent::Connected { link }
            | TransportEvent::ConnectFailed { link, .. }
            | TransportEvent::Closed { link, .. }
            | TransportEvent::Event { link, .. } => *link,
        }
    }
}

/// Duplex event-stream transport.
///
/// Calls never block: `connect` only starts the handshake, whose result is
/// reported later as a [`TransportEvent`].
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Start a handshake for `link`, attaching `credential`
    fn connect(&mut self, link: LinkId, credential: &Credential) -> Result<(), TransportFailure>;

    /// Push one named event on `link`
    fn send(&mut self, link: LinkId, name: &str, payload: &Value) -> Result<(), TransportFailure>;

    /// Tear down `link`; no further events are reported for it
    fn disconnect(&mut self, link: LinkId);
}
