//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use storefront_realtime::domain::{Credential, Principal, UserId};
use storefront_realtime::infrastructure::transport::{LinkId, Transport};
use storefront_realtime::shared::error::TransportFailure;

/// One frame pushed through [`StubTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentFrame {
    pub link: LinkId,
    pub name: String,
    pub payload: Value,
}

/// Calls observed by [`StubTransport`]
#[derive(Debug, Default)]
pub struct TransportLog {
    pub connects: Vec<LinkId>,
    pub tokens: Vec<String>,
    pub disconnects: Vec<LinkId>,
    pub sent: Vec<SentFrame>,
}

/// In-memory transport. Connects always start; events are injected by the test.
#[derive(Clone, Default)]
pub struct StubTransport {
    log: Arc<Mutex<TransportLog>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentFrame> {
        self.log.lock().unwrap().sent.clone()
    }

    /// Names of sent events, in order
    pub fn sent_names(&self) -> Vec<String> {
        self.sent().into_iter().map(|frame| frame.name).collect()
    }

    pub fn connects(&self) -> Vec<LinkId> {
        self.log.lock().unwrap().connects.clone()
    }

    /// Credential presented on each connect, in order
    pub fn tokens(&self) -> Vec<String> {
        self.log.lock().unwrap().tokens.clone()
    }

    pub fn disconnects(&self) -> Vec<LinkId> {
        self.log.lock().unwrap().disconnects.clone()
    }

    pub fn clear_sent(&self) {
        self.log.lock().unwrap().sent.clear();
    }
}

impl Transport for StubTransport {
    fn connect(&mut self, link: LinkId, credential: &Credential) -> Result<(), TransportFailure> {
        let mut log = self.log.lock().unwrap();
        log.connects.push(link);
        log.tokens.push(credential.expose().to_string());
        Ok(())
    }

    fn send(&mut self, link: LinkId, name: &str, payload: &Value) -> Result<(), TransportFailure> {
        self.log.lock().unwrap().sent.push(SentFrame {
            link,
            name: name.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }

    fn disconnect(&mut self, link: LinkId) {
        self.log.lock().unwrap().disconnects.push(link);
    }
}

/// Principal with a fixed token
pub fn principal(user_id: &str, display_name: &str) -> Principal {
    principal_with_token(user_id, display_name, "test-token")
}

pub fn principal_with_token(user_id: &str, display_name: &str, token: &str) -> Principal {
    Principal::new(UserId::new(user_id), display_name, Credential::new(token).unwrap())
}
