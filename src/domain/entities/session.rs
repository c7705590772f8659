//! Session-related entities: connection state, credential, and principal.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::UserId;

/// Connection state of a transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }

    /// Numeric form used by the connection state gauge.
    pub fn as_gauge(&self) -> i64 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bearer credential attached to the transport handshake.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for an empty or whitespace-only token.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Authenticated principal as supplied by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub display_name: String,
    pub credential: Credential,
}

impl Principal {
    pub fn new(user_id: UserId, display_name: impl Into<String>, credential: Credential) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            credential,
        }
    }
}

/// Local identity used for outbound chat commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUser {
    pub user_id: UserId,
    pub display_name: String,
}

impl From<&Principal> for LocalUser {
    fn from(principal: &Principal) -> Self {
        Self {
            user_id: principal.user_id.clone(),
            display_name: principal.display_name.clone(),
        }
    }
}
