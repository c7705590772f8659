//! Identifier value objects.
//!
//! The storefront server is loose about id types: room and user ids arrive
//! as JSON strings or numbers depending on the emitting page. Both forms
//! deserialize into the same string-backed newtype.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Accept a JSON string or integer and keep its textual form.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl From<WireId> for String {
    fn from(id: WireId) -> Self {
        match id {
            WireId::Text(s) => s,
            WireId::Signed(n) => n.to_string(),
            WireId::Unsigned(n) => n.to_string(),
        }
    }
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    WireId::deserialize(deserializer).map(String::from)
}

pub(crate) fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<WireId>::deserialize(deserializer).map(|id| id.map(String::from))
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                string_or_number(deserializer).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Chat room identifier (e.g. `"support"`).
    RoomId
);

string_id!(
    /// Principal identifier as issued by the authentication provider.
    UserId
);

/// Identifier of a notification record.
///
/// Server-supplied ids are kept verbatim; records delivered without one get a
/// receipt-time id from the store's generator. The two spaces never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "origin", content = "value", rename_all = "lowercase")]
pub enum NotificationId {
    Server(String),
    Local(u64),
}

impl NotificationId {
    pub fn is_server(&self) -> bool {
        matches!(self, NotificationId::Server(_))
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationId::Server(id) => write!(f, "{}", id),
            NotificationId::Local(id) => write!(f, "local-{}", id),
        }
    }
}
