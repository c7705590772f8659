//! Notification entity and history collaborator trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::NotificationId;
use crate::shared::error::SyncError;

/// Closed set of notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    /// Order placed, shipped, cancelled, ...
    OrderUpdate,
    /// Inventory dropped under its threshold
    LowStock,
    /// Chat activity addressed to the principal
    ChatRelated,
    #[default]
    Generic,
}

impl NotificationKind {
    /// Map the free-form `type` string sent by the server onto the closed set.
    pub fn from_wire(s: &str) -> Self {
        match s.to_lowercase().replace('_', "-").as_str() {
            "order" | "order-update" | "orderupdate" | "order-status" => Self::OrderUpdate,
            "low-stock" | "lowstock" | "stock" => Self::LowStock,
            "chat" | "message" | "chat-message" => Self::ChatRelated,
            _ => Self::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderUpdate => "order-update",
            Self::LowStock => "low-stock",
            Self::ChatRelated => "chat-related",
            Self::Generic => "generic",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One delivered notification.
///
/// The read flag only moves from false to true; use [`NotificationRecord::mark_read`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub kind: NotificationKind,
    /// Raw `type` string as delivered (`info`, `warning`, `order`, ...)
    pub level: Option<String>,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    read: bool,
}

impl NotificationRecord {
    pub fn new(
        id: NotificationId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id,
            kind,
            level: None,
            title: title.into(),
            message: message.into(),
            created_at: Utc::now(),
            read: false,
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn is_read(&self) -> bool {
        self.read
    }

    /// Set the read flag. Returns true if the flag changed.
    pub fn mark_read(&mut self) -> bool {
        let changed = !self.read;
        self.read = true;
        changed
    }

    /// Order id referenced by the message, for deep-linking into the order page.
    ///
    /// Recognizes `#<id>` and `order <id>` (case-insensitive).
    pub fn order_reference(&self) -> Option<String> {
        extract_order_reference(&self.message)
    }
}

fn extract_order_reference(text: &str) -> Option<String> {
    let is_id_char = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    let take_id = |rest: &str| -> Option<String> {
        let id: String = rest.chars().take_while(|c| is_id_char(*c)).collect();
        (!id.is_empty()).then_some(id)
    };

    if let Some(pos) = text.find('#') {
        if let Some(id) = take_id(&text[pos + 1..]) {
            return Some(id);
        }
    }

    let lower = text.to_ascii_lowercase();
    let mut search_from = 0;
    while let Some(found) = lower[search_from..].find("order") {
        let after = search_from + found + "order".len();
        let rest = &text[after..];
        let trimmed = rest.trim_start_matches([' ', ':']);
        if trimmed.len() < rest.len() {
            if let Some(id) = take_id(trimmed).filter(|id| id.chars().any(|c| c.is_ascii_digit())) {
                return Some(id);
            }
        }
        search_from = after;
    }

    None
}

/// Persistent notification history, queried on demand.
#[async_trait]
pub trait NotificationHistory: Send + Sync {
    /// Fetch up to `limit` records, most recent first.
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<NotificationRecord>, SyncError>;
}
