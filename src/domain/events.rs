//! Inbound Events
//!
//! Wire payloads for every named event the storefront server pushes, and the
//! tagged [`InboundEvent`] they decode into. Event names match the server
//! exactly; payload fields are camelCase on the wire.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::value_objects::{optional_string_or_number, string_or_number, RoomId, UserId};
use crate::shared::error::SyncError;

/// Wire event names.
pub mod names {
    pub const NOTIFICATION: &str = "notification";
    pub const LOW_STOCK_ALERT: &str = "lowStockAlert";
    pub const ONLINE_USERS_COUNT: &str = "onlineUsersCount";
    pub const ONLINE_COUNT: &str = "onlineCount";
    pub const CHAT_MESSAGE: &str = "chatMessage";
    pub const USER_TYPING: &str = "userTyping";
    pub const ORDER_STATUS_CHANGED: &str = "orderStatusChanged";
    pub const NEW_ORDER: &str = "newOrder";
    pub const STOCK_UPDATED: &str = "stockUpdated";
}

/// `notification` payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationPayload {
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// `lowStockAlert` payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LowStockPayload {
    pub message: String,
}

/// `onlineUsersCount` payload: a bare integer, or `{ "count": n }`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
enum OnlineCountPayload {
    Bare(u64),
    Wrapped { count: u64 },
}

/// Timestamps arrive as epoch milliseconds or RFC 3339 strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Millis(i64),
    Text(DateTime<Utc>),
}

impl WireTimestamp {
    pub fn to_datetime(&self) -> DateTime<Utc> {
        match self {
            WireTimestamp::Millis(ms) => Utc
                .timestamp_millis_opt(*ms)
                .single()
                .unwrap_or_else(Utc::now),
            WireTimestamp::Text(dt) => *dt,
        }
    }
}

/// `chatMessage` payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    pub room_id: RoomId,
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
    #[serde(default)]
    pub client_id: Option<Uuid>,
}

/// `userTyping` payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub room_id: RoomId,
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: String,
    pub is_typing: bool,
}

/// `orderStatusChanged` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusChangedPayload {
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    pub new_status: String,
}

/// `stockUpdated` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdatedPayload {
    #[serde(deserialize_with = "string_or_number")]
    pub product_id: String,
    pub new_stock: i64,
}

/// Decoded inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Notification(NotificationPayload),
    LowStockAlert(LowStockPayload),
    OnlineCount(u64),
    ChatMessage(ChatMessagePayload),
    UserTyping(TypingPayload),
    OrderStatusChanged(OrderStatusChangedPayload),
    NewOrder(Value),
    StockUpdated(StockUpdatedPayload),
}

impl InboundEvent {
    /// Decode a named wire event.
    ///
    /// Unknown names yield [`SyncError::UnknownEvent`]; malformed payloads
    /// yield [`SyncError::Payload`].
    pub fn decode(name: &str, payload: Value) -> Result<Self, SyncError> {
        let event = match name {
            names::NOTIFICATION => Self::Notification(serde_json::from_value(payload)?),
            names::LOW_STOCK_ALERT => Self::LowStockAlert(serde_json::from_value(payload)?),
            names::ONLINE_USERS_COUNT | names::ONLINE_COUNT => {
                match serde_json::from_value::<OnlineCountPayload>(payload)? {
                    OnlineCountPayload::Bare(n) | OnlineCountPayload::Wrapped { count: n } => {
                        Self::OnlineCount(n)
                    }
                }
            }
            names::CHAT_MESSAGE => Self::ChatMessage(serde_json::from_value(payload)?),
            names::USER_TYPING => Self::UserTyping(serde_json::from_value(payload)?),
            names::ORDER_STATUS_CHANGED => {
                Self::OrderStatusChanged(serde_json::from_value(payload)?)
            }
            names::NEW_ORDER => Self::NewOrder(payload),
            names::STOCK_UPDATED => Self::StockUpdated(serde_json::from_value(payload)?),
            other => return Err(SyncError::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }

    /// Canonical wire name of this event
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Notification(_) => names::NOTIFICATION,
            Self::LowStockAlert(_) => names::LOW_STOCK_ALERT,
            Self::OnlineCount(_) => names::ONLINE_USERS_COUNT,
            Self::ChatMessage(_) => names::CHAT_MESSAGE,
            Self::UserTyping(_) => names::USER_TYPING,
            Self::OrderStatusChanged(_) => names::ORDER_STATUS_CHANGED,
            Self::NewOrder(_) => names::NEW_ORDER,
            Self::StockUpdated(_) => names::STOCK_UPDATED,
        }
    }
}

/// Domain events forwarded to page-level consumers (order feed, admin views).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum DomainEvent {
    OrderStatusChanged(OrderStatusChangedPayload),
    NewOrder(Value),
    StockUpdated(StockUpdatedPayload),
}
