//! # Domain Entities
//!
//! Core objects held by the real-time client.
//!
//! - **NotificationRecord**: one delivered notification with its read flag
//! - **ChatRoom / ChatMessage / TypingEntry**: per-room chat state
//! - **ConnectionState / Credential / Principal**: session identity and state
//!
//! Collaborator traits (e.g. [`NotificationHistory`]) live beside the entity
//! they serve and are implemented outside the core.

mod chat;
mod notification;
mod session;

pub use chat::{ChatMessage, ChatRoom, PendingEcho, TypingEntry};
pub use notification::{NotificationHistory, NotificationKind, NotificationRecord};
pub use session::{ConnectionState, Credential, LocalUser, Principal};
