//! Application Services
//!
//! State owners of the real-time client. Every service here is synchronous
//! and owned by a single event loop; none of them performs I/O directly.
//!
//! ## Available Services
//!
//! - **EventRouter**: dispatches named inbound events to their owner
//! - **NotificationStore**: most-recent-first notifications with unread count
//! - **ChatSession**: rooms, message history, typing state machines
//! - **PresenceCounter**: online user count
//! - **OutboundEmitter**: validated fire-and-forget commands

pub mod chat_session;
pub mod emitter;
pub mod notification_store;
pub mod presence;
pub mod router;
pub mod typing;

pub use chat_session::{AppendOutcome, ChatConfig, ChatSession};
pub use emitter::{CommandSink, EmitOutcome, OutboundEmitter};
pub use notification_store::{IngestOutcome, NotificationStore};
pub use presence::PresenceCounter;
pub use router::{DomainEventSink, EventRouter, RouteOutcome, RouteTargets};
pub use typing::{ChatTimer, LocalTyping, TypingTransition};
