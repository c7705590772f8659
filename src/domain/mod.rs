//! # Domain Layer
//!
//! Entities, wire events, and commands of the real-time client. Nothing in
//! here performs I/O.
//!
//! ## Structure
//!
//! - **entities**: notifications, chat rooms, session identity
//! - **value_objects**: string-backed ids
//! - **events**: inbound named events and the domain events they produce
//! - **commands**: validated outbound commands

pub mod commands;
pub mod entities;
pub mod events;
pub mod value_objects;

// Re-export commonly used types
pub use commands::OutboundCommand;
pub use entities::*;
pub use events::{DomainEvent, InboundEvent};
pub use value_objects::*;
