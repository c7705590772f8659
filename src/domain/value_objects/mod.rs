//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! ## Value Objects
//!
//! - **RoomId / UserId**: string-backed ids tolerant of numeric wire forms
//! - **NotificationId**: server-supplied or receipt-time notification id

mod ids;

pub use ids::*;
