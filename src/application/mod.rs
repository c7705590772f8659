//! Application Layer
//!
//! State owners of the real-time client and the [`SyncCore`] that wires them
//! to a transport session. This layer sits between the domain types and the
//! event loop in [`crate::startup`].

pub mod core;
pub mod services;

pub use self::core::{CoreSignal, SyncCore};
