//! # Storefront Realtime
//!
//! Client-side real-time synchronization core for the storefront:
//! - One authenticated Socket.IO session per principal, with backoff reconnects
//! - Routing of named server events to their owners
//! - Notification store with an exact unread counter
//! - Chat rooms with echo suppression and typing indicators
//! - Online user count and validated outbound commands
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: entities, wire events, outbound commands
//! - **Application Layer**: synchronous state owners and the sync core
//! - **Infrastructure Layer**: WebSocket transport, reconnect policy, metrics
//!
//! ## Module Structure
//!
//! ```text
//! storefront_realtime/
//! +-- config/         Configuration management
//! +-- domain/         Entities, events, commands, ids
//! +-- application/    Router, stores, chat session, sync core
//! +-- infrastructure/ Transport, reconnect policy, metrics
//! +-- shared/         Errors, validation, receipt ids, timers
//! ```

// Configuration module
pub mod config;

// Domain layer - Core types
pub mod domain;

// Application layer - State owners
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Shared utilities
pub mod shared;

// Event loop and client handle
pub mod startup;

// Telemetry and observability
pub mod telemetry;
