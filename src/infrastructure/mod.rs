//! Infrastructure Layer
//!
//! Contains implementations for external concerns:
//! - Transport session and the Socket.IO websocket transport
//! - Reconnection backoff policy
//! - Prometheus metrics

pub mod metrics;
pub mod reconnect;
pub mod transport;
