//! # Configuration Module
//!
//! This module handles client configuration loading and management.
//! Configuration can be loaded from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{environment}.toml)
//! - .env files (via dotenvy)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storefront_realtime::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Connecting to {}", settings.transport.url);
//! ```

mod settings;

pub use settings::*;
