//! Client settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Transport endpoint configuration
    pub transport: TransportSettings,

    /// Reconnection backoff configuration
    pub reconnect: ReconnectSettings,

    /// Chat timers and limits
    pub chat: ChatSettings,

    /// Principal used by the console client
    #[serde(default)]
    pub principal: PrincipalSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Socket endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportSettings {
    /// Server base URL (ws, wss, http or https)
    pub url: String,

    /// Socket.IO mount path
    pub path: String,

    /// Handshake timeout in milliseconds (default: 20000)
    pub handshake_timeout_ms: u64,
}

/// Reconnection backoff configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectSettings {
    /// Retries before surfacing a permanent failure (default: 5)
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds (default: 1000)
    pub initial_delay_ms: u64,

    /// Upper bound for a single delay in milliseconds (default: 5000)
    pub max_delay_ms: u64,

    /// Growth factor between retries (default: 2.0)
    pub multiplier: f64,

    /// Randomization factor in [0, 1] (default: 0.5)
    pub jitter: f64,
}

/// Chat timers and limits.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSettings {
    /// Remote typing indicator expiry in milliseconds (default: 3000)
    pub typing_expiry_ms: u64,

    /// Local inactivity before emitting "stopped typing" (default: 1000)
    pub local_typing_idle_ms: u64,

    /// Outbound messages remembered for echo suppression, per room (default: 32)
    pub pending_echo_limit: usize,
}

/// Principal for the console client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrincipalSettings {
    /// Bearer token attached to the handshake
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub display_name: Option<String>,

    /// Rooms to join once connected
    #[serde(default)]
    pub rooms: Vec<String>,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if a value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Self::builder(&environment)?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__RECONNECT__MAX_ATTEMPTS=3 -> reconnect.max_attempts = 3
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("transport.url", std::env::var("REALTIME_URL").ok())?
            .set_override_option("principal.token", std::env::var("REALTIME_TOKEN").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| settings.validate())
    }

    /// Defaults only, without files or environment.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::builder("test")?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| settings.validate())
    }

    fn builder(
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            // Start with default values
            .set_default("environment", environment)?
            .set_default("transport.url", "ws://localhost:5000")?
            .set_default("transport.path", "/socket.io/")?
            .set_default("transport.handshake_timeout_ms", 20000_i64)?
            .set_default("reconnect.max_attempts", 5)?
            .set_default("reconnect.initial_delay_ms", 1000_i64)?
            .set_default("reconnect.max_delay_ms", 5000_i64)?
            .set_default("reconnect.multiplier", 2.0)?
            .set_default("reconnect.jitter", 0.5)?
            .set_default("chat.typing_expiry_ms", 3000_i64)?
            .set_default("chat.local_typing_idle_ms", 1000_i64)?
            .set_default("chat.pending_echo_limit", 32_i64)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.reconnect.max_attempts == 0 {
            return Err(ConfigError::Message(
                "reconnect.max_attempts must be at least 1".into(),
            ));
        }
        if self.reconnect.multiplier < 1.0 {
            return Err(ConfigError::Message(format!(
                "reconnect.multiplier must be >= 1.0. Current value: {}",
                self.reconnect.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.reconnect.jitter) {
            return Err(ConfigError::Message(format!(
                "reconnect.jitter must be within [0, 1]. Current value: {}",
                self.reconnect.jitter
            )));
        }
        if self.chat.typing_expiry_ms == 0
            || self.chat.local_typing_idle_ms == 0
            || self.transport.handshake_timeout_ms == 0
        {
            return Err(ConfigError::Message(
                "timer durations must be non-zero".into(),
            ));
        }
        Ok(self)
    }
}
