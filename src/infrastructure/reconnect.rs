//! Reconnection Policy
//!
//! Exponential backoff with jitter, bounded by a maximum attempt count.
//! Defaults: 5 attempts, 1s initial delay, 5s cap, factor 2, ±50% jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::ReconnectSettings;

/// Backoff schedule for re-opening a failed transport session
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: f64,
}

impl ReconnectPolicy {
    pub fn from_settings(settings: &ReconnectSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            multiplier: settings.multiplier,
            jitter: settings.jitter,
        }
    }

    /// Same schedule without randomization
    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    /// Un-jittered delay before retry number `attempt` (1-based), or `None`
    /// once the budget is spent.
    pub fn base_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = self.multiplier.powi(attempt as i32 - 1);
        let millis = (self.initial_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        Some(Duration::from_millis(millis as u64))
    }

    /// Delay before retry number `attempt`, with jitter applied.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        let base = self.base_delay(attempt)?;
        if self.jitter <= 0.0 {
            return Some(base);
        }
        let spread = rand::rng().random_range(-self.jitter..=self.jitter);
        let millis = (base.as_millis() as f64 * (1.0 + spread)).max(0.0);
        Some(Duration::from_millis(millis as u64))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            multiplier: 2.0,
            jitter: 0.5,
        }
    }
}
