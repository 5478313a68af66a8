use std::time::Duration;

use crate::config::RealtimeConfig;

/// Fixed-delay reconnect schedule with an attempt cap.
///
/// Once the cap is reached the policy disables itself; only `reset` turns
/// automatic reconnects back on.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    delay: Duration,
    max_attempts: u32,
    attempts: u32,
    enabled: bool,
}

impl ReconnectPolicy {
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
            attempts: 0,
            enabled: true,
        }
    }

    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self::new(config.reconnect_delay(), config.max_reconnect_attempts)
    }

    /// Delay before the next attempt, or `None` when no retry should happen.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        if self.attempts >= self.max_attempts {
            tracing::warn!(
                "Realtime reconnect gave up after {} attempts",
                self.attempts
            );
            self.enabled = false;
            return None;
        }
        self.attempts += 1;
        tracing::info!(
            "Realtime reconnect in {:?} (attempt {}/{})",
            self.delay,
            self.attempts,
            self.max_attempts
        );
        Some(self.delay)
    }

    pub fn on_connected(&mut self) {
        self.attempts = 0;
    }

    /// Stop reconnecting, e.g. on logout
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn reset(&mut self) {
        self.enabled = true;
        self.attempts = 0;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
