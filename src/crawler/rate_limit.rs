//! Named-channel rate limiting
//!
//! Each channel carries a request budget and a window length. Requests are
//! counted per channel; once a request pushes the counter past the budget the
//! caller sleeps for the whole window and the counter starts again from zero.

use crate::config::RateLimitsConfig;
use crate::RateLimitError;
use std::collections::HashMap;
use std::time::Duration;

/// Channel used when a caller does not name one
pub const UNIVERSAL_CHANNEL: &str = "universal";

/// Channel used for course detail lookups
pub const COURSE_CHANNEL: &str = "course";

/// Budget and usage of one named channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitChannel {
    /// Requests allowed before the window pause
    pub allowed: u32,

    /// Pause applied when the budget is exceeded
    pub window: Duration,

    /// Requests counted since the last reset
    pub used: u32,
}

impl RateLimitChannel {
    pub fn new(allowed: u32, window: Duration) -> Self {
        Self {
            allowed,
            window,
            used: 0,
        }
    }

    /// Counts one request and reports whether the caller must wait
    ///
    /// Returns the window to sleep for when the budget is exceeded. The
    /// counter is reset to zero in that case; excess is not carried over.
    fn record_request(&mut self) -> Option<Duration> {
        self.used += 1;

        if self.used > self.allowed {
            self.used = 0;
            Some(self.window)
        } else {
            None
        }
    }
}

/// Rate limiter over a fixed set of named channels
///
/// Channels are declared up front from configuration and live for the
/// lifetime of the limiter. Asking for an undeclared channel is a
/// configuration error.
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    channels: HashMap<String, RateLimitChannel>,
}

impl RateLimiter {
    /// Creates a limiter with the channels declared in configuration
    pub fn new(config: &RateLimitsConfig) -> Self {
        let channels = config
            .0
            .iter()
            .map(|(name, limit)| {
                (
                    name.clone(),
                    RateLimitChannel::new(limit.requests, Duration::from_secs(limit.seconds)),
                )
            })
            .collect();

        Self { channels }
    }

    /// Adds or replaces a channel
    pub fn with_channel(mut self, name: impl Into<String>, allowed: u32, window: Duration) -> Self {
        self.channels
            .insert(name.into(), RateLimitChannel::new(allowed, window));
        self
    }

    /// Counts a request against `channel`, sleeping for the full window on overflow
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::UnknownChannel`] when the channel was never
    /// declared. Nothing is counted in that case.
    pub async fn acquire(&mut self, channel: &str) -> Result<(), RateLimitError> {
        let state = self
            .channels
            .get_mut(channel)
            .ok_or_else(|| RateLimitError::UnknownChannel(channel.to_string()))?;

        if let Some(window) = state.record_request() {
            tracing::info!(
                channel,
                allowed = state.allowed,
                "Rate limit reached, pausing for {:?}",
                window
            );
            tokio::time::sleep(window).await;
        }

        Ok(())
    }

    /// Requests counted on `channel` since its last reset
    pub fn used(&self, channel: &str) -> Option<u32> {
        self.channels.get(channel).map(|state| state.used)
    }

    /// Gets a channel's full state
    pub fn channel(&self, channel: &str) -> Option<&RateLimitChannel> {
        self.channels.get(channel)
    }

    /// Names of all declared channels
    pub fn channel_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
