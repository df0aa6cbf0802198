//! Bus-wide configuration with sensible defaults (spec.md §6).
//!
//! Grounded on the teacher's `system/config.rs`: named `pub const` defaults
//! plus a plain struct with a builder, no environment-variable magic.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default deadline for [`crate::bus::MessageBus::connect`] (spec.md §6).
pub const DEFAULT_CONNECT_DEADLINE: Duration = Duration::from_millis(1000);

/// Default deadline for a single frame send.
pub const DEFAULT_SEND_DEADLINE: Duration = Duration::from_millis(5000);

/// Default bounded wait the listener mainloop uses per poll iteration
/// before looping to re-check for shutdown (spec.md §4.2 "Listener
/// mainloop").
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default number of worker threads for a bus's optional dispatch pool.
pub const DEFAULT_POOL_SIZE: usize = 0;

/// Bus-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Deadline for `connect`.
    pub connect_deadline: Duration,
    /// Deadline for a single frame send.
    pub send_deadline: Duration,
    /// Bounded wait per mainloop poll iteration.
    pub poll_interval: Duration,
    /// Worker threads for the optional dispatch pool (0 = run listeners
    /// directly on the mainloop thread).
    pub pool_size: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            connect_deadline: DEFAULT_CONNECT_DEADLINE,
            send_deadline: DEFAULT_SEND_DEADLINE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl BusConfig {
    /// Start building a configuration from the defaults.
    pub fn builder() -> BusConfigBuilder {
        BusConfigBuilder::default()
    }
}

/// Fluent constructor for [`BusConfig`].
#[derive(Debug, Default)]
pub struct BusConfigBuilder {
    config: OptionalConfig,
}

#[derive(Debug, Default)]
struct OptionalConfig {
    connect_deadline: Option<Duration>,
    send_deadline: Option<Duration>,
    poll_interval: Option<Duration>,
    pool_size: Option<usize>,
}

impl BusConfigBuilder {
    /// Override the connect deadline.
    pub fn connect_deadline(mut self, deadline: Duration) -> Self {
        self.config.connect_deadline = Some(deadline);
        self
    }

    /// Override the send deadline.
    pub fn send_deadline(mut self, deadline: Duration) -> Self {
        self.config.send_deadline = Some(deadline);
        self
    }

    /// Override the mainloop poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = Some(interval);
        self
    }

    /// Override the dispatch pool size.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.config.pool_size = Some(size);
        self
    }

    /// Finish building, falling back to defaults for anything unset.
    pub fn build(self) -> BusConfig {
        let defaults = BusConfig::default();
        BusConfig {
            connect_deadline: self.config.connect_deadline.unwrap_or(defaults.connect_deadline),
            send_deadline: self.config.send_deadline.unwrap_or(defaults.send_deadline),
            poll_interval: self.config.poll_interval.unwrap_or(defaults.poll_interval),
            pool_size: self.config.pool_size.unwrap_or(defaults.pool_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = BusConfig::default();
        assert_eq!(config.connect_deadline, Duration::from_millis(1000));
        assert_eq!(config.send_deadline, Duration::from_millis(5000));
    }

    #[test]
    fn builder_overrides_selectively() {
        let config = BusConfig::builder().pool_size(4).build();
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.connect_deadline, DEFAULT_CONNECT_DEADLINE);
    }
}
