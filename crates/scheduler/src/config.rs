//! Scheduler configuration
//!
//! Configuration can be created programmatically with the `with_*` builders or
//! loaded from environment variables.

use crate::error::ConfigError;
use crate::frame::FRAME_INTERVAL_60FPS;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable selecting the [`FlushPolicy`]
pub const ENV_FLUSH_POLICY: &str = "FRAME_BATCH_FLUSH_POLICY";

/// Environment variable holding the fallback frame interval in milliseconds
pub const ENV_FRAME_INTERVAL_MS: &str = "FRAME_BATCH_FRAME_INTERVAL_MS";

/// How a phase treats jobs added to its own queue while it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushPolicy {
    /// Keep draining the phase's queue until it stays empty, so jobs added
    /// while the phase runs (including from a failure handler) still run in
    /// this frame
    #[default]
    UntilEmpty,

    /// Run only what was queued when the phase started; anything added later
    /// waits for the next frame
    Snapshot,
}

impl fmt::Display for FlushPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushPolicy::UntilEmpty => f.write_str("until_empty"),
            FlushPolicy::Snapshot => f.write_str("snapshot"),
        }
    }
}

impl FromStr for FlushPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "until_empty" | "until-empty" => Ok(FlushPolicy::UntilEmpty),
            "snapshot" => Ok(FlushPolicy::Snapshot),
            _ => Err(ConfigError::InvalidValue {
                key: ENV_FLUSH_POLICY.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

/// Configuration for a [`FrameScheduler`](crate::FrameScheduler)
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// How phases handle jobs submitted while they run
    pub flush_policy: FlushPolicy,

    /// Interval used by the fixed-timer fallback frame primitive
    /// Default: 16.67ms (60 FPS).
    pub frame_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            flush_policy: FlushPolicy::default(),
            frame_interval: FRAME_INTERVAL_60FPS,
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flush policy
    pub fn with_flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }

    /// Set the fallback frame interval
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `FRAME_BATCH_FLUSH_POLICY`: `until_empty` or `snapshot` (default: `until_empty`)
    /// - `FRAME_BATCH_FRAME_INTERVAL_MS`: fallback frame interval in ms, at least 1
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var(ENV_FLUSH_POLICY) {
            config.flush_policy = val.parse()?;
        }

        if let Ok(val) = std::env::var(ENV_FRAME_INTERVAL_MS) {
            let millis = val
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|millis| *millis > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: ENV_FRAME_INTERVAL_MS.to_string(),
                    value: val.clone(),
                })?;
            config.frame_interval = Duration::from_millis(millis);
        }

        Ok(config)
    }
}
