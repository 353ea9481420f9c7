//! Session configuration.
//!
//! Use the builder methods to customize a session, or [`SessionConfig::from_env`]
//! to pick up overrides from the environment.
//!
//! # Example
//!
//! ```
//! use draftwire::config::SessionConfig;
//! use std::time::Duration;
//!
//! let config = SessionConfig::default()
//!     .with_fallback(false)
//!     .with_chunk_timeout(Some(Duration::from_secs(30)));
//! assert!(!config.fallback_enabled);
//! ```

use std::ops::RangeInclusive;
use std::time::Duration;

/// Canonical stage ids replayed when the backend does not stream.
pub const DEFAULT_STAGES: [&str; 4] = ["searching", "analyzing", "synthesizing", "drafting"];

/// Default flag toggled between streamed and non-streamed representations.
pub const DEFAULT_STREAM_FLAG: &str = "stream";

const ENV_FALLBACK: &str = "DRAFTWIRE_FALLBACK";
const ENV_STAGE_DELAY_MS: &str = "DRAFTWIRE_STAGE_DELAY_MS";
const ENV_OPEN_TIMEOUT: &str = "DRAFTWIRE_OPEN_TIMEOUT_SECS";
const ENV_CHUNK_TIMEOUT: &str = "DRAFTWIRE_CHUNK_TIMEOUT_SECS";
const ENV_FALLBACK_TIMEOUT: &str = "DRAFTWIRE_FALLBACK_TIMEOUT_SECS";

/// Configuration for one streaming session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Retry as a non-streamed request when streaming never starts (default: true)
    pub fallback_enabled: bool,
    /// Stage ids replayed by the simulated progress sequence
    pub stages: Vec<String>,
    /// Bounds of the random pause between simulated stage start and completion
    pub stage_delay: RangeInclusive<Duration>,
    /// Deadline for the streaming request's response headers
    pub open_timeout: Option<Duration>,
    /// Deadline for each chunk once streaming began
    pub chunk_timeout: Option<Duration>,
    /// Deadline for the whole fallback request
    pub fallback_timeout: Option<Duration>,
    /// Body field or query parameter carrying the streamed/non-streamed flag
    pub stream_flag: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fallback_enabled: true,
            stages: DEFAULT_STAGES.iter().map(|s| s.to_string()).collect(),
            stage_delay: Duration::from_millis(150)..=Duration::from_millis(450),
            open_timeout: Some(Duration::from_secs(30)),
            chunk_timeout: Some(Duration::from_secs(120)),
            fallback_timeout: Some(Duration::from_secs(120)),
            stream_flag: DEFAULT_STREAM_FLAG.to_string(),
        }
    }
}

impl SessionConfig {
    /// Create a new SessionConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    pub fn with_stages<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stages = stages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stage_delay(mut self, delay: RangeInclusive<Duration>) -> Self {
        self.stage_delay = delay;
        self
    }

    /// No pause between simulated stages.
    pub fn without_stage_delay(self) -> Self {
        self.with_stage_delay(Duration::ZERO..=Duration::ZERO)
    }

    pub fn with_open_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn with_chunk_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    pub fn with_fallback_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fallback_timeout = timeout;
        self
    }

    pub fn with_stream_flag(mut self, flag: impl Into<String>) -> Self {
        self.stream_flag = flag.into();
        self
    }

    /// Defaults overridden by `DRAFTWIRE_*` environment variables.
    ///
    /// Unparseable values are logged and ignored. A timeout of `0` disables
    /// that deadline.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_FALLBACK) {
            config.fallback_enabled = !matches!(value.trim(), "0" | "false" | "off" | "no");
        }

        if let Some(value) = lookup(ENV_STAGE_DELAY_MS) {
            match parse_delay_range(&value) {
                Some(range) => config.stage_delay = range,
                None => tracing::warn!(value = %value, "Ignoring invalid {}", ENV_STAGE_DELAY_MS),
            }
        }

        for (key, slot) in [
            (ENV_OPEN_TIMEOUT, &mut config.open_timeout),
            (ENV_CHUNK_TIMEOUT, &mut config.chunk_timeout),
            (ENV_FALLBACK_TIMEOUT, &mut config.fallback_timeout),
        ] {
            if let Some(value) = lookup(key) {
                match value.trim().parse::<u64>() {
                    Ok(0) => *slot = None,
                    Ok(secs) => *slot = Some(Duration::from_secs(secs)),
                    Err(_) => tracing::warn!(value = %value, "Ignoring invalid {}", key),
                }
            }
        }

        config
    }

    /// Pick a pause within `stage_delay`.
    pub fn sample_stage_delay(&self) -> Duration {
        let (min, max) = (*self.stage_delay.start(), *self.stage_delay.end());
        if max <= min {
            return min;
        }
        use rand::Rng;
        rand::thread_rng().gen_range(min..=max)
    }
}

/// Parse `min-max` or a single value, in milliseconds.
fn parse_delay_range(value: &str) -> Option<RangeInclusive<Duration>> {
    let value = value.trim();
    let (min, max) = match value.split_once('-') {
        Some((min, max)) => (min.trim().parse::<u64>().ok()?, max.trim().parse::<u64>().ok()?),
        None => {
            let ms = value.parse::<u64>().ok()?;
            (ms, ms)
        }
    };
    if min > max {
        return None;
    }
    Some(Duration::from_millis(min)..=Duration::from_millis(max))
}
