//! Configuration for the session client.
//!
//! Every tunable has a compile-time default and most can be overridden at
//! runtime through a dedicated environment variable, read once by
//! [`ClientConfig::from_env`]. Builder methods override individual values
//! afterwards (the CLI maps its flags onto them).

use std::path::PathBuf;
use std::time::Duration;

/// Default game server address.
const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:7878";

/// Default number of consecutive failed connection attempts before giving up.
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay before a reconnection attempt (in milliseconds).
const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Upper bound for exponential backoff (in milliseconds).
const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 10_000;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Local clock granularity.
const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

const DEFAULT_CHALLENGE_TIMEOUT_SECS: u64 = 30;

/// How many out-of-order moves are held back waiting for a gap to close.
const DEFAULT_REORDER_BUFFER: usize = 32;

const DEFAULT_EVENT_CAPACITY: usize = 256;

const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Wait `base_delay` before every attempt.
    Fixed,
    /// Double the delay after each failure, capped at `max_delay`.
    Exponential,
}

/// Bounded reconnection policy for the channel manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_RETRY_DELAY_MS),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before attempt number `attempt` (1-based) of a retry run.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential => {
                let shift = attempt.saturating_sub(1).min(16);
                self.base_delay
                    .saturating_mul(1u32 << shift)
                    .min(self.max_delay.max(self.base_delay))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    pub retry: RetryPolicy,
    pub connect_timeout: Duration,
    pub tick_interval: Duration,
    pub challenge_timeout: Duration,
    pub reorder_buffer: usize,
    /// Board orientation follows the side to move instead of the local color.
    pub auto_rotate: bool,
    /// Where the resume handle lives. `None` disables persistence.
    pub data_dir: Option<PathBuf>,
    pub event_capacity: usize,
    pub shutdown_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            retry: RetryPolicy::default(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            challenge_timeout: Duration::from_secs(DEFAULT_CHALLENGE_TIMEOUT_SECS),
            reorder_buffer: DEFAULT_REORDER_BUFFER,
            auto_rotate: false,
            data_dir: Some(default_data_dir()),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            shutdown_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS),
        }
    }
}

impl ClientConfig {
    /// Defaults with environment overrides applied.
    ///
    /// - `CHESS_CLIENT_SERVER_ADDR`
    /// - `CHESS_CLIENT_MAX_RETRIES`
    /// - `CHESS_CLIENT_RETRY_DELAY_MS`
    /// - `CHESS_CLIENT_DATA_DIR`
    ///
    /// Values that fail to parse fall back to the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(addr) = std::env::var("CHESS_CLIENT_SERVER_ADDR") {
            config.server_addr = addr;
        }
        config.retry.max_attempts = env_parse("CHESS_CLIENT_MAX_RETRIES", DEFAULT_MAX_ATTEMPTS);
        config.retry.base_delay = Duration::from_millis(env_parse(
            "CHESS_CLIENT_RETRY_DELAY_MS",
            DEFAULT_RETRY_DELAY_MS,
        ));
        if let Ok(dir) = std::env::var("CHESS_CLIENT_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }
        config
    }

    #[must_use]
    pub fn with_server_addr(mut self, addr: impl Into<String>) -> Self {
        self.server_addr = addr.into();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_auto_rotate(mut self, auto_rotate: bool) -> Self {
        self.auto_rotate = auto_rotate;
        self
    }

    #[must_use]
    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.data_dir = dir;
        self
    }

    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    #[must_use]
    pub fn with_challenge_timeout(mut self, timeout: Duration) -> Self {
        self.challenge_timeout = timeout;
        self
    }

    /// Values below 1 are clamped to 1 (tokio panics on a zero-capacity channel).
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// `~/.chesstty`, or `./.chesstty` when there is no home directory.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chesstty")
}
