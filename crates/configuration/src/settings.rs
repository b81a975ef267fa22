use crate::error::ConfigError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for the entire application.
///
/// Every section has defaults, so an empty or missing `config.toml` yields a
/// working configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub exchange: ExchangeConfig,
    pub dispatch: DispatchConfig,
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.exchange.validate()?;
        self.dispatch.validate()
    }
}

/// Parameters for talking to the exchange REST API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// How long a signed request stays valid (`api-expires` = now + life).
    pub request_life_secs: u64,
    /// HTTP timeout for a single call.
    pub timeout_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            request_life_secs: 5,
            timeout_secs: 10,
        }
    }
}

impl ExchangeConfig {
    pub fn request_life(&self) -> Duration {
        Duration::from_secs(self.request_life_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "exchange.timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Pacing and concurrency limits for fanning actions out to accounts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Global ceiling on requests in network flight at the same time.
    pub max_in_flight: usize,
    /// Per-account request budget per window.
    pub requests_per_window: u32,
    pub window_secs: u64,
    pub backoff: BackoffConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            // The exchange allows 30 authenticated requests a minute; stay under it.
            requests_per_window: 25,
            window_secs: 60,
            backoff: BackoffConfig::default(),
        }
    }
}

impl DispatchConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_in_flight == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.max_in_flight must be at least 1".into(),
            ));
        }
        if self.requests_per_window == 0 || self.window_secs == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.requests_per_window and dispatch.window_secs must be positive".into(),
            ));
        }
        self.backoff.validate()
    }
}

/// How long an account is left alone after the exchange signals a rate limit.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Backoff after the first rate-limit signal when the exchange gives no hint.
    pub min_backoff_ms: u64,
    /// Upper bound of the exponential backoff. An exchange hint may exceed it.
    pub max_backoff_secs: u64,
    /// Growth factor per consecutive rate-limit signal.
    pub multiplier: f64,
    /// Longest exchange retry hint that is honoured; longer hints are cut to
    /// this. The exchange bans abusive keys for up to a week.
    pub max_hint_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: 1_000,
            max_backoff_secs: 3_600,
            multiplier: 2.0,
            max_hint_secs: 7 * 24 * 3_600,
        }
    }
}

impl BackoffConfig {
    pub fn min_backoff(&self) -> Duration {
        Duration::from_millis(self.min_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn max_hint(&self) -> Duration {
        Duration::from_secs(self.max_hint_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "dispatch.backoff.multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        if self.min_backoff() > self.max_backoff() {
            return Err(ConfigError::ValidationError(
                "dispatch.backoff.min_backoff_ms exceeds max_backoff_secs".into(),
            ));
        }
        Ok(())
    }
}

/// Where the account registry is persisted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub accounts_file: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            accounts_file: PathBuf::from("./accounts.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// When set, logs are also written to a daily-rolling file here.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "tandem.log".to_string(),
        }
    }
}
