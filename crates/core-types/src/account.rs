use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// The default exchange host for newly registered accounts.
pub const DEFAULT_HOST: &str = "https://www.bitmex.com";

/// The credential reference of one account.
///
/// The dispatch engine never looks inside; it only hands this to the
/// exchange client that signs requests with it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            host: default_host(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
}

// Never print the secret.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("host", &self.host)
            .finish()
    }
}

/// Engine-managed pacing state of one account.
///
/// Only the unit of work dispatching to this account mutates it. It is
/// attached to the `Account` record but never serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitState {
    /// Start of the current budget window.
    pub window_started_at: Option<Instant>,
    /// Requests already spent in the current window.
    pub requests_in_window: u32,
    /// No request may be sent before this instant.
    pub backoff_until: Option<Instant>,
    /// Rate-limit signals received in a row; drives the exponential backoff.
    pub consecutive_rate_limits: u32,
}

impl RateLimitState {
    /// Requests still allowed in the current window for a budget of `budget`.
    pub fn remaining(&self, budget: u32) -> u32 {
        budget.saturating_sub(self.requests_in_window)
    }

    /// Whether a backoff window is active at `now`.
    pub fn is_backing_off(&self, now: Instant) -> bool {
        self.backoff_until.is_some_and(|until| until > now)
    }
}

/// One set of exchange credentials representing one tradeable identity.
#[derive(Debug, Serialize, Deserialize)]
pub struct Account {
    pub label: String,
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(skip)]
    rate_limit: Mutex<RateLimitState>,
}

impl Account {
    pub fn new(label: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            label: label.into(),
            credentials,
            rate_limit: Mutex::new(RateLimitState::default()),
        }
    }

    /// The account's pacing state. Lock it only from the unit of work that
    /// owns this account for the current dispatch.
    pub fn rate_limit(&self) -> &Mutex<RateLimitState> {
        &self.rate_limit
    }
}
