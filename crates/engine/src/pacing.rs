use api_client::ExchangeError;
use configuration::DispatchConfig;
use core_types::{Payload, RateLimitState};
use std::time::Duration;
use tokio::time::Instant;

/// Instants further out than this are never reached; durations are clamped
/// to it so instant arithmetic cannot overflow.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn later(start: Instant, by: Duration) -> Instant {
    start + by.min(FAR_FUTURE)
}

/// The per-account pacing rules: a request budget per window, and an
/// exponential backoff after the exchange signals a rate limit.
///
/// The policy is stateless; every call works on the `RateLimitState` of the
/// account being dispatched to.
#[derive(Debug, Clone)]
pub struct PacingPolicy {
    budget: u32,
    window: Duration,
    min_backoff: Duration,
    max_backoff: Duration,
    max_hint: Duration,
    multiplier: f64,
}

impl PacingPolicy {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            budget: config.requests_per_window.max(1),
            window: config.window(),
            min_backoff: config.backoff.min_backoff(),
            max_backoff: config.backoff.max_backoff(),
            max_hint: config.backoff.max_hint(),
            multiplier: config.backoff.multiplier,
        }
    }

    /// Requests one account may send per window.
    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// The average spacing between requests that keeps one account inside
    /// its budget.
    pub fn request_interval(&self) -> Duration {
        self.window / self.budget
    }

    /// How long the account must wait at `now` before it may send `cost`
    /// requests, or `None` if it may send immediately.
    pub fn wait_time(&self, state: &RateLimitState, now: Instant, cost: u32) -> Option<Duration> {
        if let Some(until) = state.backoff_until.filter(|_| state.is_backing_off(now)) {
            return Some(until - now);
        }
        let window_end = later(state.window_started_at?, self.window);
        let cost = cost.min(self.budget);
        (now < window_end && state.remaining(self.budget) < cost).then(|| window_end - now)
    }

    /// Spends `cost` requests of the budget, opening a new window if the
    /// last one has elapsed.
    pub fn record_request(&self, state: &mut RateLimitState, now: Instant, cost: u32) {
        let window_open = state
            .window_started_at
            .is_some_and(|start| now < later(start, self.window));
        if !window_open {
            state.window_started_at = Some(now);
            state.requests_in_window = 0;
        }
        state.requests_in_window = state.requests_in_window.saturating_add(cost);
    }

    /// Backoff after the `consecutive`-th rate-limit signal in a row, before
    /// any exchange hint is applied.
    pub fn backoff_for(&self, consecutive: u32) -> Duration {
        let exponent = consecutive.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.min_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        // f64::min also maps an overflowed or NaN product onto the cap.
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }

    /// Updates the account after a response. Returns the backoff that was
    /// imposed, if the response was a rate-limit signal.
    pub fn record_response(
        &self,
        state: &mut RateLimitState,
        result: &Result<Payload, ExchangeError>,
        now: Instant,
    ) -> Option<Duration> {
        match result {
            Err(ExchangeError::RateLimited { retry_after, .. }) => {
                state.consecutive_rate_limits = state.consecutive_rate_limits.saturating_add(1);
                let mut backoff = self.backoff_for(state.consecutive_rate_limits);
                // The exchange's hint wins over the cap, up to `max_hint`.
                if let Some(hint) = retry_after {
                    backoff = backoff.max((*hint).min(self.max_hint));
                }
                state.backoff_until = Some(later(now, backoff));
                Some(backoff)
            }
            _ => {
                state.consecutive_rate_limits = 0;
                None
            }
        }
    }
}
