use crate::report::OutcomeSlots;
use api_client::ExchangeClient;
use configuration::DispatchConfig;
use core_types::{Account, Action};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Instant;

pub mod cancel;
pub mod error;
pub mod monitor;
pub mod pacing;
pub mod report;

// --- Public API ---
pub use cancel::CancelHandle;
pub use error::DispatchError;
pub use monitor::Monitor;
pub use pacing::PacingPolicy;
pub use report::{AccountOutcome, DispatchReport, DispatchStatus, FailureDescriptor};

/// Fans one action out to many accounts.
///
/// Every account gets its own unit of work that waits out the account's
/// pacing, takes a slot from the global in-flight ceiling, sends the request
/// and records the outcome. Units never wait on each other except through
/// that ceiling.
pub struct DispatchEngine {
    client: Arc<dyn ExchangeClient>,
    in_flight: Semaphore,
    pacing: PacingPolicy,
}

impl DispatchEngine {
    pub fn new(client: Arc<dyn ExchangeClient>, config: &DispatchConfig) -> Self {
        Self {
            client,
            in_flight: Semaphore::new(config.max_in_flight.max(1)),
            pacing: PacingPolicy::from_config(config),
        }
    }

    pub fn pacing(&self) -> &PacingPolicy {
        &self.pacing
    }

    /// Executes `action` once for each of `accounts`.
    ///
    /// One account's failure never affects another's. The report lists
    /// outcomes in the order of `accounts`. If `cancel` is signalled, units
    /// that have not yet sent their request stop and are left out of the
    /// report, whose status is then `Cancelled`.
    pub async fn dispatch(
        &self,
        action: &Action,
        accounts: &[Arc<Account>],
        cancel: &CancelHandle,
    ) -> Result<DispatchReport, DispatchError> {
        if accounts.is_empty() {
            return Err(DispatchError::EmptyAccountSet);
        }
        let mut labels = HashSet::with_capacity(accounts.len());
        for account in accounts {
            if !labels.insert(account.label.as_str()) {
                return Err(DispatchError::DuplicateAccount(account.label.clone()));
            }
        }

        tracing::info!(action = %action.kind(), accounts = accounts.len(), "Dispatching action.");

        let slots = OutcomeSlots::new(accounts);
        let units = accounts
            .iter()
            .enumerate()
            .map(|(index, account)| self.run_unit(index, account, action, cancel, &slots));
        join_all(units).await;

        let status = if cancel.is_signalled() {
            DispatchStatus::Cancelled
        } else {
            DispatchStatus::Complete
        };
        let report = slots.finish(action.kind(), status);

        tracing::info!(
            action = %action.kind(),
            status = ?report.status(),
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            missing = report.missing().len(),
            "Dispatch finished."
        );
        Ok(report)
    }

    /// One account's unit of work. Returns without recording anything if it
    /// is cancelled before the request is sent.
    async fn run_unit(
        &self,
        index: usize,
        account: &Arc<Account>,
        action: &Action,
        cancel: &CancelHandle,
        slots: &OutcomeSlots,
    ) {
        let label = account.label.as_str();
        let cost = action.request_cost();
        if cancel.is_signalled() {
            tracing::debug!(label, "Cancelled before start.");
            return;
        }

        // Another dispatch may be using this account; its pacing state is
        // shared, so wait for it like for any other rate-limit window.
        let mut state = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(label, "Cancelled while waiting for the account.");
                return;
            }
            state = account.rate_limit().lock() => state,
        };

        while let Some(wait) = self.pacing.wait_time(&state, Instant::now(), cost) {
            tracing::debug!(label, wait_ms = wait.as_millis() as u64, "Waiting for rate limit.");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(label, "Cancelled while waiting for rate limit.");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(label, "Cancelled while waiting for an in-flight slot.");
                return;
            }
            permit = self.in_flight.acquire() => permit,
        };
        // Nothing was sent, so nothing is recorded.
        let Ok(_permit) = permit else {
            tracing::error!(label, "In-flight semaphore closed; request not sent.");
            return;
        };

        if cancel.is_signalled() {
            tracing::debug!(label, "Cancelled before sending.");
            return;
        }

        // From here on the request runs to completion.
        self.pacing.record_request(&mut state, Instant::now(), cost);
        tracing::trace!(
            label,
            action = %action.kind(),
            budget_left = state.remaining(self.pacing.budget()),
            "Request in flight."
        );
        let result = self.client.execute(action, &account.credentials).await;

        if let Some(backoff) = self.pacing.record_response(&mut state, &result, Instant::now()) {
            tracing::warn!(
                label,
                backoff_ms = backoff.as_millis() as u64,
                consecutive = state.consecutive_rate_limits,
                "Rate limited by the exchange; backing off."
            );
        }
        drop(state);

        match &result {
            Ok(_) => tracing::debug!(label, "Request succeeded."),
            Err(e) => tracing::warn!(label, kind = %e.kind(), error = %e, "Request failed."),
        }
        slots.record(index, result.into());
    }
}
