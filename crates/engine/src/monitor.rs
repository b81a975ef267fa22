use crate::{CancelHandle, DispatchEngine, DispatchError, DispatchReport, DispatchStatus};
use core_types::{Account, Action};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The latest report published by a running monitor, `None` before the first.
pub type LatestReport = Option<Arc<DispatchReport>>;

/// Repeatedly dispatches one query to a fixed set of accounts.
///
/// Iterations are spaced so the whole set stays inside the per-account
/// budget, and the spacing widens by one step after every iteration in which
/// any account failed. A clean iteration resets it.
pub struct Monitor {
    engine: Arc<DispatchEngine>,
    action: Action,
    accounts: Vec<Arc<Account>>,
}

impl Monitor {
    pub fn new(engine: Arc<DispatchEngine>, action: Action, accounts: Vec<Arc<Account>>) -> Self {
        Self {
            engine,
            action,
            accounts,
        }
    }

    /// Pause between iterations for the given widening factor.
    pub fn delay(&self, multiplier: u32) -> Duration {
        let accounts = self.accounts.len().max(1) as u32;
        self.engine.pacing().request_interval() * accounts * multiplier.max(1)
    }

    /// Runs until `cancel` is signalled or every receiver is gone.
    pub async fn run(
        self,
        cancel: CancelHandle,
        reports: watch::Sender<LatestReport>,
    ) -> Result<(), DispatchError> {
        let mut multiplier = 1;

        while !cancel.is_signalled() {
            let report = self
                .engine
                .dispatch(&self.action, &self.accounts, &cancel)
                .await?;
            if report.status() == DispatchStatus::Cancelled {
                break;
            }

            let failures = report.failed().count();
            multiplier = if failures > 0 { multiplier + 1 } else { 1 };
            if reports.send(Some(Arc::new(report))).is_err() {
                tracing::debug!("No one is watching any more; stopping monitor.");
                break;
            }

            let delay = self.delay(multiplier);
            tracing::debug!(
                action = %self.action.kind(),
                failures,
                delay_ms = delay.as_millis() as u64,
                "Monitor iteration done."
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!(action = %self.action.kind(), "Monitor stopped.");
        Ok(())
    }

    /// Starts the monitor on the runtime and returns a receiver of its reports.
    pub fn spawn(
        self,
        cancel: CancelHandle,
    ) -> (
        watch::Receiver<LatestReport>,
        JoinHandle<Result<(), DispatchError>>,
    ) {
        let (sender, receiver) = watch::channel(None);
        let handle = tokio::spawn(self.run(cancel, sender));
        (receiver, handle)
    }
}
