use api_client::{ErrorKind, ExchangeError};
use core_types::{Account, ActionKind, Payload};
use std::sync::{Arc, OnceLock};

/// Why one account's request failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDescriptor {
    pub kind: ErrorKind,
    pub detail: String,
    pub retryable: bool,
}

impl From<&ExchangeError> for FailureDescriptor {
    fn from(error: &ExchangeError) -> Self {
        Self {
            kind: error.kind(),
            detail: error.detail().to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// The result of the action for one account.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountOutcome {
    Succeeded(Payload),
    Failed(FailureDescriptor),
}

impl AccountOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AccountOutcome::Succeeded(_))
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            AccountOutcome::Succeeded(payload) => Some(payload),
            AccountOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureDescriptor> {
        match self {
            AccountOutcome::Succeeded(_) => None,
            AccountOutcome::Failed(failure) => Some(failure),
        }
    }
}

impl From<Result<Payload, ExchangeError>> for AccountOutcome {
    fn from(result: Result<Payload, ExchangeError>) -> Self {
        match result {
            Ok(payload) => AccountOutcome::Succeeded(payload),
            Err(error) => AccountOutcome::Failed(FailureDescriptor::from(&error)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// Every requested account has an outcome.
    Complete,
    /// Cancellation was signalled; accounts that never sent are absent.
    Cancelled,
}

/// Per-account outcomes of one dispatch, in the order the accounts were given.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    action: ActionKind,
    status: DispatchStatus,
    requested: Vec<String>,
    entries: Vec<(Arc<Account>, AccountOutcome)>,
}

impl DispatchReport {
    pub fn action(&self) -> ActionKind {
        self.action
    }

    pub fn status(&self) -> DispatchStatus {
        self.status
    }

    pub fn is_complete(&self) -> bool {
        self.status == DispatchStatus::Complete
    }

    /// Number of accounts with an outcome.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<Account>, &AccountOutcome)> {
        self.entries.iter().map(|(account, outcome)| (account, outcome))
    }

    pub fn outcome_for(&self, label: &str) -> Option<&AccountOutcome> {
        self.entries
            .iter()
            .find(|(account, _)| account.label == label)
            .map(|(_, outcome)| outcome)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&Arc<Account>, &Payload)> {
        self.entries
            .iter()
            .filter_map(|(account, outcome)| outcome.payload().map(|p| (account, p)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&Arc<Account>, &FailureDescriptor)> {
        self.entries
            .iter()
            .filter_map(|(account, outcome)| outcome.failure().map(|f| (account, f)))
    }

    /// Labels that were requested but never sent, so have no outcome.
    pub fn missing(&self) -> Vec<&str> {
        self.requested
            .iter()
            .map(String::as_str)
            .filter(|label| self.outcome_for(label).is_none())
            .collect()
    }
}

/// Write-once outcome cells, one per requested account.
///
/// Each cell is written only by the unit of work that owns that account.
pub(crate) struct OutcomeSlots {
    slots: Vec<(Arc<Account>, OnceLock<AccountOutcome>)>,
}

impl OutcomeSlots {
    pub(crate) fn new(accounts: &[Arc<Account>]) -> Self {
        Self {
            slots: accounts
                .iter()
                .map(|account| (account.clone(), OnceLock::new()))
                .collect(),
        }
    }

    /// Stores the outcome of the account at `index`. A second write is a bug
    /// in the engine and is dropped.
    pub(crate) fn record(&self, index: usize, outcome: AccountOutcome) {
        let Some((account, slot)) = self.slots.get(index) else {
            tracing::error!(index, "Outcome recorded for an account outside the dispatch.");
            return;
        };
        if slot.set(outcome).is_err() {
            tracing::error!(label = %account.label, "Outcome recorded twice; keeping the first.");
        }
    }

    /// Builds the report once every unit has returned.
    pub(crate) fn finish(self, action: ActionKind, status: DispatchStatus) -> DispatchReport {
        let requested = self
            .slots
            .iter()
            .map(|(account, _)| account.label.clone())
            .collect();
        let entries = self
            .slots
            .into_iter()
            .filter_map(|(account, slot)| slot.into_inner().map(|outcome| (account, outcome)))
            .collect();
        DispatchReport {
            action,
            status,
            requested,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Credentials;

    fn accounts(labels: &[&str]) -> Vec<Arc<Account>> {
        labels
            .iter()
            .map(|l| Arc::new(Account::new(*l, Credentials::new("k", "s"))))
            .collect()
    }

    #[test]
    fn second_write_keeps_first_outcome() {
        let slots = OutcomeSlots::new(&accounts(&["a"]));
        slots.record(0, AccountOutcome::Succeeded(Payload::Acknowledged));
        slots.record(
            0,
            AccountOutcome::from(Err(ExchangeError::Auth("late".into()))),
        );
        slots.record(7, AccountOutcome::Succeeded(Payload::Acknowledged));

        let report = slots.finish(ActionKind::QueryMargin, DispatchStatus::Complete);
        assert_eq!(report.len(), 1);
        assert!(report.outcome_for("a").unwrap().is_success());
    }

    #[test]
    fn unresolved_accounts_are_missing_not_fabricated() {
        let slots = OutcomeSlots::new(&accounts(&["a", "b", "c"]));
        slots.record(2, AccountOutcome::Succeeded(Payload::Acknowledged));
        slots.record(
            0,
            AccountOutcome::from(Err(ExchangeError::Transport("reset".into()))),
        );

        let report = slots.finish(ActionKind::CancelOrder, DispatchStatus::Cancelled);
        let order: Vec<_> = report.iter().map(|(a, _)| a.label.as_str()).collect();
        assert_eq!(order, vec!["a", "c"]);
        assert_eq!(report.missing(), vec!["b"]);
        assert_eq!(report.succeeded().count(), 1);

        let (account, failure) = report.failed().next().unwrap();
        assert_eq!(account.label, "a");
        assert_eq!(failure.kind, ErrorKind::Transport);
        assert!(failure.retryable);
        assert_eq!(failure.detail, "reset");
    }
}
