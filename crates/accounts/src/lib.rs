use core_types::{Account, Credentials};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

pub mod error;

pub use error::RegistryError;

/// The ordered set of accounts the user has registered.
///
/// The registry is the sole owner of the `Account` records. The engine only
/// borrows `Arc<Account>` handles for the duration of a dispatch, so the
/// per-account pacing state survives from one dispatch to the next.
#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: Vec<Arc<Account>>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All accounts, in registration order.
    pub fn list_accounts(&self) -> &[Arc<Account>] {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&Arc<Account>> {
        self.accounts.iter().find(|a| a.label == label)
    }

    /// Picks the accounts named in `labels`, in the order they were asked for.
    pub fn select<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<Arc<Account>>, RegistryError> {
        labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                self.get(label)
                    .cloned()
                    .ok_or_else(|| RegistryError::UnknownAccount(label.to_string()))
            })
            .collect()
    }

    /// Registers a new account. Labels are unique within the registry.
    pub fn add(
        &mut self,
        label: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Arc<Account>, RegistryError> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(RegistryError::EmptyLabel);
        }
        if self.get(&label).is_some() {
            return Err(RegistryError::DuplicateLabel(label));
        }

        let account = Arc::new(Account::new(label, credentials));
        tracing::info!(label = %account.label, host = %account.credentials.host, "Account registered.");
        self.accounts.push(account.clone());
        Ok(account)
    }

    pub fn remove(&mut self, label: &str) -> Result<Arc<Account>, RegistryError> {
        let index = self
            .accounts
            .iter()
            .position(|a| a.label == label)
            .ok_or_else(|| RegistryError::UnknownAccount(label.to_string()))?;
        tracing::info!(label, "Account removed.");
        Ok(self.accounts.remove(index))
    }

    /// Writes the accounts as a JSON array. Pacing state is never written.
    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let records: Vec<&Account> = self.accounts.iter().map(Arc::as_ref).collect();
        let json = serde_json::to_string_pretty(&records)?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), count = records.len(), "Accounts saved.");
        Ok(())
    }

    /// Replaces the current set with the accounts stored at `path`.
    ///
    /// The current set is left untouched if the file is unreadable or holds
    /// duplicate labels.
    pub fn load(&mut self, path: &Path) -> Result<(), RegistryError> {
        let text = std::fs::read_to_string(path)?;
        let records: Vec<Account> = serde_json::from_str(&text)?;

        let mut seen = HashSet::new();
        for record in &records {
            if record.label.trim().is_empty() {
                return Err(RegistryError::EmptyLabel);
            }
            if !seen.insert(record.label.as_str()) {
                return Err(RegistryError::DuplicateLabel(record.label.clone()));
            }
        }

        self.accounts = records.into_iter().map(Arc::new).collect();
        tracing::info!(path = %path.display(), count = self.accounts.len(), "Accounts loaded.");
        Ok(())
    }

    /// Loads `path` if it exists, otherwise starts with an empty registry.
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        if path.exists() {
            registry.load(path)?;
        } else {
            tracing::debug!(path = %path.display(), "No accounts file yet; starting empty.");
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::DEFAULT_HOST;
    use tempfile::tempdir;

    fn registry_with(labels: &[&str]) -> AccountRegistry {
        let mut registry = AccountRegistry::new();
        for label in labels {
            registry
                .add(*label, Credentials::new(format!("{}-key", label), "secret"))
                .unwrap();
        }
        registry
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let mut registry = registry_with(&["alice"]);
        let err = registry.add("alice", Credentials::new("k2", "s2")).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateLabel(label) if label == "alice"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_label_is_rejected() {
        let mut registry = AccountRegistry::new();
        assert!(matches!(
            registry.add("  ", Credentials::new("k", "s")),
            Err(RegistryError::EmptyLabel)
        ));
    }

    #[test]
    fn select_follows_request_order() {
        let registry = registry_with(&["alice", "bob", "carol"]);
        let picked = registry.select(&["carol", "alice"]).unwrap();
        let labels: Vec<_> = picked.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["carol", "alice"]);
        // Handles are shared, not copied.
        assert!(Arc::ptr_eq(&picked[1], registry.get("alice").unwrap()));
    }

    #[test]
    fn select_reports_unknown_label() {
        let registry = registry_with(&["alice"]);
        let err = registry.select(&["alice", "mallory"]).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownAccount(label) if label == "mallory"));
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let mut registry = registry_with(&["alice", "bob", "carol"]);
        let removed = registry.remove("bob").unwrap();
        assert_eq!(removed.label, "bob");
        let labels: Vec<_> = registry.list_accounts().iter().map(|a| a.label.clone()).collect();
        assert_eq!(labels, vec!["alice", "carol"]);
        assert!(matches!(registry.remove("bob"), Err(RegistryError::UnknownAccount(_))));
    }

    #[test]
    fn save_and_load_preserve_order_without_pacing_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.json");

        let mut registry = registry_with(&["zed", "alice"]);
        registry
            .add("testnet", Credentials::new("tk", "ts").with_host("https://testnet.bitmex.com"))
            .unwrap();
        registry.get("zed").unwrap().rate_limit().try_lock().unwrap().consecutive_rate_limits = 3;
        registry.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("rate_limit"));
        assert!(!text.contains("consecutive"));

        let mut reloaded = AccountRegistry::new();
        reloaded.load(&path).unwrap();
        let labels: Vec<_> = reloaded.list_accounts().iter().map(|a| a.label.clone()).collect();
        assert_eq!(labels, vec!["zed", "alice", "testnet"]);
        assert_eq!(reloaded.get("alice").unwrap().credentials.host, DEFAULT_HOST);
        assert_eq!(
            reloaded.get("testnet").unwrap().credentials.host,
            "https://testnet.bitmex.com"
        );
        let state = reloaded.get("zed").unwrap().rate_limit().try_lock().unwrap().clone();
        assert_eq!(state.consecutive_rate_limits, 0);
    }

    #[test]
    fn load_with_duplicates_keeps_current_set() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        std::fs::write(
            &path,
            r#"[{"label":"a","key":"k","secret":"s"},{"label":"a","key":"k2","secret":"s2"}]"#,
        )
        .unwrap();

        let mut registry = registry_with(&["keep"]);
        let err = registry.load(&path).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateLabel(label) if label == "a"));
        assert_eq!(registry.list_accounts()[0].label, "keep");
    }

    #[test]
    fn open_missing_file_starts_empty() {
        let dir = tempdir().unwrap();
        let registry = AccountRegistry::open(&dir.path().join("none.json")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn malformed_file_is_a_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(AccountRegistry::open(&path), Err(RegistryError::Format(_))));
    }
}
