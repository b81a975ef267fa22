use thiserror::Error;

/// Contract violations by the caller of `dispatch`.
///
/// Exchange failures never surface here; they are recorded per account in
/// the report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("No accounts were selected for the action")]
    EmptyAccountSet,

    #[error("Account '{0}' was selected more than once")]
    DuplicateAccount(String),
}
