use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("An account labelled '{0}' already exists")]
    DuplicateLabel(String),

    #[error("No account labelled '{0}'")]
    UnknownAccount(String),

    #[error("Account label must not be empty")]
    EmptyLabel,

    #[error("Failed to access accounts file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed accounts file: {0}")]
    Format(#[from] serde_json::Error),
}
