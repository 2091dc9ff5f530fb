//! Error types for gpuprov

use thiserror::Error;

/// Main error type for the provisioning procedure
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Unsupported OS family or release
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Unsupported accelerator runtime selector
    #[error("Unsupported runtime: {0}")]
    UnsupportedRuntime(String),

    /// Version resolution error
    #[error("Version resolution error: {0}")]
    Resolution(String),

    /// Command execution error
    #[error("Command error: {0}")]
    Command(String),

    /// Download or network error
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Metadata service error
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Retries exhausted
    #[error("Retries exhausted: {0}")]
    RetriesExhausted(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for provisioning operations
pub type ProvisionResult<T> = Result<T, ProvisionError>;

impl From<toml::de::Error> for ProvisionError {
    fn from(err: toml::de::Error) -> Self {
        ProvisionError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ProvisionError {
    fn from(err: serde_json::Error) -> Self {
        ProvisionError::Config(err.to_string())
    }
}
