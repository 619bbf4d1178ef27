use std::io;

/// Custom error type for deployment notification operations
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("No deploymon credentials were provided")]
    MissingCredentialConfig,

    #[error("Cannot find secret text credentials with id {0}")]
    CredentialNotFound(String),

    #[error("Failed to notify deploymon.io: {message}")]
    NotificationSendFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Helper type for Results that use NotifyError
pub type Result<T> = std::result::Result<T, NotifyError>;
