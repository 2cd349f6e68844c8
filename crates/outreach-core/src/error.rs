//! Error type shared across the Outreach workspace.

use thiserror::Error;

/// The primary error type for channel, provider, and configuration failures.
#[derive(Debug, Error)]
pub enum OutreachError {
    /// Configuration errors (unreadable file, invalid TOML, missing fields).
    #[error("config error: {0}")]
    Config(String),

    /// Messaging channel errors (API request failure, bad response).
    #[error("channel error: {0}")]
    Channel(String),

    /// Channel credential rejected by the platform.
    #[error("auth failed: {0}")]
    AuthFailed(String),

    /// AI provider errors (API failure, malformed completion).
    #[error("provider error: {0}")]
    Provider(String),

    /// No API key configured for the requested provider.
    #[error("api key missing for provider '{0}'")]
    ApiKeyMissing(String),

    /// Requested provider name is not known.
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    /// Durable-state read/write failure.
    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OutreachError>;
