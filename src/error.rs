//! Error types for the verifier service.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Reputation error: {0}")]
    Reputation(#[from] ReputationError),

    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Outbound channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send message on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Authentication failed for channel {name}: {reason}")]
    AuthFailed { name: String, reason: String },

    #[error("Rate limited on channel {name}")]
    RateLimited { name: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Reputation service errors. None of these abort a classification.
#[derive(Debug, thiserror::Error)]
pub enum ReputationError {
    #[error("Reputation service timed out after {0:?}")]
    Timeout(Duration),

    #[error("Reputation request failed: {0}")]
    Transport(String),

    #[error("Reputation service rate limited")]
    RateLimited,

    #[error("Reputation service rejected credentials (status {status})")]
    AuthFailed { status: u16 },

    #[error("Unexpected reputation response status {0}")]
    UnexpectedStatus(u16),

    #[error("Invalid reputation response: {0}")]
    InvalidResponse(String),
}

impl ReputationError {
    /// Whether the provider rejected our credentials, as opposed to a
    /// transient failure.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthFailed { .. })
    }

    /// Short cause, suitable for evidence shown to users.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timed out",
            Self::Transport(_) => "unreachable",
            Self::RateLimited => "rate limited",
            Self::AuthFailed { .. } => "credentials rejected",
            Self::UnexpectedStatus(_) | Self::InvalidResponse(_) => "unexpected response",
        }
    }
}

/// Translation provider errors.
#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("Translation request failed: {0}")]
    RequestFailed(String),

    #[error("Translation provider returned status {0}")]
    ProviderStatus(u16),

    #[error("Invalid translation response: {0}")]
    InvalidResponse(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
