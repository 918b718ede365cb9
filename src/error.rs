//! Error types for the post sweeper.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors returned synchronously by the job coordinator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("Job id: {owner} is already running")]
    AlreadyRunning { owner: String },

    #[error("Job id: {owner} is not running")]
    NotRunning { owner: String },
}

/// Failures of the remote platform collaborator.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("No platform credentials for {owner}")]
    NotAuthenticated { owner: String },

    #[error("Platform rejected request ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Platform rate limited the request")]
    RateLimited,

    #[error("Invalid response from platform: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Session and login errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("auth header is empty")]
    MissingToken,

    #[error("Token is invalid: {0}")]
    InvalidToken(String),

    #[error("Token is expired")]
    Expired,

    #[error("Token refresh window has passed")]
    RefreshExpired,

    #[error("Unknown or expired login state")]
    UnknownState,

    #[error("Credential exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("Failed to issue token: {0}")]
    Signing(String),
}

/// Result type alias for the sweeper.
pub type Result<T> = std::result::Result<T, Error>;
