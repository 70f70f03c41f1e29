//! Error types for the publish module.

use thiserror::Error;

/// Typed publish failures.
///
/// The first three variants drive run control: quota exhaustion ends the run,
/// forbidden feeds the per-streamer breaker, auth errors end the streamer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("Upload quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Upload forbidden: {0}")]
    Forbidden(String),

    #[error("Publisher authentication failed: {0}")]
    AuthError(String),

    /// Anything else; never crosses into the clip outcome.
    #[error("Publisher error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for PublishError {
    fn from(e: reqwest::Error) -> Self {
        PublishError::Other(e.to_string())
    }
}

/// Failure of a best-effort post-upload effect.
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<PublishError> for EffectError {
    fn from(e: PublishError) -> Self {
        EffectError::Other(e.to_string())
    }
}
