//! Candidate clip sources.

mod twitch;

pub use twitch::{TwitchConfig, TwitchSource};

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::clip::Clip;
use crate::config::StreamerConfig;

/// Errors that can occur when talking to a clip source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Credentials were rejected.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

/// Where candidate clips come from.
#[async_trait]
pub trait ClipSource: Send + Sync {
    /// Clips of `streamer` created within the last `lookback`.
    async fn fetch_candidates(
        &self,
        streamer: &StreamerConfig,
        lookback: chrono::Duration,
    ) -> Result<Vec<Clip>, SourceError>;

    /// Map game ids to display names. Unknown ids are absent from the result.
    async fn resolve_game_names(
        &self,
        game_ids: &[String],
    ) -> Result<HashMap<String, String>, SourceError>;
}
