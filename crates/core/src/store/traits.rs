//! Storage traits and error type.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::clip::ClipRecord;
use crate::pipeline::PipelineRun;

use super::types::{PerformanceUpdate, StreamerStats};

/// Error type for storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store connection lock poisoned")]
    Poisoned,
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Persistent clip history.
pub trait ClipStore: Send + Sync {
    /// Whether a clip id has a stored row.
    fn clip_exists(&self, clip_id: &str) -> Result<bool, StoreError>;

    fn get_clip(&self, clip_id: &str) -> Result<Option<ClipRecord>, StoreError>;

    /// Stored clips of `streamer` created within `window_secs` of `created_at`,
    /// excluding `exclude_id`.
    fn find_near(
        &self,
        streamer: &str,
        created_at: DateTime<Utc>,
        window_secs: i64,
        exclude_id: &str,
    ) -> Result<Vec<ClipRecord>, StoreError>;

    /// Stored clips cut from `vod_id` that carry an offset, excluding `exclude_id`.
    fn find_by_vod(&self, vod_id: &str, exclude_id: &str) -> Result<Vec<ClipRecord>, StoreError>;

    /// Insert or update a clip row.
    ///
    /// A null incoming value never overwrites a stored value. Numeric
    /// performance counters only ever grow. `fail_count` is not written.
    fn upsert_clip(&self, record: &ClipRecord) -> Result<(), StoreError>;

    /// Bump `fail_count`, inserting the row first if needed. Returns the new count.
    fn increment_fail_count(&self, record: &ClipRecord) -> Result<u32, StoreError>;

    /// Apply destination metrics with the upsert rules. Returns false when the
    /// clip is unknown.
    fn record_performance(
        &self,
        clip_id: &str,
        update: &PerformanceUpdate,
    ) -> Result<bool, StoreError>;

    /// Persist a finished run.
    fn record_run(&self, run: &PipelineRun) -> Result<(), StoreError>;

    /// Runs started in `[from, to)`, oldest first.
    fn runs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PipelineRun>, StoreError>;

    /// Flush the write-ahead log into the main database file.
    fn checkpoint(&self) -> Result<(), StoreError>;
}

/// Historical upload performance per streamer.
pub trait PerformanceHistory: Send + Sync {
    /// CTR-derived scalar in `[0.5, 2.0]`; 1.0 with fewer than 3 samples.
    fn performance_multiplier(&self, streamer: &str) -> Result<f64, StoreError>;

    /// Published clips of `streamer` posted within the last `window_hours`.
    fn recent_upload_count(&self, streamer: &str, window_hours: u32) -> Result<u32, StoreError>;

    /// Recompute the streamer's rolling 30-day statistics.
    fn update_rolling_stats(&self, streamer: &str) -> Result<StreamerStats, StoreError>;
}
