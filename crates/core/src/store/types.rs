use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Window used for rolling statistics and the performance multiplier.
pub const ROLLING_STATS_DAYS: i64 = 30;

/// Destination-side metrics reported for a published clip.
///
/// `None` fields are left untouched; lower values never replace higher ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceUpdate {
    pub views: Option<u64>,
    pub likes: Option<u64>,
    pub comments: Option<u64>,
    /// Click-through rate in `[0, 1]`.
    pub ctr: Option<f64>,
}

/// Rolling 30-day statistics for one streamer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamerStats {
    pub streamer: String,
    pub uploads: u32,
    pub avg_views: Option<f64>,
    pub avg_ctr: Option<f64>,
    pub updated_at: DateTime<Utc>,
}
