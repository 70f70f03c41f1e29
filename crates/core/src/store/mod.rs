//! Clip history storage.
//!
//! Holds every published, duplicate-discovered or failed clip, per-streamer
//! rolling statistics, and one record per pipeline run.

mod sqlite;
mod traits;
mod types;

pub use sqlite::SqliteClipStore;
pub use traits::{ClipStore, PerformanceHistory, StoreError};
pub use types::{PerformanceUpdate, StreamerStats, ROLLING_STATS_DAYS};
