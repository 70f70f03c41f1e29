//! Mock performance history for testing.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::store::{PerformanceHistory, StoreError, StreamerStats};

/// Mock implementation of the PerformanceHistory trait.
///
/// The trait is synchronous, so state sits behind a std mutex and the
/// setters are plain methods. Unknown streamers have a 1.0 multiplier and
/// no recent uploads.
#[derive(Debug, Default)]
pub struct MockHistory {
    multipliers: Mutex<HashMap<String, f64>>,
    recent_uploads: Mutex<HashMap<String, u32>>,
    recent_upload_calls: Mutex<Vec<(String, u32)>>,
    rolling_stats_calls: Mutex<Vec<String>>,
    fail_recent_uploads: Mutex<bool>,
}

impl MockHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_multiplier(&self, streamer: &str, multiplier: f64) {
        self.multipliers
            .lock()
            .unwrap()
            .insert(streamer.to_string(), multiplier);
    }

    pub fn set_recent_uploads(&self, streamer: &str, count: u32) {
        self.recent_uploads
            .lock()
            .unwrap()
            .insert(streamer.to_string(), count);
    }

    /// Make `recent_upload_count` return a storage error.
    pub fn fail_recent_uploads(&self) {
        *self.fail_recent_uploads.lock().unwrap() = true;
    }

    /// `(streamer, window_hours)` pairs passed to `recent_upload_count`.
    pub fn recent_upload_calls(&self) -> Vec<(String, u32)> {
        self.recent_upload_calls.lock().unwrap().clone()
    }

    pub fn rolling_stats_calls(&self) -> Vec<String> {
        self.rolling_stats_calls.lock().unwrap().clone()
    }
}

impl PerformanceHistory for MockHistory {
    fn performance_multiplier(&self, streamer: &str) -> Result<f64, StoreError> {
        Ok(self
            .multipliers
            .lock()
            .unwrap()
            .get(streamer)
            .copied()
            .unwrap_or(1.0))
    }

    fn recent_upload_count(&self, streamer: &str, window_hours: u32) -> Result<u32, StoreError> {
        self.recent_upload_calls
            .lock()
            .unwrap()
            .push((streamer.to_string(), window_hours));
        if *self.fail_recent_uploads.lock().unwrap() {
            return Err(StoreError::Database("mock history unavailable".to_string()));
        }
        Ok(self
            .recent_uploads
            .lock()
            .unwrap()
            .get(streamer)
            .copied()
            .unwrap_or(0))
    }

    fn update_rolling_stats(&self, streamer: &str) -> Result<StreamerStats, StoreError> {
        self.rolling_stats_calls
            .lock()
            .unwrap()
            .push(streamer.to_string());
        Ok(StreamerStats {
            streamer: streamer.to_string(),
            uploads: 0,
            avg_views: None,
            avg_ctr: None,
            updated_at: Utc::now(),
        })
    }
}
