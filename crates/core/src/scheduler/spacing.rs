//! Per-streamer upload spacing.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{ScheduleConfig, StreamerConfig};
use crate::store::{PerformanceHistory, StoreError};

/// Enforces upload spacing and the posting window.
#[derive(Debug, Clone)]
pub struct UploadScheduler {
    config: ScheduleConfig,
}

impl UploadScheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        Self { config }
    }

    /// How many more clips the streamer may publish in its current window.
    pub fn uploads_remaining(
        &self,
        history: &dyn PerformanceHistory,
        streamer: &StreamerConfig,
    ) -> Result<u32, StoreError> {
        let max = streamer.max_uploads(&self.config);
        let window_hours = streamer.window_hours(&self.config);
        let recent = history.recent_upload_count(&streamer.name, window_hours)?;
        let remaining = max.saturating_sub(recent);
        debug!(
            streamer = %streamer.name,
            max,
            recent,
            window_hours,
            remaining,
            "Upload spacing"
        );
        Ok(remaining)
    }

    /// Whether the posting window admits uploads at `now`. `force` bypasses it.
    pub fn posting_window_open(&self, now: DateTime<Utc>, force: bool) -> bool {
        if force {
            return true;
        }
        self.config
            .posting_window
            .as_ref()
            .map_or(true, |w| w.contains(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::PostingWindow;
    use crate::testing::MockHistory;
    use chrono::TimeZone;

    #[test]
    fn test_uploads_remaining() {
        let history = MockHistory::new();
        let scheduler = UploadScheduler::new(ScheduleConfig {
            max_uploads_per_window: 3,
            ..Default::default()
        });
        let streamer = StreamerConfig::new("alpha", "1001");

        assert_eq!(scheduler.uploads_remaining(&history, &streamer).unwrap(), 3);

        history.set_recent_uploads("alpha", 1);
        assert_eq!(scheduler.uploads_remaining(&history, &streamer).unwrap(), 2);

        history.set_recent_uploads("alpha", 7);
        assert_eq!(scheduler.uploads_remaining(&history, &streamer).unwrap(), 0);
    }

    #[test]
    fn test_streamer_overrides() {
        let history = MockHistory::new();
        history.set_recent_uploads("alpha", 1);
        let scheduler = UploadScheduler::new(ScheduleConfig::default());

        let mut streamer = StreamerConfig::new("alpha", "1001");
        streamer.max_uploads_per_window = Some(2);
        streamer.window_hours = Some(12);

        assert_eq!(scheduler.uploads_remaining(&history, &streamer).unwrap(), 1);
        assert_eq!(history.recent_upload_calls(), vec![("alpha".to_string(), 12)]);
    }

    #[test]
    fn test_posting_window_gate() {
        let scheduler = UploadScheduler::new(ScheduleConfig {
            posting_window: Some(PostingWindow {
                timezone: "UTC".to_string(),
                weekday: vec!["09:00-10:00".parse().unwrap()],
                weekend: vec![],
            }),
            ..Default::default()
        });
        // Monday
        let outside = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();
        let inside = Utc.with_ymd_and_hms(2024, 6, 3, 9, 15, 0).unwrap();

        assert!(!scheduler.posting_window_open(outside, false));
        assert!(scheduler.posting_window_open(outside, true));
        assert!(scheduler.posting_window_open(inside, false));

        let unrestricted = UploadScheduler::new(ScheduleConfig::default());
        assert!(unrestricted.posting_window_open(outside, false));
    }
}
