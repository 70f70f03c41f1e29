//! Clip and stored clip record types.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A candidate or processed clip.
///
/// Created by a [`ClipSource`](crate::source::ClipSource); `score` is filled in
/// by the scoring engine and `remote_id` once the clip is published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Source clip id (globally unique).
    pub id: String,
    /// Owning streamer name (matches `StreamerConfig::name`).
    pub streamer: String,
    pub title: String,
    /// Public page URL the downloader fetches from.
    pub url: String,
    pub view_count: u64,
    pub created_at: DateTime<Utc>,
    pub duration_secs: f64,
    #[serde(default)]
    pub game_id: Option<String>,
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Source recording the clip was cut from.
    #[serde(default)]
    pub vod_id: Option<String>,
    /// Offset into the source recording, in seconds.
    #[serde(default)]
    pub vod_offset: Option<u32>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub fail_count: u32,
}

impl Clip {
    /// Age in hours relative to `now`. Negative for clips from the future.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_milliseconds() as f64 / 3_600_000.0
    }

    /// Half-open `[offset, offset + duration)` range in the source recording.
    pub fn vod_range(&self) -> Option<(&str, f64, f64)> {
        let vod_id = self.vod_id.as_deref().filter(|v| !v.is_empty())?;
        let offset = f64::from(self.vod_offset?);
        Some((vod_id, offset, offset + self.duration_secs.max(0.0)))
    }
}

/// A clip row as persisted in storage.
///
/// Upserts never write `fail_count`; it only changes through
/// [`ClipStore::increment_fail_count`](crate::store::ClipStore::increment_fail_count).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipRecord {
    pub clip_id: String,
    pub streamer: String,
    pub title: Option<String>,
    pub view_count: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub duration_secs: Option<f64>,
    pub game_id: Option<String>,
    pub game_name: Option<String>,
    pub vod_id: Option<String>,
    pub vod_offset: Option<u32>,
    pub score: Option<f64>,
    pub remote_id: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub yt_views: Option<u64>,
    pub yt_likes: Option<u64>,
    pub yt_comments: Option<u64>,
    pub yt_ctr: Option<f64>,
    pub fail_count: u32,
}

impl ClipRecord {
    pub fn from_clip(clip: &Clip) -> Self {
        Self {
            clip_id: clip.id.clone(),
            streamer: clip.streamer.clone(),
            title: Some(clip.title.clone()),
            view_count: Some(clip.view_count),
            created_at: clip.created_at,
            duration_secs: Some(clip.duration_secs),
            game_id: clip.game_id.clone(),
            game_name: clip.game_name.clone(),
            vod_id: clip.vod_id.clone().filter(|v| !v.is_empty()),
            vod_offset: clip.vod_offset,
            score: Some(clip.score),
            remote_id: clip.remote_id.clone(),
            posted_at: None,
            yt_views: None,
            yt_likes: None,
            yt_comments: None,
            yt_ctr: None,
            fail_count: clip.fail_count,
        }
    }

    /// Mark the record as published at `posted_at`.
    pub fn published(mut self, remote_id: impl Into<String>, posted_at: DateTime<Utc>) -> Self {
        self.remote_id = Some(remote_id.into());
        self.posted_at = Some(posted_at);
        self
    }

    /// Record a remote id discovered on the destination without a post time.
    pub fn with_remote_id(mut self, remote_id: impl Into<String>) -> Self {
        self.remote_id = Some(remote_id.into());
        self
    }
}

/// Storage timestamp format. Fixed width with milliseconds, so string ranges
/// sort chronologically and sub-second gaps survive a round trip.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_age_hours() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut clip = fixtures::clip("c1", "alpha", 100);
        clip.created_at = now - Duration::minutes(90);
        assert!((clip.age_hours(now) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_vod_range_requires_id_and_offset() {
        let mut clip = fixtures::clip("c1", "alpha", 100);
        clip.duration_secs = 20.0;
        assert!(clip.vod_range().is_none());

        clip.vod_id = Some("v1".to_string());
        assert!(clip.vod_range().is_none());

        clip.vod_offset = Some(100);
        assert_eq!(clip.vod_range(), Some(("v1", 100.0, 120.0)));

        clip.vod_id = Some(String::new());
        assert!(clip.vod_range().is_none());
    }

    #[test]
    fn test_timestamp_format_is_sortable() {
        let a = Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let (sa, sb) = (format_timestamp(a), format_timestamp(b));
        assert_eq!(sa, "2024-01-09T23:59:59.000Z");
        assert!(sa < sb);
        assert_eq!(parse_timestamp(&sb), Some(b));

        let c = b + Duration::milliseconds(500);
        let sc = format_timestamp(c);
        assert_eq!(sc, "2024-01-10T00:00:00.500Z");
        assert!(sb < sc);
        assert_eq!(parse_timestamp(&sc), Some(c));
    }

    #[test]
    fn test_record_published() {
        let clip = fixtures::clip("c1", "alpha", 100);
        let now = Utc::now();
        let record = ClipRecord::from_clip(&clip).published("yt-1", now);
        assert_eq!(record.remote_id.as_deref(), Some("yt-1"));
        assert_eq!(record.posted_at, Some(now));
        assert_eq!(record.view_count, Some(100));
    }
}
