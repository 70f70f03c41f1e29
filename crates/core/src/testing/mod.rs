//! Testing utilities and mock implementations for pipeline tests.
//!
//! This module provides recording mocks of every collaborator trait, so a
//! full run can be exercised without Twitch, YouTube, yt-dlp or ffmpeg.
//!
//! # Example
//!
//! ```rust,ignore
//! use clipline_core::testing::{fixtures, MockClipSource, MockPublisher};
//!
//! let source = MockClipSource::new();
//! source.set_clips("alpha", vec![fixtures::clip("c1", "alpha", 500)]).await;
//!
//! let publisher = Arc::new(MockPublisher::new());
//! publisher.push_result(Err(PublishError::Forbidden("blocked".into()))).await;
//! ```

mod mock_history;
mod mock_media;
mod mock_publisher;
mod mock_source;

pub use mock_history::MockHistory;
pub use mock_media::{MockDownloader, MockTransformer};
pub use mock_publisher::{MockEffect, MockPublisher, MockPublisherProvider};
pub use mock_source::MockClipSource;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{Duration, Utc};

    use crate::clip::Clip;

    /// Create a 30 second clip created an hour ago, with no game or VOD data.
    pub fn clip(id: &str, streamer: &str, views: u64) -> Clip {
        Clip {
            id: id.to_string(),
            streamer: streamer.to_string(),
            title: format!("Clip {} by {}", id, streamer),
            url: format!("https://clips.twitch.tv/{}", id),
            view_count: views,
            created_at: Utc::now() - Duration::hours(1),
            duration_secs: 30.0,
            game_id: None,
            game_name: None,
            thumbnail_url: None,
            vod_id: None,
            vod_offset: None,
            score: 0.0,
            remote_id: None,
            fail_count: 0,
        }
    }

    /// Same as [`clip`], cut from `vod_id` at `offset` seconds.
    pub fn vod_clip(id: &str, streamer: &str, vod_id: &str, offset: u32) -> Clip {
        Clip {
            vod_id: Some(vod_id.to_string()),
            vod_offset: Some(offset),
            ..clip(id, streamer, 100)
        }
    }
}
