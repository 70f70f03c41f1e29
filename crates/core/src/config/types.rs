use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::media::{LayoutHints, MediaConfig};
use crate::pipeline::PipelineConfig;
use crate::publish::YouTubeConfig;
use crate::scheduler::PostingWindow;
use crate::scoring::ScoringConfig;
use crate::source::TwitchConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub title: TitleConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub twitch: Option<TwitchConfig>,
    #[serde(default)]
    pub youtube: Option<YouTubeConfig>,
    #[serde(default)]
    pub streamers: Vec<StreamerConfig>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("clipline.db")
}

/// PID lock file configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_path")]
    pub path: PathBuf,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            path: default_lock_path(),
        }
    }
}

fn default_lock_path() -> PathBuf {
    std::env::temp_dir().join("clipline.lock")
}

/// Duplicate detection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DedupConfig {
    /// Clips from the same streamer created within this many seconds of a
    /// known clip are treated as the same moment.
    #[serde(default = "default_dedup_window")]
    pub window_secs: i64,
    /// Compare `[vod_offset, vod_offset + duration)` ranges of clips cut from
    /// the same VOD.
    #[serde(default = "default_true")]
    pub position_dedup: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_secs: default_dedup_window(),
            position_dedup: true,
        }
    }
}

fn default_dedup_window() -> i64 {
    30
}

fn default_true() -> bool {
    true
}

/// Upload spacing and posting-time configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// Maximum uploads per streamer within `window_hours`.
    #[serde(default = "default_max_uploads")]
    pub max_uploads_per_window: u32,
    /// Length of the spacing window in hours.
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
    /// Optional time-of-day gate. Absent means uploads are always allowed.
    #[serde(default)]
    pub posting_window: Option<PostingWindow>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            max_uploads_per_window: default_max_uploads(),
            window_hours: default_window_hours(),
            posting_window: None,
        }
    }
}

fn default_max_uploads() -> u32 {
    1
}

fn default_window_hours() -> u32 {
    4
}

/// Visual quality gate configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QualityConfig {
    /// Processed clips scoring below this threshold are not published.
    #[serde(default = "default_min_quality")]
    pub min_score: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_quality(),
        }
    }
}

fn default_min_quality() -> f64 {
    0.3
}

/// Title, description and tag templates.
///
/// Templates understand `{title}`, `{streamer}` and `{game}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TitleConfig {
    #[serde(default = "default_title_template")]
    pub template: String,
    #[serde(default = "default_title_max_len")]
    pub max_len: usize,
    #[serde(default = "default_description_template")]
    pub description_template: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            template: default_title_template(),
            max_len: default_title_max_len(),
            description_template: default_description_template(),
            tags: Vec::new(),
        }
    }
}

fn default_title_template() -> String {
    "{title} | {streamer}".to_string()
}

fn default_title_max_len() -> usize {
    100
}

fn default_description_template() -> String {
    "{title}\n\nClipped from {streamer} playing {game}.\n\n#shorts".to_string()
}

/// Run report output configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Directory for per-run and per-day JSON reports. Disabled when absent.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Prometheus textfile written at the end of every run.
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,
}

/// A tracked streamer. Immutable for the duration of a run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamerConfig {
    /// Display name, also the storage key for the streamer.
    pub name: String,
    /// Twitch broadcaster id.
    pub twitch_id: String,
    /// Publish credentials for this streamer's channel. Falls back to
    /// `youtube.default_credentials`.
    #[serde(default)]
    pub credentials: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Overrides `schedule.max_uploads_per_window`.
    #[serde(default)]
    pub max_uploads_per_window: Option<u32>,
    /// Overrides `schedule.window_hours`.
    #[serde(default)]
    pub window_hours: Option<u32>,
    /// Only clips from these game ids are considered. Empty means any game.
    #[serde(default)]
    pub target_game_ids: Vec<String>,
    #[serde(default)]
    pub layout: LayoutHints,
    /// Extra tags appended to `title.tags`.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl StreamerConfig {
    /// Minimal enabled streamer with default overrides.
    pub fn new(name: impl Into<String>, twitch_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            twitch_id: twitch_id.into(),
            credentials: None,
            enabled: true,
            max_uploads_per_window: None,
            window_hours: None,
            target_game_ids: Vec::new(),
            layout: LayoutHints::default(),
            tags: Vec::new(),
        }
    }

    pub fn max_uploads(&self, schedule: &ScheduleConfig) -> u32 {
        self.max_uploads_per_window
            .unwrap_or(schedule.max_uploads_per_window)
    }

    pub fn window_hours(&self, schedule: &ScheduleConfig) -> u32 {
        self.window_hours.unwrap_or(schedule.window_hours)
    }
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub database: DatabaseConfig,
    pub lock: LockConfig,
    pub pipeline: PipelineConfig,
    pub scoring: ScoringConfig,
    pub dedup: DedupConfig,
    pub schedule: ScheduleConfig,
    pub quality: QualityConfig,
    pub twitch_configured: bool,
    pub twitch_secret_configured: bool,
    pub youtube_configured: bool,
    pub streamers: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            database: config.database.clone(),
            lock: config.lock.clone(),
            pipeline: config.pipeline.clone(),
            scoring: config.scoring.clone(),
            dedup: config.dedup.clone(),
            schedule: config.schedule.clone(),
            quality: config.quality.clone(),
            twitch_configured: config.twitch.is_some(),
            twitch_secret_configured: config
                .twitch
                .as_ref()
                .is_some_and(|t| !t.client_secret.is_empty()),
            youtube_configured: config.youtube.is_some(),
            streamers: config.streamers.iter().map(|s| s.name.clone()).collect(),
        }
    }
}
