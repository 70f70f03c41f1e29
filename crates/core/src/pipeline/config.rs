//! Pipeline run configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a `LowQuality` outcome interacts with the consecutive-forbidden breaker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowQualityBreaker {
    /// Leaves the counter untouched.
    #[default]
    Ignore,
    /// Resets the counter like a soft upload failure.
    Reset,
    /// Counts as a strike, like `Forbidden`.
    Strike,
}

/// Configuration for a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Run every step except the publish call.
    #[serde(default)]
    pub dry_run: bool,

    /// Admitted clips per streamer after ranking and dedup.
    #[serde(default = "default_max_clips")]
    pub max_clips_per_streamer: usize,

    /// How far back candidates are fetched.
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,

    /// Root for per-clip workspaces.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Workspaces older than this are removed at run start and end.
    #[serde(default = "default_stale_hours")]
    pub stale_temp_max_age_hours: u64,

    /// Consecutive `Forbidden` outcomes that stop a streamer.
    #[serde(default = "default_breaker_threshold")]
    pub forbidden_breaker_threshold: u32,

    #[serde(default)]
    pub low_quality_breaker: LowQualityBreaker,

    /// Count `LowQuality` outcomes in the streamer's `failed` total.
    #[serde(default)]
    pub low_quality_counts_as_failure: bool,
}

fn default_max_clips() -> usize {
    5
}

fn default_lookback_hours() -> u32 {
    24
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("clipline")
}

fn default_stale_hours() -> u64 {
    6
}

fn default_breaker_threshold() -> u32 {
    3
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_clips_per_streamer: default_max_clips(),
            lookback_hours: default_lookback_hours(),
            temp_dir: default_temp_dir(),
            stale_temp_max_age_hours: default_stale_hours(),
            forbidden_breaker_threshold: default_breaker_threshold(),
            low_quality_breaker: LowQualityBreaker::Ignore,
            low_quality_counts_as_failure: false,
        }
    }
}
