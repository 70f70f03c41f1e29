//! Configuration for the media tools.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Paths, limits and output geometry for yt-dlp and ffmpeg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to yt-dlp binary.
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: PathBuf,

    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Timeout for a single download in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Timeout for a single transform in seconds.
    #[serde(default = "default_transform_timeout")]
    pub transform_timeout_secs: u64,

    /// Timeout for reading stream info with ffprobe, in seconds.
    #[serde(default = "default_inspect_timeout")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_width")]
    pub output_width: u32,

    #[serde(default = "default_height")]
    pub output_height: u32,

    /// x264 constant rate factor.
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Output is trimmed to this length.
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: f64,

    /// FFmpeg log level.
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Additional yt-dlp arguments.
    #[serde(default)]
    pub extra_ytdlp_args: Vec<String>,
}

fn default_ytdlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_download_timeout() -> u64 {
    300
}

fn default_transform_timeout() -> u64 {
    600
}

fn default_inspect_timeout() -> u64 {
    60
}

fn default_width() -> u32 {
    1080
}

fn default_height() -> u32 {
    1920
}

fn default_crf() -> u8 {
    23
}

fn default_max_duration() -> f64 {
    60.0
}

fn default_log_level() -> String {
    "error".to_string()
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: default_ytdlp_path(),
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            download_timeout_secs: default_download_timeout(),
            transform_timeout_secs: default_transform_timeout(),
            probe_timeout_secs: default_inspect_timeout(),
            output_width: default_width(),
            output_height: default_height(),
            crf: default_crf(),
            max_duration_secs: default_max_duration(),
            ffmpeg_log_level: default_log_level(),
            extra_ytdlp_args: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MediaConfig::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!((config.output_width, config.output_height), (1080, 1920));
        assert_eq!(config.max_duration_secs, 60.0);
    }

    #[test]
    fn test_partial_toml() {
        let config: MediaConfig = toml::from_str("crf = 20\nytdlp_path = \"/opt/yt-dlp\"").unwrap();
        assert_eq!(config.crf, 20);
        assert_eq!(config.ytdlp_path, PathBuf::from("/opt/yt-dlp"));
        assert_eq!(config.transform_timeout_secs, 600);
        assert_eq!(config.probe_timeout_secs, 60);
    }
}
