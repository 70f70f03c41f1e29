//! Clip media download and vertical-video transformation.
//!
//! The pipeline only sees the [`MediaDownloader`] and [`MediaTransformer`]
//! traits. The shipped implementations shell out to yt-dlp and ffmpeg.

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;
mod workspace;
mod ytdlp;

pub use config::MediaConfig;
pub use error::MediaError;
pub use ffmpeg::FfmpegTransformer;
pub use traits::{MediaDownloader, MediaTransformer};
pub use types::{LayoutHints, MediaInfo, Region};
pub use workspace::{sweep_stale, ClipWorkspace};
pub use ytdlp::YtDlpDownloader;
