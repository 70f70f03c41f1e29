//! Trait definitions for the media module.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::error::MediaError;
use super::types::LayoutHints;
use crate::clip::Clip;

/// Fetches the raw media of a clip.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Download `clip` into `dest_dir`, returning the file written.
    async fn fetch_media(&self, clip: &Clip, dest_dir: &Path) -> Result<PathBuf, MediaError>;
}

/// Turns raw clip media into an uploadable vertical video.
#[async_trait]
pub trait MediaTransformer: Send + Sync {
    /// Write the publishable form of `input` into `dest_dir`.
    async fn to_publishable(
        &self,
        input: &Path,
        layout: &LayoutHints,
        dest_dir: &Path,
    ) -> Result<PathBuf, MediaError>;

    /// Visual quality estimate in `[0, 1]`.
    async fn quality_score(&self, path: &Path) -> Result<f64, MediaError>;
}
