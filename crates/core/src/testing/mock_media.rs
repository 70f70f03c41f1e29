//! Mock media downloader and transformer for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clip::Clip;
use crate::media::{LayoutHints, MediaDownloader, MediaError, MediaTransformer};

/// Leading part of a file name, before the first dot.
pub(crate) fn base_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .unwrap_or("clip")
        .to_string()
}

/// Mock implementation of the MediaDownloader trait.
///
/// Writes a small placeholder `<clip_id>.raw.mp4` into the destination so
/// workspace cleanup can be asserted on real files.
#[derive(Debug, Default)]
pub struct MockDownloader {
    calls: Arc<RwLock<Vec<String>>>,
    failure: Arc<RwLock<Option<String>>>,
}

impl MockDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every download with this reason.
    pub async fn set_failure(&self, reason: &str) {
        *self.failure.write().await = Some(reason.to_string());
    }

    pub async fn clear_failure(&self) {
        *self.failure.write().await = None;
    }

    /// Clip ids downloaded, in call order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl MediaDownloader for MockDownloader {
    async fn fetch_media(&self, clip: &Clip, dest_dir: &Path) -> Result<PathBuf, MediaError> {
        self.calls.write().await.push(clip.id.clone());
        if let Some(reason) = self.failure.read().await.clone() {
            return Err(MediaError::download_failed(reason, None));
        }
        let path = dest_dir.join(format!("{}.raw.mp4", clip.id));
        tokio::fs::write(&path, b"raw").await?;
        Ok(path)
    }
}

/// Mock implementation of the MediaTransformer trait.
///
/// Produces `<base>.vertical.mp4` next to the input and reports a fixed
/// quality score (0.9 unless changed).
#[derive(Debug)]
pub struct MockTransformer {
    quality: Arc<RwLock<f64>>,
    transform_failure: Arc<RwLock<Option<String>>>,
    probe_failure: Arc<RwLock<Option<String>>>,
    transforms: Arc<RwLock<Vec<(PathBuf, LayoutHints)>>>,
}

impl Default for MockTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransformer {
    pub fn new() -> Self {
        Self {
            quality: Arc::new(RwLock::new(0.9)),
            transform_failure: Arc::new(RwLock::new(None)),
            probe_failure: Arc::new(RwLock::new(None)),
            transforms: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set_quality(&self, score: f64) {
        *self.quality.write().await = score;
    }

    pub async fn set_transform_failure(&self, reason: &str) {
        *self.transform_failure.write().await = Some(reason.to_string());
    }

    pub async fn set_probe_failure(&self, reason: &str) {
        *self.probe_failure.write().await = Some(reason.to_string());
    }

    /// Inputs transformed, with the layout used.
    pub async fn transforms(&self) -> Vec<(PathBuf, LayoutHints)> {
        self.transforms.read().await.clone()
    }
}

#[async_trait]
impl MediaTransformer for MockTransformer {
    async fn to_publishable(
        &self,
        input: &Path,
        layout: &LayoutHints,
        dest_dir: &Path,
    ) -> Result<PathBuf, MediaError> {
        self.transforms
            .write()
            .await
            .push((input.to_path_buf(), layout.clone()));
        if !input.exists() {
            return Err(MediaError::InputNotFound {
                path: input.to_path_buf(),
            });
        }
        if let Some(reason) = self.transform_failure.read().await.clone() {
            return Err(MediaError::transform_failed(reason, None));
        }
        let path = dest_dir.join(format!("{}.vertical.mp4", base_name(input)));
        tokio::fs::write(&path, b"vertical").await?;
        Ok(path)
    }

    async fn quality_score(&self, path: &Path) -> Result<f64, MediaError> {
        if let Some(reason) = self.probe_failure.read().await.clone() {
            return Err(MediaError::probe_failed(reason));
        }
        if !path.exists() {
            return Err(MediaError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(*self.quality.read().await)
    }
}
