//! yt-dlp based clip downloader.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::config::MediaConfig;
use super::error::MediaError;
use super::traits::MediaDownloader;
use crate::clip::Clip;

/// Downloads clip media by shelling out to yt-dlp.
pub struct YtDlpDownloader {
    config: MediaConfig,
}

impl YtDlpDownloader {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    /// Filesystem-safe stem for a clip id.
    fn file_stem(clip_id: &str) -> String {
        let stem: String = clip_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if stem.is_empty() {
            "clip".to_string()
        } else {
            stem
        }
    }

    fn build_args(&self, clip: &Clip, dest_dir: &Path) -> Vec<String> {
        let template = dest_dir.join(format!("{}.raw.%(ext)s", Self::file_stem(&clip.id)));
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--quiet".to_string(),
            "-f".to_string(),
            "best[ext=mp4]/best".to_string(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
        ];
        args.extend(self.config.extra_ytdlp_args.iter().cloned());
        args.push(clip.url.clone());
        args
    }

    /// First file in `dest_dir` carrying the clip's raw stem.
    async fn find_output(dest_dir: &Path, clip_id: &str) -> Option<PathBuf> {
        let prefix = format!("{}.raw.", Self::file_stem(clip_id));
        let mut entries = tokio::fs::read_dir(dest_dir).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                return Some(entry.path());
            }
        }
        None
    }
}

#[async_trait]
impl MediaDownloader for YtDlpDownloader {
    async fn fetch_media(&self, clip: &Clip, dest_dir: &Path) -> Result<PathBuf, MediaError> {
        tokio::fs::create_dir_all(dest_dir).await?;
        let args = self.build_args(clip, dest_dir);
        debug!(clip_id = %clip.id, url = %clip.url, "Downloading clip");

        let child = Command::new(&self.config.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::spawn("yt-dlp", &self.config.ytdlp_path, e))?;

        let output = timeout(
            Duration::from_secs(self.config.download_timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| MediaError::Timeout {
            operation: "download",
            timeout_secs: self.config.download_timeout_secs,
        })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(MediaError::download_failed(
                format!("yt-dlp exited with code: {:?}", output.status.code()),
                (!stderr.is_empty()).then_some(stderr),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let printed = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(PathBuf::from)
            .filter(|p| p.exists());

        let path = match printed {
            Some(p) => p,
            None => Self::find_output(dest_dir, &clip.id)
                .await
                .ok_or_else(|| MediaError::download_failed("yt-dlp produced no file", None))?,
        };

        debug!(clip_id = %clip.id, path = %path.display(), "Clip downloaded");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_file_stem_sanitizes() {
        assert_eq!(YtDlpDownloader::file_stem("Abc-def_1"), "Abc-def_1");
        assert_eq!(YtDlpDownloader::file_stem("../etc/passwd"), "___etc_passwd");
        assert_eq!(YtDlpDownloader::file_stem(""), "clip");
    }

    #[test]
    fn test_build_args() {
        let downloader = YtDlpDownloader::new(MediaConfig {
            extra_ytdlp_args: vec!["--cookies".to_string(), "c.txt".to_string()],
            ..Default::default()
        });
        let clip = fixtures::clip("c1", "alpha", 10);
        let args = downloader.build_args(&clip, Path::new("/tmp/work"));

        assert_eq!(args.last(), Some(&clip.url));
        assert!(args.contains(&"/tmp/work/c1.raw.%(ext)s".to_string()));
        assert!(args.contains(&"--cookies".to_string()));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let downloader = YtDlpDownloader::new(MediaConfig {
            ytdlp_path: PathBuf::from("/nonexistent/yt-dlp"),
            ..Default::default()
        });
        let dir = tempfile::TempDir::new().unwrap();
        let clip = fixtures::clip("c1", "alpha", 10);
        let err = downloader.fetch_media(&clip, dir.path()).await.unwrap_err();
        assert!(matches!(err, MediaError::ToolNotFound { tool: "yt-dlp", .. }));
    }

    #[tokio::test]
    async fn test_find_output() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("c1.raw.mp4"), b"x").unwrap();
        let found = YtDlpDownloader::find_output(dir.path(), "c1").await;
        assert_eq!(found, Some(dir.path().join("c1.raw.mp4")));
        assert!(YtDlpDownloader::find_output(dir.path(), "c2").await.is_none());
    }
}
