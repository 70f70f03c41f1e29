//! Per-clip state machine.
//!
//! Drives one admitted clip from the duplicate pre-check through download,
//! transform, quality gate and publish to exactly one [`ClipOutcome`].

use std::path::Path;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::clip::{Clip, ClipRecord};
use crate::config::StreamerConfig;
use crate::media::ClipWorkspace;
use crate::publish::{EffectContext, PublishError, PublishMetadata, PublishTarget};

use super::streamer::Collaborators;
use super::title::TitleBuilder;
use super::types::{ClipAttempt, ClipOutcome};

/// Settings shared by every clip of a streamer.
pub struct ClipSettings<'a> {
    pub temp_root: &'a Path,
    pub min_quality: f64,
    pub dry_run: bool,
}

pub struct ClipStateMachine<'a> {
    collab: &'a Collaborators,
    target: &'a PublishTarget,
    streamer: &'a StreamerConfig,
    titles: &'a TitleBuilder,
    settings: ClipSettings<'a>,
}

impl<'a> ClipStateMachine<'a> {
    pub fn new(
        collab: &'a Collaborators,
        target: &'a PublishTarget,
        streamer: &'a StreamerConfig,
        titles: &'a TitleBuilder,
        settings: ClipSettings<'a>,
    ) -> Self {
        Self {
            collab,
            target,
            streamer,
            titles,
            settings,
        }
    }

    /// Run one clip to its terminal outcome.
    ///
    /// Storage failures are logged and never change the outcome. The clip's
    /// workspace is removed on every exit path.
    pub async fn run(&self, clip: &Clip) -> ClipAttempt {
        let metadata = self.titles.metadata(clip, self.streamer);
        let mut attempt = ClipAttempt::new(&clip.id, &metadata.title, clip.score);

        // 1. Duplicate pre-check
        match self.target.publisher.check_duplicate(&metadata.title).await {
            Ok(Some(remote_id)) => {
                info!(clip_id = %clip.id, remote_id = %remote_id, "Clip already published");
                self.upsert(&ClipRecord::from_clip(clip).with_remote_id(&remote_id));
                return attempt.finish(ClipOutcome::Duplicate { remote_id });
            }
            Ok(None) => {}
            Err(PublishError::QuotaExhausted(msg)) => {
                warn!(clip_id = %clip.id, error = %msg, "Quota exhausted during duplicate check");
                return attempt.finish(ClipOutcome::QuotaExhausted);
            }
            Err(PublishError::AuthError(msg)) => {
                warn!(clip_id = %clip.id, error = %msg, "Auth failed during duplicate check");
                return attempt.finish(ClipOutcome::AuthError);
            }
            Err(e) => {
                warn!(clip_id = %clip.id, error = %e, "Duplicate check failed, assuming no duplicate");
            }
        }

        let workspace = match ClipWorkspace::create(self.settings.temp_root, &clip.id) {
            Ok(ws) => ws,
            Err(e) => {
                error!(clip_id = %clip.id, error = %e, "Failed to create clip workspace");
                self.bump_fail_count(clip);
                return attempt.finish(ClipOutcome::DownloadFailed);
            }
        };

        // 2. Download
        let raw = match self
            .collab
            .downloader
            .fetch_media(clip, workspace.path())
            .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!(clip_id = %clip.id, error = %e, "Download failed");
                self.bump_fail_count(clip);
                return attempt.finish(ClipOutcome::DownloadFailed);
            }
        };
        attempt.downloaded = true;

        // 3. Transform
        let processed = match self
            .collab
            .transformer
            .to_publishable(&raw, &self.streamer.layout, workspace.path())
            .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!(clip_id = %clip.id, error = %e, "Processing failed");
                workspace.discard(&raw);
                self.bump_fail_count(clip);
                return attempt.finish(ClipOutcome::ProcessingFailed);
            }
        };
        attempt.processed = true;
        if raw != processed {
            workspace.discard(&raw);
        }

        // 4. Quality gate
        let quality = match self.collab.transformer.quality_score(&processed).await {
            Ok(score) => score,
            Err(e) => {
                warn!(clip_id = %clip.id, error = %e, "Quality probe failed, scoring 0");
                0.0
            }
        };
        if quality < self.settings.min_quality {
            info!(
                clip_id = %clip.id,
                quality,
                min_quality = self.settings.min_quality,
                "Clip below quality threshold"
            );
            return attempt.finish(ClipOutcome::LowQuality { score: quality });
        }

        // 5. Dry run
        if self.settings.dry_run {
            info!(clip_id = %clip.id, title = %metadata.title, "Dry run, not publishing");
            return attempt.finish(ClipOutcome::DryRun);
        }

        // 6. Publish
        let outcome = match self.target.publisher.publish(&processed, &metadata).await {
            Ok(Some(remote_id)) => {
                info!(clip_id = %clip.id, remote_id = %remote_id, "Clip published");
                self.upsert(&ClipRecord::from_clip(clip).published(&remote_id, Utc::now()));
                ClipOutcome::Uploaded { remote_id }
            }
            Ok(None) => {
                warn!(clip_id = %clip.id, "Publisher returned no id");
                self.bump_fail_count(clip);
                ClipOutcome::UploadFailed
            }
            Err(PublishError::QuotaExhausted(msg)) => {
                warn!(clip_id = %clip.id, error = %msg, "Upload quota exhausted");
                ClipOutcome::QuotaExhausted
            }
            Err(PublishError::Forbidden(msg)) => {
                warn!(clip_id = %clip.id, error = %msg, "Upload forbidden");
                self.bump_fail_count(clip);
                ClipOutcome::Forbidden
            }
            Err(PublishError::AuthError(msg)) => {
                warn!(clip_id = %clip.id, error = %msg, "Publisher rejected credentials");
                ClipOutcome::AuthError
            }
            Err(PublishError::Other(msg)) => {
                warn!(clip_id = %clip.id, error = %msg, "Upload failed");
                self.bump_fail_count(clip);
                ClipOutcome::UploadFailed
            }
        };

        // 7. Effects
        if let ClipOutcome::Uploaded { remote_id } = &outcome {
            self.apply_effects(clip, remote_id, metadata, &processed).await;
        }

        attempt.finish(outcome)
    }

    async fn apply_effects(
        &self,
        clip: &Clip,
        remote_id: &str,
        metadata: PublishMetadata,
        media_path: &Path,
    ) {
        if self.target.effects.is_empty() {
            return;
        }
        let mut published = clip.clone();
        published.remote_id = Some(remote_id.to_string());
        let ctx = EffectContext {
            clip: published,
            remote_id: remote_id.to_string(),
            metadata,
            media_path: media_path.to_path_buf(),
        };

        for effect in &self.target.effects {
            match effect.apply(&ctx).await {
                Ok(()) => debug!(clip_id = %clip.id, effect = effect.name(), "Effect applied"),
                Err(e) => warn!(
                    clip_id = %clip.id,
                    effect = effect.name(),
                    error = %e,
                    "Post-upload effect failed"
                ),
            }
        }
    }

    fn upsert(&self, record: &ClipRecord) {
        if let Err(e) = self.collab.store.upsert_clip(record) {
            error!(clip_id = %record.clip_id, error = %e, "Failed to store clip");
        }
    }

    fn bump_fail_count(&self, clip: &Clip) {
        match self
            .collab
            .store
            .increment_fail_count(&ClipRecord::from_clip(clip))
        {
            Ok(count) => debug!(clip_id = %clip.id, fail_count = count, "Fail count bumped"),
            Err(e) => error!(clip_id = %clip.id, error = %e, "Failed to bump fail count"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ClipStore, SqliteClipStore};
    use crate::testing::{
        fixtures, MockClipSource, MockDownloader, MockEffect, MockHistory, MockPublisher,
        MockPublisherProvider, MockTransformer,
    };
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Harness {
        collab: Collaborators,
        store: Arc<SqliteClipStore>,
        downloader: Arc<MockDownloader>,
        transformer: Arc<MockTransformer>,
        publisher: Arc<MockPublisher>,
        titles: TitleBuilder,
        streamer: StreamerConfig,
        temp: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(SqliteClipStore::in_memory().unwrap());
            let downloader = Arc::new(MockDownloader::new());
            let transformer = Arc::new(MockTransformer::new());
            let publisher = Arc::new(MockPublisher::new());
            let collab = Collaborators {
                source: Arc::new(MockClipSource::new()),
                store: store.clone(),
                history: Arc::new(MockHistory::new()),
                downloader: downloader.clone(),
                transformer: transformer.clone(),
                publisher: Arc::new(MockPublisherProvider::new(publisher.clone())),
            };
            Self {
                collab,
                store,
                downloader,
                transformer,
                publisher,
                titles: TitleBuilder::new(Default::default()),
                streamer: StreamerConfig::new("alpha", "1"),
                temp: TempDir::new().unwrap(),
            }
        }

        async fn run(&self, target: &PublishTarget, clip: &Clip, dry_run: bool) -> ClipAttempt {
            let machine = ClipStateMachine::new(
                &self.collab,
                target,
                &self.streamer,
                &self.titles,
                ClipSettings {
                    temp_root: self.temp.path(),
                    min_quality: 0.3,
                    dry_run,
                },
            );
            machine.run(clip).await
        }

        fn target(&self) -> PublishTarget {
            PublishTarget::new(self.publisher.clone())
        }

        fn workspace_entries(&self) -> usize {
            std::fs::read_dir(self.temp.path()).unwrap().count()
        }
    }

    #[tokio::test]
    async fn test_uploaded_records_clip() {
        let h = Harness::new();
        let clip = fixtures::clip("c1", "alpha", 100);

        let attempt = h.run(&h.target(), &clip, false).await;

        assert_eq!(
            attempt.outcome,
            ClipOutcome::Uploaded {
                remote_id: "yt-c1".to_string()
            }
        );
        assert!(attempt.downloaded && attempt.processed);
        let record = h.store.get_clip("c1").unwrap().unwrap();
        assert_eq!(record.remote_id.as_deref(), Some("yt-c1"));
        assert!(record.posted_at.is_some());
        assert_eq!(record.fail_count, 0);
        assert_eq!(h.workspace_entries(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_skips_download() {
        let h = Harness::new();
        let clip = fixtures::clip("c1", "alpha", 100);
        let title = h.titles.planned_title(&clip);
        h.publisher.add_existing(&title, "yt-old").await;

        let attempt = h.run(&h.target(), &clip, false).await;

        assert_eq!(
            attempt.outcome,
            ClipOutcome::Duplicate {
                remote_id: "yt-old".to_string()
            }
        );
        assert!(h.downloader.calls().await.is_empty());
        let record = h.store.get_clip("c1").unwrap().unwrap();
        assert_eq!(record.remote_id.as_deref(), Some("yt-old"));
        assert!(record.posted_at.is_none());
        assert_eq!(record.fail_count, 0);
    }

    #[tokio::test]
    async fn test_failed_duplicate_check_continues() {
        let h = Harness::new();
        h.publisher
            .fail_duplicate_checks(PublishError::Other("search down".to_string()))
            .await;
        let clip = fixtures::clip("c1", "alpha", 100);

        let attempt = h.run(&h.target(), &clip, false).await;
        assert!(matches!(attempt.outcome, ClipOutcome::Uploaded { .. }));
    }

    #[tokio::test]
    async fn test_download_failure_bumps_fail_count() {
        let h = Harness::new();
        h.downloader.set_failure("404").await;
        let clip = fixtures::clip("c1", "alpha", 100);

        let attempt = h.run(&h.target(), &clip, false).await;

        assert_eq!(attempt.outcome, ClipOutcome::DownloadFailed);
        assert!(!attempt.downloaded);
        assert_eq!(h.store.get_clip("c1").unwrap().unwrap().fail_count, 1);
        assert_eq!(h.workspace_entries(), 0);
    }

    #[tokio::test]
    async fn test_processing_failure_cleans_up() {
        let h = Harness::new();
        h.transformer.set_transform_failure("bad codec").await;
        let clip = fixtures::clip("c1", "alpha", 100);

        let attempt = h.run(&h.target(), &clip, false).await;

        assert_eq!(attempt.outcome, ClipOutcome::ProcessingFailed);
        assert!(attempt.downloaded && !attempt.processed);
        assert_eq!(h.store.get_clip("c1").unwrap().unwrap().fail_count, 1);
        assert_eq!(h.workspace_entries(), 0);
    }

    #[tokio::test]
    async fn test_low_quality_not_published() {
        let h = Harness::new();
        h.transformer.set_quality(0.1).await;
        let clip = fixtures::clip("c1", "alpha", 100);

        let attempt = h.run(&h.target(), &clip, false).await;

        assert_eq!(attempt.outcome, ClipOutcome::LowQuality { score: 0.1 });
        assert!(h.publisher.published().await.is_empty());
        assert!(h.store.get_clip("c1").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_probe_scores_zero() {
        let h = Harness::new();
        h.transformer.set_probe_failure("no streams").await;
        let clip = fixtures::clip("c1", "alpha", 100);

        let attempt = h.run(&h.target(), &clip, false).await;
        assert_eq!(attempt.outcome, ClipOutcome::LowQuality { score: 0.0 });
    }

    #[tokio::test]
    async fn test_dry_run_never_publishes() {
        let h = Harness::new();
        let clip = fixtures::clip("c1", "alpha", 100);

        let attempt = h.run(&h.target(), &clip, true).await;

        assert_eq!(attempt.outcome, ClipOutcome::DryRun);
        assert!(attempt.processed);
        assert!(h.publisher.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_publish_errors_map_to_outcomes() {
        let cases = [
            (
                PublishError::QuotaExhausted("q".to_string()),
                ClipOutcome::QuotaExhausted,
                0,
            ),
            (
                PublishError::Forbidden("f".to_string()),
                ClipOutcome::Forbidden,
                1,
            ),
            (
                PublishError::AuthError("a".to_string()),
                ClipOutcome::AuthError,
                0,
            ),
            (
                PublishError::Other("o".to_string()),
                ClipOutcome::UploadFailed,
                1,
            ),
        ];

        for (error, expected, fail_count) in cases {
            let h = Harness::new();
            h.publisher.push_result(Err(error)).await;
            let clip = fixtures::clip("c1", "alpha", 100);

            let attempt = h.run(&h.target(), &clip, false).await;

            assert_eq!(attempt.outcome, expected);
            let stored = h
                .store
                .get_clip("c1")
                .unwrap()
                .map(|r| r.fail_count)
                .unwrap_or(0);
            assert_eq!(stored, fail_count, "fail_count for {:?}", expected);
        }
    }

    #[tokio::test]
    async fn test_missing_id_is_upload_failed() {
        let h = Harness::new();
        h.publisher.push_result(Ok(None)).await;
        let clip = fixtures::clip("c1", "alpha", 100);

        let attempt = h.run(&h.target(), &clip, false).await;
        assert_eq!(attempt.outcome, ClipOutcome::UploadFailed);
    }

    #[tokio::test]
    async fn test_effect_failure_keeps_outcome() {
        let h = Harness::new();
        let failing = Arc::new(MockEffect::failing("comment"));
        let ok = Arc::new(MockEffect::new("thumbnail"));
        let target = h.target().with_effect(failing.clone()).with_effect(ok.clone());
        let clip = fixtures::clip("c1", "alpha", 100);

        let attempt = h.run(&target, &clip, false).await;

        assert!(matches!(attempt.outcome, ClipOutcome::Uploaded { .. }));
        assert_eq!(failing.applied().await, vec!["yt-c1".to_string()]);
        assert_eq!(ok.applied().await, vec!["yt-c1".to_string()]);
    }
}
