//! Per-streamer run: fetch, rank, dedup, gate, then drive admitted clips.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::clip::Clip;
use crate::config::{Config, StreamerConfig};
use crate::dedup::DedupFilter;
use crate::media::{MediaDownloader, MediaTransformer};
use crate::metrics;
use crate::publish::PublisherProvider;
use crate::scheduler::UploadScheduler;
use crate::scoring::ScoringEngine;
use crate::source::ClipSource;
use crate::store::{ClipStore, PerformanceHistory};

use super::clip_machine::{ClipSettings, ClipStateMachine};
use super::config::LowQualityBreaker;
use super::title::TitleBuilder;
use super::types::{
    ClipOutcome, PipelineError, RunContext, SkipReason, StopReason, StreamerRunResult,
};

/// External collaborators of a run.
///
/// `store` and `history` are usually the same SQLite store.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn ClipSource>,
    pub store: Arc<dyn ClipStore>,
    pub history: Arc<dyn PerformanceHistory>,
    pub downloader: Arc<dyn MediaDownloader>,
    pub transformer: Arc<dyn MediaTransformer>,
    pub publisher: Arc<dyn PublisherProvider>,
}

/// Mutable loop state for one streamer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerState {
    pub consecutive_forbidden: u32,
    pub uploads_remaining: u32,
    threshold: u32,
}

impl BreakerState {
    pub fn new(uploads_remaining: u32, threshold: u32) -> Self {
        Self {
            consecutive_forbidden: 0,
            uploads_remaining,
            threshold,
        }
    }

    /// Apply one outcome. Returns why the loop must stop, if it must.
    pub fn observe(
        &mut self,
        outcome: &ClipOutcome,
        low_quality: LowQualityBreaker,
    ) -> Option<StopReason> {
        match outcome {
            ClipOutcome::Uploaded { .. } => {
                self.uploads_remaining = self.uploads_remaining.saturating_sub(1);
                self.consecutive_forbidden = 0;
            }
            ClipOutcome::DryRun => {
                self.uploads_remaining = self.uploads_remaining.saturating_sub(1);
            }
            ClipOutcome::UploadFailed => self.consecutive_forbidden = 0,
            ClipOutcome::Forbidden => return self.strike(),
            ClipOutcome::LowQuality { .. } => match low_quality {
                LowQualityBreaker::Ignore => {}
                LowQualityBreaker::Reset => self.consecutive_forbidden = 0,
                LowQualityBreaker::Strike => return self.strike(),
            },
            ClipOutcome::QuotaExhausted => return Some(StopReason::QuotaExhausted),
            ClipOutcome::AuthError => return Some(StopReason::AuthError),
            ClipOutcome::DownloadFailed
            | ClipOutcome::ProcessingFailed
            | ClipOutcome::Duplicate { .. } => {}
        }
        None
    }

    fn strike(&mut self) -> Option<StopReason> {
        self.consecutive_forbidden += 1;
        (self.consecutive_forbidden >= self.threshold).then_some(StopReason::ForbiddenBreaker)
    }
}

/// Runs a single streamer. Stateless between streamers.
pub struct StreamerRunner<'a> {
    config: &'a Config,
    collab: &'a Collaborators,
    scoring: ScoringEngine,
    scheduler: UploadScheduler,
    titles: TitleBuilder,
}

impl<'a> StreamerRunner<'a> {
    pub fn new(config: &'a Config, collab: &'a Collaborators) -> Self {
        Self {
            config,
            collab,
            scoring: ScoringEngine::new(config.scoring.clone()),
            scheduler: UploadScheduler::new(config.schedule.clone()),
            titles: TitleBuilder::new(config.title.clone()),
        }
    }

    /// Run one streamer.
    ///
    /// Source and publisher failures end the streamer with an error note.
    /// Only storage failures are returned as errors.
    pub async fn run(
        &self,
        streamer: &StreamerConfig,
        ctx: &RunContext,
    ) -> Result<StreamerRunResult, PipelineError> {
        let mut result = StreamerRunResult::new(&streamer.name);
        let pipeline = &self.config.pipeline;

        if !streamer.enabled {
            return Ok(skip(result, SkipReason::Disabled));
        }

        let now = Utc::now();
        let lookback = chrono::Duration::hours(i64::from(pipeline.lookback_hours));
        let mut candidates = match self
            .collab
            .source
            .fetch_candidates(streamer, lookback)
            .await
        {
            Ok(clips) => clips,
            Err(e) => {
                warn!(error = %e, "Failed to fetch candidates");
                result.error = Some(e.to_string());
                return Ok(result);
            }
        };
        result.fetched = saturating_u32(candidates.len());

        if !streamer.target_game_ids.is_empty() {
            candidates.retain(|c| {
                c.game_id
                    .as_ref()
                    .is_some_and(|g| streamer.target_game_ids.contains(g))
            });
        }

        let ranked = self.scoring.rank(
            candidates,
            self.collab.history.as_ref(),
            &streamer.name,
            now,
        );
        let mut admitted =
            DedupFilter::new(self.collab.store.as_ref(), &self.config.dedup).filter_new(ranked)?;
        admitted.truncate(pipeline.max_clips_per_streamer);
        result.filtered = saturating_u32(admitted.len());
        debug!(
            fetched = result.fetched,
            admitted = result.filtered,
            "Candidates filtered"
        );

        if admitted.is_empty() {
            return Ok(skip(result, SkipReason::NoNewClips));
        }

        let uploads_remaining = self
            .scheduler
            .uploads_remaining(self.collab.history.as_ref(), streamer)?;
        if uploads_remaining == 0 {
            return Ok(skip(result, SkipReason::SpacingLimited));
        }
        if !self.scheduler.posting_window_open(now, ctx.force) {
            return Ok(skip(result, SkipReason::OutsidePostingWindow));
        }

        self.resolve_game_names(&mut admitted).await;

        let target = match self.collab.publisher.connect(streamer).await {
            Ok(target) => target,
            Err(e) => {
                warn!(error = %e, "Publisher unavailable");
                result.error = Some(e.to_string());
                return Ok(skip(result, SkipReason::PublisherUnavailable));
            }
        };

        let machine = ClipStateMachine::new(
            self.collab,
            &target,
            streamer,
            &self.titles,
            ClipSettings {
                temp_root: &pipeline.temp_dir,
                min_quality: self.config.quality.min_score,
                dry_run: ctx.dry_run || pipeline.dry_run,
            },
        );
        let mut breaker =
            BreakerState::new(uploads_remaining, pipeline.forbidden_breaker_threshold);

        for clip in &admitted {
            if breaker.uploads_remaining == 0 {
                debug!("Upload budget spent");
                break;
            }

            let attempt = machine.run(clip).await;
            info!(
                clip_id = %clip.id,
                outcome = attempt.outcome.as_str(),
                score = clip.score,
                "Clip attempt finished"
            );
            metrics::CLIP_OUTCOMES
                .with_label_values(&[attempt.outcome.as_str()])
                .inc();

            let stop = breaker.observe(&attempt.outcome, pipeline.low_quality_breaker);
            result.record(attempt, pipeline.low_quality_counts_as_failure);

            if let Some(reason) = stop {
                warn!(
                    reason = ?reason,
                    consecutive_forbidden = breaker.consecutive_forbidden,
                    "Stopping streamer early"
                );
                result.stop_reason = Some(reason);
                break;
            }
        }

        metrics::UPLOADS_TOTAL.inc_by(u64::from(result.uploaded));
        if let Err(e) = self.collab.history.update_rolling_stats(&streamer.name) {
            warn!(error = %e, "Failed to refresh rolling stats");
        }

        Ok(result)
    }

    /// Fill `game_name` for the admitted clips. A failed lookup leaves names empty.
    async fn resolve_game_names(&self, clips: &mut [Clip]) {
        let ids: Vec<String> = clips
            .iter()
            .filter(|c| c.game_name.is_none())
            .filter_map(|c| c.game_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            return;
        }

        match self.collab.source.resolve_game_names(&ids).await {
            Ok(names) => {
                for clip in clips.iter_mut() {
                    if clip.game_name.is_none() {
                        clip.game_name = clip.game_id.as_ref().and_then(|g| names.get(g)).cloned();
                    }
                }
            }
            Err(e) => warn!(error = %e, "Failed to resolve game names"),
        }
    }
}

fn skip(result: StreamerRunResult, reason: SkipReason) -> StreamerRunResult {
    info!(reason = reason.as_str(), "Streamer skipped");
    metrics::STREAMER_SKIPS
        .with_label_values(&[reason.as_str()])
        .inc();
    result.skipped(reason)
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::PublishError;

    fn uploaded() -> ClipOutcome {
        ClipOutcome::Uploaded {
            remote_id: "yt".to_string(),
        }
    }

    #[test]
    fn test_breaker_trips_on_consecutive_forbidden() {
        let mut state = BreakerState::new(5, 3);
        assert_eq!(state.observe(&ClipOutcome::Forbidden, LowQualityBreaker::Ignore), None);
        assert_eq!(state.observe(&ClipOutcome::Forbidden, LowQualityBreaker::Ignore), None);
        assert_eq!(
            state.observe(&ClipOutcome::Forbidden, LowQualityBreaker::Ignore),
            Some(StopReason::ForbiddenBreaker)
        );
    }

    #[test]
    fn test_breaker_resets_on_upload_and_soft_failure() {
        let mut state = BreakerState::new(5, 2);
        state.observe(&ClipOutcome::Forbidden, LowQualityBreaker::Ignore);
        state.observe(&uploaded(), LowQualityBreaker::Ignore);
        assert_eq!(state.consecutive_forbidden, 0);
        assert_eq!(state.uploads_remaining, 4);

        state.observe(&ClipOutcome::Forbidden, LowQualityBreaker::Ignore);
        state.observe(&ClipOutcome::UploadFailed, LowQualityBreaker::Ignore);
        assert_eq!(state.consecutive_forbidden, 0);

        state.observe(&ClipOutcome::Forbidden, LowQualityBreaker::Ignore);
        state.observe(&ClipOutcome::DownloadFailed, LowQualityBreaker::Ignore);
        assert_eq!(state.consecutive_forbidden, 1);
    }

    #[test]
    fn test_low_quality_breaker_modes() {
        let low = ClipOutcome::LowQuality { score: 0.1 };

        let mut state = BreakerState::new(5, 2);
        state.observe(&ClipOutcome::Forbidden, LowQualityBreaker::Ignore);
        state.observe(&low, LowQualityBreaker::Ignore);
        assert_eq!(state.consecutive_forbidden, 1);

        state.observe(&low, LowQualityBreaker::Reset);
        assert_eq!(state.consecutive_forbidden, 0);

        state.observe(&ClipOutcome::Forbidden, LowQualityBreaker::Strike);
        assert_eq!(
            state.observe(&low, LowQualityBreaker::Strike),
            Some(StopReason::ForbiddenBreaker)
        );
    }

    #[test]
    fn test_terminal_outcomes_stop() {
        let mut state = BreakerState::new(5, 3);
        assert_eq!(
            state.observe(&ClipOutcome::QuotaExhausted, LowQualityBreaker::Ignore),
            Some(StopReason::QuotaExhausted)
        );
        assert_eq!(
            state.observe(&ClipOutcome::AuthError, LowQualityBreaker::Ignore),
            Some(StopReason::AuthError)
        );
        assert_eq!(
            state.observe(
                &ClipOutcome::Duplicate {
                    remote_id: "x".to_string()
                },
                LowQualityBreaker::Ignore
            ),
            None
        );
    }

    #[test]
    fn test_dry_run_spends_budget() {
        let mut state = BreakerState::new(1, 3);
        state.observe(&ClipOutcome::DryRun, LowQualityBreaker::Ignore);
        assert_eq!(state.uploads_remaining, 0);
    }

    mod flow {
        use super::*;
        use crate::store::SqliteClipStore;
        use crate::testing::{
            fixtures, MockClipSource, MockDownloader, MockHistory, MockPublisher,
            MockPublisherProvider, MockTransformer,
        };
        use tempfile::TempDir;

        struct Setup {
            config: Config,
            collab: Collaborators,
            source: Arc<MockClipSource>,
            history: Arc<MockHistory>,
            publisher: Arc<MockPublisher>,
            provider: Arc<MockPublisherProvider>,
            _temp: TempDir,
        }

        fn setup() -> Setup {
            let temp = TempDir::new().unwrap();
            let mut config = Config::default();
            config.pipeline.temp_dir = temp.path().to_path_buf();
            config.schedule.max_uploads_per_window = 10;
            config.streamers = vec![StreamerConfig::new("alpha", "1")];

            let source = Arc::new(MockClipSource::new());
            let history = Arc::new(MockHistory::new());
            let publisher = Arc::new(MockPublisher::new());
            let provider = Arc::new(MockPublisherProvider::new(publisher.clone()));
            let collab = Collaborators {
                source: source.clone(),
                store: Arc::new(SqliteClipStore::in_memory().unwrap()),
                history: history.clone(),
                downloader: Arc::new(MockDownloader::new()),
                transformer: Arc::new(MockTransformer::new()),
                publisher: provider.clone(),
            };
            Setup {
                config,
                collab,
                source,
                history,
                publisher,
                provider,
                _temp: temp,
            }
        }

        fn spaced_clips(n: usize) -> Vec<Clip> {
            (0..n)
                .map(|i| {
                    let mut clip = fixtures::clip(&format!("c{}", i), "alpha", 100 + i as u64);
                    clip.created_at -= chrono::Duration::minutes(5 * i as i64);
                    clip
                })
                .collect()
        }

        #[tokio::test]
        async fn test_disabled_streamer_skipped() {
            let s = setup();
            let mut streamer = s.config.streamers[0].clone();
            streamer.enabled = false;

            let runner = StreamerRunner::new(&s.config, &s.collab);
            let result = runner.run(&streamer, &RunContext::new("test")).await.unwrap();

            assert_eq!(result.skip_reason, Some(SkipReason::Disabled));
            assert!(s.source.fetch_calls().await.is_empty());
        }

        #[tokio::test]
        async fn test_no_new_clips() {
            let s = setup();
            let runner = StreamerRunner::new(&s.config, &s.collab);
            let result = runner
                .run(&s.config.streamers[0], &RunContext::new("test"))
                .await
                .unwrap();
            assert_eq!(result.skip_reason, Some(SkipReason::NoNewClips));
            assert!(s.history.rolling_stats_calls().is_empty());
        }

        #[tokio::test]
        async fn test_spacing_limited_skips_game_lookup() {
            let mut s = setup();
            s.config.schedule.max_uploads_per_window = 1;
            s.history.set_recent_uploads("alpha", 1);
            s.source.set_clips("alpha", spaced_clips(2)).await;

            let runner = StreamerRunner::new(&s.config, &s.collab);
            let result = runner
                .run(&s.config.streamers[0], &RunContext::new("test"))
                .await
                .unwrap();

            assert_eq!(result.skip_reason, Some(SkipReason::SpacingLimited));
            assert!(s.source.resolve_calls().await.is_empty());
            assert!(s.provider.connected().await.is_empty());
        }

        #[tokio::test]
        async fn test_target_game_filter() {
            let s = setup();
            let mut clips = spaced_clips(3);
            clips[0].game_id = Some("chess".to_string());
            clips[1].game_id = Some("poker".to_string());
            s.source.set_clips("alpha", clips).await;
            let mut streamer = s.config.streamers[0].clone();
            streamer.target_game_ids = vec!["chess".to_string()];

            let runner = StreamerRunner::new(&s.config, &s.collab);
            let result = runner.run(&streamer, &RunContext::new("test")).await.unwrap();

            assert_eq!(result.fetched, 3);
            assert_eq!(result.filtered, 1);
            assert_eq!(result.attempts[0].clip_id, "c0");
        }

        #[tokio::test]
        async fn test_upload_budget_limits_attempts() {
            let mut s = setup();
            s.config.schedule.max_uploads_per_window = 2;
            s.source.set_clips("alpha", spaced_clips(4)).await;

            let runner = StreamerRunner::new(&s.config, &s.collab);
            let result = runner
                .run(&s.config.streamers[0], &RunContext::new("test"))
                .await
                .unwrap();

            assert_eq!(result.uploaded, 2);
            assert_eq!(result.attempts.len(), 2);
            assert_eq!(s.history.rolling_stats_calls(), vec!["alpha".to_string()]);
        }

        #[tokio::test]
        async fn test_auth_error_stops_streamer() {
            let s = setup();
            s.source.set_clips("alpha", spaced_clips(3)).await;
            s.publisher
                .push_result(Err(PublishError::AuthError("expired".to_string())))
                .await;

            let runner = StreamerRunner::new(&s.config, &s.collab);
            let result = runner
                .run(&s.config.streamers[0], &RunContext::new("test"))
                .await
                .unwrap();

            assert_eq!(result.attempts.len(), 1);
            assert_eq!(result.stop_reason, Some(StopReason::AuthError));
            assert_eq!(result.failed, 1);
            assert_eq!(s.history.rolling_stats_calls().len(), 1);
        }

        #[tokio::test]
        async fn test_connect_failure_skips() {
            let s = setup();
            s.source.set_clips("alpha", spaced_clips(1)).await;
            s.provider
                .fail_connect(PublishError::AuthError("no credentials".to_string()))
                .await;

            let runner = StreamerRunner::new(&s.config, &s.collab);
            let result = runner
                .run(&s.config.streamers[0], &RunContext::new("test"))
                .await
                .unwrap();

            assert_eq!(result.skip_reason, Some(SkipReason::PublisherUnavailable));
            assert!(result.error.is_some());
        }

        #[tokio::test]
        async fn test_game_names_resolved_once() {
            let s = setup();
            let mut clips = spaced_clips(2);
            clips[0].game_id = Some("g1".to_string());
            clips[1].game_id = Some("g1".to_string());
            s.source.set_clips("alpha", clips).await;
            s.source.set_game_name("g1", "Chess").await;

            let runner = StreamerRunner::new(&s.config, &s.collab);
            runner
                .run(&s.config.streamers[0], &RunContext::new("test"))
                .await
                .unwrap();

            assert_eq!(s.source.resolve_calls().await, vec![vec!["g1".to_string()]]);
            let published = s.publisher.published().await;
            assert!(published.iter().all(|p| p.tags.contains(&"Chess".to_string())));
        }
    }
}
