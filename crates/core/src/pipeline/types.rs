//! Types for pipeline runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that stop a run.
///
/// Per-clip failures never surface here; they are [`ClipOutcome`]s.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Another run holds the process lock.
    #[error("lock error: {0}")]
    Lock(#[from] crate::lock::LockError),

    /// Clip history storage failed.
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal result of one clip attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClipOutcome {
    DownloadFailed,
    ProcessingFailed,
    LowQuality { score: f64 },
    DryRun,
    /// The destination already has an upload with the planned title.
    Duplicate { remote_id: String },
    QuotaExhausted,
    Forbidden,
    AuthError,
    /// The publisher returned no id or a generic error.
    UploadFailed,
    Uploaded { remote_id: String },
}

impl ClipOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipOutcome::DownloadFailed => "download_failed",
            ClipOutcome::ProcessingFailed => "processing_failed",
            ClipOutcome::LowQuality { .. } => "low_quality",
            ClipOutcome::DryRun => "dry_run",
            ClipOutcome::Duplicate { .. } => "duplicate",
            ClipOutcome::QuotaExhausted => "quota_exhausted",
            ClipOutcome::Forbidden => "forbidden",
            ClipOutcome::AuthError => "auth_error",
            ClipOutcome::UploadFailed => "upload_failed",
            ClipOutcome::Uploaded { .. } => "uploaded",
        }
    }

    /// Whether this outcome counts toward a streamer's `failed` total.
    pub fn is_failure(&self, low_quality_counts: bool) -> bool {
        match self {
            ClipOutcome::DownloadFailed
            | ClipOutcome::ProcessingFailed
            | ClipOutcome::Forbidden
            | ClipOutcome::UploadFailed
            | ClipOutcome::AuthError => true,
            ClipOutcome::LowQuality { .. } => low_quality_counts,
            ClipOutcome::DryRun
            | ClipOutcome::Duplicate { .. }
            | ClipOutcome::QuotaExhausted
            | ClipOutcome::Uploaded { .. } => false,
        }
    }
}

/// One clip's pass through the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipAttempt {
    pub clip_id: String,
    pub title: String,
    pub score: f64,
    pub outcome: ClipOutcome,
    /// Media was fetched.
    pub downloaded: bool,
    /// Media was transformed into a publishable file.
    pub processed: bool,
}

impl ClipAttempt {
    pub fn new(clip_id: impl Into<String>, title: impl Into<String>, score: f64) -> Self {
        Self {
            clip_id: clip_id.into(),
            title: title.into(),
            score,
            outcome: ClipOutcome::UploadFailed,
            downloaded: false,
            processed: false,
        }
    }

    pub fn finish(mut self, outcome: ClipOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

/// Why a streamer was skipped before any clip was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    NoNewClips,
    SpacingLimited,
    OutsidePostingWindow,
    PublisherUnavailable,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Disabled => "disabled",
            SkipReason::NoNewClips => "no_new_clips",
            SkipReason::SpacingLimited => "spacing_limited",
            SkipReason::OutsidePostingWindow => "outside_posting_window",
            SkipReason::PublisherUnavailable => "publisher_unavailable",
        }
    }
}

/// Why the clip loop ended before the admitted list or upload budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    ForbiddenBreaker,
    AuthError,
    QuotaExhausted,
}

/// Result of one streamer's run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamerRunResult {
    pub streamer: String,
    /// Candidates returned by the source.
    pub fetched: u32,
    /// Clips admitted after filtering, ranking, dedup and the per-streamer cap.
    pub filtered: u32,
    pub downloaded: u32,
    pub processed: u32,
    pub uploaded: u32,
    pub failed: u32,
    pub quota_exhausted: bool,
    #[serde(default)]
    pub skip_reason: Option<SkipReason>,
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    /// Source or publisher error that ended the streamer early.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub attempts: Vec<ClipAttempt>,
}

impl StreamerRunResult {
    pub fn new(streamer: impl Into<String>) -> Self {
        Self {
            streamer: streamer.into(),
            fetched: 0,
            filtered: 0,
            downloaded: 0,
            processed: 0,
            uploaded: 0,
            failed: 0,
            quota_exhausted: false,
            skip_reason: None,
            stop_reason: None,
            error: None,
            attempts: Vec::new(),
        }
    }

    pub fn skipped(mut self, reason: SkipReason) -> Self {
        self.skip_reason = Some(reason);
        self
    }

    /// Fold an attempt into the counters and keep it for reporting.
    pub fn record(&mut self, attempt: ClipAttempt, low_quality_counts: bool) {
        if attempt.downloaded {
            self.downloaded += 1;
        }
        if attempt.processed {
            self.processed += 1;
        }
        if matches!(attempt.outcome, ClipOutcome::Uploaded { .. }) {
            self.uploaded += 1;
        }
        if attempt.outcome.is_failure(low_quality_counts) {
            self.failed += 1;
        }
        if attempt.outcome == ClipOutcome::QuotaExhausted {
            self.quota_exhausted = true;
        }
        self.attempts.push(attempt);
    }
}

/// Counters summed over every streamer of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub fetched: u32,
    pub filtered: u32,
    pub downloaded: u32,
    pub processed: u32,
    pub uploaded: u32,
    pub failed: u32,
    #[serde(default)]
    pub skipped_streamers: u32,
}

impl RunTotals {
    pub fn add(&mut self, result: &StreamerRunResult) {
        self.fetched += result.fetched;
        self.filtered += result.filtered;
        self.downloaded += result.downloaded;
        self.processed += result.processed;
        self.uploaded += result.uploaded;
        self.failed += result.failed;
        if result.skip_reason.is_some() {
            self.skipped_streamers += 1;
        }
    }
}

/// Per-invocation inputs, created once in `main`.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    /// What started the run: "cli", "cron", "systemd" and so on.
    pub trigger: String,
    pub dry_run: bool,
    /// Bypass the posting-time window.
    pub force: bool,
    pub started_at: DateTime<Utc>,
    pub config_hash: Option<String>,
}

impl RunContext {
    pub fn new(trigger: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            trigger: trigger.into(),
            dry_run: false,
            force: false,
            started_at: Utc::now(),
            config_hash: None,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }
}

/// Record of one pipeline invocation, persisted once at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub trigger: String,
    pub dry_run: bool,
    pub config_hash: Option<String>,
    pub totals: RunTotals,
    pub streamers: Vec<StreamerRunResult>,
    pub quota_exhausted: bool,
    pub error: Option<String>,
}

impl PipelineRun {
    pub fn start(ctx: &RunContext) -> Self {
        Self {
            run_id: ctx.run_id.clone(),
            started_at: ctx.started_at,
            finished_at: None,
            trigger: ctx.trigger.clone(),
            dry_run: ctx.dry_run,
            config_hash: ctx.config_hash.clone(),
            totals: RunTotals::default(),
            streamers: Vec::new(),
            quota_exhausted: false,
            error: None,
        }
    }

    pub fn add_streamer(&mut self, result: StreamerRunResult) {
        self.totals.add(&result);
        self.quota_exhausted |= result.quota_exhausted;
        self.streamers.push(result);
    }

    /// Wall-clock duration, if finished.
    pub fn duration_secs(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let t = &self.totals;
        let mut line = format!(
            "run {}: fetched={} filtered={} downloaded={} processed={} uploaded={} failed={} skipped_streamers={}",
            self.run_id,
            t.fetched,
            t.filtered,
            t.downloaded,
            t.processed,
            t.uploaded,
            t.failed,
            t.skipped_streamers
        );
        if self.dry_run {
            line.push_str(" (dry run)");
        }
        if self.quota_exhausted {
            line.push_str(" [quota exhausted]");
        }
        if let Some(err) = &self.error {
            line.push_str(&format!(" error: {}", err));
        }
        line
    }
}
