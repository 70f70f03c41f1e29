//! Pipeline runner implementation.
//!
//! One invocation: take the process lock, sweep stale workspaces, run each
//! configured streamer in order, then clean up. Everything is awaited in
//! sequence; nothing is spawned.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::lock::ProcessLock;
use crate::media::sweep_stale;
use crate::metrics;
use crate::report;

use super::streamer::{Collaborators, StreamerRunner};
use super::types::{PipelineError, PipelineRun, RunContext};

/// Drives a full pipeline run over every configured streamer.
pub struct PipelineRunner {
    config: Config,
    collab: Collaborators,
}

impl PipelineRunner {
    pub fn new(config: Config, collab: Collaborators) -> Self {
        Self { config, collab }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run once.
    ///
    /// Fails fast with [`PipelineError::Lock`] when another run holds the lock.
    /// Any later error is recorded on the returned run instead. A panic in a
    /// streamer is resumed after cleanup has run.
    pub async fn run(&self, ctx: &RunContext) -> Result<PipelineRun, PipelineError> {
        let lock = ProcessLock::acquire(&self.config.lock.path)?;
        info!(
            run_id = %ctx.run_id,
            trigger = %ctx.trigger,
            dry_run = ctx.dry_run,
            streamers = self.config.streamers.len(),
            "Starting pipeline run"
        );

        if let Err(e) = std::fs::create_dir_all(&self.config.pipeline.temp_dir) {
            warn!(
                dir = %self.config.pipeline.temp_dir.display(),
                error = %e,
                "Failed to create temp dir"
            );
        }
        self.sweep();

        let mut run = PipelineRun::start(ctx);
        let outcome = AssertUnwindSafe(self.run_streamers(ctx, &mut run))
            .catch_unwind()
            .await;

        let panic = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                error!(error = %e, "Pipeline run aborted");
                run.error = Some(e.to_string());
                None
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "Pipeline run panicked");
                run.error = Some(format!("panic: {}", message));
                Some(payload)
            }
        };

        self.cleanup(&mut run, lock);

        if let Some(payload) = panic {
            std::panic::resume_unwind(payload);
        }
        Ok(run)
    }

    async fn run_streamers(
        &self,
        ctx: &RunContext,
        run: &mut PipelineRun,
    ) -> Result<(), PipelineError> {
        let runner = StreamerRunner::new(&self.config, &self.collab);

        for streamer in &self.config.streamers {
            let span = info_span!("streamer", streamer = %streamer.name, run_id = %ctx.run_id);
            let result = runner.run(streamer, ctx).instrument(span).await?;
            let quota_exhausted = result.quota_exhausted;
            run.add_streamer(result);

            if quota_exhausted {
                warn!(
                    streamer = %streamer.name,
                    "Upload quota exhausted, skipping remaining streamers"
                );
                break;
            }
        }
        Ok(())
    }

    /// Runs on every exit path once the lock is held. Each step is best-effort.
    fn cleanup(&self, run: &mut PipelineRun, lock: ProcessLock) {
        run.finished_at = Some(Utc::now());

        if let Err(e) = self.collab.store.checkpoint() {
            warn!(error = %e, "Store checkpoint failed");
        }
        self.sweep();

        if let Err(e) = self.collab.store.record_run(run) {
            error!(run_id = %run.run_id, error = %e, "Failed to record run");
        }

        metrics::observe_run(run);
        if let Some(path) = &self.config.report.metrics_textfile {
            if let Err(e) = metrics::export_textfile(path) {
                warn!(path = %path.display(), error = %e, "Failed to export metrics");
            }
        }

        if let Some(dir) = &self.config.report.dir {
            if let Err(e) = report::write_run_report(dir, run) {
                warn!(dir = %dir.display(), error = %e, "Failed to write run report");
            }
        }

        lock.release();

        info!(
            run_id = %run.run_id,
            fetched = run.totals.fetched,
            uploaded = run.totals.uploaded,
            failed = run.totals.failed,
            quota_exhausted = run.quota_exhausted,
            duration_secs = run.duration_secs().unwrap_or_default(),
            "Pipeline run finished"
        );
    }

    fn sweep(&self) {
        let max_age = Duration::from_secs(
            self.config
                .pipeline
                .stale_temp_max_age_hours
                .saturating_mul(3600),
        );
        let removed = sweep_stale(&self.config.pipeline.temp_dir, max_age);
        if removed > 0 {
            info!(removed, "Removed stale clip workspaces");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
