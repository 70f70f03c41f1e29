//! Prometheus metrics for pipeline runs.
//!
//! This module provides metrics for:
//! - Clip attempts (outcomes by variant, uploads)
//! - Streamers (skips by reason)
//! - Runs (count by result, duration)
//!
//! The binary is short-lived, so metrics are exported to a node-exporter
//! textfile at the end of each run instead of being scraped.

use std::io::Write;
use std::path::Path;

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::pipeline::PipelineRun;

// =============================================================================
// Clip metrics
// =============================================================================

/// Clip attempts by terminal outcome.
pub static CLIP_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipline_clip_outcomes_total", "Clip attempts by outcome"),
        &["outcome"], // ClipOutcome::as_str
    )
    .unwrap()
});

/// Clips published.
pub static UPLOADS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("clipline_uploads_total", "Total clips published").unwrap()
});

// =============================================================================
// Streamer metrics
// =============================================================================

/// Streamers skipped before any clip attempt.
pub static STREAMER_SKIPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipline_streamer_skips_total", "Streamers skipped by reason"),
        &["reason"], // SkipReason::as_str
    )
    .unwrap()
});

// =============================================================================
// Run metrics
// =============================================================================

/// Finished runs by result.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipline_runs_total", "Total pipeline runs"),
        &["result"], // "ok", "quota_exhausted", "error"
    )
    .unwrap()
});

/// Run duration in seconds.
pub static RUN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("clipline_run_duration_seconds", "Duration of a pipeline run")
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 3600.0]),
    )
    .unwrap()
});

/// Registry holding every metric above.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in all_metrics() {
        registry.register(metric).unwrap();
    }
    registry
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(CLIP_OUTCOMES.clone()),
        Box::new(UPLOADS_TOTAL.clone()),
        Box::new(STREAMER_SKIPS.clone()),
        Box::new(RUNS_TOTAL.clone()),
        Box::new(RUN_DURATION.clone()),
    ]
}

/// Record a finished run.
pub fn observe_run(run: &PipelineRun) {
    let result = if run.error.is_some() {
        "error"
    } else if run.quota_exhausted {
        "quota_exhausted"
    } else {
        "ok"
    };
    RUNS_TOTAL.with_label_values(&[result]).inc();
    if let Some(secs) = run.duration_secs() {
        RUN_DURATION.observe(secs.max(0.0));
    }
}

/// Render the registry in the Prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Atomically write the registry to a node-exporter textfile.
pub fn export_textfile(path: &Path) -> std::io::Result<()> {
    let text = render().map_err(std::io::Error::other)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("prom.tmp");
    let mut file = std::fs::File::create(&tmp)?;
    file.write_all(text.as_bytes())?;
    file.sync_all()?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RunContext;
    use tempfile::TempDir;

    #[test]
    fn test_export_textfile() {
        CLIP_OUTCOMES.with_label_values(&["uploaded"]).inc();
        let mut run = PipelineRun::start(&RunContext::new("test"));
        run.finished_at = Some(run.started_at + chrono::Duration::seconds(3));
        observe_run(&run);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics/clipline.prom");
        export_textfile(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("clipline_clip_outcomes_total{outcome=\"uploaded\"}"));
        assert!(text.contains("clipline_runs_total{result=\"ok\"}"));
        assert!(text.contains("clipline_run_duration_seconds_bucket"));
    }
}
