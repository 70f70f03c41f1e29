//! Structured run reports.
//!
//! Each finished run is written to `runs/<run_id>.json` and appended as one
//! line to `daily/<YYYY-MM-DD>.jsonl` under the configured report directory.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::{PipelineRun, RunTotals};
use crate::store::{ClipStore, StoreError};

/// Write the per-run file and append to the day's log.
pub fn write_run_report(dir: &Path, run: &PipelineRun) -> std::io::Result<()> {
    let runs_dir = dir.join("runs");
    let daily_dir = dir.join("daily");
    std::fs::create_dir_all(&runs_dir)?;
    std::fs::create_dir_all(&daily_dir)?;

    let json = serde_json::to_string_pretty(run)?;
    std::fs::write(runs_dir.join(format!("{}.json", run.run_id)), json)?;

    let day = run.started_at.format("%Y-%m-%d").to_string();
    let mut daily = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(daily_dir.join(format!("{}.jsonl", day)))?;
    let mut line = serde_json::to_string(run)?;
    line.push('\n');
    daily.write_all(line.as_bytes())
}

/// Aggregate of every run started on one UTC day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub runs: u32,
    pub dry_runs: u32,
    pub quota_exhausted_runs: u32,
    pub errored_runs: u32,
    pub totals: RunTotals,
    pub by_streamer: BTreeMap<String, RunTotals>,
}

/// Summarize the persisted runs of `date` (UTC).
pub fn daily_summary(store: &dyn ClipStore, date: NaiveDate) -> Result<DailySummary, StoreError> {
    let from = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default());
    let to = from + chrono::Duration::days(1);
    let runs = store.runs_between(from, to)?;

    let mut summary = DailySummary {
        date,
        runs: 0,
        dry_runs: 0,
        quota_exhausted_runs: 0,
        errored_runs: 0,
        totals: RunTotals::default(),
        by_streamer: BTreeMap::new(),
    };
    for run in &runs {
        summary.runs += 1;
        summary.dry_runs += u32::from(run.dry_run);
        summary.quota_exhausted_runs += u32::from(run.quota_exhausted);
        summary.errored_runs += u32::from(run.error.is_some());
        for result in &run.streamers {
            summary.totals.add(result);
            summary
                .by_streamer
                .entry(result.streamer.clone())
                .or_default()
                .add(result);
        }
    }
    Ok(summary)
}
