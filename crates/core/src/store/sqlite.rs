//! SQLite-backed clip store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::clip::{format_timestamp, parse_timestamp, ClipRecord};
use crate::pipeline::PipelineRun;
use crate::scoring::clamp_multiplier;

use super::traits::{ClipStore, PerformanceHistory, StoreError};
use super::types::{PerformanceUpdate, StreamerStats, ROLLING_STATS_DAYS};

/// Minimum CTR samples before a streamer's multiplier departs from 1.0.
const MIN_MULTIPLIER_SAMPLES: i64 = 3;

const CLIP_COLUMNS: &str = "clip_id, streamer, title, view_count, created_at, duration_secs, \
     game_id, game_name, vod_id, vod_offset, score, remote_id, posted_at, yt_views, yt_likes, \
     yt_comments, yt_ctr, fail_count";

/// `col` takes the incoming value unless it is null.
fn keep_non_null(col: &str) -> String {
    format!("{col} = COALESCE(excluded.{col}, clips.{col})")
}

/// `col` takes the incoming value only when it is non-null and larger.
fn keep_max(col: &str) -> String {
    format!(
        "{col} = CASE WHEN excluded.{col} IS NULL THEN clips.{col} \
         WHEN clips.{col} IS NULL OR excluded.{col} > clips.{col} THEN excluded.{col} \
         ELSE clips.{col} END"
    )
}

static UPSERT_SQL: Lazy<String> = Lazy::new(|| {
    let mut sets: Vec<String> = [
        "title",
        "created_at",
        "duration_secs",
        "game_id",
        "game_name",
        "vod_id",
        "vod_offset",
        "score",
        "remote_id",
        "posted_at",
    ]
    .iter()
    .map(|c| keep_non_null(c))
    .collect();
    sets.extend(
        ["view_count", "yt_views", "yt_likes", "yt_comments", "yt_ctr"]
            .iter()
            .map(|c| keep_max(c)),
    );
    sets.push("streamer = excluded.streamer".to_string());
    sets.push("updated_at = excluded.updated_at".to_string());

    format!(
        "INSERT INTO clips (clip_id, streamer, title, view_count, created_at, duration_secs, \
         game_id, game_name, vod_id, vod_offset, score, remote_id, posted_at, yt_views, \
         yt_likes, yt_comments, yt_ctr, fail_count, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, 0, ?18) \
         ON CONFLICT(clip_id) DO UPDATE SET {}",
        sets.join(", ")
    )
});

static PERFORMANCE_SQL: Lazy<String> = Lazy::new(|| {
    let sets: Vec<String> = [
        ("yt_views", "?2"),
        ("yt_likes", "?3"),
        ("yt_comments", "?4"),
        ("yt_ctr", "?5"),
    ]
    .iter()
    .map(|(col, p)| {
        format!(
            "{col} = CASE WHEN {p} IS NULL THEN {col} \
             WHEN {col} IS NULL OR {p} > {col} THEN {p} ELSE {col} END"
        )
    })
    .collect();
    format!(
        "UPDATE clips SET {}, updated_at = ?6 WHERE clip_id = ?1",
        sets.join(", ")
    )
});

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn to_u64(v: i64) -> u64 {
    v.max(0) as u64
}

const EARLIEST_TIMESTAMP: &str = "0000-01-01T00:00:00.000Z";
const LATEST_TIMESTAMP: &str = "9999-12-31T23:59:59.999Z";

/// `at - span` as a storage timestamp, clamped to the first four-digit year.
fn timestamp_before(at: DateTime<Utc>, span: chrono::Duration) -> String {
    at.checked_sub_signed(span)
        .filter(|t| t.year() >= 1)
        .map(format_timestamp)
        .unwrap_or_else(|| EARLIEST_TIMESTAMP.to_string())
}

/// `at + span` as a storage timestamp, clamped to the last four-digit year.
fn timestamp_after(at: DateTime<Utc>, span: chrono::Duration) -> String {
    at.checked_add_signed(span)
        .filter(|t| t.year() <= 9999)
        .map(format_timestamp)
        .unwrap_or_else(|| LATEST_TIMESTAMP.to_string())
}

/// SQLite-backed clip store.
///
/// One connection per run, in WAL mode so readers are not blocked while the
/// run writes.
pub struct SqliteClipStore {
    conn: Mutex<Connection>,
}

impl SqliteClipStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "Opened clip store");
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS clips (
                clip_id TEXT PRIMARY KEY,
                streamer TEXT NOT NULL,
                title TEXT,
                view_count INTEGER,
                created_at TEXT NOT NULL,
                duration_secs REAL,
                game_id TEXT,
                game_name TEXT,
                vod_id TEXT,
                vod_offset INTEGER,
                score REAL,
                remote_id TEXT,
                posted_at TEXT,
                yt_views INTEGER,
                yt_likes INTEGER,
                yt_comments INTEGER,
                yt_ctr REAL,
                fail_count INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_clips_streamer_created ON clips(streamer, created_at);
            CREATE INDEX IF NOT EXISTS idx_clips_streamer_posted ON clips(streamer, posted_at);
            CREATE INDEX IF NOT EXISTS idx_clips_vod ON clips(vod_id);

            CREATE TABLE IF NOT EXISTS streamer_stats (
                streamer TEXT PRIMARY KEY,
                uploads INTEGER NOT NULL,
                avg_views REAL,
                avg_ctr REAL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS runs (
                run_id TEXT PRIMARY KEY,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                trigger TEXT NOT NULL,
                dry_run INTEGER NOT NULL,
                fetched INTEGER NOT NULL,
                filtered INTEGER NOT NULL,
                downloaded INTEGER NOT NULL,
                processed INTEGER NOT NULL,
                uploaded INTEGER NOT NULL,
                failed INTEGER NOT NULL,
                quota_exhausted INTEGER NOT NULL,
                error TEXT,
                payload TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs(started_at);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ClipRecord> {
        let created_at: String = row.get(4)?;
        let posted_at: Option<String> = row.get(12)?;

        Ok(ClipRecord {
            clip_id: row.get(0)?,
            streamer: row.get(1)?,
            title: row.get(2)?,
            view_count: row.get::<_, Option<i64>>(3)?.map(to_u64),
            // Timestamps are written by this store; fall back to the epoch
            // rather than failing the whole query on a hand-edited row.
            created_at: parse_timestamp(&created_at).unwrap_or_default(),
            duration_secs: row.get(5)?,
            game_id: row.get(6)?,
            game_name: row.get(7)?,
            vod_id: row.get(8)?,
            vod_offset: row.get(9)?,
            score: row.get(10)?,
            remote_id: row.get(11)?,
            posted_at: posted_at.as_deref().and_then(parse_timestamp),
            yt_views: row.get::<_, Option<i64>>(13)?.map(to_u64),
            yt_likes: row.get::<_, Option<i64>>(14)?.map(to_u64),
            yt_comments: row.get::<_, Option<i64>>(15)?.map(to_u64),
            yt_ctr: row.get(16)?,
            fail_count: row.get(17)?,
        })
    }

    fn query_records(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<ClipRecord>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// [`PerformanceHistory::recent_upload_count`] relative to `now`.
    pub fn recent_upload_count_at(
        &self,
        streamer: &str,
        window_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        let since = timestamp_before(now, chrono::Duration::hours(i64::from(window_hours)));
        let conn = self.conn()?;
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM clips \
             WHERE streamer = ?1 AND remote_id IS NOT NULL AND posted_at IS NOT NULL \
             AND posted_at >= ?2 AND posted_at <= ?3",
            params![streamer, since, format_timestamp(now)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// [`PerformanceHistory::performance_multiplier`] relative to `now`.
    pub fn performance_multiplier_at(
        &self,
        streamer: &str,
        now: DateTime<Utc>,
    ) -> Result<f64, StoreError> {
        let since = format_timestamp(now - chrono::Duration::days(ROLLING_STATS_DAYS));
        let conn = self.conn()?;

        let (samples, streamer_avg): (i64, Option<f64>) = conn.query_row(
            "SELECT COUNT(yt_ctr), AVG(yt_ctr) FROM clips \
             WHERE streamer = ?1 AND remote_id IS NOT NULL AND yt_ctr IS NOT NULL \
             AND posted_at >= ?2",
            params![streamer, since],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        if samples < MIN_MULTIPLIER_SAMPLES {
            return Ok(1.0);
        }

        let global_avg: Option<f64> = conn.query_row(
            "SELECT AVG(yt_ctr) FROM clips \
             WHERE remote_id IS NOT NULL AND yt_ctr IS NOT NULL AND posted_at >= ?1",
            params![since],
            |row| row.get(0),
        )?;

        match (streamer_avg, global_avg) {
            (Some(s), Some(g)) if g > 0.0 => Ok(clamp_multiplier(s / g)),
            _ => Ok(1.0),
        }
    }

    /// [`PerformanceHistory::update_rolling_stats`] relative to `now`.
    pub fn update_rolling_stats_at(
        &self,
        streamer: &str,
        now: DateTime<Utc>,
    ) -> Result<StreamerStats, StoreError> {
        let since = format_timestamp(now - chrono::Duration::days(ROLLING_STATS_DAYS));
        let conn = self.conn()?;

        let (uploads, avg_views, avg_ctr): (u32, Option<f64>, Option<f64>) = conn.query_row(
            "SELECT COUNT(*), AVG(yt_views), AVG(yt_ctr) FROM clips \
             WHERE streamer = ?1 AND remote_id IS NOT NULL AND posted_at >= ?2",
            params![streamer, since],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        conn.execute(
            "INSERT INTO streamer_stats (streamer, uploads, avg_views, avg_ctr, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(streamer) DO UPDATE SET uploads = excluded.uploads, \
             avg_views = excluded.avg_views, avg_ctr = excluded.avg_ctr, \
             updated_at = excluded.updated_at",
            params![streamer, uploads, avg_views, avg_ctr, format_timestamp(now)],
        )?;

        Ok(StreamerStats {
            streamer: streamer.to_string(),
            uploads,
            avg_views,
            avg_ctr,
            updated_at: now,
        })
    }

    /// Last computed rolling statistics for a streamer.
    pub fn streamer_stats(&self, streamer: &str) -> Result<Option<StreamerStats>, StoreError> {
        let conn = self.conn()?;
        let stats = conn
            .query_row(
                "SELECT streamer, uploads, avg_views, avg_ctr, updated_at \
                 FROM streamer_stats WHERE streamer = ?1",
                params![streamer],
                |row| {
                    let updated_at: String = row.get(4)?;
                    Ok(StreamerStats {
                        streamer: row.get(0)?,
                        uploads: row.get(1)?,
                        avg_views: row.get(2)?,
                        avg_ctr: row.get(3)?,
                        updated_at: parse_timestamp(&updated_at).unwrap_or_default(),
                    })
                },
            )
            .optional()?;
        Ok(stats)
    }
}

impl ClipStore for SqliteClipStore {
    fn clip_exists(&self, clip_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM clips WHERE clip_id = ?1)",
            params![clip_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn get_clip(&self, clip_id: &str) -> Result<Option<ClipRecord>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM clips WHERE clip_id = ?1", CLIP_COLUMNS);
        let record = conn
            .query_row(&sql, params![clip_id], Self::row_to_record)
            .optional()?;
        Ok(record)
    }

    fn find_near(
        &self,
        streamer: &str,
        created_at: DateTime<Utc>,
        window_secs: i64,
        exclude_id: &str,
    ) -> Result<Vec<ClipRecord>, StoreError> {
        let window = chrono::Duration::try_seconds(window_secs).unwrap_or(chrono::Duration::MAX);
        let lo = timestamp_before(created_at, window);
        let hi = timestamp_after(created_at, window);

        let conn = self.conn()?;
        // The string range is a coarse prefilter over the indexed column;
        // the elapsed-time check below is the real test.
        let sql = format!(
            "SELECT {} FROM clips WHERE streamer = ?1 AND clip_id != ?2 \
             AND created_at >= ?3 AND created_at <= ?4",
            CLIP_COLUMNS
        );
        let candidates = Self::query_records(&conn, &sql, &[&streamer, &exclude_id, &lo, &hi])?;

        Ok(candidates
            .into_iter()
            .filter(|r| (r.created_at - created_at).abs() <= window)
            .collect())
    }

    fn find_by_vod(&self, vod_id: &str, exclude_id: &str) -> Result<Vec<ClipRecord>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM clips WHERE vod_id = ?1 AND clip_id != ?2 AND vod_offset IS NOT NULL",
            CLIP_COLUMNS
        );
        Self::query_records(&conn, &sql, &[&vod_id, &exclude_id])
    }

    fn upsert_clip(&self, record: &ClipRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            UPSERT_SQL.as_str(),
            params![
                record.clip_id,
                record.streamer,
                record.title,
                record.view_count.map(to_i64),
                format_timestamp(record.created_at),
                record.duration_secs,
                record.game_id,
                record.game_name,
                record.vod_id,
                record.vod_offset,
                record.score,
                record.remote_id,
                record.posted_at.map(format_timestamp),
                record.yt_views.map(to_i64),
                record.yt_likes.map(to_i64),
                record.yt_comments.map(to_i64),
                record.yt_ctr,
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(())
    }

    fn increment_fail_count(&self, record: &ClipRecord) -> Result<u32, StoreError> {
        let conn = self.conn()?;
        let now = format_timestamp(Utc::now());
        conn.execute(
            "INSERT INTO clips (clip_id, streamer, title, view_count, created_at, duration_secs, \
             game_id, game_name, vod_id, vod_offset, score, fail_count, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1, ?12) \
             ON CONFLICT(clip_id) DO UPDATE SET fail_count = clips.fail_count + 1, \
             updated_at = excluded.updated_at",
            params![
                record.clip_id,
                record.streamer,
                record.title,
                record.view_count.map(to_i64),
                format_timestamp(record.created_at),
                record.duration_secs,
                record.game_id,
                record.game_name,
                record.vod_id,
                record.vod_offset,
                record.score,
                now,
            ],
        )?;
        let count: u32 = conn.query_row(
            "SELECT fail_count FROM clips WHERE clip_id = ?1",
            params![record.clip_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn record_performance(
        &self,
        clip_id: &str,
        update: &PerformanceUpdate,
    ) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            PERFORMANCE_SQL.as_str(),
            params![
                clip_id,
                update.views.map(to_i64),
                update.likes.map(to_i64),
                update.comments.map(to_i64),
                update.ctr,
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(changed > 0)
    }

    fn record_run(&self, run: &PipelineRun) -> Result<(), StoreError> {
        let payload = serde_json::to_string(run)?;
        let totals = &run.totals;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO runs (run_id, started_at, finished_at, trigger, dry_run, \
             fetched, filtered, downloaded, processed, uploaded, failed, quota_exhausted, error, \
             payload) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                run.run_id,
                format_timestamp(run.started_at),
                run.finished_at.map(format_timestamp),
                run.trigger,
                run.dry_run,
                totals.fetched,
                totals.filtered,
                totals.downloaded,
                totals.processed,
                totals.uploaded,
                totals.failed,
                run.quota_exhausted,
                run.error,
                payload,
            ],
        )?;
        Ok(())
    }

    fn runs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PipelineRun>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT payload FROM runs WHERE started_at >= ?1 AND started_at < ?2 \
             ORDER BY started_at ASC",
        )?;
        let rows = stmt.query_map(
            params![format_timestamp(from), format_timestamp(to)],
            |row| row.get::<_, String>(0),
        )?;

        let mut runs = Vec::new();
        for payload in rows {
            runs.push(serde_json::from_str(&payload?)?);
        }
        Ok(runs)
    }

    fn checkpoint(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }
}

impl PerformanceHistory for SqliteClipStore {
    fn performance_multiplier(&self, streamer: &str) -> Result<f64, StoreError> {
        self.performance_multiplier_at(streamer, Utc::now())
    }

    fn recent_upload_count(&self, streamer: &str, window_hours: u32) -> Result<u32, StoreError> {
        self.recent_upload_count_at(streamer, window_hours, Utc::now())
    }

    fn update_rolling_stats(&self, streamer: &str) -> Result<StreamerStats, StoreError> {
        self.update_rolling_stats_at(streamer, Utc::now())
    }
}
