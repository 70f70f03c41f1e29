//! Deduplication of ranked candidates against clip history.

use chrono::Duration;
use tracing::debug;

use crate::clip::Clip;
use crate::config::DedupConfig;
use crate::store::{ClipStore, StoreError};

/// Half-open interval overlap: `[a_start, a_end)` and `[b_start, b_end)`.
pub fn ranges_overlap(a_start: f64, a_end: f64, b_start: f64, b_end: f64) -> bool {
    a_start < b_end && b_start < a_end
}

/// Drops candidates that are already stored or that overlap a stored clip.
///
/// Candidates are checked in input (rank) order, and each admitted candidate
/// also blocks later candidates of the same batch, so of two near-simultaneous
/// clips only the better-ranked one survives.
pub struct DedupFilter<'a> {
    store: &'a dyn ClipStore,
    window_secs: i64,
    window: Duration,
    position_dedup: bool,
}

impl<'a> DedupFilter<'a> {
    pub fn new(store: &'a dyn ClipStore, config: &DedupConfig) -> Self {
        Self {
            store,
            window_secs: config.window_secs,
            window: Duration::try_seconds(config.window_secs).unwrap_or(Duration::MAX),
            position_dedup: config.position_dedup,
        }
    }

    pub fn filter_new(&self, candidates: Vec<Clip>) -> Result<Vec<Clip>, StoreError> {
        let mut admitted: Vec<Clip> = Vec::with_capacity(candidates.len());

        for clip in candidates {
            if let Some(reason) = self.duplicate_reason(&clip, &admitted)? {
                debug!(clip_id = %clip.id, streamer = %clip.streamer, reason, "Dropping duplicate candidate");
                continue;
            }
            admitted.push(clip);
        }

        Ok(admitted)
    }

    fn duplicate_reason(
        &self,
        clip: &Clip,
        admitted: &[Clip],
    ) -> Result<Option<&'static str>, StoreError> {
        if self.store.clip_exists(&clip.id)? {
            return Ok(Some("known_id"));
        }

        let near_in_batch = admitted.iter().any(|other| {
            other.streamer == clip.streamer
                && (other.created_at - clip.created_at).abs() <= self.window
        });
        if near_in_batch {
            return Ok(Some("time_window"));
        }
        let near_stored =
            self.store
                .find_near(&clip.streamer, clip.created_at, self.window_secs, &clip.id)?;
        if !near_stored.is_empty() {
            return Ok(Some("time_window"));
        }

        if !self.position_dedup {
            return Ok(None);
        }
        let Some((vod_id, start, end)) = clip.vod_range() else {
            return Ok(None);
        };

        let overlaps_batch = admitted.iter().any(|other| {
            other
                .vod_range()
                .is_some_and(|(v, s, e)| v == vod_id && ranges_overlap(start, end, s, e))
        });
        if overlaps_batch {
            return Ok(Some("vod_overlap"));
        }

        let overlaps_stored = self
            .store
            .find_by_vod(vod_id, &clip.id)?
            .iter()
            .any(|r| match r.vod_offset {
                Some(offset) => {
                    let s = f64::from(offset);
                    let e = s + r.duration_secs.unwrap_or(0.0).max(0.0);
                    ranges_overlap(start, end, s, e)
                }
                None => false,
            });
        if overlaps_stored {
            return Ok(Some("vod_overlap"));
        }

        Ok(None)
    }
}
