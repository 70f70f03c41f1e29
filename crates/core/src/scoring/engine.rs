//! Scoring engine implementation.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::clip::Clip;
use crate::store::PerformanceHistory;

use super::config::{AgeDecay, ScoringConfig, ViewTransform};
use super::title::title_quality_bonus;

pub const MIN_MULTIPLIER: f64 = 0.5;
pub const MAX_MULTIPLIER: f64 = 2.0;

const MIN_AGE_HOURS: f64 = 0.1;
const MIN_AGE_TERM: f64 = 0.1;
const MIN_DURATION_SECS: f64 = 1.0;

/// Clamp a performance multiplier into `[0.5, 2.0]`. Non-finite values map to 1.0.
pub fn clamp_multiplier(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(MIN_MULTIPLIER, MAX_MULTIPLIER)
    } else {
        1.0
    }
}

/// Scores and ranks candidate clips.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a clip with the configured weights.
    pub fn score(&self, clip: &Clip, now: DateTime<Utc>) -> f64 {
        Self::score_with(
            clip,
            now,
            self.config.velocity_weight,
            self.config.age_decay,
            self.config.view_transform,
            self.config.title_quality_weight,
        )
    }

    /// Score a clip with explicit weights.
    ///
    /// `score = density + velocity * velocity_weight`, where density is views
    /// per second of footage and velocity is views per (decayed) hour of age,
    /// then scaled by `1 + title_quality_weight * bonus`.
    pub fn score_with(
        clip: &Clip,
        now: DateTime<Utc>,
        velocity_weight: f64,
        age_decay: AgeDecay,
        view_transform: ViewTransform,
        title_quality_weight: f64,
    ) -> f64 {
        let age_hours = clip.age_hours(now).max(MIN_AGE_HOURS);
        let age_term = match age_decay {
            AgeDecay::Log => age_hours.ln_1p().max(MIN_AGE_TERM),
            AgeDecay::Linear => age_hours,
        };

        let views = clip.view_count as f64;
        let views_term = match view_transform {
            ViewTransform::Log => views.ln_1p(),
            ViewTransform::Linear => views,
        };

        let velocity = views_term / age_term;
        let density = views_term / clip.duration_secs.max(MIN_DURATION_SECS);
        let mut score = density + velocity * velocity_weight;

        if title_quality_weight > 0.0 {
            score *= 1.0 + title_quality_weight * title_quality_bonus(&clip.title);
        }

        score
    }

    /// Drop clips under `min_view_count`, score the rest, apply the streamer
    /// multiplier and sort descending. Ties keep their input order.
    pub fn filter_and_rank(
        &self,
        clips: Vec<Clip>,
        multiplier: f64,
        now: DateTime<Utc>,
    ) -> Vec<Clip> {
        let multiplier = clamp_multiplier(multiplier);

        let mut ranked: Vec<Clip> = clips
            .into_iter()
            .filter(|c| c.view_count >= self.config.min_view_count)
            .map(|mut c| {
                c.score = self.score(&c, now) * multiplier;
                c
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    /// Rank a streamer's candidates using its historical multiplier.
    ///
    /// A history failure falls back to a neutral multiplier.
    pub fn rank(
        &self,
        clips: Vec<Clip>,
        history: &dyn PerformanceHistory,
        streamer: &str,
        now: DateTime<Utc>,
    ) -> Vec<Clip> {
        let multiplier = match history.performance_multiplier(streamer) {
            Ok(m) => m,
            Err(e) => {
                warn!(streamer, error = %e, "Performance multiplier unavailable, using 1.0");
                1.0
            }
        };
        debug!(streamer, multiplier, candidates = clips.len(), "Ranking candidates");
        self.filter_and_rank(clips, multiplier, now)
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockHistory};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn clip_aged(id: &str, views: u64, duration: f64, age: Duration) -> Clip {
        let mut clip = fixtures::clip(id, "alpha", views);
        clip.duration_secs = duration;
        clip.created_at = now() - age;
        clip
    }

    #[test]
    fn test_reference_score() {
        let clip = clip_aged("c1", 1000, 30.0, Duration::hours(1));
        let score = ScoringEngine::score_with(
            &clip,
            now(),
            2.0,
            AgeDecay::Linear,
            ViewTransform::Linear,
            0.0,
        );
        assert!((score - 2033.33).abs() < 5.0, "score was {}", score);
    }

    #[test]
    fn test_age_floor_applies_to_fresh_and_future_clips() {
        let fresh = clip_aged("c1", 100, 10.0, Duration::seconds(0));
        let future = clip_aged("c2", 100, 10.0, Duration::hours(-3));
        let engine = ScoringEngine::default();

        // age clamps to 0.1h: velocity = 100 / 0.1 = 1000
        let expected = 100.0 / 10.0 + 1000.0 * 2.0;
        assert!((engine.score(&fresh, now()) - expected).abs() < 1e-6);
        assert!((engine.score(&future, now()) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_log_age_term_floor() {
        let clip = clip_aged("c1", 100, 10.0, Duration::seconds(0));
        let score =
            ScoringEngine::score_with(&clip, now(), 1.0, AgeDecay::Log, ViewTransform::Linear, 0.0);
        // ln(1.1) ~ 0.0953 < 0.1, so the term floors at 0.1
        assert!((score - (10.0 + 1000.0)).abs() < 1e-6);
    }

    #[test]
    fn test_zero_duration_uses_one_second() {
        let clip = clip_aged("c1", 50, 0.0, Duration::hours(10));
        let score = ScoringEngine::score_with(
            &clip,
            now(),
            0.0,
            AgeDecay::Linear,
            ViewTransform::Linear,
            0.0,
        );
        assert!((score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_scores_are_finite_and_non_negative() {
        let engine = ScoringEngine::new(ScoringConfig {
            title_quality_weight: 0.5,
            ..Default::default()
        });
        let ages = [0, 1, 24, 24 * 365];
        let views = [0u64, 1, 17, 1_000_000, u64::MAX];
        for age in ages {
            for v in views {
                for duration in [0.0, 0.5, 30.0, 600.0] {
                    let clip = clip_aged("c", v, duration, Duration::hours(age));
                    let s = engine.score(&clip, now());
                    assert!(s.is_finite(), "score not finite for views={}", v);
                    assert!(s >= 0.0);
                    if v > 0 {
                        assert!(s > 0.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_velocity_weight_is_monotonic() {
        let clip = clip_aged("c1", 500, 20.0, Duration::hours(5));
        let mut previous = f64::MIN;
        for w in [0.0, 0.5, 1.0, 2.0, 4.0, 8.0] {
            let s = ScoringEngine::score_with(
                &clip,
                now(),
                w,
                AgeDecay::Linear,
                ViewTransform::Log,
                0.0,
            );
            assert!(s >= previous);
            previous = s;
        }
    }

    #[test]
    fn test_title_bonus_scales_score() {
        let mut clip = clip_aged("c1", 1000, 30.0, Duration::hours(1));
        clip.title = "INSANE 1V5 CLUTCH!".to_string();
        let base = ScoringEngine::score_with(
            &clip,
            now(),
            2.0,
            AgeDecay::Linear,
            ViewTransform::Linear,
            0.0,
        );
        let boosted = ScoringEngine::score_with(
            &clip,
            now(),
            2.0,
            AgeDecay::Linear,
            ViewTransform::Linear,
            0.5,
        );
        assert!((boosted - base * 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_filter_and_rank_orders_and_filters() {
        let engine = ScoringEngine::new(ScoringConfig {
            min_view_count: 10,
            ..Default::default()
        });
        let clips = vec![
            clip_aged("low", 5, 30.0, Duration::hours(1)),
            clip_aged("mid", 100, 30.0, Duration::hours(1)),
            clip_aged("top", 1000, 30.0, Duration::hours(1)),
        ];
        let ranked = engine.filter_and_rank(clips, 1.0, now());
        let ids: Vec<_> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["top", "mid"]);
    }

    #[test]
    fn test_filter_and_rank_is_stable_for_ties() {
        let engine = ScoringEngine::default();
        let clips = vec![
            clip_aged("first", 100, 30.0, Duration::hours(2)),
            clip_aged("second", 100, 30.0, Duration::hours(2)),
        ];
        let ranked = engine.filter_and_rank(clips, 1.0, now());
        assert_eq!(ranked[0].id, "first");
        assert_eq!(ranked[1].id, "second");
    }

    #[test]
    fn test_multiplier_is_clamped() {
        let engine = ScoringEngine::default();
        let clip = clip_aged("c1", 1000, 30.0, Duration::hours(1));
        let base = engine.score(&clip, now());

        let high = engine.filter_and_rank(vec![clip.clone()], 10.0, now());
        assert!((high[0].score - base * 2.0).abs() < 1e-6);

        let low = engine.filter_and_rank(vec![clip.clone()], 0.01, now());
        assert!((low[0].score - base * 0.5).abs() < 1e-6);

        let nan = engine.filter_and_rank(vec![clip], f64::NAN, now());
        assert!((nan[0].score - base).abs() < 1e-6);
    }

    #[test]
    fn test_rank_uses_history_multiplier() {
        let history = MockHistory::new();
        history.set_multiplier("alpha", 1.5);
        let engine = ScoringEngine::default();
        let clip = clip_aged("c1", 1000, 30.0, Duration::hours(1));
        let base = engine.score(&clip, now());

        let ranked = engine.rank(vec![clip], &history, "alpha", now());
        assert!((ranked[0].score - base * 1.5).abs() < 1e-6);
    }
}
