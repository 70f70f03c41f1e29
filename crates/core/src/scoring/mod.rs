//! Clip scoring and ranking.
//!
//! A clip's score combines view density (views per second of footage) with
//! view velocity (views per hour of age). An optional title heuristic and the
//! streamer's historical performance multiplier scale the result.

mod config;
mod engine;
mod title;

pub use config::{AgeDecay, ScoringConfig, ViewTransform};
pub use engine::{clamp_multiplier, ScoringEngine, MAX_MULTIPLIER, MIN_MULTIPLIER};
pub use title::title_quality_bonus;
