//! Scoring configuration.

use serde::{Deserialize, Serialize};

/// How clip age dampens velocity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeDecay {
    /// Divide by age in hours.
    #[default]
    Linear,
    /// Divide by `ln(1 + age_hours)`.
    Log,
}

/// How raw view counts enter the score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewTransform {
    #[default]
    Linear,
    /// `ln(1 + view_count)`, compresses viral outliers.
    Log,
}

/// Configuration for the scoring engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Weight of view velocity relative to view density.
    #[serde(default = "default_velocity_weight")]
    pub velocity_weight: f64,
    #[serde(default)]
    pub age_decay: AgeDecay,
    #[serde(default)]
    pub view_transform: ViewTransform,
    /// Title heuristic weight. 0 disables the bonus.
    #[serde(default)]
    pub title_quality_weight: f64,
    /// Clips below this view count are dropped before ranking.
    #[serde(default)]
    pub min_view_count: u64,
}

fn default_velocity_weight() -> f64 {
    2.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            velocity_weight: default_velocity_weight(),
            age_decay: AgeDecay::default(),
            view_transform: ViewTransform::default(),
            title_quality_weight: 0.0,
            min_view_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScoringConfig::default();
        assert_eq!(config.velocity_weight, 2.0);
        assert_eq!(config.age_decay, AgeDecay::Linear);
        assert_eq!(config.view_transform, ViewTransform::Linear);
        assert_eq!(config.title_quality_weight, 0.0);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            velocity_weight = 1.5
            age_decay = "log"
            view_transform = "log"
            title_quality_weight = 0.2
            min_view_count = 50
        "#;
        let config: ScoringConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.velocity_weight, 1.5);
        assert_eq!(config.age_decay, AgeDecay::Log);
        assert_eq!(config.view_transform, ViewTransform::Log);
        assert_eq!(config.title_quality_weight, 0.2);
        assert_eq!(config.min_view_count, 50);
    }
}
