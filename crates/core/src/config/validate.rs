use std::collections::HashSet;

use super::{types::Config, ConfigError};

/// Upper bound for hour-based windows (one year).
const MAX_WINDOW_HOURS: u32 = 24 * 366;

/// Upper bound for the dedup window (one day).
const MAX_DEDUP_WINDOW_SECS: i64 = 86_400;

/// Validate configuration before any work starts.
///
/// Checks:
/// - at least one streamer, with unique non-empty names and twitch ids
/// - scoring weights are finite and non-negative
/// - pipeline limits are at least 1
/// - spacing and lookback windows are non-zero and at most a year
/// - the dedup window is between zero and one day
/// - the posting window timezone and ranges parse
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.streamers.is_empty() {
        return Err(invalid("at least one [[streamers]] entry is required"));
    }

    let mut names = HashSet::new();
    for streamer in &config.streamers {
        if streamer.name.trim().is_empty() {
            return Err(invalid("streamer name cannot be empty"));
        }
        if streamer.twitch_id.trim().is_empty() {
            return Err(invalid(format!(
                "streamer '{}' has an empty twitch_id",
                streamer.name
            )));
        }
        if !names.insert(streamer.name.as_str()) {
            return Err(invalid(format!(
                "streamer '{}' is configured more than once",
                streamer.name
            )));
        }
        if streamer.window_hours == Some(0) {
            return Err(invalid(format!(
                "streamer '{}': window_hours cannot be 0",
                streamer.name
            )));
        }
        if streamer.window_hours.is_some_and(|h| h > MAX_WINDOW_HOURS) {
            return Err(invalid(format!(
                "streamer '{}': window_hours cannot exceed {}",
                streamer.name, MAX_WINDOW_HOURS
            )));
        }
        streamer
            .layout
            .validate()
            .map_err(|e| invalid(format!("streamer '{}': {}", streamer.name, e)))?;
    }

    let scoring = &config.scoring;
    for (name, value) in [
        ("scoring.velocity_weight", scoring.velocity_weight),
        ("scoring.title_quality_weight", scoring.title_quality_weight),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(format!("{} must be a non-negative number", name)));
        }
    }

    if config.pipeline.max_clips_per_streamer == 0 {
        return Err(invalid("pipeline.max_clips_per_streamer cannot be 0"));
    }
    if config.pipeline.forbidden_breaker_threshold == 0 {
        return Err(invalid("pipeline.forbidden_breaker_threshold cannot be 0"));
    }
    for (name, hours) in [
        ("pipeline.lookback_hours", config.pipeline.lookback_hours),
        ("schedule.window_hours", config.schedule.window_hours),
    ] {
        if hours == 0 {
            return Err(invalid(format!("{} cannot be 0", name)));
        }
        if hours > MAX_WINDOW_HOURS {
            return Err(invalid(format!("{} cannot exceed {}", name, MAX_WINDOW_HOURS)));
        }
    }
    if config.dedup.window_secs < 0 {
        return Err(invalid("dedup.window_secs cannot be negative"));
    }
    if config.dedup.window_secs > MAX_DEDUP_WINDOW_SECS {
        return Err(invalid(format!(
            "dedup.window_secs cannot exceed {}",
            MAX_DEDUP_WINDOW_SECS
        )));
    }
    if !config.quality.min_score.is_finite() {
        return Err(invalid("quality.min_score must be a number"));
    }

    if let Some(window) = &config.schedule.posting_window {
        window
            .validate()
            .map_err(|e| invalid(format!("schedule.posting_window: {}", e)))?;
    }

    Ok(())
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_from_str, StreamerConfig};

    fn valid_config() -> Config {
        Config {
            streamers: vec![StreamerConfig::new("alpha", "1001")],
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_requires_streamers() {
        let config = Config::default();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_duplicate_streamer_names() {
        let mut config = valid_config();
        config.streamers.push(StreamerConfig::new("alpha", "2002"));
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_negative_weight() {
        let mut config = valid_config();
        config.scoring.velocity_weight = -1.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_breaker_threshold() {
        let mut config = valid_config();
        config.pipeline.forbidden_breaker_threshold = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_windows() {
        let mut config = valid_config();
        config.schedule.window_hours = u32::MAX;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("schedule.window_hours"));

        let mut config = valid_config();
        config.streamers[0].window_hours = Some(u32::MAX);
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.pipeline.lookback_hours = u32::MAX;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.dedup.window_secs = i64::MAX;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("dedup.window_secs"));

        let mut config = valid_config();
        config.schedule.window_hours = MAX_WINDOW_HOURS;
        config.dedup.window_secs = MAX_DEDUP_WINDOW_SECS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_bad_timezone() {
        let config = load_config_from_str(
            r#"
[schedule.posting_window]
timezone = "Mars/Olympus_Mons"
weekday = ["09:00-17:00"]

[[streamers]]
name = "alpha"
twitch_id = "1001"
"#,
        )
        .unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("timezone"));
    }
}
