use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Nested keys are separated by a double underscore, so
/// `CLIPLINE_PIPELINE__DRY_RUN=true` sets `pipeline.dry_run`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("CLIPLINE_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[pipeline]
dry_run = true

[[streamers]]
name = "alpha"
twitch_id = "1001"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert!(config.pipeline.dry_run);
        assert_eq!(config.streamers.len(), 1);
        assert_eq!(config.streamers[0].twitch_id, "1001");
    }

    #[test]
    fn test_load_config_from_str_streamer_missing_id() {
        let toml = r#"
[[streamers]]
name = "alpha"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/clipline.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[database]
path = "/var/lib/clipline/clips.db"

[schedule]
max_uploads_per_window = 4

[[streamers]]
name = "alpha"
twitch_id = "1001"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.schedule.max_uploads_per_window, 4);
        assert_eq!(
            config.database.path.to_str().unwrap(),
            "/var/lib/clipline/clips.db"
        );
    }
}
