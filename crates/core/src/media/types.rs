//! Layout hints and probed media information.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A rectangle in source-frame coordinates, as fractions of width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Region {
    pub fn validate(&self) -> Result<(), String> {
        let values = [self.x, self.y, self.w, self.h];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0 || *v > 1.0) {
            return Err("region values must be fractions in [0, 1]".to_string());
        }
        if self.w == 0.0 || self.h == 0.0 {
            return Err("region must have a non-zero size".to_string());
        }
        if self.x + self.w > 1.0 || self.y + self.h > 1.0 {
            return Err("region extends past the frame".to_string());
        }
        Ok(())
    }
}

/// Per-streamer hints for cropping landscape footage into a vertical frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutHints {
    /// Facecam location in the source frame. When set, the facecam is stacked
    /// above a center crop of the gameplay.
    #[serde(default)]
    pub facecam: Option<Region>,
    /// Share of the output height given to the facecam.
    #[serde(default = "default_facecam_share")]
    pub facecam_share: f64,
}

fn default_facecam_share() -> f64 {
    0.35
}

impl Default for LayoutHints {
    fn default() -> Self {
        Self {
            facecam: None,
            facecam_share: default_facecam_share(),
        }
    }
}

impl LayoutHints {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(region) = &self.facecam {
            region.validate().map_err(|e| format!("facecam {}", e))?;
        }
        if !(self.facecam_share > 0.0 && self.facecam_share < 1.0) {
            return Err(format!(
                "facecam_share must be in (0, 1), got {}",
                self.facecam_share
            ));
        }
        Ok(())
    }
}

/// Information about a media file (from ffprobe).
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration_secs: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f32>,
    pub video_bitrate_kbps: Option<u32>,
    pub has_audio: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_valid() {
        assert!(LayoutHints::default().validate().is_ok());
    }

    #[test]
    fn test_region_validation() {
        let ok = Region {
            x: 0.7,
            y: 0.0,
            w: 0.3,
            h: 0.3,
        };
        assert!(ok.validate().is_ok());

        let past_edge = Region { x: 0.8, ..ok };
        assert!(past_edge.validate().is_err());

        let empty = Region { w: 0.0, ..ok };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_layout_share_bounds() {
        let hints = LayoutHints {
            facecam_share: 1.0,
            ..Default::default()
        };
        assert!(hints.validate().is_err());
    }

    #[test]
    fn test_layout_from_toml() {
        let hints: LayoutHints = toml::from_str(
            r#"
            facecam = { x = 0.0, y = 0.7, w = 0.25, h = 0.3 }
            "#,
        )
        .unwrap();
        assert_eq!(hints.facecam_share, 0.35);
        assert!(hints.validate().is_ok());
    }
}
