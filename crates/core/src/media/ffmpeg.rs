//! FFmpeg-based vertical video transformer.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::config::MediaConfig;
use super::error::MediaError;
use super::traits::MediaTransformer;
use super::types::{LayoutHints, MediaInfo, Region};

/// Reference points for the quality heuristic.
const REFERENCE_SHORT_SIDE: f64 = 720.0;
const REFERENCE_BITRATE_KBPS: f64 = 2500.0;
const REFERENCE_FPS: f64 = 30.0;

/// Crops landscape clips into vertical video with ffmpeg.
pub struct FfmpegTransformer {
    config: MediaConfig,
}

impl FfmpegTransformer {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(MediaConfig::default())
    }

    /// Round down to an even pixel count, as libx264 with yuv420p requires.
    fn even(v: f64) -> u32 {
        ((v as u32) / 2 * 2).max(2)
    }

    /// Filter graph producing `[v]` at the configured output size.
    fn build_filter(&self, layout: &LayoutHints) -> String {
        let (w, h) = (self.config.output_width, self.config.output_height);

        match &layout.facecam {
            None => format!(
                "[0:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1[v]"
            ),
            Some(Region {
                x,
                y,
                w: rw,
                h: rh,
            }) => {
                let cam_h = Self::even(f64::from(h) * layout.facecam_share);
                let game_h = h - cam_h;
                format!(
                    "[0:v]split=2[cam][game];\
                     [cam]crop=iw*{rw}:ih*{rh}:iw*{x}:ih*{y},\
                     scale={w}:{cam_h}:force_original_aspect_ratio=increase,crop={w}:{cam_h}[top];\
                     [game]scale={w}:{game_h}:force_original_aspect_ratio=increase,crop={w}:{game_h}[bottom];\
                     [top][bottom]vstack=inputs=2,setsar=1[v]"
                )
            }
        }
    }

    fn build_args(&self, input: &Path, output: &Path, layout: &LayoutHints) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-filter_complex".to_string(),
            self.build_filter(layout),
            "-map".to_string(),
            "[v]".to_string(),
            "-map".to_string(),
            "0:a?".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-crf".to_string(),
            self.config.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "128k".to_string(),
            "-t".to_string(),
            format!("{}", self.config.max_duration_secs),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            output.to_string_lossy().to_string(),
        ]
    }

    fn output_path(input: &Path, dest_dir: &Path) -> PathBuf {
        let stem = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .and_then(|n| n.split('.').next().map(str::to_string))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "clip".to_string());
        dest_dir.join(format!("{}.vertical.mp4", stem))
    }

    /// Probe a media file.
    pub async fn probe(&self, path: &Path) -> Result<MediaInfo, MediaError> {
        if !path.exists() {
            return Err(MediaError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let child = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::spawn("ffprobe", &self.config.ffprobe_path, e))?;

        let output = timeout(
            Duration::from_secs(self.config.probe_timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| MediaError::Timeout {
            operation: "inspect",
            timeout_secs: self.config.probe_timeout_secs,
        })??;

        if !output.status.success() {
            return Err(MediaError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Self::parse_probe_output(path, &String::from_utf8_lossy(&output.stdout))
    }

    fn parse_probe_output(path: &Path, output: &str) -> Result<MediaInfo, MediaError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
            size: Option<String>,
            bit_rate: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            bit_rate: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
        }

        let probe: ProbeOutput = serde_json::from_str(output).map_err(|e| {
            MediaError::probe_failed(format!("Failed to parse ffprobe output: {}", e))
        })?;

        let video = probe.streams.iter().find(|s| s.codec_type == "video");
        let kbps = |s: &Option<String>| {
            s.as_ref()
                .and_then(|b| b.parse::<u64>().ok())
                .map(|b| (b / 1000) as u32)
        };

        Ok(MediaInfo {
            path: path.to_path_buf(),
            size_bytes: probe
                .format
                .size
                .as_ref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            duration_secs: probe
                .format
                .duration
                .as_ref()
                .and_then(|d| d.parse().ok())
                .unwrap_or(0.0),
            width: video.and_then(|s| s.width),
            height: video.and_then(|s| s.height),
            fps: video
                .and_then(|s| s.r_frame_rate.as_deref())
                .and_then(parse_frame_rate),
            video_bitrate_kbps: video
                .and_then(|s| kbps(&s.bit_rate))
                .or_else(|| kbps(&probe.format.bit_rate)),
            has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
        })
    }

    /// Weighted blend of resolution, bitrate and frame rate, each capped at
    /// its reference value.
    pub fn quality_from_info(info: &MediaInfo) -> f64 {
        let (Some(w), Some(h)) = (info.width, info.height) else {
            return 0.0;
        };
        if info.duration_secs <= 0.0 {
            return 0.0;
        }

        let short_side = f64::from(w.min(h));
        let resolution = (short_side / REFERENCE_SHORT_SIDE).min(1.0);
        let bitrate = info
            .video_bitrate_kbps
            .map(|b| (f64::from(b) / REFERENCE_BITRATE_KBPS).min(1.0))
            .unwrap_or(0.5);
        let fps = info
            .fps
            .map(|f| (f64::from(f) / REFERENCE_FPS).min(1.0))
            .unwrap_or(0.5);

        (0.4 * resolution + 0.4 * bitrate + 0.2 * fps).clamp(0.0, 1.0)
    }
}

fn parse_frame_rate(r: &str) -> Option<f32> {
    // "30000/1001" or "30"
    match r.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f32>().ok()?;
            let den = den.parse::<f32>().ok()?;
            (den > 0.0).then(|| num / den)
        }
        None => r.parse().ok(),
    }
}

#[async_trait]
impl MediaTransformer for FfmpegTransformer {
    async fn to_publishable(
        &self,
        input: &Path,
        layout: &LayoutHints,
        dest_dir: &Path,
    ) -> Result<PathBuf, MediaError> {
        if !input.exists() {
            return Err(MediaError::InputNotFound {
                path: input.to_path_buf(),
            });
        }
        layout
            .validate()
            .map_err(|reason| MediaError::InvalidLayout { reason })?;
        tokio::fs::create_dir_all(dest_dir).await?;

        let output = Self::output_path(input, dest_dir);
        let args = self.build_args(input, &output, layout);
        debug!(input = %input.display(), output = %output.display(), "Transforming clip");

        let child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::spawn("ffmpeg", &self.config.ffmpeg_path, e))?;

        let result = timeout(
            Duration::from_secs(self.config.transform_timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| MediaError::Timeout {
            operation: "transform",
            timeout_secs: self.config.transform_timeout_secs,
        })??;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            return Err(MediaError::transform_failed(
                format!("FFmpeg exited with code: {:?}", result.status.code()),
                (!stderr.is_empty()).then_some(stderr),
            ));
        }

        let meta = tokio::fs::metadata(&output)
            .await
            .map_err(|_| MediaError::transform_failed("Output file not created", None))?;
        if meta.len() == 0 {
            return Err(MediaError::transform_failed("Output file is empty", None));
        }

        Ok(output)
    }

    async fn quality_score(&self, path: &Path) -> Result<f64, MediaError> {
        let info = self.probe(path).await?;
        let score = Self::quality_from_info(&info);
        debug!(path = %path.display(), score, "Quality score");
        Ok(score)
    }
}
