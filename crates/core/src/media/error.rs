//! Error types for the media module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while downloading or transforming clip media.
#[derive(Debug, Error)]
pub enum MediaError {
    /// External tool binary not found.
    #[error("{tool} not found at path: {path}")]
    ToolNotFound { tool: &'static str, path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Download process failed.
    #[error("Download failed: {reason}")]
    DownloadFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Transform process failed.
    #[error("Transform failed: {reason}")]
    TransformFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// An external process exceeded its time budget.
    #[error("{operation} timed out after {timeout_secs} seconds")]
    Timeout {
        operation: &'static str,
        timeout_secs: u64,
    },

    /// Failed to probe media file.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// Layout hints do not describe a usable crop.
    #[error("Invalid layout: {reason}")]
    InvalidLayout { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn download_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::DownloadFailed {
            reason: reason.into(),
            stderr,
        }
    }

    pub fn transform_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::TransformFailed {
            reason: reason.into(),
            stderr,
        }
    }

    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Map a spawn error, reporting a missing binary distinctly.
    pub(crate) fn spawn(tool: &'static str, path: &std::path::Path, e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            Self::ToolNotFound {
                tool,
                path: path.to_path_buf(),
            }
        } else {
            Self::Io(e)
        }
    }
}
