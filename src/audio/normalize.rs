//! External audio normalisation (re-encode to a consistent format/level).
//!
//! Normalisation is best-effort: [`crate::audio::AudioCache`] falls back to a
//! plain copy whenever the normaliser is missing or fails, so nothing here
//! is required for the pipeline to work.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::config::NormalizeConfig;

// ---------------------------------------------------------------------------
// NormalizeError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The tool could not be started (usually: not installed).
    #[error("normaliser unavailable: {0}")]
    Unavailable(String),

    /// The tool ran and exited unsuccessfully.
    #[error("normaliser exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// The tool reported success but wrote nothing.
    #[error("normaliser produced an empty file")]
    EmptyOutput,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// AudioNormalizer
// ---------------------------------------------------------------------------

/// Re-encodes `input` into `output`.  `output` may already exist (as an
/// empty placeholder) and must be overwritten.
#[async_trait]
pub trait AudioNormalizer: Send + Sync {
    async fn normalize(&self, input: &Path, output: &Path) -> Result<(), NormalizeError>;
}

// ---------------------------------------------------------------------------
// FfmpegNormalizer
// ---------------------------------------------------------------------------

/// Mono MP3 at a fixed bitrate and sample rate, loudness-normalised.
#[derive(Debug, Clone)]
pub struct FfmpegNormalizer {
    program: PathBuf,
    bitrate_kbps: u32,
    sample_rate_hz: u32,
}

impl FfmpegNormalizer {
    pub fn new(program: impl Into<PathBuf>, bitrate_kbps: u32, sample_rate_hz: u32) -> Self {
        Self {
            program: program.into(),
            bitrate_kbps,
            sample_rate_hz,
        }
    }

    /// `None` when normalisation is disabled in the config.
    pub fn from_config(config: &NormalizeConfig) -> Option<Self> {
        config.enabled.then(|| {
            Self::new(
                config.program.clone(),
                config.bitrate_kbps,
                config.sample_rate_hz,
            )
        })
    }

    fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-nostdin", "-y", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_owned());
        for a in [
            "-vn".to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-ar".to_string(),
            self.sample_rate_hz.to_string(),
            "-af".to_string(),
            "loudnorm=I=-16:TP=-1.5:LRA=11".to_string(),
            "-codec:a".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            format!("{}k", self.bitrate_kbps),
            "-f".to_string(),
            "mp3".to_string(),
        ] {
            args.push(a.into());
        }
        args.push(output.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl AudioNormalizer for FfmpegNormalizer {
    async fn normalize(&self, input: &Path, output: &Path) -> Result<(), NormalizeError> {
        let result = Command::new(&self.program)
            .args(self.args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let out = match result {
            Ok(out) => out,
            Err(e) => {
                return Err(NormalizeError::Unavailable(format!(
                    "{}: {e}",
                    self.program.display()
                )))
            }
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(NormalizeError::Failed {
                status: out.status.to_string(),
                stderr: stderr.lines().last().unwrap_or("").trim().to_string(),
            });
        }

        let len = tokio::fs::metadata(output).await?.len();
        if len == 0 {
            return Err(NormalizeError::EmptyOutput);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
