//! Application configuration types.
//!
//! The top-level [`Config`] struct carries the conversion limits, external
//! tool locations, and delivery settings. Every section defaults sensibly so
//! an empty file is valid. Parsing from a concrete file format is left to
//! the binary.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub conversion: ConversionConfig,
    pub tools: ToolsConfig,
    pub delivery: DeliveryConfig,
}

impl Config {
    /// Reject configurations the pipeline cannot run with.
    pub fn check(&self) -> Result<()> {
        if self.conversion.max_concurrent_jobs == 0 {
            return Err(Error::Validation(
                "conversion.max_concurrent_jobs must be at least 1".into(),
            ));
        }
        if self.tools.video_renderer.program.as_os_str().is_empty() {
            return Err(Error::Validation(
                "tools.video_renderer.program is empty".into(),
            ));
        }
        if self.tools.audio_renderer.program.as_os_str().is_empty() {
            return Err(Error::Validation(
                "tools.audio_renderer.program is empty".into(),
            ));
        }
        Ok(())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.conversion.stage_timeout_secs == 0 {
            warnings.push(
                "conversion.stage_timeout_secs is 0; every stage will time out immediately".into(),
            );
        }

        if self.conversion.max_concurrent_jobs > 16 {
            warnings.push(format!(
                "conversion.max_concurrent_jobs is {}; each job runs heavy encoder processes",
                self.conversion.max_concurrent_jobs
            ));
        }

        if self.conversion.max_input_size_bytes == 0 {
            warnings.push("conversion.max_input_size_bytes is 0; every source will be rejected".into());
        }

        if self.conversion.sample_rate_hz == 0 {
            warnings.push("conversion.sample_rate_hz is 0".into());
        }

        for (name, renderer) in [
            ("video_renderer", &self.tools.video_renderer),
            ("audio_renderer", &self.tools.audio_renderer),
        ] {
            if !renderer.args.iter().any(|a| a.contains("{output}")) {
                warnings.push(format!(
                    "tools.{name}.args never mention {{output}}; the stage cannot find its artifact"
                ));
            }
            if let Some(ref dir) = renderer.working_dir {
                if !dir.exists() {
                    warnings.push(format!(
                        "tools.{name}.working_dir {} does not exist",
                        dir.display()
                    ));
                }
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Conversion limits and audio export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Caps parallel pipeline executions (minimum 1).
    pub max_concurrent_jobs: usize,
    /// Per-stage wall-clock ceiling.
    pub stage_timeout_secs: u64,
    /// Sources declared larger than this are rejected before admission.
    pub max_input_size_bytes: u64,
    /// Fixed output sample rate for standalone audio export.
    pub sample_rate_hz: u32,
    /// Parent directory for job workspaces (system temp dir when unset).
    pub workspace_root: Option<PathBuf>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            stage_timeout_secs: 180,
            max_input_size_bytes: 40 * 1024 * 1024,
            sample_rate_hz: 16364,
            workspace_root: None,
        }
    }
}

impl ConversionConfig {
    /// The stage timeout as a [`Duration`].
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

/// Locations and argument templates of the external tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Explicit ffmpeg location; PATH lookup when unset.
    pub ffmpeg_path: Option<PathBuf>,
    /// Command producing the silent video.
    pub video_renderer: RendererConfig,
    /// Command producing the PCM audio file.
    pub audio_renderer: RendererConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            video_renderer: RendererConfig {
                program: PathBuf::from("python3"),
                args: vec!["kwzVideo.py".into(), "{input}".into(), "{output}".into()],
                working_dir: None,
            },
            audio_renderer: RendererConfig {
                program: PathBuf::from("python3"),
                args: vec![
                    "kwzAudio.py".into(),
                    "{input}".into(),
                    "{track}".into(),
                    "{output}".into(),
                ],
                working_dir: None,
            },
        }
    }
}

/// An external renderer invocation.
///
/// `args` may reference `{input}`, `{output}`, `{track}`, and `{workspace}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

/// Where finished artifacts are handed over.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub output_dir: PathBuf,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./converted"),
        }
    }
}
