//! Stage identity and outcome.

use std::fmt;
use std::path::PathBuf;

use kf_core::Error;

/// The three conversion stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    RenderSilentVideo,
    RenderAudioTrack,
    MuxAudioVideo,
}

impl Stage {
    /// Stable stage name used in logs and reports.
    pub fn name(self) -> &'static str {
        match self {
            Stage::RenderSilentVideo => "render-silent-video",
            Stage::RenderAudioTrack => "render-audio-track",
            Stage::MuxAudioVideo => "mux-audio-video",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one stage run.
///
/// `SoftFailure` is the expected absence of optional content, not an error.
#[derive(Debug)]
pub enum StageResult {
    /// The stage produced its artifact.
    Success(PathBuf),
    /// Nothing usable was produced, and that is routine.
    SoftFailure(String),
    /// The stage failed.
    HardFailure(Error),
}

impl StageResult {
    pub fn is_success(&self) -> bool {
        matches!(self, StageResult::Success(_))
    }

    /// The produced artifact, if any.
    pub fn artifact(&self) -> Option<&PathBuf> {
        match self {
            StageResult::Success(path) => Some(path),
            _ => None,
        }
    }

    /// Short label for logs: `success`, `soft-failure`, `hard-failure`.
    pub fn label(&self) -> &'static str {
        match self {
            StageResult::Success(_) => "success",
            StageResult::SoftFailure(_) => "soft-failure",
            StageResult::HardFailure(_) => "hard-failure",
        }
    }

    /// Diagnostic text for a failed stage.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            StageResult::Success(_) => None,
            StageResult::SoftFailure(reason) => Some(reason.clone()),
            StageResult::HardFailure(e) => Some(e.diagnostic()),
        }
    }
}

impl From<kf_core::Result<PathBuf>> for StageResult {
    fn from(result: kf_core::Result<PathBuf>) -> Self {
        match result {
            Ok(path) => StageResult::Success(path),
            Err(e) => StageResult::HardFailure(e),
        }
    }
}
