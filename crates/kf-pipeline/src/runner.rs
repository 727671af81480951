//! The seam between the orchestrator and the conversion stages.

use std::path::Path;

use async_trait::async_trait;
use kf_audio::TrackSelector;
use kf_av::{JobWorkspace, StageResult, ToolRegistry};

/// Runs the three conversion stages inside a job workspace.
#[async_trait]
pub trait StageRunner: Send + Sync {
    async fn render_silent_video(&self, workspace: &JobWorkspace) -> StageResult;

    async fn render_audio_track(
        &self,
        workspace: &JobWorkspace,
        selector: TrackSelector,
    ) -> StageResult;

    async fn mux_audio_video(
        &self,
        workspace: &JobWorkspace,
        video: &Path,
        audio: &Path,
    ) -> StageResult;
}

/// Stages backed by the external renderers and ffmpeg.
#[derive(Debug, Clone)]
pub struct ExternalStages {
    tools: ToolRegistry,
}

impl ExternalStages {
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
}

#[async_trait]
impl StageRunner for ExternalStages {
    async fn render_silent_video(&self, workspace: &JobWorkspace) -> StageResult {
        kf_av::render_silent_video(workspace, &self.tools).await
    }

    async fn render_audio_track(
        &self,
        workspace: &JobWorkspace,
        selector: TrackSelector,
    ) -> StageResult {
        kf_av::render_audio_track(workspace, &self.tools, selector).await
    }

    async fn mux_audio_video(
        &self,
        workspace: &JobWorkspace,
        video: &Path,
        audio: &Path,
    ) -> StageResult {
        kf_av::mux_audio_video(workspace, &self.tools, video, audio).await
    }
}
