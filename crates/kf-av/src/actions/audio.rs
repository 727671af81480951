//! render-audio-track: source artifact to a PCM WAV file.

use kf_audio::{TrackSelector, WAV_HEADER_LEN};

use crate::stage::{Stage, StageResult};
use crate::template::TemplateContext;
use crate::tools::{ToolRegistry, AUDIO_RENDERER};
use crate::workspace::JobWorkspace;

/// Render the selected audio into [`JobWorkspace::audio_track`].
///
/// Success requires a zero exit status and an output strictly larger than a
/// bare WAV header. A missing or header-only file means the source carries
/// no soundtrack and yields [`StageResult::SoftFailure`].
pub async fn render_audio_track(
    workspace: &JobWorkspace,
    tools: &ToolRegistry,
    selector: TrackSelector,
) -> StageResult {
    let output = workspace.audio_track();
    let ctx = TemplateContext::new()
        .with_paths(&workspace.source(), &output, workspace.path())
        .with_var("track", &selector.to_string());

    tracing::info!(
        "job {}: {} (track {selector})",
        workspace.job_id(),
        Stage::RenderAudioTrack
    );

    let cmd = match tools.command(AUDIO_RENDERER, &ctx) {
        Ok(cmd) => cmd,
        Err(e) => return StageResult::HardFailure(e),
    };
    if let Err(e) = cmd.execute().await {
        return StageResult::HardFailure(e);
    }

    match tokio::fs::metadata(&output).await {
        Ok(meta) if meta.len() > WAV_HEADER_LEN => StageResult::Success(output),
        Ok(meta) => StageResult::SoftFailure(format!(
            "audio track is {} bytes; no samples present",
            meta.len()
        )),
        Err(_) => StageResult::SoftFailure("audio renderer produced no file".to_string()),
    }
}
