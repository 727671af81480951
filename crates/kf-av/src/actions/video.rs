//! render-silent-video: source artifact to a silent video file.

use crate::stage::{Stage, StageResult};
use crate::template::TemplateContext;
use crate::tools::{ToolRegistry, VIDEO_RENDERER};
use crate::workspace::JobWorkspace;

/// Render the persisted source into [`JobWorkspace::silent_video`].
///
/// Success is a zero exit status. The renderer is trusted to have written
/// its output; the mux stage is the one that would notice otherwise.
pub async fn render_silent_video(workspace: &JobWorkspace, tools: &ToolRegistry) -> StageResult {
    let output = workspace.silent_video();
    let ctx = TemplateContext::new().with_paths(&workspace.source(), &output, workspace.path());

    tracing::info!("job {}: {}", workspace.job_id(), Stage::RenderSilentVideo);

    let cmd = match tools.command(VIDEO_RENDERER, &ctx) {
        Ok(cmd) => cmd,
        Err(e) => return StageResult::HardFailure(e),
    };
    cmd.execute().await.map(|_| output).into()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::actions::test_support::{registry, script};
    use kf_core::{ErrorKind, JobId};

    #[tokio::test]
    async fn zero_exit_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = script(dir.path(), "video.sh", r#"printf video > "$2""#);
        let tools = registry(vec![(VIDEO_RENDERER, renderer, vec!["{input}", "{output}"])]);
        let ws = JobWorkspace::create(JobId::new(), Some(dir.path())).unwrap();

        let result = render_silent_video(&ws, &tools).await;
        assert_eq!(result.artifact(), Some(&ws.silent_video()));
        assert_eq!(std::fs::read(ws.silent_video()).unwrap(), b"video");
    }

    #[tokio::test]
    async fn non_zero_exit_is_hard_failure() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = script(dir.path(), "video.sh", "echo 'bad frame data' >&2; exit 1");
        let tools = registry(vec![(VIDEO_RENDERER, renderer, vec![])]);
        let ws = JobWorkspace::create(JobId::new(), Some(dir.path())).unwrap();

        match render_silent_video(&ws, &tools).await {
            StageResult::HardFailure(e) => {
                assert_eq!(e.kind(), ErrorKind::NonZeroExit);
                assert_eq!(e.diagnostic(), "bad frame data");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unregistered_renderer_is_hard_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(JobId::new(), Some(dir.path())).unwrap();
        let result = render_silent_video(&ws, &registry(vec![])).await;
        assert!(matches!(
            result,
            StageResult::HardFailure(ref e) if e.kind() == ErrorKind::SpawnFailure
        ));
    }
}
