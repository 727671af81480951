//! mux-audio-video: silent video plus PCM audio into the final video.

use std::path::Path;

use crate::stage::{Stage, StageResult};
use crate::tools::{ToolRegistry, FFMPEG};
use crate::workspace::JobWorkspace;

/// ffmpeg arguments copying the video stream and encoding the audio to AAC.
///
/// The audio is resampled to 48 kHz and passed through a limiter at 0.95
/// with level normalisation off; the output stops with the shorter stream.
pub fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into(), "-i".into()];
    args.push(video.display().to_string());
    args.push("-i".into());
    args.push(audio.display().to_string());
    args.extend(
        [
            "-c:v",
            "copy",
            "-af",
            "aresample=48000,alimiter=limit=0.95:level=disabled",
            "-c:a",
            "aac",
            "-b:a",
            "192k",
            "-shortest",
        ]
        .map(String::from),
    );
    args.push(output.display().to_string());
    args
}

/// Combine `video` and `audio` into [`JobWorkspace::muxed_video`].
///
/// Runs from the workspace directory. Success is a zero exit status.
pub async fn mux_audio_video(
    workspace: &JobWorkspace,
    tools: &ToolRegistry,
    video: &Path,
    audio: &Path,
) -> StageResult {
    let output = workspace.muxed_video();
    tracing::info!("job {}: {}", workspace.job_id(), Stage::MuxAudioVideo);

    let ffmpeg = match tools.require(FFMPEG) {
        Ok(tool) => tool,
        Err(e) => return StageResult::HardFailure(e),
    };

    let mut cmd = crate::command::ToolCommand::new(ffmpeg.path.clone());
    cmd.args(mux_args(video, audio, &output))
        .current_dir(workspace.path())
        .timeout(ffmpeg.timeout);
    cmd.execute().await.map(|_| output).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_are_fixed() {
        let args = mux_args(
            Path::new("/w/silent_1.mp4"),
            Path::new("/w/bgm_1.wav"),
            Path::new("/w/out_1.mp4"),
        );
        assert_eq!(
            args,
            vec![
                "-y",
                "-i",
                "/w/silent_1.mp4",
                "-i",
                "/w/bgm_1.wav",
                "-c:v",
                "copy",
                "-af",
                "aresample=48000,alimiter=limit=0.95:level=disabled",
                "-c:a",
                "aac",
                "-b:a",
                "192k",
                "-shortest",
                "/w/out_1.mp4",
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_in_workspace_and_writes_output() {
        use crate::actions::test_support::{registry, script};
        use kf_core::JobId;

        let dir = tempfile::tempdir().unwrap();
        // Writes its cwd into the last argument.
        let ffmpeg = script(
            dir.path(),
            "ffmpeg",
            r#"for last; do :; done; pwd -P > "$last""#,
        );
        let tools = registry(vec![(FFMPEG, ffmpeg, vec![])]);
        let ws = JobWorkspace::create(JobId::new(), Some(dir.path())).unwrap();

        let result = mux_audio_video(&ws, &tools, &ws.silent_video(), &ws.audio_track()).await;
        assert_eq!(result.artifact(), Some(&ws.muxed_video()));

        let cwd = std::fs::read_to_string(ws.muxed_video()).unwrap();
        assert_eq!(Path::new(cwd.trim()), ws.path().canonicalize().unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_is_hard_failure() {
        use crate::actions::test_support::{registry, script};
        use kf_core::{ErrorKind, JobId};

        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = script(dir.path(), "ffmpeg", "echo 'Invalid data found' >&2; exit 1");
        let tools = registry(vec![(FFMPEG, ffmpeg, vec![])]);
        let ws = JobWorkspace::create(JobId::new(), Some(dir.path())).unwrap();

        match mux_audio_video(&ws, &tools, &ws.silent_video(), &ws.audio_track()).await {
            StageResult::HardFailure(e) => {
                assert_eq!(e.kind(), ErrorKind::NonZeroExit);
                assert!(e.diagnostic().contains("Invalid data"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
