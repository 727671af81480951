//! Job-scoped workspace management.
//!
//! A [`JobWorkspace`] owns a temporary directory for one conversion job. All
//! intermediate artifacts are named after the job id, so concurrent jobs
//! can never collide even when they share a workspace root. The directory
//! and everything in it is removed when the workspace is closed or dropped.

use std::path::{Path, PathBuf};

use kf_core::{Error, JobId};
use tempfile::TempDir;

/// Prefix of every job workspace directory.
pub const WORKSPACE_PREFIX: &str = "kwzforge_";

/// Temporary directory exclusively owned by one job.
///
/// # Example
///
/// ```no_run
/// use kf_av::JobWorkspace;
/// use kf_core::JobId;
///
/// let ws = JobWorkspace::create(JobId::new(), None).unwrap();
/// std::fs::write(ws.source(), b"...").unwrap();
/// // ... run stages writing to ws.silent_video() etc ...
/// ws.close().unwrap();
/// ```
#[derive(Debug)]
pub struct JobWorkspace {
    dir: TempDir,
    job_id: JobId,
}

impl JobWorkspace {
    /// Create the workspace under `root`, or the system temp dir when `None`.
    pub fn create(job_id: JobId, root: Option<&Path>) -> kf_core::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| {
            Error::Internal(format!("failed to create job workspace for {job_id}: {e}"))
        })?;

        tracing::debug!("job {job_id}: workspace {}", dir.path().display());
        Ok(Self { dir, job_id })
    }

    /// The job this workspace belongs to.
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Path to the workspace directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Job-unique artifact path: `<role>_<id>.<ext>`.
    pub fn artifact(&self, role: &str, ext: &str) -> PathBuf {
        self.dir
            .path()
            .join(format!("{role}_{}.{ext}", self.job_id.simple()))
    }

    /// Where the source artifact is persisted.
    pub fn source(&self) -> PathBuf {
        self.artifact("input", "kwz")
    }

    /// Output of render-silent-video.
    pub fn silent_video(&self) -> PathBuf {
        self.artifact("silent", "mp4")
    }

    /// Output of render-audio-track.
    pub fn audio_track(&self) -> PathBuf {
        self.artifact("bgm", "wav")
    }

    /// Output of mux-audio-video.
    pub fn muxed_video(&self) -> PathBuf {
        self.artifact("out", "mp4")
    }

    /// Remove the workspace and report failures instead of ignoring them.
    pub fn close(self) -> kf_core::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| {
            Error::Internal(format!(
                "failed to remove job workspace {}: {e}",
                path.display()
            ))
        })
    }
}
