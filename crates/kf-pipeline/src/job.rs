//! Conversion requests and the per-job state machine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kf_av::{Stage, StageResult};
use kf_core::{Error, ErrorKind, JobId, Result};

/// Supplier of the raw source artifact.
///
/// The orchestrator calls [`persist`](ArtifactSource::persist) once, after a
/// slot is held and the workspace exists.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Write the artifact to `dest`.
    async fn persist(&self, dest: &Path) -> Result<()>;
}

/// A source artifact already on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileArtifact {
    path: PathBuf,
}

impl FileArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ArtifactSource for FileArtifact {
    async fn persist(&self, dest: &Path) -> Result<()> {
        tokio::fs::copy(&self.path, dest).await?;
        Ok(())
    }
}

/// A source artifact held in memory.
#[derive(Debug, Clone)]
pub struct BytesArtifact(pub Vec<u8>);

#[async_trait]
impl ArtifactSource for BytesArtifact {
    async fn persist(&self, dest: &Path) -> Result<()> {
        tokio::fs::write(dest, &self.0).await?;
        Ok(())
    }
}

/// A request to convert one source artifact.
#[derive(Clone)]
pub struct ConversionRequest {
    /// Requester-facing name of the source (e.g. the attachment filename).
    pub name: String,
    /// Size the requester declared, checked before admission.
    pub declared_size: u64,
    pub source: Arc<dyn ArtifactSource>,
}

impl ConversionRequest {
    pub fn new(
        name: impl Into<String>,
        declared_size: u64,
        source: Arc<dyn ArtifactSource>,
    ) -> Self {
        Self {
            name: name.into(),
            declared_size,
            source,
        }
    }

    /// Request converting a local file; the declared size is its length.
    pub async fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let meta = tokio::fs::metadata(&path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, meta.len(), Arc::new(FileArtifact::new(path))))
    }

    /// Request converting an in-memory artifact.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self::new(name, size, Arc::new(BytesArtifact(bytes)))
    }
}

impl std::fmt::Debug for ConversionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionRequest")
            .field("name", &self.name)
            .field("declared_size", &self.declared_size)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of a conversion job.
///
/// ```text
/// Admitted -> SlotAcquired -> VideoRendered -> AudioAttempted -> Muxed | PassThrough -> Completed
/// ```
///
/// Every non-terminal state may move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Admitted,
    SlotAcquired,
    VideoRendered,
    AudioAttempted,
    Muxed,
    PassThrough,
    Completed,
    Failed(ErrorKind),
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed(_))
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (s, Failed(_)) => !s.is_terminal(),
            (Admitted, SlotAcquired)
            | (SlotAcquired, VideoRendered)
            | (VideoRendered, AudioAttempted)
            | (AudioAttempted, Muxed)
            | (AudioAttempted, PassThrough)
            | (Muxed, Completed)
            | (PassThrough, Completed) => true,
            _ => false,
        }
    }
}

/// What one stage did, kept for the job report.
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub stage: Stage,
    /// `success`, `soft-failure` or `hard-failure`.
    pub outcome: &'static str,
    pub diagnostic: Option<String>,
    pub elapsed: Duration,
}

impl StageRecord {
    pub fn new(stage: Stage, result: &StageResult, elapsed: Duration) -> Self {
        Self {
            stage,
            outcome: result.label(),
            diagnostic: result.diagnostic(),
            elapsed,
        }
    }
}

/// One admitted conversion and its progress.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub id: JobId,
    pub name: String,
    state: JobState,
    history: Vec<JobState>,
    stages: Vec<StageRecord>,
}

impl ConversionJob {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            name: name.into(),
            state: JobState::Admitted,
            history: vec![JobState::Admitted],
            stages: Vec::new(),
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Every state the job has been in, oldest first.
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    /// Move to `next`, rejecting transitions the state machine forbids.
    pub fn advance(&mut self, next: JobState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::Internal(format!(
                "job {}: illegal transition {:?} -> {:?}",
                self.id, self.state, next
            )));
        }
        tracing::trace!("job {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    pub(crate) fn record(&mut self, record: StageRecord) {
        self.stages.push(record);
    }
}
