//! Job orchestrator: admission, slot acquisition, stage sequencing, and
//! cleanup.
//!
//! Video rendering is load-bearing: any failure there fails the job. Audio
//! rendering and muxing only enhance the result, so their failures fall back
//! to delivering the silent video.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use kf_audio::TrackSelector;
use kf_av::{JobWorkspace, Stage, StageResult};
use kf_core::config::ConversionConfig;
use kf_core::{Error, Result};

use crate::delivery::{status, Delivery};
use crate::job::{ConversionJob, ConversionRequest, JobState, StageRecord};
use crate::runner::StageRunner;
use crate::slots::SlotPool;

/// Whether the delivered video carries sound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioOutcome {
    Muxed,
    /// Pass-through: the silent video was delivered.
    Silent { reason: String },
}

/// Summary of a completed job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: ConversionJob,
    pub audio: AudioOutcome,
}

/// Runs conversion jobs under a shared concurrency ceiling.
pub struct JobOrchestrator {
    slots: SlotPool,
    stages: Arc<dyn StageRunner>,
    max_input_size: u64,
    workspace_root: Option<PathBuf>,
    selector: TrackSelector,
}

impl JobOrchestrator {
    pub fn new(config: &ConversionConfig, stages: Arc<dyn StageRunner>) -> Result<Self> {
        Ok(Self {
            slots: SlotPool::new(config.max_concurrent_jobs)?,
            stages,
            max_input_size: config.max_input_size_bytes,
            workspace_root: config.workspace_root.clone(),
            selector: TrackSelector::PRIMARY,
        })
    }

    /// Use a different track for the audio stage. Defaults to the
    /// background-music track.
    pub fn with_selector(mut self, selector: TrackSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn slots(&self) -> &SlotPool {
        &self.slots
    }

    /// Run one job to completion.
    ///
    /// Oversized requests are rejected before a slot is waited for or a
    /// workspace exists. Once admitted, the workspace is removed and the slot
    /// released on every exit path. The artifact is handed to `delivery`
    /// before cleanup.
    ///
    /// # Errors
    ///
    /// [`Error::AdmissionRejected`] for oversized sources, the video stage's
    /// error when it fails, and [`Error::Delivery`] when hand-over fails.
    pub async fn run(
        &self,
        request: ConversionRequest,
        delivery: &dyn Delivery,
    ) -> Result<JobReport> {
        let mut job = ConversionJob::new(request.name.clone());

        if request.declared_size > self.max_input_size {
            let err = Error::AdmissionRejected {
                size: request.declared_size,
                limit: self.max_input_size,
            };
            tracing::info!("job {}: rejected {}: {err}", job.id, job.name);
            return Err(fail(&mut job, err, delivery).await);
        }

        tracing::info!(
            "job {}: admitted {} ({} bytes)",
            job.id,
            job.name,
            request.declared_size
        );
        delivery.status(&job, &status::received(&job.name)).await;

        let _slot = match self.slots.acquire().await {
            Ok(slot) => slot,
            Err(e) => return Err(fail(&mut job, e, delivery).await),
        };
        job.advance(JobState::SlotAcquired)?;

        let workspace = match JobWorkspace::create(job.id, self.workspace_root.as_deref()) {
            Ok(ws) => ws,
            Err(e) => return Err(fail(&mut job, e, delivery).await),
        };

        let outcome = self.convert(&mut job, &workspace, &request, delivery).await;

        if let Err(e) = workspace.close() {
            tracing::warn!("job {}: {e}", job.id);
        }

        match outcome {
            Ok(audio) => {
                job.advance(JobState::Completed)?;
                tracing::info!("job {}: completed ({audio:?})", job.id);
                delivery.status(&job, status::complete()).await;
                Ok(JobReport { job, audio })
            }
            Err(e) => Err(fail(&mut job, e, delivery).await),
        }
    }

    async fn convert(
        &self,
        job: &mut ConversionJob,
        workspace: &JobWorkspace,
        request: &ConversionRequest,
        delivery: &dyn Delivery,
    ) -> Result<AudioOutcome> {
        request.source.persist(&workspace.source()).await?;
        delivery.status(job, status::converting()).await;

        let video = match run_stage(
            job,
            Stage::RenderSilentVideo,
            self.stages.render_silent_video(workspace),
        )
        .await
        {
            StageResult::Success(path) => path,
            StageResult::HardFailure(e) => return Err(e),
            StageResult::SoftFailure(reason) => {
                return Err(Error::Internal(format!(
                    "{} produced nothing: {reason}",
                    Stage::RenderSilentVideo
                )))
            }
        };
        job.advance(JobState::VideoRendered)?;

        let audio = run_stage(
            job,
            Stage::RenderAudioTrack,
            self.stages.render_audio_track(workspace, self.selector),
        )
        .await;
        job.advance(JobState::AudioAttempted)?;

        let (artifact, outcome) = match audio {
            StageResult::Success(audio) => {
                match run_stage(
                    job,
                    Stage::MuxAudioVideo,
                    self.stages.mux_audio_video(workspace, &video, &audio),
                )
                .await
                {
                    StageResult::Success(muxed) => {
                        job.advance(JobState::Muxed)?;
                        (muxed, AudioOutcome::Muxed)
                    }
                    other => {
                        let reason = other.diagnostic().unwrap_or_default();
                        tracing::warn!(
                            "job {}: mux failed, delivering silent video: {reason}",
                            job.id
                        );
                        job.advance(JobState::PassThrough)?;
                        (video, AudioOutcome::Silent { reason })
                    }
                }
            }
            StageResult::SoftFailure(reason) => {
                tracing::info!("job {}: no audio ({reason}); delivering silent video", job.id);
                job.advance(JobState::PassThrough)?;
                (video, AudioOutcome::Silent { reason })
            }
            StageResult::HardFailure(e) => {
                let reason = e.diagnostic();
                tracing::warn!(
                    "job {}: audio render failed, delivering silent video: {reason}",
                    job.id
                );
                job.advance(JobState::PassThrough)?;
                (video, AudioOutcome::Silent { reason })
            }
        };

        delivery.status(job, status::uploading()).await;
        delivery
            .deliver(job, &artifact)
            .await
            .map_err(|e| match e {
                Error::Delivery(_) => e,
                other => Error::Delivery(other.to_string()),
            })?;

        Ok(outcome)
    }
}

async fn run_stage<F>(job: &mut ConversionJob, stage: Stage, fut: F) -> StageResult
where
    F: Future<Output = StageResult>,
{
    let started = Instant::now();
    let result = fut.await;
    let elapsed = started.elapsed();
    tracing::debug!(
        "job {}: {stage} {} in {:.1}s",
        job.id,
        result.label(),
        elapsed.as_secs_f64()
    );
    job.record(StageRecord::new(stage, &result, elapsed));
    result
}

async fn fail(job: &mut ConversionJob, err: Error, delivery: &dyn Delivery) -> Error {
    if let Err(e) = job.advance(JobState::Failed(err.kind())) {
        tracing::error!("{e}");
    }
    tracing::warn!("job {}: failed: {err}", job.id);
    delivery.status(job, &status::failure(&err)).await;
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use kf_core::{ErrorKind, JobId};

    #[derive(Clone, Copy)]
    enum Behavior {
        Ok,
        Soft,
        Fail,
    }

    fn failure(stage: &str) -> StageResult {
        StageResult::HardFailure(Error::NonZeroExit {
            tool: stage.to_string(),
            code: Some(1),
            stdout: String::new(),
            stderr: format!("{stage} exploded"),
        })
    }

    struct FakeStages {
        video: Behavior,
        audio: Behavior,
        mux: Behavior,
        delay: Duration,
        calls: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
        log: Mutex<Vec<(JobId, &'static str)>>,
    }

    impl FakeStages {
        fn new(video: Behavior, audio: Behavior, mux: Behavior) -> Self {
            Self {
                video,
                audio,
                mux,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                log: Mutex::new(Vec::new()),
            }
        }

        async fn step(
            &self,
            ws: &JobWorkspace,
            behavior: Behavior,
            name: &'static str,
            output: PathBuf,
        ) -> StageResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push((ws.job_id(), name));
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            match behavior {
                Behavior::Ok => {
                    std::fs::write(&output, name).unwrap();
                    StageResult::Success(output)
                }
                Behavior::Soft => StageResult::SoftFailure("no samples".into()),
                Behavior::Fail => failure(name),
            }
        }
    }

    #[async_trait]
    impl StageRunner for FakeStages {
        async fn render_silent_video(&self, ws: &JobWorkspace) -> StageResult {
            assert!(ws.source().exists(), "source must be persisted first");
            self.step(ws, self.video, "silent", ws.silent_video()).await
        }

        async fn render_audio_track(&self, ws: &JobWorkspace, sel: TrackSelector) -> StageResult {
            assert_eq!(sel, TrackSelector::PRIMARY);
            self.step(ws, self.audio, "audio", ws.audio_track()).await
        }

        async fn mux_audio_video(&self, ws: &JobWorkspace, v: &Path, a: &Path) -> StageResult {
            assert!(v.exists() && a.exists());
            self.step(ws, self.mux, "muxed", ws.muxed_video()).await
        }
    }

    #[derive(Default)]
    struct Recorder {
        statuses: Mutex<Vec<String>>,
        delivered: Mutex<Vec<String>>,
        refuse: bool,
    }

    #[async_trait]
    impl Delivery for Recorder {
        async fn status(&self, _job: &ConversionJob, message: &str) {
            self.statuses.lock().unwrap().push(message.to_string());
        }

        async fn deliver(&self, _job: &ConversionJob, artifact: &Path) -> Result<()> {
            if self.refuse {
                return Err(Error::Io {
                    source: std::io::Error::other("upload rejected"),
                });
            }
            let body = std::fs::read_to_string(artifact)?;
            self.delivered.lock().unwrap().push(body);
            Ok(())
        }
    }

    fn orchestrator(root: &Path, capacity: usize, stages: Arc<FakeStages>) -> JobOrchestrator {
        let config = ConversionConfig {
            max_concurrent_jobs: capacity,
            max_input_size_bytes: 1024,
            workspace_root: Some(root.to_path_buf()),
            ..ConversionConfig::default()
        };
        JobOrchestrator::new(&config, stages).unwrap()
    }

    fn request() -> ConversionRequest {
        ConversionRequest::from_bytes("note.kwz", b"KFH".to_vec())
    }

    fn is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn muxed_video_is_delivered() {
        let root = tempfile::tempdir().unwrap();
        let stages = Arc::new(FakeStages::new(Behavior::Ok, Behavior::Ok, Behavior::Ok));
        let orch = orchestrator(root.path(), 1, stages.clone());
        let rec = Recorder::default();

        let report = orch.run(request(), &rec).await.unwrap();

        assert_eq!(report.audio, AudioOutcome::Muxed);
        assert_eq!(*rec.delivered.lock().unwrap(), vec!["muxed"]);
        assert_eq!(
            report.job.history(),
            &[
                JobState::Admitted,
                JobState::SlotAcquired,
                JobState::VideoRendered,
                JobState::AudioAttempted,
                JobState::Muxed,
                JobState::Completed,
            ]
        );
        assert_eq!(report.job.stages().len(), 3);
        assert_eq!(
            *rec.statuses.lock().unwrap(),
            vec![
                status::received("note.kwz"),
                status::converting().to_string(),
                status::uploading().to_string(),
                status::complete().to_string(),
            ]
        );
        assert!(is_empty(root.path()));
        assert_eq!(orch.slots().available(), 1);
    }

    #[tokio::test]
    async fn oversized_request_allocates_nothing() {
        let root = tempfile::tempdir().unwrap();
        let stages = Arc::new(FakeStages::new(Behavior::Ok, Behavior::Ok, Behavior::Ok));
        let orch = orchestrator(root.path(), 1, stages.clone());
        let rec = Recorder::default();

        let big = ConversionRequest::from_bytes("big.kwz", vec![0; 1025]);
        let err = orch.run(big, &rec).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AdmissionRejected);
        assert_eq!(stages.calls.load(Ordering::SeqCst), 0);
        assert!(is_empty(root.path()));
        assert!(rec.delivered.lock().unwrap().is_empty());
        assert!(rec.statuses.lock().unwrap()[0].starts_with("too large"));
    }

    #[tokio::test]
    async fn size_at_limit_is_admitted() {
        let root = tempfile::tempdir().unwrap();
        let stages = Arc::new(FakeStages::new(Behavior::Ok, Behavior::Soft, Behavior::Ok));
        let orch = orchestrator(root.path(), 1, stages);

        let exact = ConversionRequest::from_bytes("exact.kwz", vec![0; 1024]);
        assert!(orch.run(exact, &Recorder::default()).await.is_ok());
    }

    #[tokio::test]
    async fn video_failure_is_terminal() {
        let root = tempfile::tempdir().unwrap();
        let stages = Arc::new(FakeStages::new(Behavior::Fail, Behavior::Ok, Behavior::Ok));
        let orch = orchestrator(root.path(), 1, stages.clone());
        let rec = Recorder::default();

        let err = orch.run(request(), &rec).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NonZeroExit);
        assert_eq!(stages.calls.load(Ordering::SeqCst), 1);
        assert!(rec.delivered.lock().unwrap().is_empty());
        assert_eq!(
            rec.statuses.lock().unwrap().last().unwrap(),
            "conversion failed: silent exploded"
        );
        assert!(is_empty(root.path()));
        assert_eq!(orch.slots().available(), 1);
    }

    #[tokio::test]
    async fn audio_failures_pass_through_silent_video() {
        for audio in [Behavior::Fail, Behavior::Soft] {
            let root = tempfile::tempdir().unwrap();
            let stages = Arc::new(FakeStages::new(Behavior::Ok, audio, Behavior::Ok));
            let orch = orchestrator(root.path(), 1, stages.clone());
            let rec = Recorder::default();

            let report = orch.run(request(), &rec).await.unwrap();

            assert!(matches!(report.audio, AudioOutcome::Silent { .. }));
            assert_eq!(report.job.state(), JobState::Completed);
            assert!(report.job.history().contains(&JobState::PassThrough));
            // Mux is never attempted.
            assert_eq!(stages.calls.load(Ordering::SeqCst), 2);
            assert_eq!(*rec.delivered.lock().unwrap(), vec!["silent"]);
            assert!(is_empty(root.path()));
        }
    }

    #[tokio::test]
    async fn mux_failure_passes_through_silent_video() {
        let root = tempfile::tempdir().unwrap();
        let stages = Arc::new(FakeStages::new(Behavior::Ok, Behavior::Ok, Behavior::Fail));
        let orch = orchestrator(root.path(), 1, stages);
        let rec = Recorder::default();

        let report = orch.run(request(), &rec).await.unwrap();

        assert_eq!(
            report.audio,
            AudioOutcome::Silent {
                reason: "muxed exploded".into()
            }
        );
        assert_eq!(*rec.delivered.lock().unwrap(), vec!["silent"]);
        assert!(is_empty(root.path()));
    }

    #[tokio::test]
    async fn delivery_failure_fails_job_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let stages = Arc::new(FakeStages::new(Behavior::Ok, Behavior::Ok, Behavior::Ok));
        let orch = orchestrator(root.path(), 1, stages);
        let rec = Recorder {
            refuse: true,
            ..Recorder::default()
        };

        let err = orch.run(request(), &rec).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Delivery);
        assert!(rec
            .statuses
            .lock()
            .unwrap()
            .last()
            .unwrap()
            .starts_with("delivery failed"));
        assert!(is_empty(root.path()));
        assert_eq!(orch.slots().available(), 1);
    }

    #[tokio::test]
    async fn single_slot_serialises_jobs() {
        let root = tempfile::tempdir().unwrap();
        let mut fake = FakeStages::new(Behavior::Ok, Behavior::Ok, Behavior::Ok);
        fake.delay = Duration::from_millis(20);
        let stages = Arc::new(fake);
        let orch = Arc::new(orchestrator(root.path(), 1, stages.clone()));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let orch = orch.clone();
            handles.push(tokio::spawn(async move {
                orch.run(request(), &Recorder::default()).await.map(|_| ())
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(stages.calls.load(Ordering::SeqCst), 12);
        assert_eq!(stages.max_active.load(Ordering::SeqCst), 1);
        assert!(is_empty(root.path()));

        // Each job's three stages run back to back, and a job only starts
        // once the previous one has finished all of its stages.
        let log = stages.log.lock().unwrap();
        let mut finished = Vec::new();
        for run in log.chunks(3) {
            let job = run[0].0;
            assert!(!finished.contains(&job), "job {job} resumed after another job ran");
            assert_eq!(
                run,
                &[(job, "silent"), (job, "audio"), (job, "muxed")],
                "stages interleaved: {log:?}"
            );
            finished.push(job);
        }
        assert_eq!(finished.len(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn capacity_bounds_parallel_jobs() {
        let root = tempfile::tempdir().unwrap();
        let mut fake = FakeStages::new(Behavior::Ok, Behavior::Ok, Behavior::Ok);
        fake.delay = Duration::from_millis(30);
        let stages = Arc::new(fake);
        let orch = Arc::new(orchestrator(root.path(), 2, stages.clone()));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let orch = orch.clone();
                tokio::spawn(async move {
                    orch.run(request(), &Recorder::default()).await.map(|_| ())
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert!(stages.max_active.load(Ordering::SeqCst) <= 2);
        assert_eq!(orch.slots().available(), 2);
    }
}
