//! # kf-pipeline
//!
//! Conversion job orchestration: admission against a size ceiling, a
//! bounded pool of concurrency slots, the per-job state machine, and the
//! degradation policy that turns audio and mux failures into a silent
//! (but valid) result.
//!
//! External effects are reached through two seams: [`StageRunner`] runs the
//! three conversion stages, and [`Delivery`] receives status updates and the
//! finished artifact.

pub mod delivery;
pub mod job;
pub mod orchestrator;
pub mod runner;
pub mod slots;

pub use delivery::{status, Delivery};
pub use job::{
    ArtifactSource, BytesArtifact, ConversionJob, ConversionRequest, FileArtifact, JobState,
    StageRecord,
};
pub use orchestrator::{AudioOutcome, JobOrchestrator, JobReport};
pub use runner::{ExternalStages, StageRunner};
pub use slots::{Slot, SlotPool};
