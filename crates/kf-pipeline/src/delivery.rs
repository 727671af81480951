//! The delivery seam: status updates and artifact hand-over.

use std::path::Path;

use async_trait::async_trait;
use kf_core::Result;

use crate::job::ConversionJob;

/// Receives progress messages and the finished artifact.
///
/// [`deliver`](Delivery::deliver) is called while the job workspace still
/// exists; the artifact path is invalid once it returns.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// A human-readable status update. Failures to report are the
    /// implementation's concern.
    async fn status(&self, job: &ConversionJob, message: &str);

    /// Hand over the terminal artifact.
    async fn deliver(&self, job: &ConversionJob, artifact: &Path) -> Result<()>;
}

/// Status texts sent over the course of a job.
pub mod status {
    use kf_core::{Error, ErrorKind};

    const MIB: f64 = 1024.0 * 1024.0;

    pub fn received(name: &str) -> String {
        format!("received {name}, waiting for a conversion slot")
    }

    pub fn converting() -> &'static str {
        "downloaded, converting"
    }

    pub fn uploading() -> &'static str {
        "uploading"
    }

    pub fn complete() -> &'static str {
        "conversion complete"
    }

    pub fn too_large(size: u64, limit: u64) -> String {
        format!(
            "too large ({:.1} MB, limit {} MB)",
            size as f64 / MIB,
            (limit as f64 / MIB).round()
        )
    }

    /// Status text for a failed job.
    pub fn failure(error: &Error) -> String {
        match error.kind() {
            ErrorKind::AdmissionRejected => match error {
                Error::AdmissionRejected { size, limit } => too_large(*size, *limit),
                other => other.to_string(),
            },
            ErrorKind::TimedOut => "conversion timed out".to_string(),
            ErrorKind::NonZeroExit | ErrorKind::SpawnFailure => {
                format!("conversion failed: {}", error.diagnostic())
            }
            ErrorKind::Delivery => match error {
                Error::Delivery(message) => format!("delivery failed: {message}"),
                other => format!("delivery failed: {}", other.diagnostic()),
            },
            _ => format!("unexpected error: {}", error.diagnostic()),
        }
    }

}
