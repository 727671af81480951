//! Fire-and-forget intake of conversion requests.
//!
//! Each accepted request becomes its own task. Intake never waits for a
//! conversion slot; the orchestrator's slot pool is the only backpressure.

use std::sync::Arc;

use kf_core::Result;
use kf_pipeline::{ConversionRequest, Delivery, JobOrchestrator, JobReport};
use tokio::task::JoinHandle;

/// Extension a source must carry to be converted.
pub const SOURCE_EXTENSION: &str = ".kwz";

/// Whether a source named `name` is accepted for conversion.
pub fn accepts(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(SOURCE_EXTENSION)
}

/// A dispatched conversion.
pub struct Dispatched {
    pub name: String,
    pub handle: JoinHandle<Result<JobReport>>,
}

/// Spawn one task per accepted request and return without waiting.
pub fn dispatch(
    orchestrator: Arc<JobOrchestrator>,
    delivery: Arc<dyn Delivery>,
    requests: impl IntoIterator<Item = ConversionRequest>,
) -> Vec<Dispatched> {
    requests
        .into_iter()
        .filter(|request| {
            let ok = accepts(&request.name);
            if !ok {
                tracing::debug!("ignoring {}: not a {SOURCE_EXTENSION} file", request.name);
            }
            ok
        })
        .map(|request| {
            let name = request.name.clone();
            let orchestrator = Arc::clone(&orchestrator);
            let delivery = Arc::clone(&delivery);
            let handle =
                tokio::spawn(async move { orchestrator.run(request, delivery.as_ref()).await });
            Dispatched { name, handle }
        })
        .collect()
}
