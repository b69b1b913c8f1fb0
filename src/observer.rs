//! Hook for watching pipeline runs from the outside.
use std::time::Duration;

use uuid::Uuid;

use crate::state::{PipelineState, Stage};

/// Receives every state transition and stage timing of every run.
///
/// Passed to the processor through its builder. Both methods default to
/// no-ops, and are called synchronously on the run's task, so keep them
/// cheap.
pub trait PipelineObserver: Send + Sync {
    fn on_transition(&self, _run_id: Uuid, _from: PipelineState, _to: PipelineState) {}

    /// `succeeded` is false when the stage ended the run.
    fn on_stage_complete(&self, _run_id: Uuid, _stage: Stage, _elapsed: Duration, _succeeded: bool) {
    }
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}
