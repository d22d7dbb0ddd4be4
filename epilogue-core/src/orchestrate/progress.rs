//! Progress reporting hooks for the external job runner.

use epilogue_model::SourceType;

/// Phase milestones emitted while one actor is processed.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    ActorStarted {
        actor_id: i64,
        actor_name: String,
        position: usize,
        total: usize,
    },
    SourceCompleted {
        actor_id: i64,
        source: SourceType,
        succeeded: bool,
    },
    Synthesizing {
        actor_id: i64,
        snippet_count: usize,
    },
    ActorFinished {
        actor_id: i64,
        enriched: bool,
        cost_usd: f64,
    },
}

/// Implemented by the job runner; every method has a default no-op so
/// callers opt into only what they render.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, _event: &ProgressEvent) {}
}

/// The default sink when no runner is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {}
