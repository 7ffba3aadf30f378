//! Thread-local context tracking for crash reports.
//!
//! Records the pipeline phase, the run and the collector the current thread
//! is working on. Collectors run on rayon workers, so each worker carries its
//! own context; run-wide progress lives in atomic counters.

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};

static COLLECTORS_FINISHED: AtomicUsize = AtomicUsize::new(0);
static COLLECTORS_TOTAL: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static CURRENT_CONTEXT: RefCell<RunContext> = const { RefCell::new(RunContext::new()) };
}

/// What riskmap was doing on this thread.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub phase: Option<PipelinePhase>,
    pub run_id: Option<String>,
    pub collector: Option<String>,
}

impl RunContext {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: None,
            run_id: None,
            collector: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Configuration,
    Collection,
    RiskScoring,
    JourneyMapping,
    Recommendation,
    Reporting,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Collection => write!(f, "collection"),
            Self::RiskScoring => write!(f, "risk_scoring"),
            Self::JourneyMapping => write!(f, "journey_mapping"),
            Self::Recommendation => write!(f, "recommendation"),
            Self::Reporting => write!(f, "reporting"),
        }
    }
}

/// Restores the previous context when dropped, so guards nest.
pub struct ContextGuard {
    previous: RunContext,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT_CONTEXT.with(|ctx| {
            *ctx.borrow_mut() = self.previous.clone();
        });
    }
}

fn with_update(update: impl FnOnce(&mut RunContext)) -> ContextGuard {
    CURRENT_CONTEXT.with(|ctx| {
        let previous = ctx.borrow().clone();
        update(&mut ctx.borrow_mut());
        ContextGuard { previous }
    })
}

#[must_use]
pub fn set_phase(phase: PipelinePhase) -> ContextGuard {
    with_update(|ctx| ctx.phase = Some(phase))
}

#[must_use]
pub fn set_run(run_id: impl Into<String>) -> ContextGuard {
    let run_id = run_id.into();
    with_update(|ctx| ctx.run_id = Some(run_id))
}

/// Mark the current thread as running `name`.
///
/// Rayon workers start with an empty context, so the run id is passed along
/// explicitly.
#[must_use]
pub fn set_collector(run_id: &str, name: impl Into<String>) -> ContextGuard {
    let name = name.into();
    let run_id = run_id.to_string();
    with_update(|ctx| {
        ctx.phase = Some(PipelinePhase::Collection);
        ctx.run_id = Some(run_id);
        ctx.collector = Some(name);
    })
}

pub fn set_progress(finished: usize, total: usize) {
    COLLECTORS_FINISHED.store(finished, Ordering::Relaxed);
    COLLECTORS_TOTAL.store(total, Ordering::Relaxed);
}

pub fn increment_finished() {
    COLLECTORS_FINISHED.fetch_add(1, Ordering::Relaxed);
}

#[must_use]
pub fn get_current_context() -> RunContext {
    CURRENT_CONTEXT.with(|ctx| ctx.borrow().clone())
}

/// (finished, total) collectors for the active run.
#[must_use]
pub fn get_progress() -> (usize, usize) {
    (
        COLLECTORS_FINISHED.load(Ordering::Relaxed),
        COLLECTORS_TOTAL.load(Ordering::Relaxed),
    )
}

pub fn reset_context() {
    CURRENT_CONTEXT.with(|ctx| {
        *ctx.borrow_mut() = RunContext::new();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_restore_previous_context() {
        reset_context();

        let _phase = set_phase(PipelinePhase::RiskScoring);
        {
            let _collector = set_collector("20251024_193012Z", "bandit");
            let ctx = get_current_context();
            assert_eq!(ctx.phase, Some(PipelinePhase::Collection));
            assert_eq!(ctx.collector.as_deref(), Some("bandit"));
            assert_eq!(ctx.run_id.as_deref(), Some("20251024_193012Z"));
        }

        let ctx = get_current_context();
        assert_eq!(ctx.phase, Some(PipelinePhase::RiskScoring));
        assert!(ctx.collector.is_none());
        assert!(ctx.run_id.is_none());
    }

    #[test]
    fn phase_display_is_snake_case() {
        assert_eq!(PipelinePhase::JourneyMapping.to_string(), "journey_mapping");
        assert_eq!(PipelinePhase::Collection.to_string(), "collection");
    }
}
