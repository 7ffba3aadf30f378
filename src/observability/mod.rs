//! Crash reports and per-thread run context.
//!
//! ```ignore
//! use riskmap::observability::{install_panic_hook, set_phase, PipelinePhase};
//!
//! install_panic_hook();
//! let _phase = set_phase(PipelinePhase::RiskScoring);
//! // a panic here reports the phase and run
//! ```

pub mod context;
pub mod panic_hook;

pub use context::{
    get_current_context, get_progress, increment_finished, set_collector, set_phase, set_progress,
    set_run, ContextGuard, PipelinePhase, RunContext,
};
pub use panic_hook::{install_panic_hook, payload_message};
