//! Run directories and their manifests.
//!
//! ```text
//! <runs-dir>/<run-id>/
//!     manifest.json
//!     collector_events.jsonl
//!     evidence/<kind>.jsonl
//!     artifacts/<collector>.<ext>
//! ```

mod manager;
mod manifest;

pub use manager::{
    CollectorEvent, RunHandle, RunManager, RunSummary, ARTIFACTS_DIR, EVENTS_FILE, EVIDENCE_DIR,
    RUNS_DIR_ENV,
};
pub use manifest::{
    CollectorEntry, CollectorOutcome, Manifest, RunStatus, TargetInfo, MANIFEST_FILE,
};
