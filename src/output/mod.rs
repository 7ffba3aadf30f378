//! Rendering of runs for the command line.
//!
//! Everything here only reads finished evidence; nothing writes to a run.

pub mod json;
pub mod terminal;

pub use json::{outcome_json, records_json};
pub use terminal::{render_manifest, render_outcome, render_runs};

use crate::evidence::{
    read_stream, Churn, Coverage, EvidenceKind, Finding, JourneyGap, Recommendation, Risk,
};
use std::path::Path;

/// Default number of risk rows shown in the terminal summary.
pub const DEFAULT_TOP: usize = 15;

/// Every record of one stream as JSON values, in write order.
pub fn read_stream_values(evidence_dir: &Path, kind: EvidenceKind) -> Vec<serde_json::Value> {
    fn values<T: crate::evidence::EvidenceBody>(dir: &Path) -> Vec<serde_json::Value> {
        read_stream::<T>(dir)
            .iter()
            .filter_map(|r| serde_json::to_value(r).ok())
            .collect()
    }

    match kind {
        EvidenceKind::Findings => values::<Finding>(evidence_dir),
        EvidenceKind::Coverage => values::<Coverage>(evidence_dir),
        EvidenceKind::Churn => values::<Churn>(evidence_dir),
        EvidenceKind::Risks => values::<Risk>(evidence_dir),
        EvidenceKind::Gaps => values::<JourneyGap>(evidence_dir),
        EvidenceKind::Recommendations => values::<Recommendation>(evidence_dir),
    }
}
