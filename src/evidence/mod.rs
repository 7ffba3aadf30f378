//! Evidence model and the append-only store.

pub mod id;
pub mod model;
pub mod store;

pub use id::{run_date, EvidenceId, IdSequence};
pub use model::{
    ActionKind, Band, Churn, Coverage, Draft, EvidenceBody, EvidenceDraft, EvidenceKind, Factor,
    FactorContribution, Finding, FindingCategory, JourneyGap, Metadata, Recommendation, Record,
    Risk, RiskSignals, Severity, SUPERSEDES_KEY,
};
pub use store::{read_stream, EvidenceStore};
