//! riskmap: a local evidence pipeline for code risk.
//!
//! Collectors run analyzers against a repository and normalize their output
//! into an append-only evidence store. Derived passes then score each
//! component, map coverage onto business journeys and rank remediation
//! actions, every derived record citing the evidence it came from.

pub mod analysis;
pub mod cli;
pub mod collectors;
pub mod commands;
pub mod config;
pub mod errors;
pub mod evidence;
pub mod formatting;
pub mod observability;
pub mod output;
pub mod pipeline;
pub mod run;

pub use crate::analysis::{
    JourneyCoverage, JourneyCoverageReport, JourneyMapper, RecommendationGenerator, RiskEngine,
    RiskInputs,
};
pub use crate::collectors::{
    CancellationToken, Collector, CollectorContext, CollectorResult, CollectorStatus,
    ExternalTool, Orchestrator,
};
pub use crate::config::{Config, JourneyConfig, RiskConfig};
pub use crate::errors::{Error, Result};
pub use crate::evidence::{
    Band, Draft, EvidenceId, EvidenceKind, EvidenceStore, Factor, Record, Risk,
};
pub use crate::pipeline::{Pipeline, RunOptions, RunOutcome};
pub use crate::run::{Manifest, RunManager, RunStatus};
