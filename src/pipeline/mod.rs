//! End-to-end run of the evidence pipeline.
//!
//! ```text
//! validate config -> create run -> collectors (parallel) -> barrier
//!     -> risk scoring -> journey mapping -> recommendations -> close manifest
//! ```
//!
//! The derived passes only start once every collector has returned. A
//! cancelled run stops at the next phase boundary and is closed as
//! `incomplete` with whatever evidence it already holds. A store failure
//! closes the run as `failed` and is returned to the caller.

use crate::analysis::{JourneyCoverageReport, JourneyMapper, RecommendationGenerator, RiskEngine};
use crate::collectors::{
    CancellationToken, CollectionSummary, Collector, CollectorContext, Orchestrator,
};
use crate::config::Config;
use crate::errors::{Error, Result};
use crate::evidence::{JourneyGap, Recommendation, Record, Risk};
use crate::observability::{self, PipelinePhase};
use crate::run::{Manifest, RunHandle, RunManager, RunStatus};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Artifact holding the full journey coverage report.
pub const JOURNEY_REPORT_ARTIFACT: &str = "journey_coverage.json";

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Runs root; falls back to `RISKMAP_RUNS_DIR`, then `~/.riskmap/runs`
    pub runs_dir: Option<PathBuf>,
    pub cancel: CancellationToken,
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub manifest: Manifest,
    pub collection: CollectionSummary,
    pub risks: Vec<Record<Risk>>,
    pub journeys: JourneyCoverageReport,
    pub gaps: Vec<Record<JourneyGap>>,
    pub recommendations: Vec<Record<Recommendation>>,
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        self.manifest.status
    }
}

pub struct Pipeline {
    config: Config,
    orchestrator: Orchestrator,
}

impl Pipeline {
    /// Pipeline with the built-in collectors enabled in `config`.
    pub fn new(config: Config) -> Self {
        let orchestrator = Orchestrator::from_config(&config.collectors);
        Self {
            config,
            orchestrator,
        }
    }

    /// Replace the collector set.
    pub fn with_collectors(mut self, collectors: Vec<Box<dyn Collector>>) -> Self {
        self.orchestrator = Orchestrator::new(collectors, self.config.collectors.worker_count());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self, target: &Path, options: &RunOptions) -> Result<RunOutcome> {
        {
            let _phase = observability::set_phase(PipelinePhase::Configuration);
            self.config.validate()?;
            if !target.is_dir() {
                return Err(Error::config_with_path(
                    "analysis target is not a directory",
                    target,
                ));
            }
        }

        let base_dir = RunManager::resolve_base_dir(options.runs_dir.as_deref())?;
        let run = RunManager::new(base_dir).create_run(target)?;
        let _run_guard = observability::set_run(run.run_id());
        log::info!("Started run {} for {}", run.run_id(), target.display());

        match self.execute(&run, target, &options.cancel) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                log::error!("Run {} failed: {}", run.run_id(), e);
                if let Err(close) = run.finish(RunStatus::Failed) {
                    log::error!("Cannot close run {}: {}", run.run_id(), close);
                }
                Err(e)
            }
        }
    }

    fn execute(&self, run: &RunHandle, target: &Path, cancel: &CancellationToken) -> Result<RunOutcome> {
        let ctx = CollectorContext::new(target, self.config.collectors.clone())
            .with_cancel(cancel.clone());

        let collection = timed("collection", || {
            let _phase = observability::set_phase(PipelinePhase::Collection);
            self.orchestrator.run(run, &ctx)
        })?;

        let mut outcome = RunOutcome {
            run_id: run.run_id().to_string(),
            run_dir: run.root().to_path_buf(),
            manifest: run.manifest(),
            collection,
            risks: Vec::new(),
            journeys: JourneyCoverageReport::default(),
            gaps: Vec::new(),
            recommendations: Vec::new(),
        };

        if cancelled_before(run, cancel, "risk scoring")? {
            outcome.manifest = run.finish(RunStatus::Incomplete)?;
            return Ok(outcome);
        }
        outcome.risks = timed("risk scoring", || {
            let _phase = observability::set_phase(PipelinePhase::RiskScoring);
            RiskEngine::new(self.config.risk.clone()).run(run.store())
        })?;

        if cancelled_before(run, cancel, "journey mapping")? {
            outcome.manifest = run.finish(RunStatus::Incomplete)?;
            return Ok(outcome);
        }
        let (report, gaps) = timed("journey mapping", || {
            let _phase = observability::set_phase(PipelinePhase::JourneyMapping);
            JourneyMapper::new(self.config.journeys.clone()).run(run.store())
        })?;
        if !report.journeys.is_empty() {
            run.write_artifact(JOURNEY_REPORT_ARTIFACT, &serde_json::to_vec_pretty(&report)?)?;
        }
        outcome.journeys = report;
        outcome.gaps = gaps;

        if cancelled_before(run, cancel, "recommendations")? {
            outcome.manifest = run.finish(RunStatus::Incomplete)?;
            return Ok(outcome);
        }
        outcome.recommendations = timed("recommendations", || {
            let _phase = observability::set_phase(PipelinePhase::Recommendation);
            RecommendationGenerator::new(self.config.journeys.min_gap_delta).run(run.store())
        })?;

        let status = if outcome.collection.all_ok() {
            RunStatus::Completed
        } else {
            let degraded: Vec<String> = outcome
                .collection
                .statuses
                .iter()
                .filter(|(_, status)| !status.is_ok())
                .map(|(name, status)| format!("{}={}", name, status))
                .collect();
            run.add_diagnostic(format!("degraded collectors: {}", degraded.join(", ")))?;
            RunStatus::Incomplete
        };
        outcome.manifest = run.finish(status)?;
        Ok(outcome)
    }
}

/// Records a diagnostic and reports whether the run was cancelled.
fn cancelled_before(run: &RunHandle, cancel: &CancellationToken, phase: &str) -> Result<bool> {
    if !cancel.is_cancelled() {
        return Ok(false);
    }
    log::warn!("Run {} cancelled before {}", run.run_id(), phase);
    run.add_diagnostic(format!("cancelled before {}", phase))?;
    Ok(true)
}

fn timed<T>(phase: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let span = tracing::info_span!("phase", name = phase);
    let _entered = span.enter();
    let start = Instant::now();
    let result = f();
    log::debug!("{} finished in {:?}", phase, start.elapsed());
    result
}
