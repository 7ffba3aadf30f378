//! Runs collectors in parallel and persists what they produce.
//!
//! Each collector runs on a worker of a dedicated rayon pool. Results are
//! held until every collector has finished, then written to the evidence
//! store one collector at a time in declaration order, so identifiers do not
//! depend on which tool finished first. A store failure is fatal and stops
//! persisting at the failing collector.

use super::{Collector, CollectorContext, CollectorResult, CollectorStatus};
use crate::config::CollectorsConfig;
use crate::errors::{Error, Result};
use crate::observability;
use crate::run::{CollectorEntry, CollectorEvent, CollectorOutcome, RunHandle};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

pub struct Orchestrator {
    collectors: Vec<Box<dyn Collector>>,
    workers: usize,
}

/// Per-collector statuses after the barrier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionSummary {
    pub statuses: BTreeMap<String, CollectorStatus>,
    pub records: usize,
    pub cancelled: bool,
}

impl CollectionSummary {
    /// Every collector ran and produced usable output.
    pub fn all_ok(&self) -> bool {
        !self.cancelled && self.statuses.values().all(|s| *s == CollectorStatus::Ok)
    }
}

impl Orchestrator {
    pub fn new(collectors: Vec<Box<dyn Collector>>, workers: usize) -> Self {
        Self {
            collectors,
            workers: workers.max(1),
        }
    }

    /// The built-in collectors minus those disabled in `config`.
    pub fn from_config(config: &CollectorsConfig) -> Self {
        let collectors = super::default_collectors()
            .into_iter()
            .filter(|c| {
                let enabled = config.is_enabled(c.name());
                if !enabled {
                    log::debug!("{} disabled by configuration", c.name());
                }
                enabled
            })
            .collect();
        Self::new(collectors, config.worker_count())
    }

    pub fn collector_names(&self) -> Vec<&str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    /// Run every collector and wait for all of them.
    pub fn run(&self, run: &RunHandle, ctx: &CollectorContext) -> Result<CollectionSummary> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("riskmap-collector-{}", i))
            .build()
            .map_err(|e| Error::config(format!("cannot start collector pool: {}", e)))?;

        observability::set_progress(0, self.collectors.len());
        log::info!(
            "Running {} collectors with {} workers",
            self.collectors.len(),
            self.workers
        );

        let finished: Vec<Result<Option<CollectorResult>>> = pool.install(|| {
            self.collectors
                .par_iter()
                .map(|collector| run_one(collector.as_ref(), run, ctx))
                .collect()
        });

        let mut summary = CollectionSummary {
            cancelled: ctx.cancel.is_cancelled(),
            ..CollectionSummary::default()
        };
        // par_iter().collect() keeps the order of self.collectors
        for (collector, result) in self.collectors.iter().zip(finished) {
            let name = collector.name();
            match result? {
                Some(result) => {
                    let (status, records) = persist(run, name, result).inspect_err(|e| {
                        log::error!("{}: cannot persist evidence: {}", name, e);
                    })?;
                    summary.records += records;
                    summary.statuses.insert(name.to_string(), status);
                }
                None => {
                    summary
                        .statuses
                        .insert(name.to_string(), CollectorStatus::Failed);
                }
            }
        }
        Ok(summary)
    }
}

/// Run one collector. `None` means it was skipped because the run was
/// cancelled before it started; its manifest entry is already written.
fn run_one(
    collector: &dyn Collector,
    run: &RunHandle,
    ctx: &CollectorContext,
) -> Result<Option<CollectorResult>> {
    let name = collector.name().to_string();
    let _guard = observability::set_collector(run.run_id(), name.clone());
    let span = tracing::info_span!("collector", name = %name);
    let _entered = span.enter();

    if ctx.cancel.is_cancelled() {
        log::info!("{} skipped: run cancelled", name);
        run.log_event(&CollectorEvent::new(&name, "collector.skipped").with_detail("cancelled"))?;
        run.record_collector(&name, CollectorEntry::cancelled())?;
        observability::increment_finished();
        return Ok(None);
    }

    run.log_event(&CollectorEvent::new(&name, "collector.start"))?;
    let started = Instant::now();
    let mut result = catch_unwind(AssertUnwindSafe(|| collector.run(ctx))).unwrap_or_else(|panic| {
        CollectorResult::new(&name, CollectorStatus::Failed).with_message(format!(
            "collector panicked: {}",
            observability::payload_message(panic.as_ref())
        ))
    });
    if result.duration.is_zero() {
        result.duration = started.elapsed();
    }
    observability::increment_finished();
    Ok(Some(result))
}

/// Write artifacts and records, then the manifest entry.
fn persist(run: &RunHandle, name: &str, result: CollectorResult) -> Result<(CollectorStatus, usize)> {
    let mut artifacts = Vec::with_capacity(result.artifacts.len());
    for artifact in &result.artifacts {
        artifacts.push(run.write_artifact(&artifact.file_name, &artifact.contents)?);
    }

    let mut records = 0;
    for draft in result.drafts {
        run.store().append_draft(draft)?;
        records += 1;
    }

    let outcome = match result.status {
        _ if result.cancelled => CollectorOutcome::Skipped,
        CollectorStatus::Ok => CollectorOutcome::Executed,
        CollectorStatus::NotFound => CollectorOutcome::Skipped,
        _ => CollectorOutcome::Failed,
    };
    match (&result.status, &result.message) {
        (CollectorStatus::Ok, _) => {
            log::info!("{}: ok, {} records in {:?}", name, records, result.duration)
        }
        (status, Some(message)) => log::warn!("{}: {} ({})", name, status, message),
        (status, None) => log::warn!("{}: {}", name, status),
    }

    let entry = CollectorEntry {
        status: result.status,
        executed: result.status.executed(),
        outcome,
        reason: result.message.clone(),
        version: result.version,
        exit_code: result.exit_code,
        duration_ms: result.duration.as_millis() as u64,
        records,
        artifacts,
    };
    run.record_collector(name, entry)?;

    let event = CollectorEvent::new(name, "collector.finish").with_detail(result.status.as_str());
    run.log_event(&event)?;
    Ok((result.status, records))
}
