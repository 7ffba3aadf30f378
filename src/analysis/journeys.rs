//! Coverage-to-journey mapping.
//!
//! Components are matched against each journey's globs (a component may
//! belong to several journeys), their coverage is averaged and compared
//! against the journey's target. Journeys below target become gap records;
//! journeys at or above target stay quiet.

use super::{current_records, round2};
use crate::config::{Averaging, Journey, JourneyConfig};
use crate::errors::Result;
use crate::evidence::{Coverage, Draft, EvidenceId, EvidenceStore, JourneyGap, Record};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const SOURCE: &str = "journey-mapper";

/// Coverage of one journey in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyCoverage {
    pub id: String,
    pub name: String,
    pub target_pct: f64,
    /// `None` when no matched component had measurable lines
    pub current_pct: Option<f64>,
    pub components: Vec<String>,
    /// Matched components without measurable coverage
    pub unknown_components: Vec<String>,
    pub coverage_refs: Vec<EvidenceId>,
}

impl JourneyCoverage {
    pub fn measured(&self) -> bool {
        self.current_pct.is_some()
    }

    /// Percentage points still missing, zero when on target.
    pub fn delta_pct(&self) -> f64 {
        round2((self.target_pct - self.current_pct.unwrap_or(0.0)).max(0.0))
    }

    pub fn meets_target(&self) -> bool {
        self.delta_pct() <= 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JourneyCoverageReport {
    pub journeys: Vec<JourneyCoverage>,
    /// Covered components that no journey claims
    pub unmapped: Vec<String>,
}

impl JourneyCoverageReport {
    pub fn below_target(&self) -> impl Iterator<Item = &JourneyCoverage> {
        self.journeys.iter().filter(|j| !j.meets_target())
    }
}

/// Merged coverage of a single component.
#[derive(Debug, Default)]
struct ComponentCoverage {
    covered: u64,
    total: u64,
    refs: Vec<EvidenceId>,
}

impl ComponentCoverage {
    fn ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.covered.min(self.total) as f64 / self.total as f64)
    }
}

struct CompiledJourney<'a> {
    journey: &'a Journey,
    patterns: Vec<Pattern>,
}

impl CompiledJourney<'_> {
    fn matches(&self, component: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(component))
    }
}

pub struct JourneyMapper {
    config: JourneyConfig,
}

impl JourneyMapper {
    pub fn new(config: JourneyConfig) -> Self {
        Self { config }
    }

    /// Group coverage records by journey.
    pub fn evaluate(&self, records: &[Record<Coverage>]) -> Result<JourneyCoverageReport> {
        let mut components: BTreeMap<&str, ComponentCoverage> = BTreeMap::new();
        for record in records {
            let entry = components.entry(record.body.component.as_str()).or_default();
            entry.covered += record.body.covered;
            entry.total += record.body.total;
            entry.refs.push(record.id.clone());
        }

        let compiled = self
            .config
            .journeys
            .iter()
            .map(|journey| -> Result<CompiledJourney<'_>> {
                let patterns = journey
                    .patterns
                    .iter()
                    .map(|p| Pattern::new(p))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(CompiledJourney { journey, patterns })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut mapped: BTreeSet<&str> = BTreeSet::new();
        let journeys = compiled
            .iter()
            .map(|cj| {
                let matched: Vec<(&str, &ComponentCoverage)> = components
                    .iter()
                    .filter(|(name, _)| cj.matches(name))
                    .map(|(name, cov)| (*name, cov))
                    .collect();
                mapped.extend(matched.iter().map(|(name, _)| *name));
                self.summarize(cj.journey, &matched)
            })
            .collect();

        let unmapped = components
            .keys()
            .filter(|name| !mapped.contains(*name))
            .map(|name| name.to_string())
            .collect();

        Ok(JourneyCoverageReport { journeys, unmapped })
    }

    fn summarize(&self, journey: &Journey, matched: &[(&str, &ComponentCoverage)]) -> JourneyCoverage {
        let measurable: Vec<&ComponentCoverage> = matched
            .iter()
            .filter(|(_, cov)| cov.total > 0)
            .map(|(_, cov)| *cov)
            .collect();

        let current = if measurable.is_empty() {
            None
        } else {
            let ratio = match self.config.averaging {
                Averaging::Mean => {
                    measurable.iter().filter_map(|c| c.ratio()).sum::<f64>()
                        / measurable.len() as f64
                }
                Averaging::StatementWeighted => {
                    let covered: u64 = measurable.iter().map(|c| c.covered.min(c.total)).sum();
                    let total: u64 = measurable.iter().map(|c| c.total).sum();
                    covered as f64 / total as f64
                }
            };
            Some(round2(ratio * 100.0))
        };

        let mut coverage_refs: Vec<EvidenceId> = matched
            .iter()
            .flat_map(|(_, cov)| cov.refs.iter().cloned())
            .collect();
        coverage_refs.sort();

        JourneyCoverage {
            id: journey.id.clone(),
            name: journey.display_name().to_string(),
            target_pct: journey.target,
            current_pct: current,
            components: matched.iter().map(|(name, _)| name.to_string()).collect(),
            unknown_components: matched
                .iter()
                .filter(|(_, cov)| cov.total == 0)
                .map(|(name, _)| name.to_string())
                .collect(),
            coverage_refs,
        }
    }

    /// One gap draft per journey below target, in configuration order.
    pub fn gaps(&self, report: &JourneyCoverageReport) -> Vec<Draft<JourneyGap>> {
        report
            .below_target()
            .map(|journey| {
                let gap = JourneyGap {
                    journey_id: journey.id.clone(),
                    journey_name: journey.name.clone(),
                    current_pct: journey.current_pct.unwrap_or(0.0),
                    target_pct: journey.target_pct,
                    delta_pct: journey.delta_pct(),
                    measured: journey.measured(),
                    components: journey.components.clone(),
                    evidence_refs: journey.coverage_refs.clone(),
                };
                let mut draft = Draft::new(SOURCE, gap).with_tag(format!("journey:{}", journey.id));
                if !journey.measured() {
                    draft = draft.with_tag("unmeasured");
                }
                draft
            })
            .collect()
    }

    /// Map the run's coverage and append gap records.
    pub fn run(&self, store: &EvidenceStore) -> Result<(JourneyCoverageReport, Vec<Record<JourneyGap>>)> {
        if self.config.is_empty() {
            log::debug!("No journeys configured; skipping journey mapping");
        }
        let coverage = current_records(store.read_all::<Coverage>());
        let report = self.evaluate(&coverage)?;
        let gaps = store.append_all(self.gaps(&report))?;
        log::info!(
            "Mapped {} journeys: {} below target, {} unmapped components",
            report.journeys.len(),
            gaps.len(),
            report.unmapped.len()
        );
        Ok((report, gaps))
    }
}
