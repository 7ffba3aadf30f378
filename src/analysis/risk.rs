//! Composite risk scoring per component.
//!
//! Three factors feed the score, each normalized to [0, 1]:
//!
//! - **security**: weighted findings, saturating at `security.saturation`
//! - **coverage**: `1 - covered/total`, or `unknown_coverage_score` when no
//!   measurable coverage exists
//! - **churn**: percentile rank of the component's raw churn among all
//!   churned components in the run
//!
//! The composite is the weighted mean scaled to 0-100 and rounded to two
//! decimals; the band comes from the rounded score.

use super::{current_records, round2};
use crate::config::RiskConfig;
use crate::errors::Result;
use crate::evidence::{
    Churn, Coverage, Draft, EvidenceId, EvidenceStore, Factor, FactorContribution, Finding, Record,
    Risk, RiskSignals, Severity,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

pub const SOURCE: &str = "risk-engine";

/// Evidence consumed by the engine, with superseded records already removed.
#[derive(Debug, Clone, Default)]
pub struct RiskInputs {
    pub findings: Vec<Record<Finding>>,
    pub coverage: Vec<Record<Coverage>>,
    pub churn: Vec<Record<Churn>>,
}

impl RiskInputs {
    pub fn from_store(store: &EvidenceStore) -> Self {
        Self {
            findings: current_records(store.read_all()),
            coverage: current_records(store.read_all()),
            churn: current_records(store.read_all()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty() && self.coverage.is_empty() && self.churn.is_empty()
    }
}

/// Everything known about one component.
#[derive(Debug, Default)]
struct ComponentEvidence<'a> {
    findings: Vec<&'a Record<Finding>>,
    coverage: Vec<&'a Record<Coverage>>,
    churn: Vec<&'a Record<Churn>>,
}

impl ComponentEvidence<'_> {
    /// Summed covered/total over records with measurable lines.
    fn merged_coverage(&self) -> Option<f64> {
        let (covered, total) = self
            .coverage
            .iter()
            .filter(|r| r.body.total > 0)
            .fold((0u64, 0u64), |(c, t), r| (c + r.body.covered, t + r.body.total));
        (total > 0).then(|| covered.min(total) as f64 / total as f64)
    }

    fn commits(&self) -> u32 {
        self.churn.iter().map(|r| r.body.commits).sum()
    }

    fn lines_changed(&self) -> u64 {
        self.churn.iter().map(|r| r.body.lines_changed()).sum()
    }

    fn last_commit_at(&self) -> Option<DateTime<Utc>> {
        self.churn.iter().filter_map(|r| r.body.last_commit_at).max()
    }

    fn sources(&self) -> BTreeSet<&str> {
        self.findings
            .iter()
            .map(|r| r.source.as_str())
            .chain(self.coverage.iter().map(|r| r.source.as_str()))
            .chain(self.churn.iter().map(|r| r.source.as_str()))
            .collect()
    }

    fn evidence_refs(&self) -> Vec<EvidenceId> {
        let mut refs: Vec<EvidenceId> = self
            .findings
            .iter()
            .map(|r| r.id.clone())
            .chain(self.coverage.iter().map(|r| r.id.clone()))
            .chain(self.churn.iter().map(|r| r.id.clone()))
            .collect();
        refs.sort();
        refs
    }
}

pub struct RiskEngine {
    config: RiskConfig,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Score every component with evidence, in component order.
    pub fn assess(&self, inputs: &RiskInputs) -> Vec<Draft<Risk>> {
        let mut components: BTreeMap<&str, ComponentEvidence<'_>> = BTreeMap::new();
        for record in &inputs.findings {
            components
                .entry(record.body.component.as_str())
                .or_default()
                .findings
                .push(record);
        }
        for record in &inputs.coverage {
            components
                .entry(record.body.component.as_str())
                .or_default()
                .coverage
                .push(record);
        }
        for record in &inputs.churn {
            components
                .entry(record.body.component.as_str())
                .or_default()
                .churn
                .push(record);
        }

        let raw_churn: BTreeMap<&str, f64> = components
            .iter()
            .filter(|(_, ev)| !ev.churn.is_empty())
            .map(|(name, ev)| {
                (
                    *name,
                    self.config.churn.raw(ev.commits(), ev.lines_changed()),
                )
            })
            .collect();
        let percentiles = churn_percentiles(&raw_churn);
        let newest_commit = inputs
            .churn
            .iter()
            .filter_map(|r| r.body.last_commit_at)
            .max();

        components
            .iter()
            .map(|(name, evidence)| {
                let churn_score = percentiles.get(name).copied().unwrap_or(0.0);
                self.score_component(name, evidence, churn_score, newest_commit)
            })
            .collect()
    }

    fn score_component(
        &self,
        component: &str,
        evidence: &ComponentEvidence<'_>,
        churn_score: f64,
        newest_commit: Option<DateTime<Utc>>,
    ) -> Draft<Risk> {
        let weights = &self.config.weights;

        let security_points: f64 = evidence
            .findings
            .iter()
            .map(|r| {
                self.config
                    .security
                    .finding_points(r.body.severity, r.body.category)
            })
            .sum();
        let security_score = (security_points / self.config.security.saturation).min(1.0);

        let coverage_ratio = evidence.merged_coverage();
        let coverage_score = coverage_ratio
            .map(|ratio| 1.0 - ratio)
            .unwrap_or(self.config.unknown_coverage_score);

        let sub_scores = [
            (Factor::Security, security_score, evidence.findings.len(), !evidence.findings.is_empty()),
            (Factor::Coverage, coverage_score, evidence.coverage.len(), coverage_ratio.is_some()),
            (Factor::Churn, churn_score, evidence.churn.len(), !evidence.churn.is_empty()),
        ];

        let factors: BTreeMap<Factor, FactorContribution> = sub_scores
            .iter()
            .map(|&(factor, sub_score, evidence_count, observed)| {
                let weight = weights.normalized(factor);
                (
                    factor,
                    FactorContribution {
                        sub_score: round4(sub_score),
                        weight: round4(weight),
                        contribution: round2(sub_score * weight * 100.0),
                        evidence_count,
                        observed,
                    },
                )
            })
            .collect();

        let score = round2(
            sub_scores
                .iter()
                .map(|(factor, sub, _, _)| sub * weights.normalized(*factor))
                .sum::<f64>()
                * 100.0,
        )
        .clamp(0.0, 100.0);
        let band = self.config.bands.band_for(score);

        // Ties go to the earlier factor in Factor::ALL.
        let dominant_factor = Factor::ALL
            .into_iter()
            .fold(None::<(Factor, f64)>, |best, factor| {
                let contribution = factors[&factor].contribution;
                match best {
                    Some((_, top)) if top >= contribution => best,
                    _ => Some((factor, contribution)),
                }
            })
            .map(|(factor, _)| factor)
            .unwrap_or(Factor::Security);

        let confidence = self.confidence(evidence, &factors, newest_commit);

        let risk = Risk {
            component: component.to_string(),
            score,
            band,
            confidence,
            dominant_factor,
            factors,
            signals: RiskSignals {
                findings: evidence.findings.len(),
                max_severity: evidence.findings.iter().map(|r| r.body.severity).max(),
                coverage_ratio: coverage_ratio.map(round4),
                commits: evidence.commits(),
                lines_changed: evidence.lines_changed(),
            },
            evidence_refs: evidence.evidence_refs(),
        };

        let mut draft = Draft::new(SOURCE, risk).with_tag(band.as_str());
        if draft.body.signals.max_severity == Some(Severity::Critical) {
            draft = draft.with_tag("critical-finding");
        }
        draft
    }

    /// Base confidence is the share of weighted factors that were actually
    /// observed; density, tool diversity and recency adjust it.
    fn confidence(
        &self,
        evidence: &ComponentEvidence<'_>,
        factors: &BTreeMap<Factor, FactorContribution>,
        newest_commit: Option<DateTime<Utc>>,
    ) -> f64 {
        let active = self.config.weights.active();
        if active.is_empty() {
            return 0.0;
        }
        let populated = active
            .iter()
            .filter(|f| factors.get(f).is_some_and(|c| c.observed))
            .count();
        let base = populated as f64 / active.len() as f64;

        let tuning = &self.config.confidence;
        let density = tuning.density_multiplier(evidence.findings.len());
        let diversity = tuning.diversity_multiplier(evidence.sources().len());
        let recency = match (newest_commit, evidence.last_commit_at()) {
            (Some(newest), Some(last)) => {
                let age_days = (newest - last).num_seconds() as f64 / 86_400.0;
                tuning.recency_multiplier(age_days)
            }
            _ => 1.0,
        };

        round4((base * density * diversity * recency).clamp(0.0, 1.0))
    }

    /// Score the run's evidence and append the results.
    pub fn run(&self, store: &EvidenceStore) -> Result<Vec<Record<Risk>>> {
        let inputs = RiskInputs::from_store(store);
        let drafts = self.assess(&inputs);
        log::info!(
            "Scored {} components ({} findings, {} coverage, {} churn records)",
            drafts.len(),
            inputs.findings.len(),
            inputs.coverage.len(),
            inputs.churn.len()
        );
        store.append_all(drafts)
    }
}

/// Average-rank percentile of each raw churn value. Zero churn stays zero;
/// tied values share the mean of their ranks.
fn churn_percentiles<'a>(raw: &BTreeMap<&'a str, f64>) -> BTreeMap<&'a str, f64> {
    let positive: Vec<f64> = raw.values().copied().filter(|v| *v > 0.0).collect();
    let n = positive.len() as f64;

    raw.iter()
        .map(|(name, value)| {
            if *value <= 0.0 {
                return (*name, 0.0);
            }
            let below = positive.iter().filter(|v| **v < *value).count() as f64;
            let equal = positive.iter().filter(|v| **v == *value).count() as f64;
            let mean_rank = below + (equal + 1.0) / 2.0;
            (*name, mean_rank / n)
        })
        .collect()
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FactorWeights;
    use crate::evidence::{Band, EvidenceKind, FindingCategory};
    use chrono::TimeZone;

    const DATE: &str = "20251024";

    fn finding(seq: u32, component: &str, severity: Severity, source: &str) -> Record<Finding> {
        Draft::new(
            source,
            Finding {
                component: component.into(),
                line: Some(1),
                column: None,
                severity,
                category: FindingCategory::Security,
                code: None,
                message: "issue".into(),
                confidence: 0.9,
            },
        )
        .into_record(EvidenceId::new(EvidenceKind::Findings, DATE, seq))
    }

    fn coverage(seq: u32, component: &str, covered: u64, total: u64) -> Record<Coverage> {
        Draft::new("coverage", Coverage::new(component, covered, total))
            .into_record(EvidenceId::new(EvidenceKind::Coverage, DATE, seq))
    }

    fn churn(seq: u32, component: &str, commits: u32, lines: u64, day: u32) -> Record<Churn> {
        Draft::new(
            "git-churn",
            Churn {
                component: component.into(),
                commits,
                lines_added: lines,
                lines_removed: 0,
                contributors: 1,
                window_days: 90,
                last_commit_at: Some(Utc.with_ymd_and_hms(2025, 10, day, 12, 0, 0).unwrap()),
            },
        )
        .into_record(EvidenceId::new(EvidenceKind::Churn, DATE, seq))
    }

    #[test]
    fn two_critical_findings_without_coverage_land_in_p1() {
        let engine = RiskEngine::new(RiskConfig::default());
        let inputs = RiskInputs {
            findings: vec![
                finding(1, "app/auth.py", Severity::Critical, "bandit"),
                finding(2, "app/auth.py", Severity::Critical, "bandit"),
            ],
            ..RiskInputs::default()
        };

        let drafts = engine.assess(&inputs);
        assert_eq!(drafts.len(), 1);
        let risk = &drafts[0].body;

        assert_eq!(risk.score, 68.0);
        assert_eq!(risk.band, Band::P1);
        assert_eq!(risk.dominant_factor, Factor::Security);
        assert!(!risk.factors[&Factor::Coverage].observed);
        // one of three weighted factors observed, plus one corroborating finding
        assert!((risk.confidence - 0.35).abs() < 1e-9, "{}", risk.confidence);
        assert_eq!(risk.evidence_refs.len(), 2);
    }

    #[test]
    fn zero_total_coverage_is_unknown_not_a_division() {
        let engine = RiskEngine::new(RiskConfig::default());
        let inputs = RiskInputs {
            coverage: vec![coverage(1, "empty.py", 0, 0)],
            ..RiskInputs::default()
        };

        let risk = &engine.assess(&inputs)[0].body;
        assert_eq!(risk.signals.coverage_ratio, None);
        assert_eq!(risk.factors[&Factor::Coverage].sub_score, 0.6);
        assert!(risk.score.is_finite());
        assert_eq!(risk.score, 18.0);
    }

    #[test]
    fn merged_coverage_sums_lines_across_reports() {
        let engine = RiskEngine::new(RiskConfig::default());
        let inputs = RiskInputs {
            coverage: vec![coverage(1, "a.py", 1, 4), coverage(2, "a.py", 3, 4)],
            ..RiskInputs::default()
        };
        let risk = &engine.assess(&inputs)[0].body;
        assert_eq!(risk.signals.coverage_ratio, Some(0.5));
        assert_eq!(risk.factors[&Factor::Coverage].contribution, 15.0);
    }

    #[test]
    fn churn_percentiles_rank_and_share_ties() {
        let raw: BTreeMap<&str, f64> =
            [("a", 1.0), ("b", 2.0), ("c", 2.0), ("d", 4.0), ("z", 0.0)]
                .into_iter()
                .collect();
        let p = churn_percentiles(&raw);
        assert_eq!(p["a"], 0.25);
        assert_eq!(p["b"], 0.625);
        assert_eq!(p["c"], 0.625);
        assert_eq!(p["d"], 1.0);
        assert_eq!(p["z"], 0.0);
    }

    #[test]
    fn components_are_scored_in_sorted_order() {
        let engine = RiskEngine::new(RiskConfig::default());
        let inputs = RiskInputs {
            coverage: vec![coverage(1, "z.py", 1, 2), coverage(2, "a.py", 1, 2)],
            churn: vec![churn(1, "m.py", 3, 40, 20)],
            ..RiskInputs::default()
        };
        let names: Vec<_> = engine
            .assess(&inputs)
            .into_iter()
            .map(|d| d.body.component)
            .collect();
        assert_eq!(names, vec!["a.py", "m.py", "z.py"]);
    }

    #[test]
    fn stale_churn_lowers_confidence() {
        let engine = RiskEngine::new(RiskConfig::default());
        let inputs = RiskInputs {
            churn: vec![churn(1, "fresh.py", 2, 10, 20), churn(2, "stale.py", 2, 10, 1)],
            ..RiskInputs::default()
        };
        let drafts = engine.assess(&inputs);
        let fresh = drafts.iter().find(|d| d.body.component == "fresh.py").unwrap();
        let stale = drafts.iter().find(|d| d.body.component == "stale.py").unwrap();
        assert!(stale.body.confidence < fresh.body.confidence);
        assert_eq!(fresh.body.score, stale.body.score);
    }

    #[test]
    fn zero_weight_factor_does_not_count_toward_confidence() {
        let config = RiskConfig {
            weights: FactorWeights {
                security: 1.0,
                coverage: 0.0,
                churn: 0.0,
            },
            ..RiskConfig::default()
        };
        let engine = RiskEngine::new(config);
        let inputs = RiskInputs {
            findings: vec![finding(1, "x.py", Severity::High, "bandit")],
            ..RiskInputs::default()
        };
        let risk = &engine.assess(&inputs)[0].body;
        assert_eq!(risk.confidence, 1.0);
        assert_eq!(risk.score, 30.0);
        assert_eq!(risk.band, Band::P3);
    }

    #[test]
    fn identical_inputs_give_identical_output() {
        let engine = RiskEngine::new(RiskConfig::default());
        let inputs = RiskInputs {
            findings: vec![finding(1, "a.py", Severity::Medium, "bandit")],
            coverage: vec![coverage(1, "a.py", 2, 10)],
            churn: vec![churn(1, "a.py", 5, 100, 10)],
        };
        assert_eq!(engine.assess(&inputs), engine.assess(&inputs));
    }
}
