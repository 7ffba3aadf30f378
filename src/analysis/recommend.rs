//! Ranked remediation actions from risks and journey gaps.
//!
//! Only P0/P1 risks and journey gaps of at least `min_gap_delta` points are
//! considered. Text comes from fixed templates chosen by the dominant factor,
//! so the same inputs always yield the same list.

use crate::errors::Result;
use crate::evidence::{
    ActionKind, Band, Draft, EvidenceId, EvidenceStore, Factor, JourneyGap, Recommendation,
    Record, Risk,
};
use std::cmp::Ordering;

pub const SOURCE: &str = "recommender";

/// Band assigned to journey-gap recommendations.
pub const GAP_BAND: Band = Band::P1;

/// A candidate before ranking.
#[derive(Debug, Clone)]
struct Candidate {
    band: Band,
    score: Option<f64>,
    gap_pct: Option<f64>,
    subject: String,
    action: ActionKind,
    summary: String,
    details: String,
    justified_by: Vec<EvidenceId>,
}

impl Candidate {
    fn from_risk(record: &Record<Risk>) -> Self {
        let risk = &record.body;
        let (action, summary, hint) = match risk.dominant_factor {
            Factor::Security => (
                ActionKind::ResolveSecurityFindings,
                format!(
                    "Resolve {} finding{} in {}",
                    risk.signals.findings,
                    if risk.signals.findings == 1 { "" } else { "s" },
                    risk.component
                ),
                match risk.signals.max_severity {
                    Some(severity) => format!(
                        "Highest severity is {}. Review the cited findings and fix or suppress each one with a justification.",
                        severity
                    ),
                    None => "Review the cited findings.".to_string(),
                },
            ),
            Factor::Coverage => (
                ActionKind::AddTests,
                format!("Add tests for {}", risk.component),
                match risk.signals.coverage_ratio {
                    Some(ratio) => format!(
                        "Line coverage is {:.1}%, leaving a {:.1} point gap.",
                        ratio * 100.0,
                        risk.coverage_gap_pct()
                    ),
                    None => "No coverage was measured for this file; add it to the test run.".to_string(),
                },
            ),
            Factor::Churn => (
                ActionKind::StabilizeHotspot,
                format!("Stabilize change hotspot {}", risk.component),
                format!(
                    "{} commits touched {} lines recently. Consider splitting the file or adding regression tests before further changes.",
                    risk.signals.commits, risk.signals.lines_changed
                ),
            ),
        };

        let factors = risk
            .factors
            .iter()
            .map(|(factor, c)| format!("{}={:.1}", factor, c.contribution))
            .collect::<Vec<_>>()
            .join(", ");
        let details = format!(
            "Risk score {:.1} (band {}, confidence {:.2}). Factors: {}. {}",
            risk.score, risk.band, risk.confidence, factors, hint
        );

        let mut justified_by = vec![record.id.clone()];
        justified_by.extend(risk.evidence_refs.iter().cloned());

        Self {
            band: risk.band,
            score: Some(risk.score),
            gap_pct: Some(risk.coverage_gap_pct()),
            subject: risk.component.clone(),
            action,
            summary,
            details,
            justified_by,
        }
    }

    fn from_gap(record: &Record<JourneyGap>) -> Self {
        let gap = &record.body;
        let details = if gap.measured {
            format!(
                "Journey coverage is {:.1}% against a {:.1}% target ({:.1} points short) across {} component{}.",
                gap.current_pct,
                gap.target_pct,
                gap.delta_pct,
                gap.components.len(),
                if gap.components.len() == 1 { "" } else { "s" }
            )
        } else if gap.components.is_empty() {
            format!(
                "No covered file matches this journey's patterns; target is {:.1}%.",
                gap.target_pct
            )
        } else {
            format!(
                "None of the {} matched files has measurable coverage; target is {:.1}%.",
                gap.components.len(),
                gap.target_pct
            )
        };

        let mut justified_by = vec![record.id.clone()];
        justified_by.extend(gap.evidence_refs.iter().cloned());

        Self {
            band: GAP_BAND,
            score: None,
            gap_pct: Some(gap.delta_pct),
            subject: gap.journey_id.clone(),
            action: ActionKind::CloseJourneyGap,
            summary: format!("Increase coverage for journey {}", gap.journey_name),
            details,
            justified_by,
        }
    }

    fn into_draft(self, rank: u32) -> Draft<Recommendation> {
        Draft::new(
            SOURCE,
            Recommendation {
                rank,
                band: self.band,
                action: self.action,
                subject: self.subject,
                summary: self.summary,
                details: self.details,
                score: self.score,
                gap_pct: self.gap_pct.map(super::round2),
                justified_by: self.justified_by,
            },
        )
        .with_tag(self.band.as_str())
    }
}

/// Band desc, score desc (unscored last), gap desc, then subject.
fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.band
        .cmp(&a.band)
        .then_with(|| cmp_desc(a.score, b.score))
        .then_with(|| cmp_desc(a.gap_pct, b.gap_pct))
        .then_with(|| a.subject.cmp(&b.subject))
}

fn cmp_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub struct RecommendationGenerator {
    min_gap_delta: f64,
}

impl RecommendationGenerator {
    pub fn new(min_gap_delta: f64) -> Self {
        Self { min_gap_delta }
    }

    pub fn generate(
        &self,
        risks: &[Record<Risk>],
        gaps: &[Record<JourneyGap>],
    ) -> Vec<Draft<Recommendation>> {
        let mut candidates: Vec<Candidate> = risks
            .iter()
            .filter(|r| r.body.band.is_actionable())
            .map(Candidate::from_risk)
            .chain(
                gaps.iter()
                    .filter(|g| g.body.delta_pct > 0.0 && g.body.delta_pct >= self.min_gap_delta)
                    .map(Candidate::from_gap),
            )
            .collect();
        candidates.sort_by(rank_order);

        candidates
            .into_iter()
            .enumerate()
            .map(|(i, candidate)| candidate.into_draft(i as u32 + 1))
            .collect()
    }

    /// Rank the run's risks and gaps and append the recommendations.
    pub fn run(&self, store: &EvidenceStore) -> Result<Vec<Record<Recommendation>>> {
        let risks = super::current_records(store.read_all::<Risk>());
        let gaps = super::current_records(store.read_all::<JourneyGap>());
        let drafts = self.generate(&risks, &gaps);
        log::info!(
            "Generated {} recommendations from {} risks and {} gaps",
            drafts.len(),
            risks.len(),
            gaps.len()
        );
        store.append_all(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{EvidenceKind, FactorContribution, RiskSignals, Severity};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn risk(seq: u32, component: &str, score: f64, band: Band, dominant: Factor) -> Record<Risk> {
        let factors: BTreeMap<Factor, FactorContribution> = Factor::ALL
            .into_iter()
            .map(|f| {
                (
                    f,
                    FactorContribution {
                        sub_score: 0.5,
                        weight: 1.0 / 3.0,
                        contribution: if f == dominant { score } else { 0.0 },
                        evidence_count: 1,
                        observed: true,
                    },
                )
            })
            .collect();
        Draft::new(
            "risk-engine",
            Risk {
                component: component.into(),
                score,
                band,
                confidence: 0.5,
                dominant_factor: dominant,
                factors,
                signals: RiskSignals {
                    findings: 2,
                    max_severity: Some(Severity::Critical),
                    coverage_ratio: Some(0.25),
                    commits: 4,
                    lines_changed: 120,
                },
                evidence_refs: vec![EvidenceId::new(EvidenceKind::Findings, "20251024", seq)],
            },
        )
        .into_record(EvidenceId::new(EvidenceKind::Risks, "20251024", seq))
    }

    fn gap(seq: u32, journey: &str, delta: f64) -> Record<JourneyGap> {
        Draft::new(
            "journey-mapper",
            JourneyGap {
                journey_id: journey.into(),
                journey_name: journey.to_uppercase(),
                current_pct: 80.0 - delta,
                target_pct: 80.0,
                delta_pct: delta,
                measured: true,
                components: vec!["src/a.py".into()],
                evidence_refs: vec![EvidenceId::new(EvidenceKind::Coverage, "20251024", seq)],
            },
        )
        .into_record(EvidenceId::new(EvidenceKind::Gaps, "20251024", seq))
    }

    #[test]
    fn ranks_by_band_then_score_then_gap() {
        let risks = vec![
            risk(1, "low.py", 40.0, Band::P3, Factor::Security),
            risk(2, "p1.py", 70.0, Band::P1, Factor::Coverage),
            risk(3, "p0.py", 85.0, Band::P0, Factor::Security),
            risk(4, "p1b.py", 66.0, Band::P1, Factor::Churn),
        ];
        let gaps = vec![gap(1, "checkout", 30.0), gap(2, "search", 10.0)];

        let recs = RecommendationGenerator::new(0.0).generate(&risks, &gaps);
        let order: Vec<_> = recs.iter().map(|d| d.body.subject.as_str()).collect();
        assert_eq!(order, vec!["p0.py", "p1.py", "p1b.py", "checkout", "search"]);
        let ranks: Vec<_> = recs.iter().map(|d| d.body.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn templates_follow_dominant_factor() {
        let risks = vec![
            risk(1, "a.py", 85.0, Band::P0, Factor::Security),
            risk(2, "b.py", 70.0, Band::P1, Factor::Coverage),
            risk(3, "c.py", 66.0, Band::P1, Factor::Churn),
        ];
        let recs = RecommendationGenerator::new(0.0).generate(&risks, &[]);
        assert_eq!(recs[0].body.action, ActionKind::ResolveSecurityFindings);
        assert_eq!(recs[0].body.summary, "Resolve 2 findings in a.py");
        assert!(recs[0].body.details.contains("critical"));
        assert_eq!(recs[1].body.action, ActionKind::AddTests);
        assert!(recs[1].body.details.contains("25.0%"));
        assert_eq!(recs[2].body.action, ActionKind::StabilizeHotspot);
    }

    #[test]
    fn every_recommendation_cites_its_source_record_first() {
        let risks = vec![risk(7, "a.py", 90.0, Band::P0, Factor::Security)];
        let gaps = vec![gap(3, "checkout", 12.0)];
        let recs = RecommendationGenerator::new(0.0).generate(&risks, &gaps);

        assert_eq!(recs[0].body.justified_by[0].as_str(), "RSK-20251024-0007");
        assert_eq!(recs[1].body.justified_by[0].as_str(), "GAP-20251024-0003");
        assert!(recs.iter().all(|r| !r.body.justified_by.is_empty()));
    }

    #[test]
    fn small_gaps_are_filtered_by_threshold() {
        let gaps = vec![gap(1, "checkout", 4.0), gap(2, "search", 6.0)];
        let recs = RecommendationGenerator::new(5.0).generate(&[], &gaps);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].body.subject, "search");
        assert_eq!(recs[0].body.band, GAP_BAND);
        assert_eq!(recs[0].body.score, None);
    }

    #[test]
    fn nothing_actionable_yields_empty_list() {
        let risks = vec![risk(1, "a.py", 55.0, Band::P2, Factor::Security)];
        assert!(RecommendationGenerator::new(0.0)
            .generate(&risks, &[])
            .is_empty());
    }
}
