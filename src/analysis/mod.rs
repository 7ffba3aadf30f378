//! Post-collection analysis passes.
//!
//! All three passes run after the collector barrier, read the run's evidence
//! and append derived records (risks, journey gaps, recommendations) to the
//! same store. Each pass is single-threaded and processes its inputs in a
//! fixed order, so identical evidence always yields identical records and ids.

pub mod journeys;
pub mod recommend;
pub mod risk;

pub use journeys::{JourneyCoverage, JourneyCoverageReport, JourneyMapper};
pub use recommend::RecommendationGenerator;
pub use risk::{RiskEngine, RiskInputs};

use crate::evidence::{EvidenceBody, EvidenceId, Record, SUPERSEDES_KEY};
use std::collections::BTreeSet;

/// Drop records that a later correction supersedes.
pub fn current_records<T: EvidenceBody>(records: Vec<Record<T>>) -> Vec<Record<T>> {
    let superseded: BTreeSet<EvidenceId> = records
        .iter()
        .filter_map(|r| r.metadata.get(SUPERSEDES_KEY))
        .filter_map(|v| v.as_str())
        .filter_map(|s| EvidenceId::parse(s).ok())
        .collect();
    if superseded.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|r| !superseded.contains(&r.id))
        .collect()
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{Coverage, Draft, EvidenceKind};

    #[test]
    fn superseded_records_are_dropped() {
        let first = EvidenceId::new(EvidenceKind::Coverage, "20251024", 1);
        let second = EvidenceId::new(EvidenceKind::Coverage, "20251024", 2);
        let records = vec![
            Draft::new("coverage", Coverage::new("a.py", 1, 4)).into_record(first.clone()),
            Draft::new("coverage", Coverage::new("a.py", 3, 4))
                .superseding(&first)
                .into_record(second.clone()),
        ];

        let current = current_records(records);
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id, second);
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(1.006), 1.01);
        assert_eq!(round2(68.0), 68.0);
        assert_eq!(round2(12.344), 12.34);
    }
}
