use crate::pipeline::RunOutcome;
use serde_json::{json, Value};

/// Machine-readable summary of a finished run.
pub fn outcome_json(outcome: &RunOutcome) -> Value {
    json!({
        "run_id": outcome.run_id,
        "run_dir": outcome.run_dir.display().to_string(),
        "status": outcome.status(),
        "collectors": outcome.manifest.collectors,
        "counts": outcome.manifest.counts,
        "diagnostics": outcome.manifest.diagnostics,
        "risks": outcome.risks,
        "journeys": outcome.journeys,
        "gaps": outcome.gaps,
        "recommendations": outcome.recommendations,
    })
}

/// Records of one stream wrapped with their kind.
pub fn records_json(kind: &str, records: Vec<Value>) -> Value {
    json!({
        "kind": kind,
        "count": records.len(),
        "records": records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_json_reports_count() {
        let value = records_json("risks", vec![json!({"id": "RSK-20251024-0001"})]);
        assert_eq!(value["count"], 1);
        assert_eq!(value["records"][0]["id"], "RSK-20251024-0001");
    }
}
