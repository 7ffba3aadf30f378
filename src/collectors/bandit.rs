//! Bandit security scanner.

use super::tool::{parse_error, ExternalTool};
use super::CollectorContext;
use crate::errors::Result;
use crate::evidence::{Draft, EvidenceDraft, Finding, FindingCategory, Severity};
use serde::Deserialize;
use std::time::Duration;

pub struct Bandit;

#[derive(Debug, Deserialize)]
struct Report {
    #[serde(default)]
    results: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    filename: String,
    #[serde(default)]
    line_number: Option<u32>,
    #[serde(default)]
    col_offset: Option<u32>,
    #[serde(default)]
    issue_severity: Option<String>,
    #[serde(default)]
    issue_confidence: Option<String>,
    #[serde(default)]
    issue_text: String,
    #[serde(default)]
    test_id: Option<String>,
    #[serde(default)]
    test_name: Option<String>,
    #[serde(default)]
    more_info: Option<String>,
}

fn confidence_value(label: Option<&str>) -> f64 {
    match label.map(str::to_ascii_uppercase).as_deref() {
        Some("HIGH") => 0.9,
        Some("LOW") => 0.3,
        _ => 0.6,
    }
}

impl ExternalTool for Bandit {
    fn tool_name(&self) -> &'static str {
        "bandit"
    }

    fn executable(&self) -> &'static str {
        "bandit"
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(180)
    }

    fn args(&self, _ctx: &CollectorContext) -> Result<Vec<String>> {
        Ok(["-f", "json", "-q", "-r", "."].map(String::from).to_vec())
    }

    fn parse(&self, stdout: &str, ctx: &CollectorContext) -> Result<Vec<EvidenceDraft>> {
        if stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        let report: Report =
            serde_json::from_str(stdout).map_err(|e| parse_error(self.tool_name(), e))?;

        Ok(report
            .results
            .into_iter()
            .map(|issue| {
                let finding = Finding {
                    component: ctx.component_path(&issue.filename),
                    line: issue.line_number,
                    column: issue.col_offset,
                    severity: Severity::from_label(issue.issue_severity.as_deref().unwrap_or("medium")),
                    category: FindingCategory::Security,
                    code: issue.test_id,
                    message: issue.issue_text,
                    confidence: confidence_value(issue.issue_confidence.as_deref()),
                };
                let mut draft = Draft::new(self.tool_name(), finding)
                    .with_tag("security")
                    .with_tag("bandit");
                if let Some(name) = issue.test_name {
                    draft = draft.with_metadata("test_name", name);
                }
                if let Some(url) = issue.more_info {
                    draft = draft.with_metadata("more_info", url);
                }
                draft.into()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectorsConfig;
    use indoc::indoc;

    #[test]
    fn parses_results_into_security_findings() {
        let ctx = CollectorContext::new("/repo", CollectorsConfig::default());
        let drafts = Bandit
            .parse(
                indoc! {r#"
                    {
                      "errors": [],
                      "results": [
                        {
                          "filename": "./app/db.py",
                          "line_number": 42,
                          "col_offset": 8,
                          "issue_severity": "HIGH",
                          "issue_confidence": "MEDIUM",
                          "issue_text": "Possible SQL injection vector through string-based query construction.",
                          "test_id": "B608",
                          "test_name": "hardcoded_sql_expressions"
                        }
                      ]
                    }
                "#},
                &ctx,
            )
            .unwrap();

        assert_eq!(drafts.len(), 1);
        let EvidenceDraft::Finding(draft) = &drafts[0] else {
            panic!("expected a finding");
        };
        assert_eq!(draft.body.component, "app/db.py");
        assert_eq!(draft.body.severity, Severity::High);
        assert_eq!(draft.body.category, FindingCategory::Security);
        assert_eq!(draft.body.code.as_deref(), Some("B608"));
        assert_eq!(draft.body.confidence, 0.6);
        assert_eq!(draft.metadata["test_name"], "hardcoded_sql_expressions");
    }

    #[test]
    fn empty_output_means_no_findings() {
        let ctx = CollectorContext::new("/repo", CollectorsConfig::default());
        assert!(Bandit.parse("", &ctx).unwrap().is_empty());
    }

    #[test]
    fn non_json_output_is_a_parse_error() {
        let ctx = CollectorContext::new("/repo", CollectorsConfig::default());
        assert!(Bandit.parse("Traceback (most recent call last):", &ctx).is_err());
    }
}
