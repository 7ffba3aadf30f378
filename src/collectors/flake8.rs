//! Flake8 in its default `path:line:col: CODE message` format.

use super::tool::ExternalTool;
use super::CollectorContext;
use crate::errors::Result;
use crate::evidence::{Draft, EvidenceDraft, Finding, FindingCategory, Severity};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

static LINE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<file>.*?):(?P<line>\d+):(?P<column>\d+):\s(?P<code>[A-Z]+\d+)\s(?P<message>.*)$")
        .expect("valid regex")
});

pub struct Flake8;

/// Severity by code family: E9/F8 are syntax or undefined-name errors.
fn severity_for(code: &str) -> Severity {
    if code.starts_with("E9") || code.starts_with("F8") {
        Severity::High
    } else if code.starts_with('F') || code.starts_with('E') {
        Severity::Medium
    } else {
        Severity::Low
    }
}

impl ExternalTool for Flake8 {
    fn tool_name(&self) -> &'static str {
        "flake8"
    }

    fn executable(&self) -> &'static str {
        "flake8"
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(120)
    }

    fn artifact_extension(&self) -> &'static str {
        "log"
    }

    fn args(&self, _ctx: &CollectorContext) -> Result<Vec<String>> {
        Ok(vec![".".to_string()])
    }

    fn parse(&self, stdout: &str, ctx: &CollectorContext) -> Result<Vec<EvidenceDraft>> {
        let mut drafts = Vec::new();
        for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Some(caps) = LINE_PATTERN.captures(line) else {
                log::debug!("flake8: ignoring unrecognized line {:?}", line);
                continue;
            };
            let code = caps["code"].to_string();
            let finding = Finding {
                component: ctx.component_path(&caps["file"]),
                line: caps["line"].parse().ok(),
                column: caps["column"].parse().ok(),
                severity: severity_for(&code),
                category: FindingCategory::Quality,
                code: Some(code),
                message: caps["message"].to_string(),
                confidence: 0.8,
            };
            drafts.push(
                Draft::new(self.tool_name(), finding)
                    .with_tag("lint")
                    .with_tag("flake8")
                    .into(),
            );
        }
        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectorsConfig;
    use indoc::indoc;

    #[test]
    fn parses_default_format_and_skips_noise() {
        let ctx = CollectorContext::new("/repo", CollectorsConfig::default());
        let drafts = Flake8
            .parse(
                indoc! {"
                    ./app/views.py:10:1: F401 'os' imported but unused
                    ./app/views.py:88:80: E501 line too long (99 > 79 characters)
                    some warning from a plugin
                    ./app/models.py:3:5: E999 SyntaxError: invalid syntax
                "},
                &ctx,
            )
            .unwrap();

        let findings: Vec<&Finding> = drafts
            .iter()
            .filter_map(|d| match d {
                EvidenceDraft::Finding(f) => Some(&f.body),
                _ => None,
            })
            .collect();

        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].component, "app/views.py");
        assert_eq!(findings[0].line, Some(10));
        assert_eq!(findings[1].column, Some(80));
        assert_eq!(findings[2].severity, Severity::High);
    }

    #[test]
    fn code_families_map_to_severity() {
        assert_eq!(severity_for("F821"), Severity::High);
        assert_eq!(severity_for("F401"), Severity::Medium);
        assert_eq!(severity_for("W605"), Severity::Low);
        assert_eq!(severity_for("C901"), Severity::Low);
    }
}
