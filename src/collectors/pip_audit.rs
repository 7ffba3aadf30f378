use super::tool::{parse_error, ExternalTool};
use super::CollectorContext;
use crate::errors::{Error, Result};
use crate::evidence::{Draft, EvidenceDraft, Finding, FindingCategory, Severity};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Dependency vulnerability audit of the target's requirements file.
pub struct PipAudit;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Report {
    Wrapped { dependencies: Vec<Dependency> },
    Bare(Vec<Dependency>),
}

#[derive(Debug, Deserialize)]
struct Dependency {
    name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    vulns: Vec<Vulnerability>,
}

#[derive(Debug, Deserialize)]
struct Vulnerability {
    id: String,
    #[serde(default)]
    fix_versions: Vec<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
}

/// `requirements.txt` if present, otherwise the first `requirements*.txt`.
pub(crate) fn requirements_file(target: &Path) -> Option<String> {
    if target.join("requirements.txt").is_file() {
        return Some("requirements.txt".to_string());
    }
    let pattern = target.join("requirements*.txt");
    let mut found: Vec<String> = glob::glob(&pattern.to_string_lossy())
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    found.sort();
    found.into_iter().next()
}

impl ExternalTool for PipAudit {
    fn tool_name(&self) -> &'static str {
        "pip-audit"
    }

    fn executable(&self) -> &'static str {
        "pip-audit"
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(120)
    }

    fn args(&self, ctx: &CollectorContext) -> Result<Vec<String>> {
        let requirements =
            requirements_file(&ctx.target).ok_or_else(|| Error::ToolUnavailable {
                tool: self.tool_name().to_string(),
                message: "no requirements file found".to_string(),
            })?;
        Ok(vec![
            "-r".to_string(),
            requirements,
            "--format".to_string(),
            "json".to_string(),
        ])
    }

    fn parse(&self, stdout: &str, ctx: &CollectorContext) -> Result<Vec<EvidenceDraft>> {
        if stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        let report: Report =
            serde_json::from_str(stdout).map_err(|e| parse_error(self.tool_name(), e))?;
        let dependencies = match report {
            Report::Wrapped { dependencies } => dependencies,
            Report::Bare(dependencies) => dependencies,
        };
        let manifest = requirements_file(&ctx.target).unwrap_or_else(|| "requirements.txt".into());

        let mut drafts = Vec::new();
        for dependency in dependencies {
            for vuln in dependency.vulns {
                // A published fix makes the exposure actionable right away.
                let severity = if vuln.fix_versions.is_empty() {
                    Severity::High
                } else {
                    Severity::Critical
                };
                let message = format!(
                    "{} {} is affected by {}{}",
                    dependency.name,
                    dependency.version.as_deref().unwrap_or("?"),
                    vuln.id,
                    vuln.description
                        .as_deref()
                        .map(|d| format!(": {}", d.lines().next().unwrap_or(d)))
                        .unwrap_or_default()
                );
                let finding = Finding {
                    component: manifest.clone(),
                    line: None,
                    column: None,
                    severity,
                    category: FindingCategory::Dependency,
                    code: Some(vuln.id.clone()),
                    message,
                    confidence: 0.9,
                };
                drafts.push(
                    Draft::new(self.tool_name(), finding)
                        .with_tag("dependency")
                        .with_tag("pip-audit")
                        .with_metadata("package", dependency.name.clone())
                        .with_metadata("installed_version", dependency.version.clone())
                        .with_metadata("fix_versions", vuln.fix_versions)
                        .with_metadata("aliases", vuln.aliases)
                        .into(),
                );
            }
        }
        Ok(drafts)
    }
}
