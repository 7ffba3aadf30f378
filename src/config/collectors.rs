use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Names accepted under `[collectors.tools.<name>]`.
pub const KNOWN_COLLECTORS: [&str; 6] = [
    "bandit",
    "pip-audit",
    "pylint",
    "flake8",
    "coverage",
    "git-churn",
];

/// Upper bound for the automatic worker count
const MAX_AUTO_WORKERS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorsConfig {
    /// Concurrent collectors; 0 picks the number of cores, capped at 4
    pub parallelism: usize,
    /// Fallback timeout for tools without their own default
    pub default_timeout_secs: u64,
    /// History window for git churn
    pub churn_window_days: u32,
    /// Coverage reports probed relative to the target, in order
    pub coverage_reports: Vec<String>,
    pub tools: BTreeMap<String, ToolOverride>,
}

impl Default for CollectorsConfig {
    fn default() -> Self {
        Self {
            parallelism: 0,
            default_timeout_secs: 120,
            churn_window_days: 90,
            coverage_reports: vec!["coverage.xml".to_string(), "lcov.info".to_string()],
            tools: BTreeMap::new(),
        }
    }
}

/// Per-tool adjustments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolOverride {
    pub enabled: Option<bool>,
    /// Executable name or path to use instead of the tool's default
    pub executable: Option<String>,
    pub timeout_secs: Option<u64>,
    pub extra_args: Vec<String>,
}

impl CollectorsConfig {
    pub fn tool(&self, name: &str) -> Option<&ToolOverride> {
        self.tools.get(name)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.tool(name).and_then(|t| t.enabled).unwrap_or(true)
    }

    /// Timeout for `name`: explicit override, then the tool's own default,
    /// then the global fallback.
    pub fn timeout_for(&self, name: &str, tool_default: Option<Duration>) -> Duration {
        self.tool(name)
            .and_then(|t| t.timeout_secs)
            .map(Duration::from_secs)
            .or(tool_default)
            .unwrap_or_else(|| Duration::from_secs(self.default_timeout_secs))
    }

    pub fn executable_for<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.tool(name)
            .and_then(|t| t.executable.as_deref())
            .unwrap_or(default)
    }

    pub fn extra_args(&self, name: &str) -> &[String] {
        self.tool(name).map(|t| t.extra_args.as_slice()).unwrap_or(&[])
    }

    pub fn worker_count(&self) -> usize {
        if self.parallelism > 0 {
            self.parallelism
        } else {
            num_cpus().min(MAX_AUTO_WORKERS)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.default_timeout_secs == 0 {
            problems.push("default_timeout_secs must be positive".to_string());
        }
        if self.churn_window_days == 0 {
            problems.push("churn_window_days must be positive".to_string());
        }
        for (name, tool) in &self.tools {
            if !KNOWN_COLLECTORS.contains(&name.as_str()) {
                problems.push(format!(
                    "unknown collector '{}' (expected one of: {})",
                    name,
                    KNOWN_COLLECTORS.join(", ")
                ));
            }
            if tool.timeout_secs == Some(0) {
                problems.push(format!("collector '{}' timeout must be positive", name));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::config(format!("collectors: {}", problems.join("; "))))
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_timeout_wins_over_tool_default() {
        let mut config = CollectorsConfig::default();
        config.tools.insert(
            "pylint".into(),
            ToolOverride {
                timeout_secs: Some(30),
                ..ToolOverride::default()
            },
        );
        assert_eq!(
            config.timeout_for("pylint", Some(Duration::from_secs(180))),
            Duration::from_secs(30)
        );
        assert_eq!(
            config.timeout_for("bandit", Some(Duration::from_secs(180))),
            Duration::from_secs(180)
        );
        assert_eq!(config.timeout_for("bandit", None), Duration::from_secs(120));
    }

    #[test]
    fn auto_parallelism_is_capped() {
        let config = CollectorsConfig::default();
        let workers = config.worker_count();
        assert!((1..=MAX_AUTO_WORKERS).contains(&workers));
    }

    #[test]
    fn unknown_tool_names_are_rejected() {
        let mut config = CollectorsConfig::default();
        config.tools.insert("sonar".into(), ToolOverride::default());
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("unknown collector 'sonar'"), "{message}");
    }

    #[test]
    fn disabled_tools_report_disabled() {
        let mut config = CollectorsConfig::default();
        config.tools.insert(
            "flake8".into(),
            ToolOverride {
                enabled: Some(false),
                ..ToolOverride::default()
            },
        );
        assert!(!config.is_enabled("flake8"));
        assert!(config.is_enabled("bandit"));
    }
}
