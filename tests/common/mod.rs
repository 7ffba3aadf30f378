// Shared fixtures for riskmap integration tests
#![allow(dead_code)]

use riskmap::collectors::{Collector, CollectorContext, CollectorResult, CollectorStatus};
use riskmap::evidence::{Churn, Coverage, Draft, EvidenceDraft, Finding, FindingCategory, Severity};
use riskmap::{CancellationToken, RunOptions};
use tempfile::TempDir;

/// Collector that replays a fixed set of drafts.
pub struct Replay {
    pub name: &'static str,
    pub status: CollectorStatus,
    pub drafts: Vec<EvidenceDraft>,
}

impl Replay {
    pub fn ok(name: &'static str, drafts: Vec<EvidenceDraft>) -> Box<dyn Collector> {
        Box::new(Self {
            name,
            status: CollectorStatus::Ok,
            drafts,
        })
    }
}

impl Collector for Replay {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, _ctx: &CollectorContext) -> CollectorResult {
        let mut result = CollectorResult::new(self.name, self.status);
        result.drafts = self.drafts.clone();
        if self.status != CollectorStatus::Ok {
            result.message = Some("replayed failure".to_string());
        }
        result
    }
}

pub fn finding(source: &str, component: &str, severity: Severity) -> EvidenceDraft {
    Draft::new(
        source,
        Finding {
            component: component.to_string(),
            line: Some(10),
            column: None,
            severity,
            category: FindingCategory::Security,
            code: Some("B105".to_string()),
            message: "hardcoded password".to_string(),
            confidence: 0.9,
        },
    )
    .into()
}

pub fn coverage(component: &str, covered: u64, total: u64) -> EvidenceDraft {
    Draft::new("coverage", Coverage::new(component, covered, total)).into()
}

pub fn churn(component: &str, commits: u32, lines: u64) -> EvidenceDraft {
    Draft::new(
        "git-churn",
        Churn {
            component: component.to_string(),
            commits,
            lines_added: lines,
            lines_removed: lines / 2,
            contributors: 2,
            window_days: 90,
            last_commit_at: None,
        },
    )
    .into()
}

/// Temporary runs root and analysis target.
pub struct Workspace {
    pub runs: TempDir,
    pub target: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            runs: TempDir::new().unwrap(),
            target: TempDir::new().unwrap(),
        }
    }

    pub fn options(&self) -> RunOptions {
        RunOptions {
            runs_dir: Some(self.runs.path().to_path_buf()),
            cancel: CancellationToken::new(),
        }
    }
}
