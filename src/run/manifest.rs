//! The run manifest: one JSON document describing what a run did.

use crate::collectors::CollectorStatus;
use crate::errors::{Error, Result};
use crate::evidence::EvidenceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    /// Every enabled collector executed
    Completed,
    /// Finished, but at least one collector was skipped, failed or cancelled
    Incomplete,
    /// A fatal error stopped the run
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Failed => "failed",
        }
    }
}

/// What happened to a collector, coarser than [`CollectorStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorOutcome {
    Executed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorEntry {
    pub status: CollectorStatus,
    pub executed: bool,
    pub outcome: CollectorOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub records: usize,
    #[serde(default)]
    pub artifacts: Vec<String>,
}

impl CollectorEntry {
    /// Entry for a collector that was cancelled before it started.
    pub fn cancelled() -> Self {
        Self {
            status: CollectorStatus::Failed,
            executed: false,
            outcome: CollectorOutcome::Skipped,
            reason: Some("cancelled".to_string()),
            version: None,
            exit_code: None,
            duration_ms: 0,
            records: 0,
            artifacts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_head: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub run_id: String,
    pub tool_version: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub target: TargetInfo,
    #[serde(default)]
    pub collectors: BTreeMap<String, CollectorEntry>,
    #[serde(default)]
    pub counts: BTreeMap<EvidenceKind, usize>,
    /// Evidence stream paths relative to the run directory
    #[serde(default)]
    pub evidence_files: BTreeMap<EvidenceKind, String>,
    #[serde(default)]
    pub diagnostics: Vec<String>,
}

impl Manifest {
    pub fn new(run_id: impl Into<String>, created_at: DateTime<Utc>, target: TargetInfo) -> Self {
        Self {
            run_id: run_id.into(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at,
            finished_at: None,
            status: RunStatus::Running,
            target,
            collectors: BTreeMap::new(),
            counts: BTreeMap::new(),
            evidence_files: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write to a sibling temp file then rename over `path`, so readers see
    /// either the old or the new manifest.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(self)?;
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            fs::rename(&tmp, path)
        };
        write().map_err(|e| Error::store_write(path, e))
    }

    /// Collectors that ran to completion with usable output.
    pub fn executed_ok(&self) -> usize {
        self.collectors
            .values()
            .filter(|c| c.status == CollectorStatus::Ok)
            .count()
    }

    pub fn total_records(&self) -> usize {
        self.counts.values().sum()
    }
}
