//! Collectors turn analyzer output into normalized evidence drafts.
//!
//! A collector never writes to the store and never returns an error: every
//! failure mode becomes a [`CollectorStatus`] on its [`CollectorResult`], so
//! one broken tool cannot take down its siblings. The orchestrator persists
//! the drafts and raw artifacts and records the status in the run manifest.

pub mod bandit;
pub mod coverage;
pub mod flake8;
pub mod git_churn;
pub mod orchestrator;
pub mod pip_audit;
pub mod process;
pub mod pylint;
pub mod tool;

pub use orchestrator::{CollectionSummary, Orchestrator};
pub use tool::ExternalTool;

use crate::config::CollectorsConfig;
use crate::evidence::EvidenceDraft;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorStatus {
    Ok,
    NotFound,
    Timeout,
    ParseError,
    Failed,
}

impl CollectorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NotFound => "not_found",
            Self::Timeout => "timeout",
            Self::ParseError => "parse_error",
            Self::Failed => "failed",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Whether the tool actually ran.
    pub fn executed(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

impl fmt::Display for CollectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw tool output kept verbatim under `artifacts/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub contents: Vec<u8>,
}

impl Artifact {
    pub fn new(file_name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            contents: contents.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorResult {
    pub name: String,
    pub status: CollectorStatus,
    pub drafts: Vec<EvidenceDraft>,
    pub artifacts: Vec<Artifact>,
    pub version: Option<String>,
    pub exit_code: Option<i32>,
    pub duration: Duration,
    /// Diagnostic for any status other than `ok`
    pub message: Option<String>,
    /// Stopped by run cancellation rather than by its own failure
    pub cancelled: bool,
}

impl CollectorResult {
    pub fn new(name: impl Into<String>, status: CollectorStatus) -> Self {
        Self {
            name: name.into(),
            status,
            drafts: Vec::new(),
            artifacts: Vec::new(),
            version: None,
            exit_code: None,
            duration: Duration::ZERO,
            message: None,
            cancelled: false,
        }
    }

    pub fn ok(name: impl Into<String>, drafts: Vec<EvidenceDraft>) -> Self {
        Self {
            drafts,
            ..Self::new(name, CollectorStatus::Ok)
        }
    }

    pub fn not_found(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, CollectorStatus::NotFound).with_message(message)
    }

    /// Interrupted by run cancellation; reported as `failed` with outcome `skipped`.
    pub fn cancelled(name: impl Into<String>) -> Self {
        Self {
            cancelled: true,
            ..Self::new(name, CollectorStatus::Failed).with_message("cancelled")
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }
}

/// Cooperative cancellation shared by every collector of a run.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a collector may look at.
#[derive(Debug, Clone)]
pub struct CollectorContext {
    pub target: PathBuf,
    pub config: CollectorsConfig,
    pub cancel: CancellationToken,
}

impl CollectorContext {
    pub fn new(target: impl Into<PathBuf>, config: CollectorsConfig) -> Self {
        Self {
            target: target.into(),
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Express `path` relative to the target when it lies inside it, with
    /// forward slashes so components compare equal across platforms.
    pub fn component_path(&self, path: &str) -> String {
        normalize_component(&self.target, path)
    }
}

pub(crate) fn normalize_component(root: &Path, path: &str) -> String {
    let candidate = Path::new(path);
    let relative = if candidate.is_absolute() {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        candidate
            .strip_prefix(&root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| candidate.to_path_buf())
    } else {
        candidate.to_path_buf()
    };
    let text = relative.to_string_lossy().replace('\\', "/");
    text.trim_start_matches("./").to_string()
}

/// A source of evidence.
pub trait Collector: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, ctx: &CollectorContext) -> CollectorResult;
}

/// The built-in collectors, in manifest order.
pub fn default_collectors() -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(bandit::Bandit),
        Box::new(pip_audit::PipAudit),
        Box::new(pylint::Pylint),
        Box::new(flake8::Flake8),
        Box::new(coverage::CoverageCollector),
        Box::new(git_churn::GitChurn),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KNOWN_COLLECTORS;

    #[test]
    fn default_collectors_match_known_names() {
        let names: Vec<String> = default_collectors()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, KNOWN_COLLECTORS.map(String::from).to_vec());
    }

    #[test]
    fn component_paths_are_relative_and_slash_separated() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let absolute = root.join("src").join("app.py");

        assert_eq!(
            normalize_component(&root, &absolute.to_string_lossy()),
            "src/app.py"
        );
        assert_eq!(normalize_component(&root, "./src/app.py"), "src/app.py");
        assert_eq!(normalize_component(&root, "src\\win.py"), "src/win.py");
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn only_not_found_counts_as_not_executed() {
        assert!(!CollectorStatus::NotFound.executed());
        assert!(CollectorStatus::Timeout.executed());
        assert!(CollectorStatus::ParseError.executed());
    }
}
