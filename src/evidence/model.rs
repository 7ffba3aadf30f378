//! Typed evidence records.
//!
//! Every stored line is a [`Record`]: a common envelope (identifier, source
//! tool, tags, free-form metadata) around a kind-specific body. Collectors
//! produce [`Draft`]s without identifiers; only the store turns a draft into a
//! record.

use super::id::EvidenceId;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Tool-specific context attached to a record.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Metadata key naming the identifier a correction supersedes.
pub const SUPERSEDES_KEY: &str = "supersedes";

/// One append-only stream per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Findings,
    Coverage,
    Churn,
    Risks,
    Gaps,
    Recommendations,
}

impl EvidenceKind {
    pub const ALL: [EvidenceKind; 6] = [
        Self::Findings,
        Self::Coverage,
        Self::Churn,
        Self::Risks,
        Self::Gaps,
        Self::Recommendations,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Findings => "FND",
            Self::Coverage => "COV",
            Self::Churn => "CHN",
            Self::Risks => "RSK",
            Self::Gaps => "GAP",
            Self::Recommendations => "REC",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }

    pub fn stream_name(&self) -> &'static str {
        match self {
            Self::Findings => "findings",
            Self::Coverage => "coverage",
            Self::Churn => "churn",
            Self::Risks => "risks",
            Self::Gaps => "gaps",
            Self::Recommendations => "recommendations",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.jsonl", self.stream_name())
    }
}

impl fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stream_name())
    }
}

impl FromStr for EvidenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.stream_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown evidence kind '{}'", s))
    }
}

/// Body of a stored record.
pub trait EvidenceBody: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync {
    const KIND: EvidenceKind;

    /// The component (file or module) the body is about, if any.
    fn component(&self) -> Option<&str> {
        None
    }
}

/// Stored, immutable evidence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<T> {
    pub id: EvidenceId,
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(flatten)]
    pub body: T,
}

/// A record that has not been assigned an identifier yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft<T> {
    pub source: String,
    pub tags: Vec<String>,
    pub metadata: Metadata,
    pub body: T,
}

impl<T> Draft<T> {
    pub fn new(source: impl Into<String>, body: T) -> Self {
        Self {
            source: source.into(),
            tags: Vec::new(),
            metadata: Metadata::new(),
            body,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Mark this draft as a correction of an earlier record.
    pub fn superseding(self, previous: &EvidenceId) -> Self {
        self.with_metadata(SUPERSEDES_KEY, previous.as_str())
    }

    pub fn into_record(self, id: EvidenceId) -> Record<T> {
        Record {
            id,
            source: self.source,
            tags: self.tags,
            metadata: self.metadata,
            body: self.body,
        }
    }
}

/// Drafts a collector may emit.
#[derive(Debug, Clone, PartialEq)]
pub enum EvidenceDraft {
    Finding(Draft<Finding>),
    Coverage(Draft<Coverage>),
    Churn(Draft<Churn>),
}

impl EvidenceDraft {
    pub fn kind(&self) -> EvidenceKind {
        match self {
            Self::Finding(_) => EvidenceKind::Findings,
            Self::Coverage(_) => EvidenceKind::Coverage,
            Self::Churn(_) => EvidenceKind::Churn,
        }
    }
}

impl From<Draft<Finding>> for EvidenceDraft {
    fn from(draft: Draft<Finding>) -> Self {
        Self::Finding(draft)
    }
}

impl From<Draft<Coverage>> for EvidenceDraft {
    fn from(draft: Draft<Coverage>) -> Self {
        Self::Coverage(draft)
    }
}

impl From<Draft<Churn>> for EvidenceDraft {
    fn from(draft: Draft<Churn>) -> Self {
        Self::Churn(draft)
    }
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Map a tool's severity vocabulary onto the shared scale.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" | "fatal" | "blocker" => Self::Critical,
            "high" | "error" | "major" => Self::High,
            "medium" | "moderate" | "warning" => Self::Medium,
            "low" | "minor" | "convention" | "refactor" => Self::Low,
            "info" | "informational" | "note" | "undefined" => Self::Info,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingCategory {
    Security,
    Dependency,
    Quality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub severity: Severity,
    pub category: FindingCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    pub confidence: f64,
}

impl EvidenceBody for Finding {
    const KIND: EvidenceKind = EvidenceKind::Findings;

    fn component(&self) -> Option<&str> {
        Some(&self.component)
    }
}

// ---------------------------------------------------------------------------
// Coverage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub component: String,
    pub covered: u64,
    pub total: u64,
}

impl Coverage {
    /// Covered counts above the total are clamped so the ratio stays in [0, 1].
    pub fn new(component: impl Into<String>, covered: u64, total: u64) -> Self {
        Self {
            component: component.into(),
            covered: covered.min(total),
            total,
        }
    }

    /// Covered / total, or `None` when nothing was measurable.
    pub fn ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.covered.min(self.total) as f64 / self.total as f64)
    }
}

impl EvidenceBody for Coverage {
    const KIND: EvidenceKind = EvidenceKind::Coverage;

    fn component(&self) -> Option<&str> {
        Some(&self.component)
    }
}

// ---------------------------------------------------------------------------
// Churn
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Churn {
    pub component: String,
    pub commits: u32,
    pub lines_added: u64,
    pub lines_removed: u64,
    #[serde(default)]
    pub contributors: u32,
    pub window_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_at: Option<DateTime<Utc>>,
}

impl Churn {
    pub fn lines_changed(&self) -> u64 {
        self.lines_added + self.lines_removed
    }
}

impl EvidenceBody for Churn {
    const KIND: EvidenceKind = EvidenceKind::Churn;

    fn component(&self) -> Option<&str> {
        Some(&self.component)
    }
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

/// Priority band. `P0` is the most urgent and compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    P3,
    P2,
    P1,
    P0,
}

impl Band {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        }
    }

    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::P0 | Self::P1)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scoring factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Factor {
    Security,
    Coverage,
    Churn,
}

impl Factor {
    pub const ALL: [Factor; 3] = [Self::Security, Self::Coverage, Self::Churn];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Coverage => "coverage",
            Self::Churn => "churn",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one factor contributed to a composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    /// Normalized sub-score in [0, 1]
    pub sub_score: f64,
    /// Normalized weight (weights sum to 1 across factors)
    pub weight: f64,
    /// Points this factor adds to the 0-100 composite
    pub contribution: f64,
    /// Upstream records that fed this factor
    pub evidence_count: usize,
    /// False when the sub-score is a default rather than measured
    pub observed: bool,
}

/// Raw signals behind the factors, kept for recommendation text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskSignals {
    pub findings: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_ratio: Option<f64>,
    pub commits: u32,
    pub lines_changed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub component: String,
    pub score: f64,
    pub band: Band,
    pub confidence: f64,
    pub dominant_factor: Factor,
    pub factors: BTreeMap<Factor, FactorContribution>,
    pub signals: RiskSignals,
    pub evidence_refs: Vec<EvidenceId>,
}

impl Risk {
    /// Coverage gap in percentage points (100 when coverage is unknown).
    pub fn coverage_gap_pct(&self) -> f64 {
        match self.signals.coverage_ratio {
            Some(ratio) => (1.0 - ratio) * 100.0,
            None => 100.0,
        }
    }
}

impl EvidenceBody for Risk {
    const KIND: EvidenceKind = EvidenceKind::Risks;

    fn component(&self) -> Option<&str> {
        Some(&self.component)
    }
}

// ---------------------------------------------------------------------------
// Journey gaps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyGap {
    pub journey_id: String,
    pub journey_name: String,
    /// Average coverage across matched components, percent
    pub current_pct: f64,
    pub target_pct: f64,
    /// target - current, percentage points
    pub delta_pct: f64,
    /// False when no matched component had measurable coverage
    pub measured: bool,
    pub components: Vec<String>,
    pub evidence_refs: Vec<EvidenceId>,
}

impl EvidenceBody for JourneyGap {
    const KIND: EvidenceKind = EvidenceKind::Gaps;
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ResolveSecurityFindings,
    AddTests,
    StabilizeHotspot,
    CloseJourneyGap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// 1-based position in the ranked list
    pub rank: u32,
    pub band: Band,
    pub action: ActionKind,
    /// Component path or journey id
    pub subject: String,
    pub summary: String,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_pct: Option<f64>,
    pub justified_by: Vec<EvidenceId>,
}

impl EvidenceBody for Recommendation {
    const KIND: EvidenceKind = EvidenceKind::Recommendations;
}
