//! Error taxonomy for the evidence pipeline.
//!
//! Errors split into two groups:
//!
//! - **Per-collector** (`ToolUnavailable`, `ToolTimeout`, `Parse`): recovered
//!   inside the collector boundary and recorded in the run manifest as a
//!   [`CollectorStatus`](crate::collectors::CollectorStatus). They never reach
//!   the caller of a run.
//! - **Fatal** (`StoreWrite`, `Config`): surfaced to the caller. A config error
//!   is raised before any collector starts; a store error marks the run failed.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for riskmap operations
#[derive(Debug, Error)]
pub enum Error {
    /// Analyzer binary could not be resolved
    #[error("Tool unavailable: {tool} ({message})")]
    ToolUnavailable { tool: String, message: String },

    /// Analyzer subprocess exceeded its time bound
    #[error("Tool timed out: {tool} after {seconds}s")]
    ToolTimeout { tool: String, seconds: u64 },

    /// Analyzer output did not match the expected format
    #[error("Parse error in {tool} output: {message}")]
    Parse { tool: String, message: String },

    /// Persisting a record or manifest failed
    #[error("Store write error at {}: {source}", path.display())]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed weight, band, journey or collector configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// No run directory (or manifest) for the requested identifier
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// Identifier does not follow `<PREFIX>-<YYYYMMDD>-<SEQ>`
    #[error("Invalid evidence identifier: {0}")]
    InvalidEvidenceId(String),

    /// The run was cancelled before it could finish
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// IO errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Pattern errors
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
}

impl Error {
    /// Create a configuration error without file context
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error tied to the file it came from
    pub fn config_with_path(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Wrap an I/O failure that happened while persisting evidence
    pub fn store_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StoreWrite {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort the run.
    ///
    /// Tool errors are degraded locally; everything else propagates.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ToolUnavailable { .. } | Self::ToolTimeout { .. } | Self::Parse { .. }
        )
    }
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;
