use super::manifest::{CollectorEntry, Manifest, RunStatus, TargetInfo, MANIFEST_FILE};
use crate::errors::{Error, Result};
use crate::evidence::{EvidenceKind, EvidenceStore};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variable overriding the default runs directory
pub const RUNS_DIR_ENV: &str = "RISKMAP_RUNS_DIR";

pub const EVIDENCE_DIR: &str = "evidence";
pub const ARTIFACTS_DIR: &str = "artifacts";
pub const EVENTS_FILE: &str = "collector_events.jsonl";

const RUN_ID_FORMAT: &str = "%Y%m%d_%H%M%SZ";
const MAX_COLLISION_SUFFIX: u32 = 99;

/// Allocates run directories and reads them back.
#[derive(Debug, Clone)]
pub struct RunManager {
    base_dir: PathBuf,
}

/// Listing entry for `riskmap runs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub status: RunStatus,
    pub target: String,
    pub collectors_ok: usize,
    pub collectors_total: usize,
    pub counts: BTreeMap<EvidenceKind, usize>,
}

impl From<&Manifest> for RunSummary {
    fn from(manifest: &Manifest) -> Self {
        Self {
            run_id: manifest.run_id.clone(),
            created_at: manifest.created_at,
            status: manifest.status,
            target: manifest.target.name.clone(),
            collectors_ok: manifest.executed_ok(),
            collectors_total: manifest.collectors.len(),
            counts: manifest.counts.clone(),
        }
    }
}

impl RunManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// `--runs-dir`, then `$RISKMAP_RUNS_DIR`, then `~/.riskmap/runs`.
    pub fn resolve_base_dir(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = explicit {
            return Ok(dir.to_path_buf());
        }
        if let Some(dir) = std::env::var_os(RUNS_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        dirs::home_dir()
            .map(|home| home.join(".riskmap").join("runs"))
            .ok_or_else(|| {
                Error::config(format!(
                    "cannot determine home directory; pass --runs-dir or set {}",
                    RUNS_DIR_ENV
                ))
            })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.base_dir.join(run_id)
    }

    pub fn create_run(&self, target: &Path) -> Result<RunHandle> {
        self.create_run_at(target, Utc::now())
    }

    /// Allocate a fresh run directory stamped with `now`.
    ///
    /// The directory is claimed with `create_dir`, which fails if it exists,
    /// so two processes starting in the same second get distinct suffixes.
    pub fn create_run_at(&self, target: &Path, now: DateTime<Utc>) -> Result<RunHandle> {
        fs::create_dir_all(&self.base_dir).map_err(|e| Error::store_write(&self.base_dir, e))?;

        let stamp = now.format(RUN_ID_FORMAT).to_string();
        let (run_id, root) = self.claim_directory(&stamp)?;

        let target_info = describe_target(target);
        let manifest = Manifest::new(run_id.clone(), now, target_info);
        let handle = RunHandle::initialize(run_id, root, manifest)?;
        log::info!("Created run {} at {}", handle.run_id(), handle.root().display());
        Ok(handle)
    }

    fn claim_directory(&self, stamp: &str) -> Result<(String, PathBuf)> {
        let candidates = std::iter::once(stamp.to_string()).chain(
            (1..=MAX_COLLISION_SUFFIX).map(|n| format!("{}_{:02}", stamp, n)),
        );
        for run_id in candidates {
            let root = self.run_dir(&run_id);
            match fs::create_dir(&root) {
                Ok(()) => return Ok((run_id, root)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(Error::store_write(&root, e)),
            }
        }
        Err(Error::store_write(
            self.run_dir(stamp),
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                "too many runs started within one second",
            ),
        ))
    }

    pub fn load_run(&self, run_id: &str) -> Result<Manifest> {
        let path = self.run_dir(run_id).join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(Error::RunNotFound(run_id.to_string()));
        }
        Manifest::load(&path)
    }

    /// All runs with a readable manifest, newest first.
    pub fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut summaries: Vec<RunSummary> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let path = entry.path().join(MANIFEST_FILE);
                match Manifest::load(&path) {
                    Ok(manifest) => Some(RunSummary::from(&manifest)),
                    Err(e) => {
                        log::warn!("Skipping {}: {}", entry.path().display(), e);
                        None
                    }
                }
            })
            .collect();

        // Run ids sort chronologically, suffixes included.
        summaries.sort_by(|a, b| b.run_id.cmp(&a.run_id));
        Ok(summaries)
    }

    pub fn evidence_dir(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join(EVIDENCE_DIR)
    }
}

/// One JSON line in `collector_events.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorEvent {
    pub timestamp: DateTime<Utc>,
    pub collector: String,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CollectorEvent {
    pub fn new(collector: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            collector: collector.into(),
            event: event.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// An open run: its directory, evidence store and live manifest.
pub struct RunHandle {
    run_id: String,
    root: PathBuf,
    store: EvidenceStore,
    manifest: Mutex<Manifest>,
    events: Mutex<fs::File>,
}

impl RunHandle {
    fn initialize(run_id: String, root: PathBuf, manifest: Manifest) -> Result<Self> {
        let artifacts = root.join(ARTIFACTS_DIR);
        fs::create_dir_all(&artifacts).map_err(|e| Error::store_write(&artifacts, e))?;

        let store = EvidenceStore::open(root.join(EVIDENCE_DIR), &run_id)?;
        let events_path = root.join(EVENTS_FILE);
        let events = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&events_path)
            .map_err(|e| Error::store_write(&events_path, e))?;

        manifest.write_atomic(&root.join(MANIFEST_FILE))?;

        Ok(Self {
            run_id,
            root,
            store,
            manifest: Mutex::new(manifest),
            events: Mutex::new(events),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &EvidenceStore {
        &self.store
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join(ARTIFACTS_DIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn manifest(&self) -> Manifest {
        self.manifest.lock().clone()
    }

    /// Apply `update` and persist the manifest while holding the lock.
    pub fn update_manifest(&self, update: impl FnOnce(&mut Manifest)) -> Result<()> {
        let mut manifest = self.manifest.lock();
        update(&mut manifest);
        manifest.counts = self.store.counts();
        manifest.write_atomic(&self.root.join(MANIFEST_FILE))
    }

    pub fn record_collector(&self, name: &str, entry: CollectorEntry) -> Result<()> {
        self.update_manifest(|m| {
            m.collectors.insert(name.to_string(), entry);
        })
    }

    pub fn add_diagnostic(&self, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        self.update_manifest(|m| m.diagnostics.push(message))
    }

    /// Store a raw tool output under `artifacts/`, returning its path relative
    /// to the run directory.
    pub fn write_artifact(&self, file_name: &str, contents: &[u8]) -> Result<String> {
        let path = self.artifacts_dir().join(file_name);
        fs::write(&path, contents).map_err(|e| Error::store_write(&path, e))?;
        Ok(format!("{}/{}", ARTIFACTS_DIR, file_name))
    }

    pub fn log_event(&self, event: &CollectorEvent) -> Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let mut file = self.events.lock();
        file.write_all(&line)
            .and_then(|_| file.flush())
            .map_err(|e| Error::store_write(self.root.join(EVENTS_FILE), e))
    }

    /// Close the run with `status`. The manifest is final afterwards.
    pub fn finish(&self, status: RunStatus) -> Result<Manifest> {
        let counts = self.store.counts();
        let evidence_files = EvidenceKind::ALL
            .into_iter()
            .filter(|kind| self.store.stream_path(*kind).exists())
            .map(|kind| (kind, format!("{}/{}", EVIDENCE_DIR, kind.file_name())))
            .collect();

        self.update_manifest(|m| {
            m.status = status;
            m.finished_at = Some(Utc::now());
            m.evidence_files = evidence_files;
        })?;
        let manifest = self.manifest();
        log::info!(
            "Run {} finished: {} ({} records)",
            self.run_id,
            status.as_str(),
            counts.values().sum::<usize>()
        );
        Ok(manifest)
    }
}

fn describe_target(target: &Path) -> TargetInfo {
    let canonical = fs::canonicalize(target).unwrap_or_else(|_| target.to_path_buf());
    let name = canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| canonical.display().to_string());

    TargetInfo {
        name,
        path: canonical.display().to_string(),
        git_head: git_output(&canonical, &["rev-parse", "HEAD"]),
        git_branch: git_output(&canonical, &["rev-parse", "--abbrev-ref", "HEAD"]),
    }
}

fn git_output(dir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}
