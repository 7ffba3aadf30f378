//! Append-only JSONL evidence store for one run.
//!
//! Each kind lives in `evidence/<kind>.jsonl`, one record per line. The store
//! is the only place identifiers are issued: the sequence counter and the
//! stream writes sit behind a single mutex, so concurrent collectors can never
//! observe duplicate or skipped numbers and file order equals sequence order.
//!
//! A record is written with one `write_all` of the full line. If that fails
//! the stream is truncated back to its previous length, so a reader never sees
//! a partial trailing record. Reopening a run repairs torn tails left by a
//! crash before any new write.

use super::id::{EvidenceId, IdSequence};
use super::model::{Draft, EvidenceBody, EvidenceDraft, EvidenceKind, Record};
use crate::errors::{Error, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

struct Stream {
    path: PathBuf,
    file: File,
    len: u64,
}

struct StoreState {
    sequence: IdSequence,
    streams: HashMap<EvidenceKind, Stream>,
    counts: BTreeMap<EvidenceKind, usize>,
}

/// Durable ledger of evidence records for a single run.
pub struct EvidenceStore {
    evidence_dir: PathBuf,
    state: Mutex<StoreState>,
}

impl EvidenceStore {
    /// Open (or start) the store for `run_id` rooted at `evidence_dir`.
    ///
    /// Existing streams are repaired and numbering continues after the highest
    /// stored sequence.
    pub fn open(evidence_dir: impl Into<PathBuf>, run_id: &str) -> Result<Self> {
        let evidence_dir = evidence_dir.into();
        fs::create_dir_all(&evidence_dir).map_err(|e| Error::store_write(&evidence_dir, e))?;

        let mut sequence = IdSequence::for_run(run_id)?;
        let mut counts = BTreeMap::new();

        for kind in EvidenceKind::ALL {
            let path = evidence_dir.join(kind.file_name());
            if !path.exists() {
                continue;
            }
            repair_torn_tail(&path)?;
            let ids = read_ids(&path);
            if let Some(last) = ids.iter().map(EvidenceId::sequence).max() {
                sequence.seed(kind, last);
            }
            counts.insert(kind, ids.len());
        }

        Ok(Self {
            evidence_dir,
            state: Mutex::new(StoreState {
                sequence,
                streams: HashMap::new(),
                counts,
            }),
        })
    }

    pub fn evidence_dir(&self) -> &Path {
        &self.evidence_dir
    }

    pub fn stream_path(&self, kind: EvidenceKind) -> PathBuf {
        self.evidence_dir.join(kind.file_name())
    }

    /// Issue an identifier for `draft` and persist it atomically.
    pub fn append<T: EvidenceBody>(&self, draft: Draft<T>) -> Result<Record<T>> {
        let mut state = self.state.lock();
        let id = state.sequence.next(T::KIND);
        let record = draft.into_record(id);

        let mut line = match serde_json::to_vec(&record) {
            Ok(line) => line,
            Err(e) => {
                state.sequence.release(&record.id);
                return Err(e.into());
            }
        };
        line.push(b'\n');

        if let Err(e) = self.write_line(&mut state, T::KIND, &line) {
            state.sequence.release(&record.id);
            return Err(e);
        }

        *state.counts.entry(T::KIND).or_insert(0) += 1;
        log::trace!("appended {} to {}", record.id, T::KIND);
        Ok(record)
    }

    /// Append several drafts of one kind in order.
    pub fn append_all<T: EvidenceBody>(&self, drafts: Vec<Draft<T>>) -> Result<Vec<Record<T>>> {
        drafts.into_iter().map(|draft| self.append(draft)).collect()
    }

    /// Append a collector draft of any kind, returning its identifier.
    pub fn append_draft(&self, draft: EvidenceDraft) -> Result<EvidenceId> {
        match draft {
            EvidenceDraft::Finding(d) => self.append(d).map(|r| r.id),
            EvidenceDraft::Coverage(d) => self.append(d).map(|r| r.id),
            EvidenceDraft::Churn(d) => self.append(d).map(|r| r.id),
        }
    }

    fn write_line(&self, state: &mut StoreState, kind: EvidenceKind, line: &[u8]) -> Result<()> {
        if !state.streams.contains_key(&kind) {
            let path = self.stream_path(kind);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| Error::store_write(&path, e))?;
            let len = file
                .metadata()
                .map_err(|e| Error::store_write(&path, e))?
                .len();
            state.streams.insert(kind, Stream { path, file, len });
        }

        let Some(stream) = state.streams.get_mut(&kind) else {
            return Err(Error::store_write(
                self.stream_path(kind),
                io::Error::other("stream unavailable"),
            ));
        };

        let written = stream
            .file
            .write_all(line)
            .and_then(|_| stream.file.flush());
        match written {
            Ok(()) => {
                stream.len += line.len() as u64;
                Ok(())
            }
            Err(e) => {
                if let Err(truncate_err) = stream.file.set_len(stream.len) {
                    log::error!(
                        "failed to roll back partial write to {}: {}",
                        stream.path.display(),
                        truncate_err
                    );
                }
                Err(Error::store_write(&stream.path, e))
            }
        }
    }

    /// Every record of one kind, in write order. Missing streams read as empty.
    pub fn read_all<T: EvidenceBody>(&self) -> Vec<Record<T>> {
        read_stream(&self.evidence_dir)
    }

    /// Records written so far per kind.
    pub fn counts(&self) -> BTreeMap<EvidenceKind, usize> {
        self.state.lock().counts.clone()
    }

    pub fn count(&self, kind: EvidenceKind) -> usize {
        self.state.lock().counts.get(&kind).copied().unwrap_or(0)
    }

    /// Every identifier stored in this run, across all kinds.
    pub fn all_ids(&self) -> BTreeSet<EvidenceId> {
        EvidenceKind::ALL
            .iter()
            .flat_map(|kind| read_ids(&self.stream_path(*kind)))
            .collect()
    }

    pub fn contains(&self, id: &EvidenceId) -> bool {
        id.kind()
            .map(|kind| read_ids(&self.stream_path(kind)).contains(id))
            .unwrap_or(false)
    }
}

/// Read every record of `T` from an evidence directory without opening a store.
///
/// Absent files yield an empty vector; unparsable lines are skipped with a
/// warning.
pub fn read_stream<T: EvidenceBody>(evidence_dir: &Path) -> Vec<Record<T>> {
    let path = evidence_dir.join(T::KIND.file_name());
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("Failed to read {}: {}", path.display(), e);
            }
            return Vec::new();
        }
    };

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!(
                    "Skipping malformed record at {}:{}: {}",
                    path.display(),
                    idx + 1,
                    e
                );
                None
            }
        })
        .collect()
}

fn read_ids(path: &Path) -> Vec<EvidenceId> {
    #[derive(serde::Deserialize)]
    struct IdOnly {
        id: EvidenceId,
    }

    let Ok(contents) = fs::read_to_string(path) else {
        return Vec::new();
    };
    contents
        .lines()
        .filter_map(|line| serde_json::from_str::<IdOnly>(line).ok())
        .map(|entry| entry.id)
        .collect()
}

/// Drop a trailing partial line left behind by an interrupted write.
fn repair_torn_tail(path: &Path) -> Result<()> {
    let bytes = fs::read(path).map_err(|e| Error::store_write(path, e))?;
    let keep = match bytes.iter().rposition(|b| *b == b'\n') {
        Some(pos) => pos + 1,
        None => 0,
    };
    if keep < bytes.len() {
        log::warn!(
            "Truncating {} torn byte(s) at end of {}",
            bytes.len() - keep,
            path.display()
        );
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| Error::store_write(path, e))?;
        file.set_len(keep as u64)
            .map_err(|e| Error::store_write(path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::model::{Coverage, Finding, FindingCategory, Severity};
    use std::sync::Arc;
    use tempfile::TempDir;

    const RUN_ID: &str = "20251024_193012Z";

    fn finding(component: &str) -> Draft<Finding> {
        Draft::new(
            "bandit",
            Finding {
                component: component.into(),
                line: Some(1),
                column: None,
                severity: Severity::High,
                category: FindingCategory::Security,
                code: Some("B602".into()),
                message: "subprocess with shell=True".into(),
                confidence: 0.9,
            },
        )
    }

    #[test]
    fn append_issues_sequential_ids_per_kind() {
        let dir = TempDir::new().unwrap();
        let store = EvidenceStore::open(dir.path(), RUN_ID).unwrap();

        let a = store.append(finding("a.py")).unwrap();
        let b = store.append(finding("b.py")).unwrap();
        let c = store
            .append(Draft::new("coverage", Coverage::new("a.py", 1, 2)))
            .unwrap();

        assert_eq!(a.id.as_str(), "FND-20251024-0001");
        assert_eq!(b.id.as_str(), "FND-20251024-0002");
        assert_eq!(c.id.as_str(), "COV-20251024-0001");
        assert_eq!(store.count(EvidenceKind::Findings), 2);
    }

    #[test]
    fn read_all_returns_records_in_write_order() {
        let dir = TempDir::new().unwrap();
        let store = EvidenceStore::open(dir.path(), RUN_ID).unwrap();
        store.append(finding("a.py")).unwrap();
        store.append(finding("b.py")).unwrap();

        let records: Vec<Record<Finding>> = store.read_all();
        let components: Vec<_> = records.iter().map(|r| r.body.component.as_str()).collect();
        assert_eq!(components, vec!["a.py", "b.py"]);
    }

    #[test]
    fn missing_stream_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = EvidenceStore::open(dir.path(), RUN_ID).unwrap();
        assert!(store.read_all::<Coverage>().is_empty());
        assert!(read_stream::<Coverage>(&dir.path().join("nowhere")).is_empty());
    }

    #[test]
    fn reopen_truncates_torn_tail_and_continues_numbering() {
        let dir = TempDir::new().unwrap();
        {
            let store = EvidenceStore::open(dir.path(), RUN_ID).unwrap();
            store.append(finding("a.py")).unwrap();
            store.append(finding("b.py")).unwrap();
        }
        let path = dir.path().join("findings.jsonl");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"id":"FND-20251024-0003","sour"#).unwrap();
        drop(file);

        let store = EvidenceStore::open(dir.path(), RUN_ID).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with('\n'));
        assert_eq!(contents.lines().count(), 2);

        let next = store.append(finding("c.py")).unwrap();
        assert_eq!(next.id.as_str(), "FND-20251024-0003");
        assert_eq!(store.read_all::<Finding>().len(), 3);
    }

    #[test]
    fn concurrent_appends_never_duplicate_or_skip() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(EvidenceStore::open(dir.path(), RUN_ID).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store.append(finding(&format!("t{t}/f{i}.py"))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let records: Vec<Record<Finding>> = store.read_all();
        let sequences: Vec<u32> = records.iter().map(|r| r.id.sequence()).collect();
        let expected: Vec<u32> = (1..=200).collect();
        assert_eq!(sequences, expected);
    }

    #[test]
    fn all_ids_and_contains_cover_every_stream() {
        let dir = TempDir::new().unwrap();
        let store = EvidenceStore::open(dir.path(), RUN_ID).unwrap();
        let f = store.append(finding("a.py")).unwrap();
        let c = store
            .append(Draft::new("coverage", Coverage::new("a.py", 0, 0)))
            .unwrap();

        let ids = store.all_ids();
        assert!(ids.contains(&f.id));
        assert!(ids.contains(&c.id));
        assert!(store.contains(&f.id));
        assert!(!store.contains(&EvidenceId::new(EvidenceKind::Risks, "20251024", 1)));
    }

    #[test]
    fn malformed_lines_are_skipped_on_read() {
        let dir = TempDir::new().unwrap();
        let store = EvidenceStore::open(dir.path(), RUN_ID).unwrap();
        store.append(finding("a.py")).unwrap();
        let mut file = OpenOptions::new()
            .append(true)
            .open(dir.path().join("findings.jsonl"))
            .unwrap();
        file.write_all(b"not json\n").unwrap();

        assert_eq!(store.read_all::<Finding>().len(), 1);
    }
}
