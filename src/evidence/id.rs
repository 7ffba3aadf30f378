//! Evidence identifiers: `<PREFIX>-<YYYYMMDD>-<SEQ>`.
//!
//! The prefix names the record kind, the date is taken from the run id and the
//! sequence counts from 1 per kind per run. Sequences are zero-padded to four
//! digits but may grow wider; ordering compares the numeric sequence, not the
//! string. Padding beyond four digits is rejected.

use super::model::EvidenceKind;
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

const SEQUENCE_WIDTH: usize = 4;

/// A stable, citeable identifier for one evidence record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EvidenceId {
    raw: String,
    sequence: u32,
}

impl EvidenceId {
    /// Build an identifier from its parts.
    pub fn new(kind: EvidenceKind, date: &str, sequence: u32) -> Self {
        Self {
            raw: format!(
                "{}-{}-{:0width$}",
                kind.prefix(),
                date,
                sequence,
                width = SEQUENCE_WIDTH
            ),
            sequence,
        }
    }

    /// Parse and validate an identifier string.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || Error::InvalidEvidenceId(value.to_string());
        let mut parts = value.splitn(3, '-');
        let prefix = parts.next().ok_or_else(invalid)?;
        let date = parts.next().ok_or_else(invalid)?;
        let seq = parts.next().ok_or_else(invalid)?;

        let prefix_ok = prefix.len() == 3 && prefix.chars().all(|c| c.is_ascii_uppercase());
        let date_ok = date.len() == 8 && date.chars().all(|c| c.is_ascii_digit());
        // wider than four digits only when the number needs it, so each
        // sequence has exactly one spelling and equality agrees with ordering
        let seq_ok = seq.len() >= SEQUENCE_WIDTH
            && seq.chars().all(|c| c.is_ascii_digit())
            && !(seq.len() > SEQUENCE_WIDTH && seq.starts_with('0'));
        if !(prefix_ok && date_ok && seq_ok) {
            return Err(invalid());
        }

        let sequence: u32 = seq.parse().map_err(|_| invalid())?;
        if sequence == 0 {
            return Err(invalid());
        }

        Ok(Self {
            raw: value.to_string(),
            sequence,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn prefix(&self) -> &str {
        &self.raw[..3]
    }

    pub fn date(&self) -> &str {
        &self.raw[4..12]
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// The record kind this identifier was issued for, if the prefix is known.
    pub fn kind(&self) -> Option<EvidenceKind> {
        EvidenceKind::from_prefix(self.prefix())
    }
}

impl Ord for EvidenceId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.prefix()
            .cmp(other.prefix())
            .then_with(|| self.date().cmp(other.date()))
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for EvidenceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for EvidenceId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<EvidenceId> for String {
    fn from(id: EvidenceId) -> Self {
        id.raw
    }
}

/// Extract the `YYYYMMDD` stamp that prefixes every run id.
pub fn run_date(run_id: &str) -> Result<String> {
    let stamp = run_id.split('_').next().unwrap_or_default();
    if stamp.len() == 8 && stamp.chars().all(|c| c.is_ascii_digit()) {
        Ok(stamp.to_string())
    } else {
        Err(Error::config(format!(
            "run id '{}' must begin with YYYYMMDD",
            run_id
        )))
    }
}

/// Per-kind sequence counters for one run.
///
/// Not synchronized on its own; the evidence store owns the only instance and
/// guards it together with the stream writes.
#[derive(Debug, Clone)]
pub struct IdSequence {
    date: String,
    counters: BTreeMap<EvidenceKind, u32>,
}

impl IdSequence {
    pub fn for_run(run_id: &str) -> Result<Self> {
        Ok(Self {
            date: run_date(run_id)?,
            counters: BTreeMap::new(),
        })
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    /// Issue the next identifier for `kind`.
    pub fn next(&mut self, kind: EvidenceKind) -> EvidenceId {
        let counter = self.counters.entry(kind).or_insert(0);
        *counter += 1;
        EvidenceId::new(kind, &self.date, *counter)
    }

    /// Give back the most recently issued identifier after a failed write.
    pub fn release(&mut self, id: &EvidenceId) {
        if let Some(kind) = id.kind() {
            if let Some(counter) = self.counters.get_mut(&kind) {
                if *counter == id.sequence() {
                    *counter -= 1;
                }
            }
        }
    }

    /// Continue numbering after `last` (used when reopening a run).
    pub fn seed(&mut self, kind: EvidenceKind, last: u32) {
        let counter = self.counters.entry(kind).or_insert(0);
        *counter = (*counter).max(last);
    }

    pub fn current(&self, kind: EvidenceKind) -> u32 {
        self.counters.get(&kind).copied().unwrap_or(0)
    }
}
