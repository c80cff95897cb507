use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use super::domain::{ApplicationKey, ApplicationRecord, ApplicationStatus, CandidateId};

/// Failures at the store boundary. `Corrupt` means the persisted document cannot be
/// trusted and no mutation may proceed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("tracker store at {} is unreadable: {detail}", .path.display())]
    Corrupt { path: PathBuf, detail: String },
    #[error("tracker store io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode tracker store: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("another pass holds the tracker lock at {}", .0.display())]
    Locked(PathBuf),
}

/// A proposed status change that would move a record backwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition from {from} to {to}")]
pub struct InvalidTransition {
    pub key: ApplicationKey,
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
}

/// What an upsert actually did to the record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    Unchanged,
}

/// In-memory view of the tracker, keyed by application identity. All mutation
/// discipline (uniqueness, forward-only transitions) lives here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: BTreeMap<ApplicationKey, ApplicationRecord>,
}

impl RecordSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, key: &ApplicationKey) -> bool {
        self.records.contains_key(key)
    }

    pub fn get(&self, key: &ApplicationKey) -> Option<&ApplicationRecord> {
        self.records.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApplicationRecord> {
        self.records.values()
    }

    /// Insert a new record or merge a status update into an existing one.
    /// Updates must be forward transitions; regressions are rejected, except
    /// transitions into `Closed` which always succeed. Re-applying the current
    /// status is a no-op.
    pub fn upsert(&mut self, record: ApplicationRecord) -> Result<UpsertOutcome, InvalidTransition> {
        match self.records.entry(record.key()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(UpsertOutcome::Inserted)
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get_mut();
                if record.status == current.status {
                    return Ok(UpsertOutcome::Unchanged);
                }
                if !current.status.accepts(record.status) {
                    return Err(InvalidTransition {
                        key: current.key(),
                        from: current.status,
                        to: record.status,
                    });
                }
                let from = current.status;
                current.status = record.status;
                current.last_updated = record.last_updated;
                if current.date_submitted.is_none() {
                    current.date_submitted = record.date_submitted;
                }
                current.notes.extend(record.notes);
                Ok(UpsertOutcome::Updated {
                    from,
                    to: record.status,
                })
            }
        }
    }

    /// Move a tracked record forward and append an audit note. Equal status is a
    /// no-op so re-delivered mail cannot make two passes diverge.
    pub fn advance(
        &mut self,
        key: &ApplicationKey,
        to: ApplicationStatus,
        note: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<UpsertOutcome, InvalidTransition> {
        let Some(record) = self.records.get_mut(key) else {
            // Keys handed out by classification always exist; a missing key means
            // the caller staged against a different record set.
            return Ok(UpsertOutcome::Unchanged);
        };
        if record.status == to {
            return Ok(UpsertOutcome::Unchanged);
        }
        if !record.status.accepts(to) {
            return Err(InvalidTransition {
                key: key.clone(),
                from: record.status,
                to,
            });
        }
        let from = record.status;
        record.status = to;
        record.last_updated = at;
        record.push_note(note);
        Ok(UpsertOutcome::Updated { from, to })
    }

    /// Append a note to a tracked record without touching its status.
    pub fn annotate(&mut self, key: &ApplicationKey, note: impl Into<String>, at: DateTime<Utc>) {
        if let Some(record) = self.records.get_mut(key) {
            record.push_note(note);
            record.last_updated = at;
        }
    }

    /// Distinct `(candidate, company)` pairs in deterministic order, for the
    /// reconciliation fetch loop.
    pub fn candidate_company_pairs(&self) -> Vec<(CandidateId, String)> {
        let mut pairs: Vec<(CandidateId, String)> = Vec::new();
        for record in self.records.values() {
            let pair = (record.candidate_id.clone(), record.company.clone());
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }
        pairs
    }

    /// All records tracked for one candidate.
    pub fn records_for(&self, candidate: &CandidateId) -> Vec<&ApplicationRecord> {
        self.records
            .values()
            .filter(|record| &record.candidate_id == candidate)
            .collect()
    }
}

/// On-disk shape of the tracker. A flat list keeps the file greppable and lets the
/// whole document be replaced atomically.
#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    applications: Vec<ApplicationRecord>,
}

/// Durable JSON-backed tracker store. Persistence is all-or-nothing: the file on
/// disk is always either the fully-old or fully-new document.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted record set. A missing file is an empty tracker; an
    /// unparseable file or duplicate keys mark the store corrupt and callers must
    /// not proceed to mutate.
    pub fn load(&self) -> Result<RecordSet, StoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "tracker store missing, starting empty");
            return Ok(RecordSet::default());
        }

        let raw = fs::read_to_string(&self.path)?;
        let document: StoreDocument =
            serde_json::from_str(&raw).map_err(|err| StoreError::Corrupt {
                path: self.path.clone(),
                detail: err.to_string(),
            })?;

        let mut records = RecordSet::default();
        for record in document.applications {
            let key = record.key();
            if records.records.insert(key.clone(), record).is_some() {
                return Err(StoreError::Corrupt {
                    path: self.path.clone(),
                    detail: format!(
                        "duplicate application entry for {}/{} ({})",
                        key.company, key.role, key.candidate_id
                    ),
                });
            }
        }

        debug!(path = %self.path.display(), count = records.len(), "tracker store loaded");
        Ok(records)
    }

    /// Atomically replace the persisted document: write a temp file in the same
    /// directory, flush and fsync, then rename over the target. A crash mid-write
    /// leaves the previous document intact.
    pub fn persist(&self, records: &RecordSet) -> Result<(), StoreError> {
        let document = StoreDocument {
            applications: records.iter().cloned().collect(),
        };
        let encoded = serde_json::to_vec_pretty(&document).map_err(StoreError::Encode)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent)?;
                parent.to_path_buf()
            }
            _ => PathBuf::from("."),
        };

        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(&encoded)?;
        staged.flush()?;
        staged.as_file().sync_all()?;
        staged
            .persist(&self.path)
            .map_err(|err| StoreError::Io(err.error))?;

        debug!(path = %self.path.display(), count = records.len(), "tracker store persisted");
        Ok(())
    }

    /// Take the pass-level mutual exclusion lock. At most one reconciliation or
    /// ingest pass may hold it; the guard releases the lock on drop.
    pub fn lock(&self) -> Result<StoreLock, StoreError> {
        let lock_path = self.path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(_) => Ok(StoreLock { path: lock_path }),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::Locked(lock_path))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Guard for the tracker lock file.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
