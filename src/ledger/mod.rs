//! # Action ledger
//!
//! Append-only JSON-lines record of every install/remove attempt. One
//! `Ledger` handle per run: opening it takes the directory lock, so at most
//! one process appends at a time, and an in-process mutex serializes
//! appends across threads.

mod filter;
mod locking;
mod projection;
mod reader;
mod tags;

pub use filter::ActionFilter;
pub use locking::LedgerLock;
pub use projection::{LedgerState, PackageState};
pub use reader::LedgerReader;
pub use tags::{Tag, TagStore};

pub(crate) use locking::write_atomically;

use crate::core::types::{
    Action, ActionKind, ActionOutcome, Backend, Outcome, PackageId, PackageRef,
};
use crate::error::{PkgtrailError, Result};
use crate::ui;
use crate::utils::paths;
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// An action before the ledger assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDraft {
    pub backend: Backend,
    pub kind: ActionKind,
    pub package: String,
    pub requested_version: Option<String>,
    pub result_version: Option<String>,
    pub outcome: Outcome,
    pub error_detail: Option<String>,
    /// Historical time for imported records; `None` means now.
    pub timestamp: Option<DateTime<Utc>>,
}

impl ActionDraft {
    /// Record what an adapter reported for `package`.
    pub fn from_outcome(kind: ActionKind, package: &PackageRef, outcome: &ActionOutcome) -> Self {
        Self {
            backend: package.backend.clone(),
            kind,
            package: package.name.clone(),
            requested_version: package.version.clone(),
            result_version: outcome.version.clone(),
            outcome: outcome.outcome,
            error_detail: if outcome.is_failure() {
                outcome.detail.clone()
            } else {
                None
            },
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

struct Writer {
    file: File,
    len: u64,
    next_id: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

/// Read-only access to a ledger directory. Takes no lock, so previews work
/// while another process is appending. A missing ledger reads as empty.
#[derive(Debug, Clone)]
pub struct LedgerView {
    dir: PathBuf,
}

impl LedgerView {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn state(&self, up_to: Option<u64>) -> Result<LedgerState> {
        let path = paths::ledger_file(&self.dir);
        if !path.exists() {
            return Ok(LedgerState::new());
        }
        let mut filter = ActionFilter::all();
        filter.max_id = up_to;
        LedgerState::from_actions(LedgerReader::open(&path, filter)?)
    }

    pub fn tags(&self) -> Result<TagStore> {
        TagStore::load(&paths::tags_file(&self.dir))
    }
}

pub struct Ledger {
    dir: PathBuf,
    path: PathBuf,
    writer: Mutex<Writer>,
    lock: LedgerLock,
}

impl Ledger {
    /// Open (or create) the ledger in `dir` and take its lock.
    pub fn open(dir: &Path) -> Result<Self> {
        paths::ensure_dir(dir)?;

        let lock = LedgerLock::acquire(dir)?;
        let path = paths::ledger_file(dir);
        let scan = reader::scan(&path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| PkgtrailError::IoError {
                path: path.clone(),
                source: e,
            })?;

        let mut len = scan.valid_len;
        if scan.torn {
            ui::warning(&format!(
                "Discarding incomplete last record of {} (interrupted write)",
                path.display()
            ));
            file.set_len(len)?;
            file.sync_data()?;
        }
        if scan.needs_newline {
            file.write_all(b"\n")?;
            len += 1;
        }

        let next_id = scan.last.as_ref().map_or(1, |a| a.id + 1);
        let last_timestamp = scan.last.map(|a| a.timestamp);

        Ok(Self {
            dir: dir.to_path_buf(),
            path,
            writer: Mutex::new(Writer {
                file,
                len,
                next_id,
                last_timestamp,
            }),
            lock,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Id of the newest record, or 0 for an empty ledger.
    pub fn last_id(&self) -> u64 {
        self.writer.lock().map_or(0, |w| w.next_id - 1)
    }

    /// Timestamp of the newest record.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.writer.lock().ok().and_then(|w| w.last_timestamp)
    }

    /// Durably append one action and return it as recorded.
    ///
    /// On `LedgerWriteError` nothing was recorded and the id is reused by
    /// the next append.
    pub fn append(&self, draft: ActionDraft) -> Result<Action> {
        let write_error = |reason: String| PkgtrailError::LedgerWriteError {
            path: self.path.clone(),
            reason,
        };

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| write_error("ledger writer is poisoned".to_string()))?;

        let mut timestamp = draft.timestamp.unwrap_or_else(Utc::now);
        if let Some(last) = writer.last_timestamp
            && timestamp < last
        {
            timestamp = last;
        }

        let action = Action {
            id: writer.next_id,
            timestamp,
            backend: draft.backend,
            kind: draft.kind,
            package: draft.package,
            requested_version: draft.requested_version,
            result_version: draft.result_version,
            outcome: draft.outcome,
            error_detail: draft.error_detail,
        };

        let mut line = serde_json::to_string(&action).map_err(|e| write_error(e.to_string()))?;
        line.push('\n');

        let written = writer
            .file
            .write_all(line.as_bytes())
            .and_then(|()| writer.file.sync_data());

        if let Err(e) = written {
            // Cut off whatever part of the line reached the file
            let len = writer.len;
            if let Err(truncate_err) = writer.file.set_len(len) {
                ui::error(&format!(
                    "Could not roll back partial ledger write: {}",
                    truncate_err
                ));
            }
            return Err(write_error(e.to_string()));
        }

        writer.len += line.len() as u64;
        writer.next_id += 1;
        writer.last_timestamp = Some(timestamp);

        ui::verbose(&format!(
            "ledger #{}: {} {}:{} -> {}",
            action.id, action.kind, action.backend, action.package, action.outcome
        ));

        Ok(action)
    }

    /// Actions in id order. Every call re-reads the file from the start.
    pub fn read(&self, filter: ActionFilter) -> Result<LedgerReader> {
        LedgerReader::open(&self.path, filter)
    }

    /// `read` collected into memory.
    pub fn actions(&self, filter: ActionFilter) -> Result<Vec<Action>> {
        self.read(filter)?.collect()
    }

    /// Version left by the most recent successful action on `package`.
    /// A successful remove clears it.
    pub fn last_known_version(&self, package: &PackageId) -> Result<Option<String>> {
        let filter = ActionFilter::all()
            .backend(package.backend.clone())
            .package(&package.name)
            .outcome(Outcome::Success);

        let mut version = None;
        for action in self.read(filter)? {
            let action = action?;
            version = if action.kind.makes_present() {
                action.result_version.or(action.requested_version)
            } else {
                None
            };
        }
        Ok(version)
    }

    /// Fold the ledger, optionally only up to `up_to`, into package state.
    pub fn state(&self, up_to: Option<u64>) -> Result<LedgerState> {
        self.view().state(up_to)
    }

    pub fn tags(&self) -> Result<TagStore> {
        self.view().tags()
    }

    pub fn view(&self) -> LedgerView {
        LedgerView::new(&self.dir)
    }

    /// Flush and release the lock.
    pub fn close(self) -> Result<()> {
        let writer = self
            .writer
            .into_inner()
            .map_err(|_| PkgtrailError::LockError("ledger writer is poisoned".to_string()))?;
        writer.file.sync_all()?;
        drop(self.lock);
        Ok(())
    }
}
