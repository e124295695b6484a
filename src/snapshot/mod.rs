//! # Snapshot store
//!
//! `<data_dir>/snapshots/<backend>/<seq>.json`. A capture is written and
//! synced to a pending file first, then hard-linked to the next free
//! sequence number. Published files are never rewritten.

use crate::core::types::{Backend, Snapshot};
use crate::error::{PkgtrailError, Result};
use crate::packages::{BackendRegistry, PackageManager};
use crate::ui;
use rayon::prelude::*;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static PENDING: AtomicU64 = AtomicU64::new(0);

/// Result of capturing every registered backend.
#[derive(Debug, Default)]
pub struct CaptureReport {
    pub captured: Vec<Snapshot>,
    /// Native tool missing; skipped for this run
    pub unavailable: Vec<Backend>,
    pub failed: Vec<(Backend, PkgtrailError)>,
}

pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List `manager` and persist the result.
    pub fn capture(&self, manager: &dyn PackageManager) -> Result<Snapshot> {
        let snapshot = manager.list()?;
        self.save(&snapshot)?;
        Ok(snapshot)
    }

    /// Capture every available backend in parallel.
    pub fn capture_all(&self, registry: &BackendRegistry) -> CaptureReport {
        self.capture_backends(registry, &registry.backends())
    }

    pub fn capture_backends(&self, registry: &BackendRegistry, backends: &[Backend]) -> CaptureReport {
        let results: Vec<(Backend, Option<Result<Snapshot>>)> = backends
            .par_iter()
            .map(|backend| {
                let result = registry
                    .get(backend)
                    .filter(|manager| manager.detect())
                    .map(|manager| self.capture(manager.as_ref()));
                (backend.clone(), result)
            })
            .collect();

        let mut report = CaptureReport::default();
        for (backend, result) in results {
            match result {
                Some(Ok(snapshot)) => report.captured.push(snapshot),
                Some(Err(PkgtrailError::BackendUnavailable(_))) | None => {
                    report.unavailable.push(backend)
                }
                Some(Err(e)) => {
                    ui::warning(&format!("Failed to snapshot {}: {}", backend, e));
                    report.failed.push((backend, e));
                }
            }
        }
        report
    }

    /// Persist `snapshot` as the next entry of its backend. Returns its path.
    pub fn save(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        let dir = self.backend_dir(&snapshot.backend)?;
        fs::create_dir_all(&dir).map_err(|e| PkgtrailError::IoError {
            path: dir.clone(),
            source: e,
        })?;

        let content = serde_json::to_string_pretty(snapshot)
            .map_err(|e| PkgtrailError::SerializationError(format!("Snapshot: {}", e)))?;

        // Fully written before it gets a sequence number
        let pending = dir.join(format!(
            ".pending-{}-{}.tmp",
            std::process::id(),
            PENDING.fetch_add(1, Ordering::Relaxed)
        ));
        let published = self.publish(&dir, &snapshot.backend, &pending, content.as_bytes());
        let _ = fs::remove_file(&pending);
        let path = published?;

        ui::verbose(&format!(
            "Saved {} snapshot ({} packages) to {}",
            snapshot.backend,
            snapshot.len(),
            path.display()
        ));
        Ok(path)
    }

    fn publish(&self, dir: &Path, backend: &Backend, pending: &Path, content: &[u8]) -> Result<PathBuf> {
        let io_err = |path: &Path, e: std::io::Error| PkgtrailError::IoError {
            path: path.to_path_buf(),
            source: e,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(pending)
            .map_err(|e| io_err(pending, e))?;
        file.write_all(content).map_err(|e| io_err(pending, e))?;
        file.sync_all().map_err(|e| io_err(pending, e))?;
        drop(file);

        let mut seq = self.sequence_numbers(backend)?.last().map_or(1, |s| s + 1);
        loop {
            let path = dir.join(format!("{:010}.json", seq));
            match fs::hard_link(pending, &path) {
                Ok(()) => return Ok(path),
                // A concurrent capture took this number
                Err(e) if e.kind() == ErrorKind::AlreadyExists => seq += 1,
                Err(e) => return Err(io_err(&path, e)),
            }
        }
    }

    /// Most recent readable snapshot of `backend`, `None` if never captured.
    /// Unparsable files are skipped with a warning.
    pub fn latest(&self, backend: &Backend) -> Result<Option<Snapshot>> {
        for seq in self.sequence_numbers(backend)?.into_iter().rev() {
            match self.load(backend, seq) {
                Ok(snapshot) => return Ok(Some(snapshot)),
                Err(PkgtrailError::ParseError { file, message }) => {
                    ui::warning(&format!("Skipping unreadable snapshot {}: {}", file, message));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Latest snapshot of every backend that has one.
    pub fn latest_all(&self) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        for backend in self.stored_backends()? {
            if let Some(snapshot) = self.latest(&backend)? {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }

    /// Every snapshot of `backend`, oldest first.
    pub fn history(&self, backend: &Backend) -> Result<Vec<Snapshot>> {
        self.sequence_numbers(backend)?
            .into_iter()
            .map(|seq| self.load(backend, seq))
            .collect()
    }

    pub fn stored_backends(&self) -> Result<Vec<Backend>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut backends = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                backends.push(Backend::from(entry.file_name().to_string_lossy().as_ref()));
            }
        }
        backends.sort();
        Ok(backends)
    }

    fn load(&self, backend: &Backend, seq: u64) -> Result<Snapshot> {
        let path = self.backend_dir(backend)?.join(format!("{:010}.json", seq));
        let content = fs::read_to_string(&path).map_err(|e| PkgtrailError::IoError {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| PkgtrailError::ParseError {
            file: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn sequence_numbers(&self, backend: &Backend) -> Result<Vec<u64>> {
        let dir = self.backend_dir(backend)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut seqs: Vec<u64> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.strip_suffix(".json")?.parse().ok()
            })
            .collect();
        seqs.sort_unstable();
        Ok(seqs)
    }

    fn backend_dir(&self, backend: &Backend) -> Result<PathBuf> {
        let name = backend.name();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PkgtrailError::PathError(format!(
                "Backend name '{}' cannot be used as a directory name",
                name
            )));
        }
        Ok(self.root.join(name))
    }
}
