use crate::error::{PkgtrailError, Result};
use crate::project_identity;
use crate::ui;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Exclusive, process-wide hold on one ledger directory.
///
/// The OS releases the lock when the file handle closes, so a crashed run
/// never leaves the ledger locked; the pid it wrote is only informational.
#[derive(Debug)]
pub struct LedgerLock {
    _file: File,
    path: PathBuf,
}

impl LedgerLock {
    pub fn acquire(dir: &Path) -> Result<Self> {
        let lock_path = dir.join(project_identity::LEDGER_LOCK_NAME);

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| PkgtrailError::IoError {
                path: lock_path.clone(),
                source: e,
            })?;

        if file.try_lock_exclusive().is_err() {
            let holder = read_pid(&mut file)
                .map(|pid| format!(" (pid {})", pid))
                .unwrap_or_default();
            return Err(PkgtrailError::LockError(format!(
                "Another {} process{} is using the ledger.\n\
                 Lock file: {}\n\
                 Wait for it to complete and try again.",
                project_identity::BINARY_NAME,
                holder,
                lock_path.display()
            )));
        }

        if let Some(stale) = read_pid(&mut file)
            && stale != std::process::id()
        {
            ui::verbose(&format!("Recovered ledger lock left by pid {}", stale));
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;

        Ok(Self {
            _file: file,
            path: lock_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_pid(file: &mut File) -> Option<u32> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut content).ok()?;
    content.trim().parse().ok()
}

/// Write `content` to `path` through a temp file and rename.
pub(crate) fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        PkgtrailError::PathError(format!("Invalid path (no parent directory): {}", path.display()))
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{}.tmp", file_name));

    let mut tmp_file = File::create(&tmp_path).map_err(|e| PkgtrailError::IoError {
        path: tmp_path.clone(),
        source: e,
    })?;
    tmp_file.write_all(content)?;
    tmp_file.sync_all()?;
    drop(tmp_file);

    fs::rename(&tmp_path, path).map_err(|e| PkgtrailError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
