use super::filter::ActionFilter;
use crate::core::types::Action;
use crate::error::{PkgtrailError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Lazy iterator over the actions of one ledger file, in id order.
///
/// Each `LedgerReader` holds its own file handle, so re-opening yields the
/// same sequence for an unmodified ledger. An unterminated last line is a
/// write still in flight and ends the sequence.
pub struct LedgerReader {
    path: PathBuf,
    lines: BufReader<File>,
    filter: ActionFilter,
    line_no: usize,
    done: bool,
}

impl LedgerReader {
    /// Open any ledger file. Takes no lock.
    pub fn open(path: &Path, filter: ActionFilter) -> Result<Self> {
        let file = File::open(path).map_err(|e| PkgtrailError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file),
            filter,
            line_no: 0,
            done: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corrupt(&mut self, message: String) -> Option<Result<Action>> {
        self.done = true;
        Some(Err(PkgtrailError::LedgerCorrupt {
            path: self.path.clone(),
            line: self.line_no,
            message,
        }))
    }
}

impl Iterator for LedgerReader {
    type Item = Result<Action>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = Vec::new();

        while !self.done {
            buf.clear();
            let read = match self.lines.read_until(b'\n', &mut buf) {
                Ok(read) => read,
                Err(e) => return self.corrupt(e.to_string()),
            };
            if read == 0 {
                self.done = true;
                return None;
            }
            self.line_no += 1;

            let terminated = buf.last() == Some(&b'\n');
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let action: Action = match serde_json::from_str(line) {
                Ok(action) => action,
                Err(_) if !terminated => {
                    self.done = true;
                    return None;
                }
                Err(e) => return self.corrupt(e.to_string()),
            };

            if self.filter.exhausted_by(&action) {
                self.done = true;
                return None;
            }
            if self.filter.matches(&action) {
                return Some(Ok(action));
            }
        }

        None
    }
}

/// Where the next append goes, as found by scanning an existing file.
#[derive(Debug, Default)]
pub(super) struct ScanResult {
    pub last: Option<Action>,
    /// Byte length of the valid prefix.
    pub valid_len: u64,
    /// A torn trailing line was found past `valid_len`.
    pub torn: bool,
    /// The last record is complete but lacks its newline.
    pub needs_newline: bool,
}

/// Validate a whole ledger file: every line parses and ids strictly increase.
pub(super) fn scan(path: &Path) -> Result<ScanResult> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ScanResult::default()),
        Err(e) => {
            return Err(PkgtrailError::IoError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    let corrupt = |line: usize, message: String| PkgtrailError::LedgerCorrupt {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut reader = BufReader::new(file);
    let mut result = ScanResult::default();
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        if read == 0 {
            break;
        }
        line_no += 1;

        let terminated = buf.last() == Some(&b'\n');
        let text = String::from_utf8_lossy(&buf);
        let text = text.trim();

        if text.is_empty() {
            result.valid_len += read as u64;
            continue;
        }

        match serde_json::from_str::<Action>(text) {
            Ok(action) => {
                if let Some(prev) = &result.last
                    && action.id <= prev.id
                {
                    return Err(corrupt(
                        line_no,
                        format!("id {} does not follow id {}", action.id, prev.id),
                    ));
                }
                result.valid_len += read as u64;
                result.needs_newline = !terminated;
                result.last = Some(action);
            }
            Err(_) if !terminated => {
                result.torn = true;
                break;
            }
            Err(e) => return Err(corrupt(line_no, e.to_string())),
        }
    }

    Ok(result)
}
