//! `/var/log/apt/history.log` import.
//!
//! ```text
//! Start-Date: 2024-03-01  10:15:02
//! Commandline: apt install curl
//! Install: curl:amd64 (8.5.0-2ubuntu10), libcurl4:amd64 (8.5.0-2ubuntu10, automatic)
//! Upgrade: jq:amd64 (1.6-2, 1.7.1-3)
//! End-Date: 2024-03-01  10:15:05
//! ```
//!
//! Timestamps are local time. `Purge` is recorded as a remove; automatic
//! dependencies are not recorded at all.

use super::ImportReport;
use crate::core::types::{ActionKind, ActionOutcome, Backend, PackageRef};
use crate::error::{PkgtrailError, Result};
use crate::ledger::{ActionDraft, Ledger};
use crate::ui;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

pub const DEFAULT_LOG: &str = "/var/log/apt/history.log";

static ENTRY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(Start-Date|End-Date|Install|Reinstall|Upgrade|Downgrade|Remove|Purge):\s*(.*)$")
        .expect("Invalid regex pattern")
});

/// `name:arch (details)`; the architecture suffix is optional.
static PACKAGE_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z0-9][A-Za-z0-9.+_-]*)(?::[A-Za-z0-9_-]+)?\s+\(([^)]*)\)")
        .expect("Invalid regex pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: ActionKind,
    pub package: String,
    /// Version after the action; `None` for removals
    pub version: Option<String>,
    pub automatic: bool,
}

/// Parse every package line of a history log. Blocks with an unreadable
/// `Start-Date` are skipped with a warning.
pub fn parse_history(content: &str) -> Vec<HistoryEntry> {
    let mut entries = Vec::new();
    let mut block_time: Option<DateTime<Utc>> = None;

    for line in content.lines() {
        let Some(caps) = ENTRY_LINE.captures(line.trim_end()) else {
            continue;
        };
        let body = &caps[2];

        let kind = match &caps[1] {
            "Start-Date" => {
                block_time = parse_timestamp(body);
                if block_time.is_none() {
                    ui::warning(&format!("apt history: unreadable Start-Date '{}'", body));
                }
                continue;
            }
            "End-Date" => {
                block_time = None;
                continue;
            }
            "Install" | "Reinstall" => ActionKind::Install,
            "Upgrade" | "Downgrade" => ActionKind::Upgrade,
            _ => ActionKind::Remove,
        };

        let Some(timestamp) = block_time else {
            continue;
        };

        for item in PACKAGE_ITEM.captures_iter(body) {
            let details: Vec<&str> = item[2].split(',').map(str::trim).collect();
            let automatic = details.contains(&"automatic");
            let version = match kind {
                ActionKind::Remove => None,
                // `old, new`
                ActionKind::Upgrade => details.get(1).or(details.first()),
                ActionKind::Install => details.first(),
            }
            .filter(|v| !v.is_empty() && **v != "automatic")
            .map(|v| v.to_string());

            entries.push(HistoryEntry {
                timestamp,
                kind,
                package: item[1].to_string(),
                version,
                automatic,
            });
        }
    }

    entries
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    let naive = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Append the log's explicit installs/removes as `Success` actions with
/// their original timestamps. Entries not newer than the ledger's last
/// record are counted and skipped, so importing twice is harmless.
pub fn import_history(ledger: &Ledger, content: &str) -> Result<ImportReport> {
    let backend = Backend::from("apt");
    let tail = ledger.last_timestamp();
    let mut report = ImportReport::default();

    for entry in parse_history(content) {
        if entry.automatic {
            report.automatic += 1;
            continue;
        }
        if tail.is_some_and(|tail| entry.timestamp <= tail) {
            report.already_recorded += 1;
            continue;
        }

        let package = PackageRef::new(backend.clone(), &entry.package, None);
        let outcome = ActionOutcome::success(entry.version.clone());
        ledger.append(ActionDraft::from_outcome(entry.kind, &package, &outcome).at(entry.timestamp))?;
        report.imported += 1;
    }

    ui::verbose(&format!(
        "apt history: {} imported, {} already recorded, {} automatic",
        report.imported, report.already_recorded, report.automatic
    ));
    Ok(report)
}

pub fn import_file(ledger: &Ledger, path: &Path) -> Result<ImportReport> {
    let content = std::fs::read_to_string(path).map_err(|e| PkgtrailError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    import_history(ledger, &content)
}
