use crate::core::types::{Backend, PackageId, Snapshot};
use crate::core::version;
use crate::ledger::LedgerState;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A disagreement between the ledger and what a backend reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriftKind {
    /// Ledger says installed, the backend no longer lists it
    Missing,
    /// Installed, but not at the version the ledger recorded
    VersionChanged { expected: String, found: String },
    /// Ledger says removed, the backend lists it again
    Reappeared { found: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drift {
    pub package: PackageId,
    /// Ledger id of the action the snapshot contradicts
    pub last_action: u64,
    #[serde(flatten)]
    pub kind: DriftKind,
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DriftKind::Missing => write!(
                f,
                "{} is missing (installed by #{})",
                self.package, self.last_action
            ),
            DriftKind::VersionChanged { expected, found } => write!(
                f,
                "{} is at {} but #{} recorded {}",
                self.package, found, self.last_action, expected
            ),
            DriftKind::Reappeared { .. } => write!(
                f,
                "{} is installed again (removed by #{})",
                self.package, self.last_action
            ),
        }
    }
}

/// Compare the ledger against snapshots taken after its actions.
///
/// A package is only checked when its backend has a snapshot no older than
/// the package's last ledger action; older snapshots cannot contradict it.
pub fn detect_drift(snapshots: &[Snapshot], state: &LedgerState) -> Vec<Drift> {
    let by_backend: BTreeMap<&Backend, &Snapshot> =
        snapshots.iter().map(|s| (&s.backend, s)).collect();

    let mut drift = Vec::new();
    for (id, package) in state.entries() {
        let Some(snapshot) = by_backend.get(&id.backend) else {
            continue;
        };
        if snapshot.timestamp < package.timestamp {
            continue;
        }

        let kind = match (package.present, snapshot.version_of(&id.name)) {
            (true, None) => Some(DriftKind::Missing),
            (true, Some(found)) => match (&package.resolved_version, found) {
                (Some(expected), Some(found)) if !version::satisfies(found, expected) => {
                    Some(DriftKind::VersionChanged {
                        expected: expected.clone(),
                        found: found.to_string(),
                    })
                }
                _ => None,
            },
            (false, Some(found)) => Some(DriftKind::Reappeared {
                found: found.map(str::to_string),
            }),
            (false, None) => None,
        };

        if let Some(kind) = kind {
            drift.push(Drift {
                package: id.clone(),
                last_action: package.last_action,
                kind,
            });
        }
    }
    drift
}
