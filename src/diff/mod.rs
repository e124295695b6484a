//! # Diff engine
//!
//! Computes the install/upgrade/remove operations that move observed
//! snapshots to a target. Identity is `(backend, name)`: the same name
//! under two backends is two packages and is never merged.

mod drift;

pub use drift::{Drift, DriftKind, detect_drift};

use crate::core::types::{
    ActionKind, Backend, PackageId, PackageRef, Snapshot, sort_by_precedence,
};
use crate::core::version;
use crate::ledger::LedgerState;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// What the diff should move towards.
#[derive(Debug, Clone)]
pub enum TargetSpec {
    /// Exactly the packages of another snapshot, for its backend
    Snapshot(Snapshot),
    /// A declared package list; every backend it names is fully specified
    Packages(Vec<PackageRef>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffOrder {
    /// Installs and upgrades before removes (default)
    #[default]
    InstallFirst,
    /// Removes first, for disk-constrained replacements
    RemoveFirst,
}

impl DiffOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().replace('-', "_").as_str() {
            "install_first" => Some(Self::InstallFirst),
            "remove_first" => Some(Self::RemoveFirst),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    pub order: DiffOrder,
    /// Output order of backends; unlisted backends follow by name
    pub precedence: Vec<Backend>,
    /// Never propose removing packages the target does not mention
    pub keep_unlisted: bool,
    /// Ledger targets: reproduce resolved versions, not just requested ones
    pub pin_versions: bool,
}

/// One operation the diff proposes. Not executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposedAction {
    pub kind: ActionKind,
    /// Package with the version to request (`None` = any)
    pub package: PackageRef,
    /// Installed version in the source snapshot
    pub current_version: Option<String>,
}

impl fmt::Display for ProposedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.current_version) {
            (ActionKind::Upgrade, Some(current)) => {
                write!(f, "{} {} (from {})", self.kind, self.package, current)
            }
            _ => write!(f, "{} {}", self.kind, self.package),
        }
    }
}

/// One name provided by several backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedName {
    pub name: String,
    pub backends: Vec<Backend>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub actions: Vec<ProposedAction>,
    pub shared_names: Vec<SharedName>,
    pub drift: Vec<Drift>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind == kind).count()
    }
}

type Listing = BTreeMap<String, Option<String>>;

enum Removals {
    /// Everything in the source but not in the target
    Unlisted,
    /// Only these packages, when present
    Only(BTreeSet<PackageId>),
}

/// Diff source snapshots against a target.
///
/// A target backend without a source snapshot is diffed as empty.
pub fn diff(from: &[Snapshot], to: &TargetSpec, options: &DiffOptions) -> DiffResult {
    let mut desired: BTreeMap<Backend, Listing> = BTreeMap::new();
    match to {
        TargetSpec::Snapshot(snapshot) => {
            desired.insert(snapshot.backend.clone(), snapshot.packages.clone());
        }
        TargetSpec::Packages(packages) => {
            for package in packages {
                desired
                    .entry(package.backend.clone())
                    .or_default()
                    .insert(package.name.clone(), package.version.clone());
            }
        }
    }

    let removals = if options.keep_unlisted {
        Removals::Only(BTreeSet::new())
    } else {
        Removals::Unlisted
    };
    plan(from, desired, removals, options)
}

/// Diff snapshots against the state a ledger describes, and report drift.
///
/// Only packages the ledger removed are proposed for removal; packages it
/// never touched are left alone.
pub fn diff_against_ledger(
    from: &[Snapshot],
    state: &LedgerState,
    options: &DiffOptions,
) -> DiffResult {
    let mut result = towards_state(from, state, BTreeSet::new(), options);
    result.drift = detect_drift(from, state);
    result
}

/// Diff towards an earlier point (e.g. a tag) of the ledger whose current
/// state is `current`. Packages that ledger installed after that point are
/// removed as well. Drift is reported against `current`.
pub fn diff_to_earlier_state(
    from: &[Snapshot],
    earlier: &LedgerState,
    current: &LedgerState,
    options: &DiffOptions,
) -> DiffResult {
    let installed_since: BTreeSet<PackageId> = current
        .installed()
        .map(|(id, _)| id)
        .filter(|id| !earlier.get(id).is_some_and(|state| state.present))
        .cloned()
        .collect();

    let mut result = towards_state(from, earlier, installed_since, options);
    result.drift = detect_drift(from, current);
    result
}

fn towards_state(
    from: &[Snapshot],
    state: &LedgerState,
    mut removable: BTreeSet<PackageId>,
    options: &DiffOptions,
) -> DiffResult {
    let mut desired: BTreeMap<Backend, Listing> = BTreeMap::new();
    for package in state.to_target(options.pin_versions) {
        desired
            .entry(package.backend)
            .or_default()
            .insert(package.name, package.version);
    }

    removable.extend(state.removed().cloned());
    if options.keep_unlisted {
        removable.clear();
    }
    for id in &removable {
        desired.entry(id.backend.clone()).or_default();
    }

    plan(from, desired, Removals::Only(removable), options)
}

fn plan(
    from: &[Snapshot],
    desired: BTreeMap<Backend, Listing>,
    removals: Removals,
    options: &DiffOptions,
) -> DiffResult {
    let empty = Listing::new();
    let source: BTreeMap<&Backend, &Listing> =
        from.iter().map(|s| (&s.backend, &s.packages)).collect();

    let mut result = DiffResult::default();
    let mut backends: Vec<Backend> = desired.keys().cloned().collect();
    sort_by_precedence(&mut backends, &options.precedence);

    for backend in backends {
        let wanted = &desired[&backend];
        let current = source.get(&backend).copied().unwrap_or(&empty);

        let mut installs = Vec::new();
        let mut upgrades = Vec::new();
        let mut removes = Vec::new();

        for (name, requested) in wanted {
            let package = PackageRef {
                backend: backend.clone(),
                name: name.clone(),
                version: requested.clone(),
            };
            match current.get(name) {
                None => installs.push(ProposedAction {
                    kind: ActionKind::Install,
                    package,
                    current_version: None,
                }),
                Some(installed) => {
                    // No requested version: keep whatever is installed
                    if !version::satisfies_request(installed.as_deref(), requested.as_deref()) {
                        upgrades.push(ProposedAction {
                            kind: ActionKind::Upgrade,
                            package,
                            current_version: installed.clone(),
                        });
                    }
                }
            }
        }

        for (name, installed) in current {
            if wanted.contains_key(name) {
                continue;
            }
            let id = PackageId {
                backend: backend.clone(),
                name: name.clone(),
            };
            let remove = match &removals {
                Removals::Unlisted => true,
                Removals::Only(ids) => ids.contains(&id),
            };
            if remove {
                removes.push(ProposedAction {
                    kind: ActionKind::Remove,
                    package: PackageRef {
                        backend: backend.clone(),
                        name: name.clone(),
                        version: None,
                    },
                    current_version: installed.clone(),
                });
            }
        }

        match options.order {
            DiffOrder::InstallFirst => {
                result.actions.extend(installs);
                result.actions.extend(upgrades);
                result.actions.extend(removes);
            }
            DiffOrder::RemoveFirst => {
                result.actions.extend(removes);
                result.actions.extend(installs);
                result.actions.extend(upgrades);
            }
        }
    }

    result.shared_names = shared_names(from, &desired, &result.actions);
    result
}

/// Names a fresh install shares with another backend, in the source or
/// in the target.
fn shared_names(
    from: &[Snapshot],
    desired: &BTreeMap<Backend, Listing>,
    actions: &[ProposedAction],
) -> Vec<SharedName> {
    let mut providers: BTreeMap<&str, BTreeSet<Backend>> = BTreeMap::new();
    for snapshot in from {
        for name in snapshot.packages.keys() {
            providers
                .entry(name.as_str())
                .or_default()
                .insert(snapshot.backend.clone());
        }
    }
    for (backend, listing) in desired {
        for name in listing.keys() {
            providers
                .entry(name.as_str())
                .or_default()
                .insert(backend.clone());
        }
    }

    let mut seen = BTreeSet::new();
    actions
        .iter()
        .filter(|a| a.kind == ActionKind::Install)
        .filter_map(|a| {
            let backends = providers.get(a.package.name.as_str())?;
            if backends.len() < 2 || !seen.insert(a.package.name.clone()) {
                return None;
            }
            Some(SharedName {
                name: a.package.name.clone(),
                backends: backends.iter().cloned().collect(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests;
