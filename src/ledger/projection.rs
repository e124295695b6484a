use crate::core::types::{Action, Outcome, PackageId, PackageRef};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// What the ledger says about one package after folding its actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageState {
    pub present: bool,
    /// Version explicitly asked for by the last install/upgrade
    pub requested_version: Option<String>,
    /// Version the backend reported after the last install/upgrade
    pub resolved_version: Option<String>,
    pub last_action: u64,
    pub timestamp: DateTime<Utc>,
}

/// Package state derived from a ledger replay.
///
/// Only `Success` and `Skipped` actions count: both mean the backend ended
/// in the state the action asked for. `Failed` actions change nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    packages: BTreeMap<PackageId, PackageState>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_actions<I>(actions: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<Action>>,
    {
        let mut state = Self::new();
        for action in actions {
            state.apply(&action?);
        }
        Ok(state)
    }

    pub fn apply(&mut self, action: &Action) {
        if action.outcome == Outcome::Failed {
            return;
        }

        let id = action.package_id();
        if action.kind.makes_present() {
            self.packages.insert(
                id,
                PackageState {
                    present: true,
                    requested_version: action.requested_version.clone(),
                    resolved_version: action.result_version.clone(),
                    last_action: action.id,
                    timestamp: action.timestamp,
                },
            );
        } else {
            self.packages.insert(
                id,
                PackageState {
                    present: false,
                    requested_version: None,
                    resolved_version: None,
                    last_action: action.id,
                    timestamp: action.timestamp,
                },
            );
        }
    }

    pub fn get(&self, id: &PackageId) -> Option<&PackageState> {
        self.packages.get(id)
    }

    /// Every package the ledger has touched, present or removed
    pub fn entries(&self) -> impl Iterator<Item = (&PackageId, &PackageState)> {
        self.packages.iter()
    }

    pub fn installed(&self) -> impl Iterator<Item = (&PackageId, &PackageState)> {
        self.packages.iter().filter(|(_, state)| state.present)
    }

    pub fn removed(&self) -> impl Iterator<Item = &PackageId> {
        self.packages
            .iter()
            .filter(|(_, state)| !state.present)
            .map(|(id, _)| id)
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Desired package list. With `pin_versions` the resolved version wins
    /// over the requested one, reproducing the exact versions recorded.
    pub fn to_target(&self, pin_versions: bool) -> Vec<PackageRef> {
        self.installed()
            .map(|(id, state)| {
                let version = if pin_versions {
                    state
                        .resolved_version
                        .clone()
                        .or_else(|| state.requested_version.clone())
                } else {
                    state.requested_version.clone()
                };
                PackageRef {
                    backend: id.backend.clone(),
                    name: id.name.clone(),
                    version,
                }
            })
            .collect()
    }
}
