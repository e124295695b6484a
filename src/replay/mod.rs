//! # Reproduction engine
//!
//! Applies proposed actions through the backend adapters, in order, and
//! logs every attempt. A sequence is first reduced to each package's net
//! effect, so replaying it again only skips. Each action moves
//! `Pending -> Applying -> {Applied, Failed, Skipped}`.

mod report;

pub use report::{ActionState, FailedAction, ReplayReport, ReplayStep};

use crate::core::CancelToken;
use crate::core::types::{
    Action, ActionKind, ActionOutcome, Backend, Outcome, PackageId, PackageRef, Snapshot,
};
use crate::diff::{DiffResult, ProposedAction};
use crate::error::Result;
use crate::ledger::{ActionDraft, Ledger};
use crate::packages::BackendRegistry;
use crate::packages::traits::{DETAIL_BACKEND_UNAVAILABLE, DETAIL_CANCELLED};
use crate::snapshot::SnapshotStore;
use crate::ui;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What happens after a failed action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayMode {
    /// Record the failure and carry on
    #[default]
    Continue,
    /// Stop at the first failure
    Strict,
}

impl ReplayMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "continue" | "partial" => Some(Self::Continue),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    pub mode: ReplayMode,
    /// Ledger replays request the versions that were resolved, not just
    /// the ones originally requested
    pub pin_versions: bool,
}

pub struct ReplayEngine<'a> {
    registry: &'a BackendRegistry,
    ledger: &'a Ledger,
    options: ReplayOptions,
    cancel: CancelToken,
    snapshots: Option<&'a SnapshotStore>,
}

impl<'a> ReplayEngine<'a> {
    pub fn new(registry: &'a BackendRegistry, ledger: &'a Ledger, options: ReplayOptions) -> Self {
        Self {
            registry,
            ledger,
            options,
            cancel: CancelToken::new(),
            snapshots: None,
        }
    }

    /// Re-snapshot touched backends after each run.
    pub fn with_snapshots(mut self, store: &'a SnapshotStore) -> Self {
        self.snapshots = Some(store);
        self
    }

    /// Share the token the adapters were built with.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn replay_diff(&self, diff: &DiffResult) -> Result<ReplayReport> {
        self.replay(&diff.actions)
    }

    /// Reproduce the effects of recorded actions, e.g. another machine's
    /// ledger. Failed source actions had no effect and are not replayed.
    pub fn replay_ledger(&self, source: &[Action]) -> Result<ReplayReport> {
        let actions: Vec<ProposedAction> = source
            .iter()
            .filter(|a| a.outcome != Outcome::Failed)
            .map(|a| {
                let version = match a.kind {
                    ActionKind::Remove => None,
                    _ if self.options.pin_versions => {
                        a.result_version.clone().or_else(|| a.requested_version.clone())
                    }
                    _ => a.requested_version.clone(),
                };
                ProposedAction {
                    kind: a.kind,
                    package: PackageRef {
                        backend: a.backend.clone(),
                        name: a.package.clone(),
                        version,
                    },
                    current_version: None,
                }
            })
            .collect();

        self.replay(&actions)
    }

    /// Apply a single install/remove and record it.
    pub fn apply_one(&self, kind: ActionKind, package: &PackageRef) -> Result<Action> {
        let mut availability = BTreeMap::new();
        let action = self.execute(kind, package, &mut availability)?;
        self.refresh_snapshots(&BTreeSet::from([package.backend.clone()]));
        Ok(action)
    }

    pub fn replay(&self, actions: &[ProposedAction]) -> Result<ReplayReport> {
        let mut report = ReplayReport {
            steps: actions
                .iter()
                .map(|proposed| ReplayStep {
                    proposed: proposed.clone(),
                    state: ActionState::Pending,
                    recorded: None,
                })
                .collect(),
            ..Default::default()
        };
        report.skipped = supersede(&mut report.steps);

        let mut availability = BTreeMap::new();
        let mut touched = BTreeSet::new();

        for step in report.steps.iter_mut() {
            if step.state == ActionState::Skipped {
                continue;
            }
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if report.aborted {
                break;
            }

            step.state = ActionState::Applying;
            let package = &step.proposed.package;
            touched.insert(package.backend.clone());

            let action = self.execute(step.proposed.kind, package, &mut availability)?;
            step.state = ActionState::from_outcome(action.outcome);

            match action.outcome {
                Outcome::Success => report.applied += 1,
                Outcome::Skipped => report.skipped += 1,
                Outcome::Failed => {
                    let detail = action.error_detail.clone().unwrap_or_default();
                    if detail == DETAIL_CANCELLED || self.cancel.is_cancelled() {
                        report.cancelled = true;
                    } else if self.options.mode == ReplayMode::Strict {
                        report.aborted = true;
                    }
                    report.failed.push(FailedAction {
                        action: action.clone(),
                        detail,
                    });
                }
            }
            step.recorded = Some(action);

            if report.cancelled {
                break;
            }
        }

        if report.cancelled {
            ui::warning(&format!(
                "Replay cancelled; {} action(s) not started",
                report.not_started()
            ));
        } else if report.aborted {
            ui::warning(&format!(
                "Strict mode: stopped after first failure; {} action(s) not started",
                report.not_started()
            ));
        }

        report.snapshots = self.refresh_snapshots(&touched);
        Ok(report)
    }

    /// Applying: run the adapter under the backend's mutation lock, then log.
    fn execute(
        &self,
        kind: ActionKind,
        package: &PackageRef,
        availability: &mut BTreeMap<Backend, bool>,
    ) -> Result<Action> {
        let manager = self.registry.get(&package.backend);
        let available = *availability
            .entry(package.backend.clone())
            .or_insert_with(|| manager.as_ref().is_some_and(|m| m.detect()));

        let outcome = match manager {
            Some(manager) if available => {
                let _guard = self.registry.lock_mutations(&package.backend)?;
                ui::verbose(&format!("{} {}", kind, package));
                match kind {
                    ActionKind::Install | ActionKind::Upgrade => {
                        manager.install(&package.name, package.version.as_deref())
                    }
                    ActionKind::Remove => manager.remove(&package.name),
                }
            }
            _ => ActionOutcome::failed(DETAIL_BACKEND_UNAVAILABLE),
        };

        let action = self
            .ledger
            .append(ActionDraft::from_outcome(kind, package, &outcome))
            .inspect_err(|e| {
                ui::error(&format!("Could not record {} {}: {}", kind, package, e));
            })?;

        Ok(action)
    }

    /// Failures only warn: the actions are already recorded.
    fn refresh_snapshots(&self, touched: &BTreeSet<Backend>) -> Vec<Snapshot> {
        let Some(store) = self.snapshots else {
            return Vec::new();
        };
        if self.cancel.is_cancelled() {
            return Vec::new();
        }
        let backends: Vec<Backend> = touched.iter().cloned().collect();
        store.capture_backends(self.registry, &backends).captured
    }
}

/// Reduce a sequence to each package's net effect: a step that a later
/// step on the same package overrides is marked Skipped and never runs.
/// A final install without a version inherits the version an earlier
/// install asked for, unless a remove came in between. Returns the number
/// of superseded steps.
fn supersede(steps: &mut [ReplayStep]) -> usize {
    // package -> (index of its final step, still collecting a version)
    let mut last: BTreeMap<PackageId, (usize, bool)> = BTreeMap::new();
    let mut superseded = 0;

    for i in (0..steps.len()).rev() {
        let id = steps[i].proposed.package.id();
        let Some((final_idx, open)) = last.get(&id).copied() else {
            let collecting = steps[i].proposed.kind.makes_present()
                && steps[i].proposed.package.version.is_none();
            last.insert(id, (i, collecting));
            continue;
        };

        steps[i].state = ActionState::Skipped;
        superseded += 1;
        ui::verbose(&format!(
            "{} superseded by a later action on {}",
            steps[i].proposed, id
        ));

        if !open {
            continue;
        }
        if steps[i].proposed.kind == ActionKind::Remove {
            last.insert(id, (final_idx, false));
        } else if let Some(version) = steps[i].proposed.package.version.clone() {
            steps[final_idx].proposed.package.version = Some(version);
            last.insert(id, (final_idx, false));
        }
    }

    superseded
}

#[cfg(test)]
mod tests;
