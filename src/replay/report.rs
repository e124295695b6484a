use crate::core::types::{Action, Outcome, Snapshot};
use crate::diff::ProposedAction;
use crate::error::{PkgtrailError, Result};
use serde::Serialize;

/// Lifecycle of one action during a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionState {
    Pending,
    Applying,
    Applied,
    Failed,
    Skipped,
}

impl ActionState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Applying)
    }

    pub(super) fn from_outcome(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Self::Applied,
            Outcome::Failed => Self::Failed,
            Outcome::Skipped => Self::Skipped,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayStep {
    pub proposed: ProposedAction,
    pub state: ActionState,
    /// Ledger record, once the step reached a terminal state
    pub recorded: Option<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedAction {
    pub action: Action,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayReport {
    pub applied: usize,
    pub skipped: usize,
    /// Every failure, in execution order
    pub failed: Vec<FailedAction>,
    pub steps: Vec<ReplayStep>,
    /// Strict mode stopped after a failure
    pub aborted: bool,
    pub cancelled: bool,
    /// Snapshots re-captured after the run
    #[serde(skip)]
    pub snapshots: Vec<Snapshot>,
}

impl ReplayReport {
    pub fn not_started(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.state == ActionState::Pending)
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    /// Turn the report into an error when anything failed.
    pub fn ensure_success(&self) -> Result<()> {
        if self.cancelled {
            return Err(PkgtrailError::Cancelled);
        }
        match self.failed.first() {
            None => Ok(()),
            Some(first) => Err(PkgtrailError::ActionFailed {
                kind: first.action.kind.to_string(),
                backend: first.action.backend.to_string(),
                package: first.action.package.clone(),
                detail: if self.failed.len() > 1 {
                    format!("{} (and {} more failures)", first.detail, self.failed.len() - 1)
                } else {
                    first.detail.clone()
                },
            }),
        }
    }
}
