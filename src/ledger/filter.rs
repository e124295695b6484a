use crate::core::types::{Action, ActionKind, Backend, Outcome};
use chrono::{DateTime, Utc};

/// Narrows a ledger read. Every unset field matches everything.
#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    pub backend: Option<Backend>,
    pub package: Option<String>,
    pub kind: Option<ActionKind>,
    pub outcome: Option<Outcome>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Inclusive upper bound; reading stops once it is passed.
    pub max_id: Option<u64>,
}

impl ActionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn backend(mut self, backend: impl Into<Backend>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    pub fn package(mut self, name: &str) -> Self {
        self.package = Some(name.to_string());
        self
    }

    pub fn kind(mut self, kind: ActionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn up_to(mut self, id: u64) -> Self {
        self.max_id = Some(id);
        self
    }

    pub fn matches(&self, action: &Action) -> bool {
        self.backend.as_ref().is_none_or(|b| *b == action.backend)
            && self.package.as_ref().is_none_or(|p| *p == action.package)
            && self.kind.is_none_or(|k| k == action.kind)
            && self.outcome.is_none_or(|o| o == action.outcome)
            && self.since.is_none_or(|t| action.timestamp >= t)
            && self.until.is_none_or(|t| action.timestamp <= t)
            && self.max_id.is_none_or(|id| action.id <= id)
    }

    /// True once no later action (higher id) can match.
    pub(crate) fn exhausted_by(&self, action: &Action) -> bool {
        self.max_id.is_some_and(|id| action.id > id)
    }
}
