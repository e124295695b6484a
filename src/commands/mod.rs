//! Command handlers behind the CLI. Each takes an options struct and a
//! `Session`; none of them parse arguments themselves.

pub mod apply;
pub mod diff;
pub mod export;
pub mod import;
pub mod install;
pub mod log;
pub mod snapshot;
pub mod status;
pub mod tag;

use crate::config::Settings;
use crate::core::CancelToken;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::packages::BackendRegistry;
use crate::snapshot::SnapshotStore;

/// Settings plus the process-wide cancellation token.
pub struct Session {
    pub settings: Settings,
    pub cancel: CancelToken,
}

impl Session {
    pub fn new(settings: Settings, cancel: CancelToken) -> Self {
        Self { settings, cancel }
    }

    pub fn registry(&self) -> BackendRegistry {
        let ctx = self.settings.exec_context(self.cancel.clone());
        self.settings.registry(&ctx)
    }

    /// Opening takes the ledger lock for the lifetime of the handle.
    pub fn ledger(&self) -> Result<Ledger> {
        Ledger::open(self.settings.ledger_dir())
    }

    pub fn snapshots(&self) -> SnapshotStore {
        SnapshotStore::new(&self.settings.snapshots_dir())
    }
}
