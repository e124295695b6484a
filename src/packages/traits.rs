use crate::core::types::{ActionOutcome, Backend, InstalledPackages, Snapshot};
use crate::error::Result;

/// Detail recorded when a backend's native tool is missing.
pub const DETAIL_BACKEND_UNAVAILABLE: &str = "backend unavailable";
/// Detail recorded when the caller interrupted an in-flight action.
pub const DETAIL_CANCELLED: &str = "cancelled";

/// Whether a single package is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Absent,
    Installed { version: Option<String> },
}

impl Presence {
    pub fn version(&self) -> Option<&str> {
        match self {
            Presence::Installed { version } => version.as_deref(),
            Presence::Absent => None,
        }
    }

    pub fn is_installed(&self) -> bool {
        matches!(self, Presence::Installed { .. })
    }
}

/// Uniform capability set over one native package manager.
///
/// `install` and `remove` never return errors: every failure is reported
/// as an `ActionOutcome` with `Outcome::Failed` and diagnostic text.
pub trait PackageManager: Send + Sync {
    fn backend(&self) -> Backend;

    /// True if the native tool is present and usable. Never mutates state.
    fn detect(&self) -> bool;

    /// Installed packages with versions.
    ///
    /// Fails with `BackendUnavailable` when the tool is missing and
    /// `BackendQueryError` on output that cannot be parsed.
    fn list_installed(&self) -> Result<InstalledPackages>;

    /// `list_installed` wrapped as a timestamped snapshot.
    fn list(&self) -> Result<Snapshot> {
        let packages = self.list_installed()?;
        let mut snapshot = Snapshot::new(self.backend(), packages);
        snapshot.host = hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().into_owned());
        Ok(snapshot)
    }

    /// Install `name`, optionally at `version`. Already satisfied => Skipped.
    fn install(&self, name: &str, version: Option<&str>) -> ActionOutcome;

    /// Remove `name`. Absent => Skipped.
    fn remove(&self, name: &str) -> ActionOutcome;

    fn query(&self, name: &str) -> Result<Presence>;

    /// Installed version of `name`, if installed and known.
    fn query_version(&self, name: &str) -> Result<Option<String>> {
        Ok(self.query(name)?.version().map(str::to_string))
    }

    /// Shell command that would install `name`, for exported scripts.
    fn install_command_preview(&self, _name: &str, _version: Option<&str>) -> Option<String> {
        None
    }
}
