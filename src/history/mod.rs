//! Import of installs made outside pkgtrail, from native package manager logs.

pub mod apt;

/// Counts from one import run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    /// Entries at or before the ledger's last record
    pub already_recorded: usize,
    /// Dependencies apt pulled in on its own
    pub automatic: usize,
}
