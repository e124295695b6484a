pub mod cancel;
pub mod types;
pub mod version;

pub use cancel::{CancelToken, ExecContext};
pub use types::{
    Action, ActionKind, ActionOutcome, Backend, InstalledPackages, Outcome, PackageId, PackageRef,
    Snapshot,
};
