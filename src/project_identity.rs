//! Central project identity contract.
//!
//! Single source of truth for names that end up on disk or in the
//! environment. Keep `STABLE_PROJECT_ID` stable across renames: it is
//! written into persisted snapshots.

pub const BINARY_NAME: &str = "pkgtrail";
pub const STABLE_PROJECT_ID: &str = "pkgtrail";
pub const QUALIFIER: &str = "com";
pub const ORGANIZATION: &str = "pkgtrail";
pub const ENV_PREFIX: &str = "PKGTRAIL";
pub const CONFIG_FILE_BASENAME: &str = "pkgtrail.kdl";
pub const LEDGER_FILE_NAME: &str = "ledger.jsonl";
pub const LEDGER_LOCK_NAME: &str = "ledger.lock";
pub const TAGS_FILE_NAME: &str = "tags.json";
pub const SNAPSHOT_DIR_NAME: &str = "snapshots";

pub fn env_key(suffix: &str) -> String {
    format!("{}_{}", ENV_PREFIX, suffix)
}

pub fn cli_with(args: &str) -> String {
    format!("{} {}", BINARY_NAME, args)
}
