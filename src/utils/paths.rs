use crate::error::{PkgtrailError, Result};
use crate::project_identity;
use directories::{ProjectDirs, UserDirs};
use std::path::{Path, PathBuf};

pub fn expand_home(path: &Path) -> Result<PathBuf> {
    let path_str = path.to_string_lossy();

    if !path_str.starts_with('~') {
        return Ok(path.to_path_buf());
    }

    let user_dirs = UserDirs::new()
        .ok_or_else(|| PkgtrailError::PathError("Could not determine user home directory".into()))?;

    let home = user_dirs.home_dir();

    if path_str == "~" {
        return Ok(home.to_path_buf());
    }

    let stripped = path_str
        .strip_prefix("~/")
        .ok_or_else(|| PkgtrailError::PathError(format!("Invalid path format: {}", path_str)))?;

    Ok(home.join(stripped))
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from(
        project_identity::QUALIFIER,
        project_identity::ORGANIZATION,
        project_identity::STABLE_PROJECT_ID,
    )
    .ok_or_else(|| PkgtrailError::PathError("Could not determine project directories".into()))
}

/// Read a path override from the environment, expanding `~`.
fn env_path(suffix: &str) -> Result<Option<PathBuf>> {
    match std::env::var_os(project_identity::env_key(suffix)) {
        Some(value) if !value.is_empty() => Ok(Some(expand_home(Path::new(&value))?)),
        _ => Ok(None),
    }
}

pub fn config_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().to_path_buf())
}

/// Settings file: `$PKGTRAIL_CONFIG` or `<config_dir>/pkgtrail.kdl`.
pub fn config_file() -> Result<PathBuf> {
    if let Some(path) = env_path("CONFIG")? {
        return Ok(path);
    }
    Ok(config_dir()?.join(project_identity::CONFIG_FILE_BASENAME))
}

/// `$PKGTRAIL_DATA_DIR`, which beats the settings file.
pub fn data_dir_override() -> Result<Option<PathBuf>> {
    env_path("DATA_DIR")
}

/// Data directory when neither the environment nor settings name one.
pub fn default_data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

pub fn ledger_file(data_dir: &Path) -> PathBuf {
    data_dir.join(project_identity::LEDGER_FILE_NAME)
}

pub fn tags_file(data_dir: &Path) -> PathBuf {
    data_dir.join(project_identity::TAGS_FILE_NAME)
}

pub fn snapshots_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(project_identity::SNAPSHOT_DIR_NAME)
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| PkgtrailError::IoError {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}
