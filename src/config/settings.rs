//! Settings Module
//!
//! `<config_dir>/pkgtrail.kdl` (or `$PKGTRAIL_CONFIG`):
//!
//! ```kdl
//! data_dir "~/.local/share/pkgtrail"
//! default_backend "apt"
//! replay_mode "continue"        // or "strict"
//! diff_order "install_first"    // or "remove_first"
//! command_timeout 600           // seconds; unset = no timeout
//! backend_precedence "apt" "pip" "brew"
//! pin_versions #false
//!
//! backend "zypper" { ... }
//! ```

use super::{first_arg, first_string, string_args};
use crate::backends::{BackendConfig, load_all_backends, user_parser};
use crate::core::types::Backend;
use crate::core::{CancelToken, ExecContext};
use crate::diff::{DiffOptions, DiffOrder};
use crate::error::{PkgtrailError, Result};
use crate::packages::BackendRegistry;
use crate::replay::{ReplayMode, ReplayOptions};
use crate::ui;
use crate::utils::paths;
use kdl::{KdlDocument, KdlNode};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BACKEND: &str = "apt";

#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub default_backend: Backend,
    pub replay_mode: ReplayMode,
    pub diff_order: DiffOrder,
    pub command_timeout: Option<Duration>,
    pub backend_precedence: Vec<Backend>,
    pub pin_versions: bool,
    /// User-defined backends; override built-ins by name
    pub backends: Vec<BackendConfig>,
}

impl Settings {
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            default_backend: Backend::from(DEFAULT_BACKEND),
            replay_mode: ReplayMode::default(),
            diff_order: DiffOrder::default(),
            command_timeout: None,
            backend_precedence: Vec::new(),
            pin_versions: false,
            backends: Vec::new(),
        }
    }

    /// Load the settings file, falling back to defaults when it is absent.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| PkgtrailError::IoError {
                path: path.to_path_buf(),
                source: e,
            })?;
            Self::parse(&content, &path.display().to_string())?
        } else {
            ui::verbose(&format!("No settings at {}, using defaults", path.display()));
            Self::with_data_dir(paths::default_data_dir()?)
        };

        if let Some(dir) = paths::data_dir_override()? {
            settings.data_dir = dir;
        }
        Ok(settings)
    }

    /// Parse settings KDL. `file` only labels errors.
    pub fn parse(content: &str, file: &str) -> Result<Self> {
        let doc = KdlDocument::parse(content).map_err(|e| PkgtrailError::ParseError {
            file: file.to_string(),
            message: e.to_string(),
        })?;

        let invalid = |node: &KdlNode, expected: &str| PkgtrailError::ConfigError(format!(
            "{}: '{}' expects {}",
            file,
            node.name().value(),
            expected
        ));

        let mut settings = Self::with_data_dir(PathBuf::new());
        let mut data_dir = None;

        for node in doc.nodes() {
            match node.name().value() {
                "data_dir" => {
                    let value = first_string(node).ok_or_else(|| invalid(node, "a path"))?;
                    data_dir = Some(paths::expand_home(Path::new(&value))?);
                }
                "default_backend" => {
                    let value = first_string(node).ok_or_else(|| invalid(node, "a backend name"))?;
                    settings.default_backend = Backend::from(value);
                }
                "replay_mode" => {
                    settings.replay_mode = first_string(node)
                        .as_deref()
                        .and_then(ReplayMode::parse)
                        .ok_or_else(|| invalid(node, "\"continue\" or \"strict\""))?;
                }
                "diff_order" => {
                    settings.diff_order = first_string(node)
                        .as_deref()
                        .and_then(DiffOrder::parse)
                        .ok_or_else(|| invalid(node, "\"install_first\" or \"remove_first\""))?;
                }
                "command_timeout" => {
                    let seconds = parse_seconds(node).ok_or_else(|| invalid(node, "seconds"))?;
                    settings.command_timeout = (seconds > 0).then(|| Duration::from_secs(seconds));
                }
                "backend_precedence" => {
                    settings.backend_precedence =
                        string_args(node).into_iter().map(Backend::from).collect();
                }
                "pin_versions" => {
                    settings.pin_versions =
                        parse_flag(node).ok_or_else(|| invalid(node, "#true or #false"))?;
                }
                "backend" => {}
                other => ui::verbose(&format!("{}: ignoring unknown setting '{}'", file, other)),
            }
        }

        settings.backends = user_parser::parse_backends(&doc)?;
        settings.data_dir = match data_dir {
            Some(dir) => dir,
            None => paths::default_data_dir()?,
        };
        Ok(settings)
    }

    /// Built-in backends with user definitions layered on top
    pub fn backend_configs(&self) -> BTreeMap<String, BackendConfig> {
        load_all_backends(self.backends.clone())
    }

    pub fn exec_context(&self, cancel: CancelToken) -> ExecContext {
        ExecContext::new(cancel, self.command_timeout)
    }

    pub fn registry(&self, ctx: &ExecContext) -> BackendRegistry {
        let mut registry = BackendRegistry::from_configs(self.backend_configs(), ctx);
        registry.set_precedence(self.backend_precedence.clone());
        registry
    }

    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            order: self.diff_order,
            precedence: self.backend_precedence.clone(),
            keep_unlisted: false,
            pin_versions: self.pin_versions,
        }
    }

    pub fn replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            mode: self.replay_mode,
            pin_versions: self.pin_versions,
        }
    }

    pub fn ledger_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        paths::snapshots_dir(&self.data_dir)
    }
}

fn parse_seconds(node: &KdlNode) -> Option<u64> {
    let value = first_arg(node)?.value();
    value
        .as_integer()
        .and_then(|n| u64::try_from(n).ok())
        .or_else(|| value.as_string().and_then(|s| s.trim().parse().ok()))
}

fn parse_flag(node: &KdlNode) -> Option<bool> {
    let value = first_arg(node)?.value();
    value.as_bool().or_else(|| match value.as_string()? {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    })
}
