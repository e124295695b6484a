//! Exports of the ledger state: a reinstall shell script and the
//! human-readable `.result` package table.

use crate::core::types::{Backend, PackageRef, sort_by_precedence};
use crate::error::{PkgtrailError, Result};
use crate::ledger::{LedgerState, write_atomically};
use crate::packages::BackendRegistry;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct InstallScript {
    pub content: String,
    /// Commands written
    pub commands: usize,
    /// Packages left out, with the reason
    pub omitted: Vec<(PackageRef, String)>,
}

/// Render a `#!/bin/sh` script reinstalling every package the ledger state
/// holds. `label` names the point in history ("current state", "tag: base").
///
/// Packages whose backend has no adapter or no install template for the
/// requested version become comments.
pub fn install_script(
    state: &LedgerState,
    registry: &BackendRegistry,
    label: &str,
    pin_versions: bool,
) -> InstallScript {
    let mut by_backend: BTreeMap<Backend, Vec<PackageRef>> = BTreeMap::new();
    for package in state.to_target(pin_versions) {
        by_backend.entry(package.backend.clone()).or_default().push(package);
    }

    let mut backends: Vec<Backend> = by_backend.keys().cloned().collect();
    sort_by_precedence(&mut backends, registry.precedence());

    let mut script = InstallScript::default();
    let out = &mut script.content;
    out.push_str("#!/bin/sh\n");
    out.push_str("# Generated by pkgtrail\n");
    let _ = writeln!(out, "# Reinstall script for {}", label);
    let _ = writeln!(out, "# Generated on: {}", Utc::now().to_rfc3339());

    for backend in backends {
        let packages = by_backend.remove(&backend).unwrap_or_default();
        let _ = writeln!(out, "\n# {}", backend);

        let manager = registry.get(&backend);
        for package in packages {
            let command = manager.as_ref().and_then(|m| {
                m.install_command_preview(&package.name, package.version.as_deref())
            });
            match command {
                Some(command) => {
                    let _ = writeln!(out, "{}", command);
                    script.commands += 1;
                }
                None => {
                    let reason = if manager.is_none() {
                        format!("no adapter for backend '{}'", backend)
                    } else {
                        "no install command for this request".to_string()
                    };
                    let _ = writeln!(out, "# skipped {}: {}", package, reason);
                    script.omitted.push((package, reason));
                }
            }
        }
    }

    script
}

/// Write an exported script and mark it executable.
pub fn write_script(path: &Path, content: &str) -> Result<()> {
    write_atomically(path, content.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
            PkgtrailError::IoError {
                path: path.to_path_buf(),
                source: e,
            }
        })?;
    }

    Ok(())
}

/// Fixed-width table of installed packages, oldest action first.
pub fn result_view(state: &LedgerState, label: &str) -> String {
    let mut rows: Vec<_> = state.installed().collect();
    if rows.is_empty() {
        return format!("No packages installed ({})\n", label);
    }
    rows.sort_by_key(|(_, s)| s.last_action);

    let mut out = String::new();
    let _ = writeln!(out, "Installed packages ({}):", label);
    let _ = writeln!(
        out,
        "{:<30} {:<10} {:<20} {:<8} {:<20}",
        "Package", "Backend", "Version", "Action", "Date"
    );
    let _ = writeln!(out, "{}", "-".repeat(92));
    for (id, pkg) in rows {
        let version = pkg
            .resolved_version
            .as_deref()
            .or(pkg.requested_version.as_deref())
            .unwrap_or("-");
        let _ = writeln!(
            out,
            "{:<30} {:<10} {:<20} {:<8} {:<20}",
            id.name,
            id.backend,
            version,
            pkg.last_action,
            pkg.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }
    out
}
