use super::clean_version;
use crate::backends::config::BackendConfig;
use crate::core::types::InstalledPackages;

/// Parse space-separated output (like `pacman -Q` or `brew list --versions`)
///
/// Format: "package-name version"
pub fn parse_whitespace_split(output: &str, config: &BackendConfig) -> InstalledPackages {
    let mut installed = InstalledPackages::new();
    let name_col = config.list_name_col.unwrap_or(0);
    let version_col = config.list_version_col.unwrap_or(1);

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();

        if let Some(name) = parts.get(name_col) {
            let version = clean_version(parts.get(version_col).copied());
            installed.insert(name.to_string(), version);
        }
    }

    installed
}
