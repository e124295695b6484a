use super::clean_version;
use crate::backends::config::BackendConfig;
use crate::core::types::InstalledPackages;

/// Parse tab-separated output (like `dpkg-query -W` or `flatpak list --columns=...`)
pub fn parse_tsv(output: &str, config: &BackendConfig) -> InstalledPackages {
    let mut installed = InstalledPackages::new();
    let name_col = config.list_name_col.unwrap_or(0);
    let version_col = config.list_version_col.unwrap_or(1);

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split('\t').collect();

        if let Some(name) = parts.get(name_col).map(|n| n.trim())
            && !name.is_empty()
        {
            let version = clean_version(parts.get(version_col).copied());
            installed.insert(name.to_string(), version);
        }
    }

    installed
}
