use super::clean_version;
use crate::backends::config::BackendConfig;
use crate::core::types::InstalledPackages;
use crate::utils::regex_cache;

/// Parse output using the configured regex pattern.
///
/// Patterns are compiled through the process-wide cache.
pub fn parse_regex(output: &str, config: &BackendConfig) -> Result<InstalledPackages, String> {
    let pattern = config
        .list_regex
        .as_ref()
        .ok_or_else(|| "Missing list_regex for regex parser".to_string())?;

    let name_group = config.list_regex_name_group.unwrap_or(1);
    let version_group = config.list_regex_version_group.unwrap_or(2);

    let regex = regex_cache::get_cached_regex(pattern)
        .map_err(|e| format!("Invalid regex pattern: {}", e))?;

    let mut installed = InstalledPackages::new();

    for caps in regex.captures_iter(output) {
        if let Some(name_match) = caps.get(name_group) {
            let version = clean_version(caps.get(version_group).map(|m| m.as_str()));
            installed.insert(name_match.as_str().to_string(), version);
        }
    }

    Ok(installed)
}
