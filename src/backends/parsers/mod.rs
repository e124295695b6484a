pub mod json_parser;
pub mod regex_parser;
pub mod tsv;
pub mod whitespace;

use crate::backends::config::{BackendConfig, OutputFormat};
use crate::core::types::InstalledPackages;

/// Parse package list output according to the backend's configured format.
///
/// Errors are plain messages; the caller wraps them as a backend query error.
pub fn parse_package_list(
    output: &[u8],
    config: &BackendConfig,
) -> Result<InstalledPackages, String> {
    let stdout = String::from_utf8_lossy(output);

    match config.list_format {
        OutputFormat::SplitWhitespace => Ok(whitespace::parse_whitespace_split(&stdout, config)),
        OutputFormat::TabSeparated => Ok(tsv::parse_tsv(&stdout, config)),
        OutputFormat::Json => json_parser::parse_json(&stdout, config),
        OutputFormat::Regex => regex_parser::parse_regex(&stdout, config),
    }
}

/// Normalize a parsed version cell: blank or placeholder cells mean unknown.
pub(crate) fn clean_version(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() || value == "-" || value == "(none)" {
        return None;
    }
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_format() {
        let config = BackendConfig {
            list_name_col: Some(0),
            list_version_col: Some(1),
            ..Default::default()
        };

        let output = b"package1 1.0.0\npackage2 2.0.0\n";
        let result = parse_package_list(output, &config).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result["package1"].as_deref(), Some("1.0.0"));
    }

    #[test]
    fn placeholder_versions_are_unknown() {
        assert_eq!(clean_version(Some(" 1.2 ")), Some("1.2".to_string()));
        assert_eq!(clean_version(Some("(none)")), None);
        assert_eq!(clean_version(Some("")), None);
        assert_eq!(clean_version(None), None);
    }
}
