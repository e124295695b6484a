use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for a config-driven package manager backend.
///
/// Command templates understand these placeholders:
/// `{binary}` (resolved executable), `{packages}` and `{package}` (the
/// shell-quoted package name), `{version}` (the shell-quoted version).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend identifier (e.g., "apt", "pip")
    pub name: String,

    /// Binary name or path; alternatives are tried in order (["dnf", "yum"])
    pub binary: BinarySpecifier,

    /// Command listing installed packages with their versions
    pub list_cmd: Option<String>,

    /// Command installing one package
    pub install_cmd: String,

    /// Command installing one package at a requested version.
    /// Without it, version-pinned installs fail.
    pub install_version_cmd: Option<String>,

    /// Command removing one package
    pub remove_cmd: Option<String>,

    /// Command reporting a single installed package, parsed like `list_cmd`.
    /// A non-zero exit means "not installed".
    pub query_cmd: Option<String>,

    /// How to parse list/query output
    pub list_format: OutputFormat,

    /// Column index for package name (whitespace / tsv)
    pub list_name_col: Option<usize>,

    /// Column index for package version (whitespace / tsv)
    pub list_version_col: Option<usize>,

    /// Dot path to the packages array or object (json); empty means root
    pub list_json_path: Option<String>,

    /// Key holding the package name in JSON objects
    pub list_name_key: Option<String>,

    /// Key holding the package version in JSON objects
    pub list_version_key: Option<String>,

    /// Pattern with name/version capture groups (regex)
    pub list_regex: Option<String>,

    pub list_regex_name_group: Option<usize>,

    pub list_regex_version_group: Option<usize>,

    /// Whether mutating commands run through sudo
    pub needs_sudo: bool,

    /// Environment variables set for every backend command
    pub env: Option<HashMap<String, String>>,
}

impl BackendConfig {
    pub fn supports_remove(&self) -> bool {
        self.remove_cmd.is_some()
    }

    pub fn supports_version_pinning(&self) -> bool {
        self.install_version_cmd.is_some()
    }
}

/// Binary specifier - single executable or ordered alternatives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinarySpecifier {
    Single(String),
    Multiple(Vec<String>),
}

impl Default for BinarySpecifier {
    fn default() -> Self {
        BinarySpecifier::Single(String::new())
    }
}

impl BinarySpecifier {
    /// First alternative found on PATH (absolute paths are checked directly)
    pub fn find_available(&self) -> Option<String> {
        match self {
            BinarySpecifier::Single(bin) => which::which(bin).ok().map(|_| bin.clone()),
            BinarySpecifier::Multiple(binaries) => binaries
                .iter()
                .find(|bin| which::which(bin).is_ok())
                .cloned(),
        }
    }

    /// Primary binary name (for display and error messages)
    pub fn primary(&self) -> String {
        match self {
            BinarySpecifier::Single(bin) => bin.clone(),
            BinarySpecifier::Multiple(binaries) => binaries
                .first()
                .cloned()
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            BinarySpecifier::Single(bin) => bin.is_empty(),
            BinarySpecifier::Multiple(binaries) => binaries.iter().all(String::is_empty),
        }
    }
}

/// Output format for list and query commands
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `name version` separated by whitespace (pacman -Q, brew list --versions)
    #[default]
    SplitWhitespace,
    /// Tab separated columns (dpkg-query, rpm --qf, flatpak --columns)
    TabSeparated,
    /// JSON array of objects, or object keyed by package name
    Json,
    /// Regex with name/version capture groups
    Regex,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "whitespace" | "split_whitespace" | "space" => Some(Self::SplitWhitespace),
            "tsv" | "tab" | "tab_separated" => Some(Self::TabSeparated),
            "json" => Some(Self::Json),
            "regex" => Some(Self::Regex),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_aliases() {
        assert_eq!(
            OutputFormat::parse("whitespace"),
            Some(OutputFormat::SplitWhitespace)
        );
        assert_eq!(OutputFormat::parse("TSV"), Some(OutputFormat::TabSeparated));
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("xml"), None);
    }

    #[test]
    fn primary_binary_of_alternatives() {
        let spec = BinarySpecifier::Multiple(vec!["dnf".into(), "yum".into()]);
        assert_eq!(spec.primary(), "dnf");
        assert!(!spec.is_empty());
        assert!(BinarySpecifier::default().is_empty());
    }

    #[test]
    fn missing_binary_is_not_available() {
        let spec = BinarySpecifier::Single("pkgtrail-definitely-missing-binary".into());
        assert!(spec.find_available().is_none());
    }
}
