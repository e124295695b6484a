//! Input sanitization for anything that ends up on a shell command line.

use crate::error::{PkgtrailError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Safe characters for package names across package managers.
/// Allows: alphanumeric, dash, underscore, dot, plus, at sign, slash (scoped npm packages)
static SAFE_PACKAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9@._+/-]+$").expect("Invalid regex pattern"));

/// Versions additionally carry epochs (`1:2.3`) and tildes (`1.0~rc1`).
static SAFE_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._+:~-]+$").expect("Invalid regex pattern"));

/// Characters that could be dangerous in shell contexts
static SHELL_DANGEROUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[;`$(){}|&<>\\'"\n\r\t ]"#).expect("Invalid regex pattern"));

/// Validate a package name is safe for shell execution.
pub fn validate_package_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PkgtrailError::InvalidPackage(
            "Package name cannot be empty".to_string(),
        ));
    }

    if name.len() > 256 {
        let preview: String = name.chars().take(50).collect();
        return Err(PkgtrailError::InvalidPackage(format!(
            "Package name too long (max 256 chars): {}...",
            preview
        )));
    }

    if SHELL_DANGEROUS.is_match(name) {
        return Err(PkgtrailError::InvalidPackage(format!(
            "Package name contains unsafe characters: {}",
            name
        )));
    }

    if !SAFE_PACKAGE_NAME.is_match(name) {
        return Err(PkgtrailError::InvalidPackage(format!(
            "Package name contains invalid characters: {}",
            name
        )));
    }

    if name.contains("..") {
        return Err(PkgtrailError::InvalidPackage(format!(
            "Package name cannot contain path traversal: {}",
            name
        )));
    }

    Ok(())
}

pub fn validate_version(version: &str) -> Result<()> {
    if version.is_empty() || version.len() > 128 || !SAFE_VERSION.is_match(version) {
        return Err(PkgtrailError::InvalidPackage(format!(
            "Version contains invalid characters: {}",
            version
        )));
    }
    Ok(())
}

/// Quote a value for POSIX `sh`.
pub fn shell_escape(value: &str) -> Result<String> {
    shlex::try_quote(value)
        .map(|quoted| quoted.into_owned())
        .map_err(|e| PkgtrailError::InvalidPackage(format!("Cannot quote '{}': {}", value, e)))
}

/// Truncate text for display in logs and ledger details.
pub fn sanitize_for_display(input: &str, max_chars: usize) -> String {
    let trimmed = input.trim();
    if trimmed.chars().count() > max_chars {
        let head: String = trimmed.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}
