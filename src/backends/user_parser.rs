//! User-defined backend parser
//!
//! Parses `backend "name" { ... }` blocks from the settings file so new
//! package managers need no code.

use crate::backends::config::{BackendConfig, BinarySpecifier, OutputFormat};
use crate::error::{PkgtrailError, Result};
use crate::utils::regex_cache;
use kdl::{KdlDocument, KdlEntry, KdlNode};
use std::collections::HashMap;

/// Every `backend` node of a settings document.
pub fn parse_backends(doc: &KdlDocument) -> Result<Vec<BackendConfig>> {
    doc.nodes()
        .iter()
        .filter(|node| node.name().value() == "backend")
        .map(parse_backend_node)
        .collect()
}

/// Parse a single backend node
pub fn parse_backend_node(node: &KdlNode) -> Result<BackendConfig> {
    let name = first_string(node).ok_or_else(|| {
        PkgtrailError::ConfigError(
            "Backend name required. Usage: backend \"name\" { ... }".to_string(),
        )
    })?;

    let mut config = BackendConfig {
        name: name.to_lowercase(),
        ..Default::default()
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "binary" => parse_binary(child, &mut config)?,
                "list" => parse_list(child, &mut config)?,
                "install" => config.install_cmd = required_command(child, "install")?,
                "install_version" => {
                    config.install_version_cmd = optional_command(child, "install_version")?
                }
                "remove" => config.remove_cmd = optional_command(child, "remove")?,
                "query" => config.query_cmd = optional_command(child, "query")?,
                "needs_sudo" | "sudo" => config.needs_sudo = parse_bool(child)?,
                "env" => parse_env(child, &mut config)?,
                _ => {
                    // Ignore unknown fields for forward compatibility
                }
            }
        }
    }

    validate_backend_config(&config)?;
    Ok(config)
}

fn first_string(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|entry| entry.name().is_none())
        .and_then(|entry| entry.value().as_string())
        .map(str::to_string)
}

fn entry_usize(entry: &KdlEntry) -> Option<usize> {
    entry
        .value()
        .as_integer()
        .and_then(|n| usize::try_from(n).ok())
        .or_else(|| entry.value().as_string().and_then(|s| s.parse().ok()))
}

fn first_usize(node: &KdlNode) -> Option<usize> {
    node.entries().first().and_then(entry_usize)
}

fn required_command(node: &KdlNode, field: &str) -> Result<String> {
    first_string(node).ok_or_else(|| {
        PkgtrailError::ConfigError(format!(
            "{} command required. Usage: {} \"command\"",
            field, field
        ))
    })
}

/// `"-"` explicitly disables an operation.
fn optional_command(node: &KdlNode, field: &str) -> Result<Option<String>> {
    let cmd = required_command(node, field)?;
    Ok((cmd != "-").then_some(cmd))
}

fn parse_binary(node: &KdlNode, config: &mut BackendConfig) -> Result<()> {
    let values: Vec<String> = node
        .entries()
        .iter()
        .filter(|entry| entry.name().is_none())
        .filter_map(|entry| entry.value().as_string())
        .map(str::to_string)
        .collect();

    config.binary = match values.len() {
        0 => {
            return Err(PkgtrailError::ConfigError(
                "Binary requires at least one value. Usage: binary \"cmd1\" \"cmd2\"".to_string(),
            ));
        }
        1 => BinarySpecifier::Single(values[0].clone()),
        _ => BinarySpecifier::Multiple(values),
    };

    Ok(())
}

fn parse_list(node: &KdlNode, config: &mut BackendConfig) -> Result<()> {
    config.list_cmd = optional_command(node, "list")?;

    let Some(children) = node.children() else {
        return Ok(());
    };

    for child in children.nodes() {
        match child.name().value() {
            "format" => {
                let value = first_string(child).unwrap_or_default();
                config.list_format = OutputFormat::parse(&value).ok_or_else(|| {
                    PkgtrailError::ConfigError(format!(
                        "Unknown format '{}'. Valid: whitespace, tsv, json, regex",
                        value
                    ))
                })?;
            }
            "name_col" => config.list_name_col = first_usize(child),
            "version_col" => config.list_version_col = first_usize(child),
            "json_path" => config.list_json_path = first_string(child),
            "name_key" => config.list_name_key = first_string(child),
            "version_key" => config.list_version_key = first_string(child),
            "regex" | "pattern" => config.list_regex = first_string(child),
            "name_group" => config.list_regex_name_group = first_usize(child),
            "version_group" => config.list_regex_version_group = first_usize(child),
            _ => {}
        }
    }

    Ok(())
}

fn parse_bool(node: &KdlNode) -> Result<bool> {
    let entry = node.entries().first();

    if let Some(val) = entry.and_then(|e| e.value().as_bool()) {
        return Ok(val);
    }

    match entry
        .and_then(|e| e.value().as_string())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("true") | Some("yes") => Ok(true),
        Some("false") | Some("no") => Ok(false),
        _ => Err(PkgtrailError::ConfigError(format!(
            "Boolean value required for '{}'. Usage: {} #true",
            node.name().value(),
            node.name().value()
        ))),
    }
}

/// `env KEY="value"` or `env "KEY=value"`
fn parse_env(node: &KdlNode, config: &mut BackendConfig) -> Result<()> {
    let mut env_map = config.env.take().unwrap_or_else(HashMap::new);

    for entry in node.entries() {
        let Some(value) = entry.value().as_string() else {
            continue;
        };
        match entry.name() {
            Some(key) => {
                env_map.insert(key.value().to_string(), value.to_string());
            }
            None => {
                let (key, value) = value.split_once('=').ok_or_else(|| {
                    PkgtrailError::ConfigError(format!(
                        "Environment variable must be KEY=VALUE, got: {}",
                        value
                    ))
                })?;
                env_map.insert(key.to_string(), value.to_string());
            }
        }
    }

    if !env_map.is_empty() {
        config.env = Some(env_map);
    }
    Ok(())
}

fn has_package_placeholder(cmd: &str) -> bool {
    cmd.contains("{package}") || cmd.contains("{packages}")
}

/// Catch template typos at load time instead of mid-replay.
fn validate_backend_config(config: &BackendConfig) -> Result<()> {
    let invalid = |message: String| {
        Err(PkgtrailError::ConfigError(format!(
            "Backend '{}': {}",
            config.name, message
        )))
    };

    if config.binary.is_empty() {
        return invalid("'binary' is required".to_string());
    }
    if config.install_cmd.is_empty() {
        return invalid("'install' is required".to_string());
    }
    if !has_package_placeholder(&config.install_cmd) {
        return invalid("'install' must contain '{package}'".to_string());
    }
    if let Some(cmd) = &config.install_version_cmd
        && !(has_package_placeholder(cmd) && cmd.contains("{version}"))
    {
        return invalid("'install_version' must contain '{package}' and '{version}'".to_string());
    }
    for (field, cmd) in [("remove", &config.remove_cmd), ("query", &config.query_cmd)] {
        if let Some(cmd) = cmd
            && !has_package_placeholder(cmd)
        {
            return invalid(format!("'{}' must contain '{{package}}'", field));
        }
    }
    if config.list_format == OutputFormat::Regex && config.list_regex.is_none() {
        return invalid("regex format requires 'regex' in the list block".to_string());
    }
    if let Some(pattern) = &config.list_regex {
        regex_cache::get_cached_regex(pattern).map_err(|e| {
            PkgtrailError::InvalidRegex(format!("backend '{}': {}", config.name, e))
        })?;
    }

    Ok(())
}
