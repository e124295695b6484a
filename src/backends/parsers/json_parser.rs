use super::clean_version;
use crate::backends::config::BackendConfig;
use crate::core::types::InstalledPackages;
use serde_json::Value;

/// Parse JSON output (like `pip list --format=json` or `npm ls -g --json`)
pub fn parse_json(output: &str, config: &BackendConfig) -> Result<InstalledPackages, String> {
    let name_key = config.list_name_key.as_deref().unwrap_or("name");
    let version_key = config.list_version_key.as_deref().unwrap_or("version");

    // Tools print nothing at all when nothing is installed
    if output.trim().is_empty() {
        return Ok(InstalledPackages::new());
    }

    let json: Value =
        serde_json::from_str(output).map_err(|e| format!("Failed to parse JSON: {}", e))?;

    let packages = match config.list_json_path.as_deref() {
        Some(path) if !path.is_empty() => navigate_json_path(&json, path),
        _ => Some(&json),
    };

    let mut installed = InstalledPackages::new();

    match packages {
        // [{"name": "pkg", "version": "1.0"}, ...]
        Some(Value::Array(arr)) => {
            for pkg in arr {
                let Some(obj) = pkg.as_object() else {
                    continue;
                };
                if let Some(Value::String(name)) = obj.get(name_key) {
                    let version = clean_version(obj.get(version_key).and_then(Value::as_str));
                    installed.insert(name.clone(), version);
                }
            }
        }
        // {"pkg-name": {"version": "1.0"}, ...}
        Some(Value::Object(obj)) => {
            for (name, metadata) in obj {
                let version = clean_version(
                    metadata
                        .as_object()
                        .and_then(|m| m.get(version_key))
                        .and_then(Value::as_str),
                );
                installed.insert(name.clone(), version);
            }
        }
        // A missing path means an empty listing (npm omits "dependencies")
        None | Some(Value::Null) => {}
        Some(other) => {
            return Err(format!(
                "Expected an array or object of packages, found {}",
                json_kind(other)
            ));
        }
    }

    Ok(installed)
}

/// Navigate through JSON structure using dot notation path
fn navigate_json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;

    for part in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
