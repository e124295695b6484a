//! Configuration: the KDL settings file and KDL target package lists.

pub mod settings;
pub mod target;

pub use settings::Settings;
pub use target::{load_target, parse_target};

use kdl::{KdlEntry, KdlNode};

pub(crate) fn first_arg(node: &KdlNode) -> Option<&KdlEntry> {
    node.entries().iter().find(|entry| entry.name().is_none())
}

/// String value of the first positional argument
pub(crate) fn first_string(node: &KdlNode) -> Option<String> {
    first_arg(node)
        .and_then(|entry| entry.value().as_string())
        .map(str::to_string)
}

/// All positional string arguments
pub(crate) fn string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|entry| entry.name().is_none())
        .filter_map(|entry| entry.value().as_string())
        .map(str::to_string)
        .collect()
}
