//! Target package lists.
//!
//! One node per backend; each child is a package with an optional version.
//! Positional arguments on the backend node are shorthand for unversioned
//! packages.
//!
//! ```kdl
//! apt {
//!     curl "8.0"
//!     jq
//! }
//! brew "wget" "htop"
//! npm {
//!     "@angular/cli" "17.0.0"
//! }
//! ```

use super::{first_string, string_args};
use crate::core::types::{Backend, PackageId, PackageRef};
use crate::error::{PkgtrailError, Result};
use crate::utils::sanitize;
use kdl::KdlDocument;
use std::collections::BTreeSet;
use std::path::Path;

pub fn load_target(path: &Path) -> Result<Vec<PackageRef>> {
    let content = std::fs::read_to_string(path).map_err(|e| PkgtrailError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_target(&content, &path.display().to_string())
}

/// Parse a target list. Duplicate `(backend, name)` entries are an error.
pub fn parse_target(content: &str, file: &str) -> Result<Vec<PackageRef>> {
    let doc = KdlDocument::parse(content).map_err(|e| PkgtrailError::ParseError {
        file: file.to_string(),
        message: e.to_string(),
    })?;

    let mut seen: BTreeSet<PackageId> = BTreeSet::new();
    let mut packages = Vec::new();

    let mut push = |package: PackageRef| -> Result<()> {
        let invalid = |e: PkgtrailError| PkgtrailError::ParseError {
            file: file.to_string(),
            message: e.to_string(),
        };
        sanitize::validate_package_name(&package.name).map_err(invalid)?;
        if let Some(version) = &package.version {
            sanitize::validate_version(version).map_err(invalid)?;
        }
        if !seen.insert(package.id()) {
            return Err(PkgtrailError::ParseError {
                file: file.to_string(),
                message: format!("{} is listed twice", package.id()),
            });
        }
        packages.push(package);
        Ok(())
    };

    for node in doc.nodes() {
        let backend = Backend::new(node.name().value());

        for name in string_args(node) {
            push(PackageRef::new(backend.clone(), &name, None))?;
        }

        if let Some(children) = node.children() {
            for child in children.nodes() {
                let version = first_string(child);
                push(PackageRef::new(
                    backend.clone(),
                    child.name().value(),
                    version.as_deref(),
                ))?;
            }
        }
    }

    Ok(packages)
}
