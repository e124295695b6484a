use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{PkgtrailError, Result};

/// Installed packages as reported by one backend: name -> version.
pub type InstalledPackages = BTreeMap<String, Option<String>>;

/// Tag of a native package manager.
///
/// String-backed so new backends only need a registered adapter.
/// Always lower-cased.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Backend(String);

impl Backend {
    pub fn new(name: &str) -> Self {
        Self(name.trim().to_lowercase())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Sort backends listed in `precedence` first, in that order, then the
/// rest by name.
pub fn sort_by_precedence(backends: &mut Vec<Backend>, precedence: &[Backend]) {
    backends.sort_by_key(|backend| {
        let rank = precedence
            .iter()
            .position(|p| p == backend)
            .unwrap_or(usize::MAX);
        (rank, backend.clone())
    });
    backends.dedup();
}

impl From<&str> for Backend {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Backend {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<Backend> for String {
    fn from(value: Backend) -> Self {
        value.0
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a package: the same name under two backends is two packages.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId {
    pub backend: Backend,
    pub name: String,
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub backend: Backend,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl PackageRef {
    pub fn new(backend: impl Into<Backend>, name: &str, version: Option<&str>) -> Self {
        Self {
            backend: backend.into(),
            name: name.to_string(),
            version: version.map(str::to_string),
        }
    }

    pub fn id(&self) -> PackageId {
        PackageId {
            backend: self.backend.clone(),
            name: self.name.clone(),
        }
    }

    /// Parse `backend:name@version`, `backend:name` or `name`.
    ///
    /// A bare name uses `default_backend`.
    pub fn parse(spec: &str, default_backend: &Backend) -> Result<Self> {
        let spec = spec.trim();
        let (backend, rest) = match spec.split_once(':') {
            Some((backend, rest)) if !backend.is_empty() => (Backend::new(backend), rest),
            Some(_) => {
                return Err(PkgtrailError::InvalidPackage(format!(
                    "missing backend before ':' in '{}'",
                    spec
                )));
            }
            None => (default_backend.clone(), spec),
        };

        // Scoped npm names start with '@', so only split on a later '@'.
        let (name, version) = match rest.rfind('@') {
            Some(idx) if idx > 0 => (&rest[..idx], Some(&rest[idx + 1..])),
            _ => (rest, None),
        };

        if name.is_empty() {
            return Err(PkgtrailError::InvalidPackage(format!(
                "missing package name in '{}'",
                spec
            )));
        }
        if version.is_some_and(str::is_empty) {
            return Err(PkgtrailError::InvalidPackage(format!(
                "empty version after '@' in '{}'",
                spec
            )));
        }

        Ok(Self {
            backend,
            name: name.to_string(),
            version: version.map(str::to_string),
        })
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}:{}@{}", self.backend, self.name, version),
            None => write!(f, "{}:{}", self.backend, self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Install,
    Remove,
    Upgrade,
}

impl ActionKind {
    pub fn makes_present(self) -> bool {
        matches!(self, Self::Install | Self::Upgrade)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Remove => write!(f, "remove"),
            Self::Upgrade => write!(f, "upgrade"),
        }
    }
}

impl FromStr for ActionKind {
    type Err = PkgtrailError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "install" => Ok(Self::Install),
            "remove" => Ok(Self::Remove),
            "upgrade" => Ok(Self::Upgrade),
            other => Err(PkgtrailError::Other(format!("Unknown action kind: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl FromStr for Outcome {
    type Err = PkgtrailError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            other => Err(PkgtrailError::Other(format!("Unknown outcome: {}", other))),
        }
    }
}

/// One ledger record. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub backend: Backend,
    pub kind: ActionKind,
    pub package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_version: Option<String>,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl Action {
    pub fn package_id(&self) -> PackageId {
        PackageId {
            backend: self.backend.clone(),
            name: self.package.clone(),
        }
    }

    /// The package as requested by this action.
    pub fn package_ref(&self) -> PackageRef {
        PackageRef {
            backend: self.backend.clone(),
            name: self.package.clone(),
            version: self.requested_version.clone(),
        }
    }
}

/// What a backend adapter reports for one install/remove attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub outcome: Outcome,
    /// Version present after the attempt, when known.
    pub version: Option<String>,
    pub detail: Option<String>,
}

impl ActionOutcome {
    pub fn success(version: Option<String>) -> Self {
        Self {
            outcome: Outcome::Success,
            version,
            detail: None,
        }
    }

    pub fn skipped(version: Option<String>, reason: &str) -> Self {
        Self {
            outcome: Outcome::Skipped,
            version,
            detail: Some(reason.to_string()),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failed,
            version: None,
            detail: Some(detail.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Failed
    }
}

/// Point-in-time listing of one backend. Read-only once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub backend: Backend,
    #[serde(default)]
    pub host: Option<String>,
    pub packages: InstalledPackages,
}

impl Snapshot {
    pub fn new(backend: Backend, packages: InstalledPackages) -> Self {
        Self {
            timestamp: Utc::now(),
            backend,
            host: None,
            packages,
        }
    }

    pub fn empty(backend: Backend) -> Self {
        Self::new(backend, InstalledPackages::new())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// `None` if absent, `Some(None)` if present with an unknown version.
    pub fn version_of(&self, name: &str) -> Option<Option<&str>> {
        self.packages.get(name).map(|v| v.as_deref())
    }

    pub fn refs(&self) -> impl Iterator<Item = PackageRef> + '_ {
        self.packages.iter().map(|(name, version)| PackageRef {
            backend: self.backend.clone(),
            name: name.clone(),
            version: version.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_are_normalized() {
        assert_eq!(Backend::from("APT"), Backend::from("apt"));
        assert_eq!(Backend::from(" Brew ").to_string(), "brew");
    }

    #[test]
    fn precedence_then_name() {
        let mut backends: Vec<Backend> = ["pip", "apt", "brew", "npm"]
            .into_iter()
            .map(Backend::from)
            .collect();
        sort_by_precedence(&mut backends, &[Backend::from("brew"), Backend::from("pip")]);
        let names: Vec<&str> = backends.iter().map(Backend::name).collect();
        assert_eq!(names, vec!["brew", "pip", "apt", "npm"]);
    }

    #[test]
    fn parse_full_spec() {
        let default = Backend::from("apt");
        let pkg = PackageRef::parse("pip:requests@2.31.0", &default).unwrap();
        assert_eq!(pkg.backend, Backend::from("pip"));
        assert_eq!(pkg.name, "requests");
        assert_eq!(pkg.version.as_deref(), Some("2.31.0"));
    }

    #[test]
    fn parse_bare_name_uses_default_backend() {
        let default = Backend::from("apt");
        let pkg = PackageRef::parse("curl", &default).unwrap();
        assert_eq!(pkg.id().to_string(), "apt:curl");
        assert!(pkg.version.is_none());
    }

    #[test]
    fn parse_keeps_npm_scope() {
        let default = Backend::from("npm");
        let pkg = PackageRef::parse("@angular/cli@17.0.0", &default).unwrap();
        assert_eq!(pkg.name, "@angular/cli");
        assert_eq!(pkg.version.as_deref(), Some("17.0.0"));

        let unversioned = PackageRef::parse("npm:@angular/cli", &default).unwrap();
        assert_eq!(unversioned.name, "@angular/cli");
        assert!(unversioned.version.is_none());
    }

    #[test]
    fn parse_rejects_empty_parts() {
        let default = Backend::from("apt");
        assert!(PackageRef::parse(":curl", &default).is_err());
        assert!(PackageRef::parse("apt:", &default).is_err());
        assert!(PackageRef::parse("apt:curl@", &default).is_err());
    }

    #[test]
    fn action_serializes_with_lowercase_tags() {
        let action = Action {
            id: 7,
            timestamp: Utc::now(),
            backend: Backend::from("apt"),
            kind: ActionKind::Upgrade,
            package: "curl".to_string(),
            requested_version: Some("8.0".to_string()),
            result_version: None,
            outcome: Outcome::Skipped,
            error_detail: None,
        };
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains("\"backend\":\"apt\""));
        assert!(json.contains("\"kind\":\"upgrade\""));
        assert!(json.contains("\"outcome\":\"skipped\""));
        assert!(!json.contains("result_version"));

        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn snapshot_distinguishes_absent_from_unknown_version() {
        let mut packages = InstalledPackages::new();
        packages.insert("jq".to_string(), None);
        let snapshot = Snapshot::new(Backend::from("apt"), packages);
        assert_eq!(snapshot.version_of("jq"), Some(None));
        assert_eq!(snapshot.version_of("curl"), None);
    }
}
