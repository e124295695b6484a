use super::locking::write_atomically;
use crate::error::{PkgtrailError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A named point in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Newest ledger id when the tag was taken; 0 tags the empty ledger.
    pub id: u64,
    pub created: DateTime<Utc>,
}

/// Tag name -> ledger id, persisted as `tags.json`.
#[derive(Debug)]
pub struct TagStore {
    path: PathBuf,
    tags: BTreeMap<String, Tag>,
}

impl TagStore {
    pub fn load(path: &Path) -> Result<Self> {
        let tags = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| PkgtrailError::IoError {
                path: path.to_path_buf(),
                source: e,
            })?;
            serde_json::from_str(&content).map_err(|e| PkgtrailError::ParseError {
                file: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            tags,
        })
    }

    pub fn add(&mut self, name: &str, id: u64) -> Result<Tag> {
        validate_tag_name(name)?;
        if self.tags.contains_key(name) {
            return Err(PkgtrailError::Other(format!(
                "Tag '{}' already exists (at #{})",
                name, self.tags[name].id
            )));
        }

        let tag = Tag {
            id,
            created: Utc::now(),
        };
        self.tags.insert(name.to_string(), tag.clone());
        self.save()?;
        Ok(tag)
    }

    pub fn remove(&mut self, name: &str) -> Result<Tag> {
        let tag = self
            .tags
            .remove(name)
            .ok_or_else(|| PkgtrailError::TargetNotFound(format!("tag '{}'", name)))?;
        self.save()?;
        Ok(tag)
    }

    pub fn resolve(&self, name: &str) -> Result<u64> {
        self.tags
            .get(name)
            .map(|tag| tag.id)
            .ok_or_else(|| PkgtrailError::TargetNotFound(format!("tag '{}'", name)))
    }

    pub fn list(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.tags.iter().map(|(name, tag)| (name.as_str(), tag))
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.tags)
            .map_err(|e| PkgtrailError::SerializationError(format!("Tags: {}", e)))?;
        write_atomically(&self.path, content.as_bytes())
    }
}

fn validate_tag_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(PkgtrailError::Other(format!(
            "Invalid tag name '{}': must be non-empty without whitespace",
            name
        )));
    }
    Ok(())
}
