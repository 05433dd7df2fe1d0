//! Helm's repository list (`$HELM_HOME/repository/repositories.yaml`)
//!
//! Only the fields this plugin sets are modelled; anything else Helm or
//! other plugins stored on an entry survives a load/write cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::write_atomic;
use crate::error::{RepoError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoriesFile {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "Utc::now")]
    pub generated: DateTime<Utc>,

    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

impl Default for RepositoriesFile {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            generated: Utc::now(),
            repositories: Vec::new(),
        }
    }
}

/// One chart repository as Helm sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub name: String,
    pub url: String,
    /// Path of Helm's cached copy of the index
    #[serde(default)]
    pub cache: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl RepositoryEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>, cache: &Path) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            cache: cache.display().to_string(),
            extra: BTreeMap::new(),
        }
    }
}

impl RepositoriesFile {
    /// Load the file; a missing file is an empty list
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| RepoError::config(path, e))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|e| RepoError::config(path, e))
    }

    pub fn get(&self, name: &str) -> Option<&RepositoryEntry> {
        self.repositories.iter().find(|r| r.name == name)
    }

    /// Replace the entry with the same name or append a new one
    ///
    /// Fields of the existing entry that are not modelled here are kept.
    pub fn update(&mut self, entry: RepositoryEntry) {
        match self.repositories.iter_mut().find(|r| r.name == entry.name) {
            Some(existing) => {
                existing.url = entry.url;
                existing.cache = entry.cache;
                existing.extra.extend(entry.extra);
            }
            None => self.repositories.push(entry),
        }
    }

    /// Atomically write the file, refreshing `generated`
    pub fn write(&mut self, path: &Path) -> Result<()> {
        self.generated = Utc::now();
        let content = serde_yaml::to_string(self)?;
        write_atomic(path, content.as_bytes()).map_err(|e| RepoError::config(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_update_preserves_foreign_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repositories.yaml");
        std::fs::write(
            &path,
            r#"apiVersion: v1
generated: "2018-01-01T00:00:00Z"
repositories:
- name: stable
  url: https://kubernetes-charts.storage.googleapis.com
  cache: /home/user/.helm/repository/cache/stable-index.yaml
  certFile: ""
- name: charts
  url: git://github.com/org/old
  cache: /tmp/old-index.yaml
  username: bob
"#,
        )
        .unwrap();

        let mut file = RepositoriesFile::load(&path).unwrap();
        file.update(RepositoryEntry::new(
            "charts",
            "git://github.com/org/charts",
            Path::new("/tmp/charts-index.yaml"),
        ));
        file.update(RepositoryEntry::new(
            "other",
            "hg://hg.example.com/other",
            Path::new("/tmp/other-index.yaml"),
        ));
        file.write(&path).unwrap();

        let reloaded = RepositoriesFile::load(&path).unwrap();
        assert_eq!(reloaded.repositories.len(), 3);

        let charts = reloaded.get("charts").unwrap();
        assert_eq!(charts.url, "git://github.com/org/charts");
        assert_eq!(charts.cache, "/tmp/charts-index.yaml");
        assert_eq!(
            charts.extra.get("username"),
            Some(&serde_yaml::Value::String("bob".to_string()))
        );
        assert!(reloaded.get("stable").unwrap().extra.contains_key("certFile"));
    }

    #[test]
    fn test_load_missing() {
        let temp = TempDir::new().unwrap();
        let file = RepositoriesFile::load(&temp.path().join("nope.yaml")).unwrap();
        assert!(file.repositories.is_empty());
        assert_eq!(file.api_version, "v1");
    }
}
