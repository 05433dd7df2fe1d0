//! Repository index types
//!
//! Helm-compatible `index.yaml`, plus the builder that accumulates the
//! charts found across revisions.

use chrono::{DateTime, Utc};
use helmvcs_core::{ChartMetadata, archive_name, compare_versions};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use crate::config::write_atomic;
use crate::error::{RepoError, Result};
use crate::scanner::DiscoveredChart;

/// File name of the generated index
pub const INDEX_FILE: &str = "index.yaml";

/// Repository index (Helm-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFile {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// When this index was generated
    #[serde(default = "Utc::now")]
    pub generated: DateTime<Utc>,

    /// Chart versions by chart name
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<ChartVersion>>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

impl Default for IndexFile {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            generated: Utc::now(),
            entries: BTreeMap::new(),
        }
    }
}

impl IndexFile {
    /// Parse index from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| RepoError::IndexParse {
            message: e.to_string(),
        })
    }

    /// Read an index file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Atomically write the index to `path`
    pub fn write(&self, path: &Path) -> Result<()> {
        let yaml = self.to_yaml()?;
        write_atomic(path, yaml.as_bytes()).map_err(|e| RepoError::IndexWrite {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// All versions of a chart, newest first
    pub fn get(&self, name: &str) -> Option<&[ChartVersion]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// A specific version of a chart
    pub fn get_version(&self, name: &str, version: &str) -> Option<&ChartVersion> {
        self.entries
            .get(name)?
            .iter()
            .find(|e| e.metadata.version == version)
    }

    /// Every `(name, version)` pair in the index
    pub fn chart_keys(&self) -> BTreeSet<(String, String)> {
        self.entries
            .values()
            .flatten()
            .map(|e| (e.metadata.name.clone(), e.metadata.version.clone()))
            .collect()
    }

    /// Number of chart versions
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }
}

/// One chart version in the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartVersion {
    #[serde(flatten)]
    pub metadata: ChartMetadata,

    /// Download locations, relative to the repository URL
    #[serde(default)]
    pub urls: Vec<String>,

    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,

    /// Hex SHA-256 of the chart archive
    #[serde(default)]
    pub digest: String,
}

/// Hex SHA-256 of a chart archive
pub fn digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Accumulates charts keyed by name and version; the first one added wins
#[derive(Debug)]
pub struct IndexBuilder {
    created: DateTime<Utc>,
    entries: Vec<ChartVersion>,
    keys: HashSet<(String, String)>,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self {
            created: Utc::now(),
            entries: Vec::new(),
            keys: HashSet::new(),
        }
    }

    pub fn contains(&self, name: &str, version: &str) -> bool {
        self.keys.contains(&(name.to_string(), version.to_string()))
    }

    /// Record a chart and its packaged bytes
    ///
    /// Returns `false` and leaves the builder untouched when the
    /// name/version pair is already present.
    pub fn add(&mut self, chart: &DiscoveredChart, package: &[u8]) -> bool {
        if !self.keys.insert((chart.name.clone(), chart.version.clone())) {
            return false;
        }

        // v1 charts may declare dependencies in requirements.yaml only
        let mut metadata = chart.chart.metadata.clone();
        metadata.dependencies = chart.chart.dependencies().to_vec();

        self.entries.push(ChartVersion {
            metadata,
            urls: vec![archive_name(&chart.name, &chart.version)],
            created: self.created,
            digest: digest(package),
        });
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the index: names in lexical order, versions newest first
    pub fn emit(&self) -> IndexFile {
        let mut entries: BTreeMap<String, Vec<ChartVersion>> = BTreeMap::new();
        for entry in &self.entries {
            entries
                .entry(entry.metadata.name.clone())
                .or_default()
                .push(entry.clone());
        }
        for versions in entries.values_mut() {
            versions.sort_by(|a, b| compare_versions(&b.metadata.version, &a.metadata.version));
        }

        IndexFile {
            api_version: default_api_version(),
            generated: Utc::now(),
            entries,
        }
    }
}
