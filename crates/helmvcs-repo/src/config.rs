//! Repository registry
//!
//! The plugin keeps its own list of VCS-backed repositories in
//! `$HELM_HOME/plugins/helm-vcs/vcs.yaml`. Helm only knows them by their
//! display URI; this file maps that back to the real upstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::error::{RepoError, Result};
use crate::vcs::{VcsKind, display_uri};

/// Registry file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "Utc::now")]
    pub generated: DateTime<Utc>,

    #[serde(default)]
    pub repositories: Vec<Repository>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            generated: Utc::now(),
            repositories: Vec::new(),
        }
    }
}

impl RegistryConfig {
    /// Load the registry; a missing file is an empty registry
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

    /// Atomically save the registry, refreshing `generated`
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.generated = Utc::now();
        let content = serde_yaml::to_string(self)?;
        write_atomic(path, content.as_bytes()).map_err(|e| RepoError::config(path, e))
    }

    /// Look a repository up by its upstream or display URI
    pub fn find(&self, uri: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.matches_uri(uri))
    }

    /// Get a repository by name
    pub fn get(&self, name: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.name == name)
    }

    /// Insert a repository, replacing any with the same name
    pub fn upsert(&mut self, repo: Repository) {
        match self.repositories.iter_mut().find(|r| r.name == repo.name) {
            Some(existing) => *existing = repo,
            None => self.repositories.push(repo),
        }
    }

    /// Remove a repository by name
    pub fn remove(&mut self, name: &str) -> Option<Repository> {
        let idx = self.repositories.iter().position(|r| r.name == name)?;
        Some(self.repositories.remove(idx))
    }
}

/// A VCS repository registered as a chart repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Unique name, also the Helm repository name
    pub name: String,

    /// Upstream VCS URI
    pub uri: String,

    /// URI Helm uses for this repository, scheme replaced by the VCS name
    #[serde(rename = "displayURI")]
    pub display_uri: String,

    /// Directory inside the repository to scan for charts
    #[serde(default)]
    pub path: String,

    /// Single branch, tag or revision to index instead of every tag
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,

    /// Version charts by the tag they were found under
    #[serde(default, rename = "useTag")]
    pub use_tag: bool,
}

impl Repository {
    /// Create a repository entry, detecting the VCS from `uri`
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();
        let kind = VcsKind::detect(&uri)?.kind;
        Ok(Self {
            name: name.into(),
            display_uri: display_uri(kind, &uri),
            uri,
            path: String::new(),
            git_ref: None,
            use_tag: false,
        })
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_ref(mut self, git_ref: Option<String>) -> Self {
        self.git_ref = git_ref.filter(|r| !r.trim().is_empty());
        self
    }

    pub fn with_use_tag(mut self, use_tag: bool) -> Self {
        self.use_tag = use_tag;
        self
    }

    /// Whether `uri` names this repository, ignoring a trailing `/`
    pub fn matches_uri(&self, uri: &str) -> bool {
        let uri = uri.trim_end_matches('/');
        uri == self.uri.trim_end_matches('/') || uri == self.display_uri.trim_end_matches('/')
    }
}

/// Derive a repository name from the last path segment of `uri`
///
/// `https://github.com/org/my-charts.git` gives `my-charts`.
pub fn infer_name(uri: &str) -> Result<String> {
    let unresolved = || RepoError::NameResolution {
        uri: uri.to_string(),
    };

    let segment = match url::Url::parse(uri) {
        Ok(parsed) if parsed.has_host() || parsed.scheme() == "file" => parsed
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .map(str::to_string),
        _ => uri
            .trim_end_matches('/')
            .rsplit(['/', ':'])
            .next()
            .map(str::to_string),
    }
    .ok_or_else(unresolved)?;

    let name = segment.strip_suffix(".git").unwrap_or(&segment).trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(unresolved());
    }
    Ok(name.to_string())
}

/// Write `data` to `path` through a temporary file in the same directory
///
/// Readers see either the old or the new content, never a partial file.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
