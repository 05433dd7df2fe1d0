//! Helm home layout
//!
//! All persisted state lives under a single root (`$HELM_HOME`, `~/.helm`
//! by default). The root is resolved once at startup and passed to every
//! component that touches the filesystem.

use std::path::{Path, PathBuf};

use crate::error::{RepoError, Result};

/// Plugin name, used for the plugin's own directory under `plugins/`
pub const PLUGIN_NAME: &str = "helm-vcs";

/// Directory layout rooted at the Helm home
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelmHome {
    root: PathBuf,
}

impl HelmHome {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Use `explicit` when given, otherwise `~/.helm`
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        match explicit {
            Some(root) => Ok(Self::new(root)),
            None => Ok(Self::new(Self::default_root()?)),
        }
    }

    /// `~/.helm`
    pub fn default_root() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".helm"))
            .ok_or(RepoError::HomeNotFound)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join path segments onto the home root
    pub fn path(&self, parts: &[&str]) -> PathBuf {
        parts.iter().fold(self.root.clone(), |acc, p| acc.join(p))
    }

    /// `plugins/helm-vcs`
    pub fn plugin_dir(&self) -> PathBuf {
        self.path(&["plugins", PLUGIN_NAME])
    }

    /// Registry of VCS-backed repositories
    pub fn config_file(&self) -> PathBuf {
        self.plugin_dir().join("vcs.yaml")
    }

    /// Packaged charts and generated index for one repository
    pub fn chart_dir(&self, name: &str) -> PathBuf {
        self.plugin_dir().join("repository").join(name).join("chart")
    }

    /// Local VCS mirror for one repository
    pub fn vcs_dir(&self, name: &str) -> PathBuf {
        self.plugin_dir().join("repository").join(name).join("vcs")
    }

    /// Helm's list of chart repositories
    pub fn repository_file(&self) -> PathBuf {
        self.path(&["repository", "repositories.yaml"])
    }

    /// Helm's index cache directory
    pub fn cache_dir(&self) -> PathBuf {
        self.path(&["repository", "cache"])
    }

    /// Helm's cached index for one repository
    pub fn cache_index(&self, name: &str) -> PathBuf {
        self.cache_dir().join(format!("{}-index.yaml", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let home = HelmHome::new("/opt/helm");
        assert_eq!(
            home.config_file(),
            PathBuf::from("/opt/helm/plugins/helm-vcs/vcs.yaml")
        );
        assert_eq!(
            home.chart_dir("stable"),
            PathBuf::from("/opt/helm/plugins/helm-vcs/repository/stable/chart")
        );
        assert_eq!(
            home.vcs_dir("stable"),
            PathBuf::from("/opt/helm/plugins/helm-vcs/repository/stable/vcs")
        );
        assert_eq!(
            home.repository_file(),
            PathBuf::from("/opt/helm/repository/repositories.yaml")
        );
        assert_eq!(
            home.cache_index("stable"),
            PathBuf::from("/opt/helm/repository/cache/stable-index.yaml")
        );
    }

    #[test]
    fn test_resolve_explicit() {
        let home = HelmHome::resolve(Some(PathBuf::from("/tmp/helm"))).unwrap();
        assert_eq!(home.root(), Path::new("/tmp/helm"));
    }
}
