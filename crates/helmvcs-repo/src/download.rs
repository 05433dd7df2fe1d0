//! Helm downloader requests
//!
//! Helm calls the plugin with the full URL of what it wants: the
//! repository index (`<display-uri>/index.yaml`) or a chart archive
//! (`<display-uri>/<name>-<version>.tgz`).

use helmvcs_core::archive::ARCHIVE_EXTENSION;

use crate::config::{RegistryConfig, Repository};
use crate::error::{RepoError, Result};
use crate::index::INDEX_FILE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadTarget {
    Index,
    /// Archive file name inside the chart cache
    Chart(String),
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub repository: Repository,
    pub target: DownloadTarget,
}

/// Split a downloader URI into the registered repository and the target
pub fn resolve_download(registry: &RegistryConfig, uri: &str) -> Result<DownloadRequest> {
    let trimmed = uri.trim().trim_end_matches('/');
    let (base, target) = split_target(trimmed);

    let repository = registry
        .find(base)
        .cloned()
        .ok_or_else(|| RepoError::RepositoryNotFound {
            uri: base.to_string(),
        })?;

    Ok(DownloadRequest { repository, target })
}

fn split_target(uri: &str) -> (&str, DownloadTarget) {
    if let Some((base, file)) = uri.rsplit_once('/') {
        if file == INDEX_FILE {
            return (base, DownloadTarget::Index);
        }
        let is_archive = file
            .rsplit_once('.')
            .is_some_and(|(stem, ext)| !stem.is_empty() && ext == ARCHIVE_EXTENSION);
        if is_archive {
            return (base, DownloadTarget::Chart(file.to_string()));
        }
    }
    (uri, DownloadTarget::Index)
}
