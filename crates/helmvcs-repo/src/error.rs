//! Error types for repository operations

use helmvcs_core::CoreError;
use thiserror::Error;

/// Repository operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Configuration Errors ============
    #[error("Invalid configuration file {path}: {message}")]
    Config { path: String, message: String },

    #[error("Missing repository {uri}. Try first running `helm vcs init`")]
    RepositoryNotFound { uri: String },

    #[error("Unable to infer a repository name from {uri}. Pass one explicitly")]
    NameResolution { uri: String },

    #[error("Could not determine the home directory. Set HELM_HOME or pass --home")]
    HomeNotFound,

    // ============ VCS Errors ============
    #[error("Cannot detect the version control system of {uri}")]
    UnknownVcs { uri: String },

    #[error("{operation} failed: {message}")]
    Vcs { operation: String, message: String },

    // ============ Index Errors ============
    #[error("Unable to write index {path}: {message}")]
    IndexWrite { path: String, message: String },

    #[error("Invalid index format: {message}")]
    IndexParse { message: String },

    #[error("Chart archive {file} not found in repository {repository}")]
    ArchiveNotFound { file: String, repository: String },

    // ============ Chart Errors ============
    #[error(transparent)]
    Chart(#[from] CoreError),

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepoError {
    /// Wrap a failure while reading or writing a configuration file
    pub fn config(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        RepoError::Config {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Wrap a VCS client failure
    pub fn vcs(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        RepoError::Vcs {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}
