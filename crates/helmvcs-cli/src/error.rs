//! CLI error type with exit code mapping

use helmvcs_repo::RepoError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Failure reported by the synchronizer
    #[error(transparent)]
    #[diagnostic(code(helmvcs::cli::repository))]
    Repo(#[from] RepoError),

    /// Invalid arguments
    #[error("{message}")]
    #[diagnostic(code(helmvcs::cli::usage))]
    Usage { message: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(helmvcs::cli::io))]
    Io { message: String },
}

impl CliError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Repo(err) => match err {
                RepoError::Config { .. }
                | RepoError::RepositoryNotFound { .. }
                | RepoError::NameResolution { .. }
                | RepoError::HomeNotFound => exit_codes::CONFIG_ERROR,
                RepoError::UnknownVcs { .. } | RepoError::Vcs { .. } => exit_codes::VCS_ERROR,
                RepoError::Chart(_) | RepoError::IndexParse { .. } => exit_codes::CHART_ERROR,
                RepoError::IndexWrite { .. } | RepoError::Io(_) | RepoError::Serialization(_) => {
                    exit_codes::IO_ERROR
                }
                RepoError::ArchiveNotFound { .. } => exit_codes::ERROR,
            },
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
