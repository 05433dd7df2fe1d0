//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Chart not found: {path}")]
    ChartNotFound { path: String },

    #[error("Invalid Chart.yaml: {message}")]
    InvalidChart { message: String },

    #[error("Failed to parse {file}: {source}")]
    YamlParse {
        file: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version '{version}': {message}")]
    InvalidVersion { version: String, message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Invalid .helmignore pattern '{pattern}': {message}")]
    IgnorePattern { pattern: String, message: String },
}

impl CoreError {
    pub(crate) fn yaml(file: &str, source: serde_yaml::Error) -> Self {
        Self::YamlParse {
            file: file.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
