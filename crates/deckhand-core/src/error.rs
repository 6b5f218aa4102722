//! Core error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    ConfigSource(#[from] ConfigSourceError),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown builder type '{type_name}' (known types: {})", known.join(", "))]
    UnknownBuilderType {
        type_name: String,
        known: Vec<String>,
        suggestion: Option<String>,
    },

    #[error("Invalid definition: {message}")]
    InvalidDefinition { message: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// A chart value override that cannot be applied
    #[error("Invalid value override '{input}': {message}")]
    InvalidOverride { input: String, message: String },
}

impl CoreError {
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_definition(message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            message: message.into(),
        }
    }
}

/// A ConfigMap or Secret data source could not be resolved
#[derive(Error, Debug)]
pub enum ConfigSourceError {
    #[error("{owner}: source file not found: {}", path.display())]
    FileNotFound { owner: String, path: PathBuf },

    #[error("{owner}: source directory not found: {}", path.display())]
    DirectoryNotFound { owner: String, path: PathBuf },

    #[error("{owner}: failed to read {}: {source}", path.display())]
    Unreadable {
        owner: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{owner}: failed to serialize key '{key}': {message}")]
    Serialize {
        owner: String,
        key: String,
        message: String,
    },
}

impl ConfigSourceError {
    /// Path of the missing or unreadable source, if any
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::FileNotFound { path, .. }
            | Self::DirectoryNotFound { path, .. }
            | Self::Unreadable { path, .. } => Some(path),
            Self::Serialize { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
