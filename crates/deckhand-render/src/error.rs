//! Render error types

use deckhand_core::{CoreError, OutputFormat};
use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum RenderError {
    #[error(transparent)]
    #[diagnostic(code(deckhand::render::builder))]
    Core(#[from] CoreError),

    #[error("Failed to write {}: {source}", path.display())]
    #[diagnostic(
        code(deckhand::render::write),
        help("check that the output directory exists and is writable")
    )]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    #[diagnostic(code(deckhand::render::io))]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    #[diagnostic(code(deckhand::render::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    #[diagnostic(code(deckhand::render::json))]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    #[diagnostic(code(deckhand::render::template))]
    Template(#[from] minijinja::Error),

    #[error("Invalid chart version '{version}': {message}")]
    #[diagnostic(
        code(deckhand::render::chart_version),
        help("chart versions must be SemVer 2, e.g. 1.2.3 or 0.1.0-rc.1")
    )]
    InvalidChartVersion { version: String, message: String },

    #[error("{type_name} '{name}' has nothing to render as {format}")]
    #[diagnostic(
        code(deckhand::render::unsupported),
        help("compose output needs at least one container workload (App, StatefulApp or an AppGroup of them)")
    )]
    Unsupported {
        type_name: String,
        name: String,
        format: OutputFormat,
    },
}

impl RenderError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
