//! CLI error types with exit code handling

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

use deckhand_core::CoreError;
use deckhand_render::RenderError;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// The definition file could not be read or parsed
    #[error("Invalid definition {}: {message}", path.display())]
    #[diagnostic(code(deckhand::cli::definition))]
    Definition {
        path: PathBuf,
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A builder in the definition failed to decode or generate
    #[error(transparent)]
    #[diagnostic(code(deckhand::cli::builder))]
    Builder(#[from] CoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Render(#[from] RenderError),

    /// `validate --strict` found problems
    #[error("Validation failed with {count} problem(s)")]
    #[diagnostic(code(deckhand::cli::validation))]
    Validation { count: usize },

    #[error("Failed to access {}: {source}", path.display())]
    #[diagnostic(code(deckhand::cli::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("kubectl apply failed: {message}")]
    #[diagnostic(code(deckhand::cli::apply))]
    Apply {
        message: String,
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Definition { .. } | CliError::Builder(_) => exit_codes::DEFINITION_ERROR,
            CliError::Render(_) => exit_codes::RENDER_ERROR,
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Apply { .. } => exit_codes::APPLY_ERROR,
        }
    }

    pub fn definition(path: &Path, message: impl Into<String>) -> Self {
        Self::Definition {
            path: path.to_path_buf(),
            message: message.into(),
            help: None,
        }
    }

    pub fn definition_with_help(
        path: &Path,
        message: impl Into<String>,
        help: impl Into<String>,
    ) -> Self {
        Self::Definition {
            path: path.to_path_buf(),
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let definition = CliError::definition(Path::new("deckhand.yaml"), "bad");
        assert_eq!(definition.exit_code(), exit_codes::DEFINITION_ERROR);
        assert_eq!(
            CliError::Validation { count: 2 }.exit_code(),
            exit_codes::VALIDATION_ERROR
        );
        let io = CliError::io(
            Path::new("out"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(io.exit_code(), exit_codes::IO_ERROR);
    }

    #[test]
    fn test_definition_message() {
        let err = CliError::definition(Path::new("deckhand.yaml"), "missing builders");
        assert_eq!(
            err.to_string(),
            "Invalid definition deckhand.yaml: missing builders"
        );
    }
}
