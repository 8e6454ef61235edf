//! Error types for template generation

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while generating a source file
///
/// Every variant is fatal for the invocation that produced it. Generation is
/// deterministic, so retrying without changing inputs reproduces the error.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("Failed to load template {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Malformed call to {name} at line {line}, column {column}: expected {expected} argument(s), found {found}"
    )]
    MalformedMacro {
        name: String,
        line: usize,
        column: usize,
        expected: usize,
        found: String,
    },

    #[error("Argument {index} of {name} at line {line}, column {column} {reason}")]
    InvalidArgument {
        name: String,
        index: usize,
        line: usize,
        column: usize,
        reason: String,
    },

    #[error("Template compilation failed: {0}")]
    Compile(#[from] Box<handlebars::TemplateError>),

    #[error("Template execution failed: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No generator registered for output: {0}")]
    UnknownOutput(String),

    #[error("Invalid overload table: {0}")]
    Table(String),

    #[error("Invalid configuration {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("Formatting generated source failed: {0}")]
    Format(String),
}

impl From<handlebars::TemplateError> for GenError {
    fn from(error: handlebars::TemplateError) -> Self {
        GenError::Compile(Box::new(error))
    }
}

pub type Result<T> = std::result::Result<T, GenError>;
