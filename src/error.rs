//! Error types for template parsing, resolution and dispatch.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Template parse and evaluation errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Parse error: {message} at line {line}")]
    Parse { message: String, line: usize },

    #[error("Evaluation error: {message} at line {line}")]
    Eval { message: String, line: usize },

    #[error("yield encountered outside of layout context")]
    StrayYield,

    #[error("Failed to read template '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TemplateError {
    pub fn parse(message: impl Into<String>, line: usize) -> Self {
        Self::Parse {
            message: message.into(),
            line,
        }
    }

    pub fn eval(message: impl Into<String>, line: usize) -> Self {
        Self::Eval {
            message: message.into(),
            line,
        }
    }
}

/// A template name that resolved to no file under the views root.
#[derive(Debug, Error)]
#[error("Template '{name}' not found in {}", .views_root.display())]
pub struct ResolveError {
    pub name: String,
    pub views_root: PathBuf,
}

/// Request-fatal dispatch errors. Every failure here aborts the current
/// request; there are no retries or partial recoveries.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Controller '{controller}' has no action '{action}'")]
    UnknownAction { controller: String, action: String },

    #[error("Failed to load model '{model}': {message}")]
    ModelLoad { model: String, message: String },

    #[error("render() called with no view selected")]
    NoViewSelected,

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("{path}: {source}")]
    Template {
        path: String,
        #[source]
        source: TemplateError,
    },
}
