//! Error types for loading build files.

use std::path::{Path, PathBuf};

/// The build file is not well-formed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}:{line}:{column}: {message}", .path.display())]
pub struct SyntaxError {
    pub path: PathBuf,
    /// 1-based line of the first offending token.
    pub line: usize,
    /// 1-based column of the first offending token.
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(path: &Path, line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            line,
            column,
            message: message.into(),
        }
    }
}

/// Failure to produce the existing tree for a reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

impl LoadError {
    pub fn path(&self) -> &Path {
        match self {
            LoadError::Io { path, .. } => path,
            LoadError::Syntax(err) => &err.path,
        }
    }
}
