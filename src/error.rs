//! Error types for phishtrap.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhishTrapError {
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Parse error on line {line:?}: {reason}")]
    Parse { line: String, reason: String },

    #[error("Can't write {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

impl PhishTrapError {
    pub(crate) fn parse(line: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
