//! Error types for layerscan.
//!
//! Low-level failures (a stale [`Location`](crate::source::Location), a
//! malformed manifest) are collected per location by the catalogers and
//! surfaced together as [`Error::Catalog`]; resource failures (opening a
//! source, an unknown scope) are returned immediately.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The requested scope is not one of the fixed set.
    #[error("unsupported scope: {0:?} (expected one of: squashed, all-layers)")]
    UnsupportedScope(String),

    /// A location's backing reference no longer resolves.
    #[error("file not found: {0}")]
    NotFound(String),

    /// Manifest content could not be parsed into packages.
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    /// A CPE binding string could not be parsed.
    #[error("failed to parse CPE={input:?}: {reason}")]
    Cpe { input: String, reason: String },

    /// A component was set up in a way that can never do useful work.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A glob pattern is malformed.
    #[error("invalid glob pattern {pattern:?}: {reason}")]
    Glob { pattern: String, reason: String },

    /// The source could not be opened.
    #[error("unable to open source {specifier:?}: {reason}")]
    Source { specifier: String, reason: String },

    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One or more locations failed during a catalog pass.
    #[error("{cataloger}: {} location(s) failed: {}", .failures.len(), summarize(.failures))]
    Catalog {
        cataloger: String,
        failures: Vec<LocationFailure>,
    },
}

/// A single location that failed during cataloging, and why.
#[derive(Debug)]
pub struct LocationFailure {
    pub path: String,
    pub error: Error,
}

impl std::fmt::Display for LocationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.error)
    }
}

fn summarize(failures: &[LocationFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: &str, reason: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}
