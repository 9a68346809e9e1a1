//! Error types shared by every pipeline stage.
//!
//! Fatal conditions (bad configuration, corrupted joins, unreadable inputs) are
//! reported through [`ScreenError`]. Failures that only affect a single model
//! replica are *not* errors at this level; they are carried as
//! [`RecordFailure`] values so that the rest of the batch keeps going.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for all fatal pipeline conditions.
#[derive(Error, Debug)]
pub enum ScreenError {
    /// Missing or inconsistent configuration, detected before any work starts
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed FASTA or accession-list input
    #[error("FASTA error in {path}: {message}")]
    Fasta { path: PathBuf, message: String },

    /// A structure file could not be read or written
    #[error("Structure error for {path}: {message}")]
    Structure { path: PathBuf, message: String },

    /// An expected prediction artifact does not exist
    #[error("No file matching '{pattern}' in {dir}")]
    MissingArtifact { dir: PathBuf, pattern: String },

    /// A join changed the number of rows, meaning the stages disagree on model keys
    #[error("Row count mismatch while {context}: expected {expected} rows, found {found}")]
    Cardinality {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Table error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ScreenError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        ScreenError::Config(message.into())
    }

    /// Creates a structure error for the given file.
    pub fn structure(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ScreenError::Structure {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a cardinality error.
    pub fn cardinality(context: impl Into<String>, expected: usize, found: usize) -> Self {
        ScreenError::Cardinality {
            context: context.into(),
            expected,
            found,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ScreenError>;

/// Why a single replica could not be scored.
///
/// The reason is kept verbatim (including captured tool output) so it can be
/// logged next to the model it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub reason: String,
}

impl RecordFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.reason)
    }
}

/// Outcome of scoring one replica.
pub type RecordOutcome<T> = std::result::Result<T, RecordFailure>;
