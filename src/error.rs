//! Error types for the event index
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::vector::VectorError;

/// Errors raised by an embedding encoder
#[derive(Error, Debug, Clone)]
pub enum EncoderError {
    /// The model could not be loaded or is not callable right now
    #[error("Embedding model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    #[error(
        "Embedding dimension mismatch: expected {expected}, got {actual}\nSuggestion: Rebuild the index with a single embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors raised while pulling records from a catalog source
#[derive(Error, Debug, Clone)]
pub enum CatalogError {
    #[error("Catalog '{source_name}' is unreachable: {reason}")]
    Unreachable { source_name: String, reason: String },

    #[error("Catalog file '{path}' is malformed: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// Errors that abort a refresh before anything is published
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("Catalog pull failed, previous snapshot kept: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Refresh timed out after {after:?}, previous snapshot kept")]
    TimedOut { after: Duration },

    #[error("Failed to build snapshot: {0}")]
    Build(#[source] VectorError),

    #[error("Refresh task failed: {reason}")]
    TaskFailed { reason: String },
}

/// Errors surfaced to callers of `search`
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Cannot encode query: {0}")]
    Encoder(#[from] EncoderError),

    #[error("Vector query failed: {0}")]
    Vector(#[from] VectorError),
}

/// Errors assembling the service from configuration
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Invalid configuration: {0}\nSuggestion: Fix the value in .eventdex/settings.toml or the EVENTDEX_ environment")]
    Config(String),

    #[error(transparent)]
    Encoder(#[from] EncoderError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Vector(#[from] VectorError),
}

impl CatalogError {
    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Unreachable { .. } => "CATALOG_UNREACHABLE",
            Self::Malformed { .. } => "CATALOG_MALFORMED",
        }
    }
}

impl StartupError {
    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_INVALID",
            Self::Encoder(_) => "MODEL_UNAVAILABLE",
            Self::Catalog(e) => e.status_code(),
            Self::Vector(_) => "INVALID_INDEX_SETTINGS",
        }
    }
}

impl RefreshError {
    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Catalog(e) => e.status_code(),
            Self::TimedOut { .. } => "REFRESH_TIMED_OUT",
            Self::Build(_) => "SNAPSHOT_BUILD_FAILED",
            Self::TaskFailed { .. } => "REFRESH_TASK_FAILED",
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Catalog(CatalogError::Unreachable { .. }) => vec![
                "The previous index is still being served",
                "Check the catalog source and run 'eventdex refresh' again",
            ],
            Self::Catalog(CatalogError::Malformed { .. }) => vec![
                "The previous index is still being served",
                "The catalog file must be a JSON array of event objects",
            ],
            Self::TimedOut { .. } => vec![
                "Increase refresh.timeout_secs if the catalog is large",
                "Check that the embedding model is loaded and responsive",
            ],
            Self::Build(_) => vec![
                "Run 'eventdex refresh' to rebuild from scratch",
                "Make sure every record was encoded with the same model",
            ],
            Self::TaskFailed { .. } => vec!["Check the logs for a panic in the refresh task"],
        }
    }
}

impl SearchError {
    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Encoder(EncoderError::ModelUnavailable { .. }) => "MODEL_UNAVAILABLE",
            Self::Encoder(EncoderError::DimensionMismatch { .. }) => "DIMENSION_MISMATCH",
            Self::Vector(_) => "VECTOR_QUERY_FAILED",
        }
    }
}

/// Result type alias for encoder operations
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
