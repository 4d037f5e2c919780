//! Type-safe wrappers and core types for the vector index.
//!
//! This module provides newtypes and error types that keep dimension and
//! ranking parameters validated at the edges of the index.

use std::num::NonZeroUsize;
use thiserror::Error;

/// Standard vector dimension for event embeddings (all-MiniLM-L6-v2 model).
pub const VECTOR_DIMENSION_384: usize = 384;

/// Number of results returned when the caller does not ask for a specific count.
pub const DEFAULT_TOP_K: usize = 10;

/// Type-safe wrapper for vector dimensions.
///
/// Ensures runtime validation of vector dimensions to prevent
/// dimension mismatches between snapshot entries and queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Creates a standard 384-dimensional vector dimension.
    #[must_use]
    pub const fn dimension_384() -> Self {
        Self(VECTOR_DIMENSION_384)
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for VectorDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of neighbours requested from a top-k query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopK(NonZeroUsize);

impl TopK {
    /// Validates a raw `top_k`; zero is rejected.
    pub fn new(k: usize) -> Result<Self, VectorError> {
        NonZeroUsize::new(k)
            .map(Self)
            .ok_or(VectorError::InvalidTopK(k))
    }

    #[must_use]
    pub fn get(&self) -> usize {
        self.0.get()
    }
}

impl Default for TopK {
    fn default() -> Self {
        Self(NonZeroUsize::new(DEFAULT_TOP_K).unwrap_or(NonZeroUsize::MIN))
    }
}

/// Errors that can occur during vector operations.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error("Invalid top_k value: {0}\nSuggestion: Request at least one result")]
    InvalidTopK(usize),

    #[error("Duplicate event id in snapshot: {0}\nSuggestion: Catalog identifiers must be unique")]
    DuplicateId(String),

    #[error("Storage error: {0}\nSuggestion: Check disk space and file permissions")]
    Storage(#[from] std::io::Error),

    #[error(
        "Serialization error: {0}\nSuggestion: Check that the persisted snapshot is valid and not corrupted"
    )]
    Serialization(String),

    #[error("Invalid storage format: {0}\nSuggestion: Delete the index directory and refresh")]
    InvalidFormat(String),

    #[error(
        "Invalid storage version: expected {expected}, got {actual}\nSuggestion: Delete the index directory and refresh"
    )]
    VersionMismatch { expected: u32, actual: u32 },
}

/// Result type alias for vector operations
pub type VectorResult<T> = Result<T, VectorError>;
