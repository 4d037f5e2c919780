//! Text embedding for events and queries.
//!
//! Two encoders are available:
//!
//! | Backend | Model id | Dimension | Notes |
//! |---------|----------|-----------|-------|
//! | fastembed | `AllMiniLML6V2` (default) | 384 | Semantic, downloads the model once |
//! | hash | `fnv1a-<dim>` | configurable | Lexical feature hashing, always available |
//!
//! Both are deterministic for a fixed model version and map blank input
//! to the zero vector instead of failing.

mod fastembed_encoder;
mod hash;

pub use fastembed_encoder::{FastEmbedEncoder, parse_embedding_model};
pub use hash::HashEncoder;

use std::sync::Arc;
use tracing::warn;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::{EncoderError, EncoderResult};
use crate::vector::VectorDimension;

/// Maps free text to fixed-length dense vectors.
///
/// Implementations must be thread-safe; a single encoder is shared by the
/// refresh task and every concurrent search.
pub trait Encoder: Send + Sync {
    /// Generate embeddings for non-blank texts, one per input.
    fn generate_embeddings(&self, texts: &[&str]) -> EncoderResult<Vec<Vec<f32>>>;

    /// Dimension of every vector this encoder produces.
    fn dimension(&self) -> VectorDimension;

    /// Stable identifier of the model, recorded in persisted snapshots.
    fn model_id(&self) -> &str;

    /// Encode a single text. Blank input yields the zero vector.
    fn encode(&self, text: &str) -> EncoderResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension().get()]);
        }

        let embedding = self
            .generate_embeddings(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| EncoderError::ModelUnavailable {
                reason: "model returned no embedding".to_string(),
            })?;

        self.check_dimension(&embedding)?;
        Ok(embedding)
    }

    /// Encode many texts, isolating failures to the texts that caused them.
    ///
    /// The whole batch is tried first. If it fails, each text is retried on
    /// its own so one bad input does not take down its neighbours.
    fn encode_each(&self, texts: &[&str]) -> Vec<EncoderResult<Vec<f32>>> {
        let batch: Vec<&str> = texts
            .iter()
            .copied()
            .filter(|t| !t.trim().is_empty())
            .collect();

        let batched = if batch.is_empty() {
            Ok(Vec::new())
        } else {
            self.generate_embeddings(&batch)
        };

        match batched {
            Ok(embeddings) if embeddings.len() == batch.len() => {
                let mut embeddings = embeddings.into_iter();
                texts
                    .iter()
                    .map(|text| {
                        if text.trim().is_empty() {
                            return Ok(vec![0.0; self.dimension().get()]);
                        }
                        let embedding =
                            embeddings
                                .next()
                                .ok_or_else(|| EncoderError::ModelUnavailable {
                                    reason: "model returned too few embeddings".to_string(),
                                })?;
                        self.check_dimension(&embedding)?;
                        Ok(embedding)
                    })
                    .collect()
            }
            Ok(embeddings) => {
                warn!(
                    expected = batch.len(),
                    actual = embeddings.len(),
                    "batch embedding count mismatch, encoding one by one"
                );
                texts.iter().map(|text| self.encode(text)).collect()
            }
            Err(e) => {
                warn!("batch embedding failed ({e}), encoding one by one");
                texts.iter().map(|text| self.encode(text)).collect()
            }
        }
    }

    fn check_dimension(&self, embedding: &[f32]) -> EncoderResult<()> {
        let expected = self.dimension().get();
        if embedding.len() != expected {
            return Err(EncoderError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            });
        }
        Ok(())
    }
}

/// Builds the encoder selected by configuration.
///
/// # Errors
/// `ModelUnavailable` if the fastembed model cannot be loaded.
pub fn create_encoder(config: &EmbeddingConfig) -> EncoderResult<Arc<dyn Encoder>> {
    match config.backend {
        EmbeddingBackend::Fastembed => {
            let encoder = FastEmbedEncoder::from_config(config)?;
            Ok(Arc::new(encoder))
        }
        EmbeddingBackend::Hash => {
            let dimension =
                VectorDimension::new(config.dimension).map_err(|e| EncoderError::ModelUnavailable {
                    reason: e.to_string(),
                })?;
            Ok(Arc::new(HashEncoder::new(dimension)))
        }
    }
}
