//! fastembed-backed semantic encoder.
//!
//! Produces 384-dimensional embeddings with AllMiniLML6V2 by default.
//! The ONNX model is downloaded on first use and cached under the
//! configured cache directory.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

use crate::config::EmbeddingConfig;
use crate::embedding::Encoder;
use crate::error::{EncoderError, EncoderResult};
use crate::vector::VectorDimension;

/// Semantic encoder wrapping a fastembed `TextEmbedding`.
pub struct FastEmbedEncoder {
    /// fastembed needs `&mut` to run inference
    model: Mutex<TextEmbedding>,
    dimension: VectorDimension,
    model_id: String,
}

impl std::fmt::Debug for FastEmbedEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedEncoder")
            .field("model", &"<TextEmbedding>")
            .field("dimension", &self.dimension)
            .field("model_id", &self.model_id)
            .finish()
    }
}

impl FastEmbedEncoder {
    /// Load the model named in `config`.
    ///
    /// # Errors
    /// `ModelUnavailable` if the model name is unknown or the model fails to
    /// download or initialise.
    pub fn from_config(config: &EmbeddingConfig) -> EncoderResult<Self> {
        let model = parse_embedding_model(&config.model)?;
        let cache_dir = config.cache_dir.clone().unwrap_or_else(default_cache_dir);
        Self::with_model(model, config.model.clone(), cache_dir)
    }

    pub fn with_model(
        model: EmbeddingModel,
        model_id: String,
        cache_dir: PathBuf,
    ) -> EncoderResult<Self> {
        let has_cached_models = cache_dir.exists()
            && cache_dir
                .read_dir()
                .is_ok_and(|mut entries| entries.any(|_| true));

        if has_cached_models {
            info!(model = %model_id, "loading embedding model from cache");
        } else {
            info!(model = %model_id, "downloading embedding model (first time only)");
        }

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(false),
        )
        .map_err(|e| EncoderError::ModelUnavailable {
            reason: format!(
                "Failed to initialize embedding model: {e}. Ensure you have internet connection for first-time model download"
            ),
        })?;

        // Embed once to learn the output dimension
        let sample = text_model
            .embed(vec!["dimension check"], None)
            .map_err(|e| EncoderError::ModelUnavailable {
                reason: format!("Failed to generate sample embedding: {e}"),
            })?;
        let dim = sample.first().map_or(0, Vec::len);
        let dimension = VectorDimension::new(dim).map_err(|e| EncoderError::ModelUnavailable {
            reason: e.to_string(),
        })?;

        Ok(Self {
            model: Mutex::new(text_model),
            dimension,
            model_id,
        })
    }
}

impl Encoder for FastEmbedEncoder {
    fn generate_embeddings(&self, texts: &[&str]) -> EncoderResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        self.model
            .lock()
            .map_err(|_| EncoderError::ModelUnavailable {
                reason: "Failed to acquire embedding model lock - model may be poisoned"
                    .to_string(),
            })?
            .embed(texts.to_vec(), None)
            .map_err(|e| EncoderError::ModelUnavailable {
                reason: format!("Failed to generate embeddings: {e}"),
            })
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Resolve a configured model name to a fastembed model.
pub fn parse_embedding_model(name: &str) -> EncoderResult<EmbeddingModel> {
    match name {
        "AllMiniLML6V2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "AllMiniLML12V2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "BGESmallENV15" => Ok(EmbeddingModel::BGESmallENV15),
        "BGEBaseENV15" => Ok(EmbeddingModel::BGEBaseENV15),
        "MultilingualE5Small" => Ok(EmbeddingModel::MultilingualE5Small),
        "ParaphraseMLMiniLML12V2" => Ok(EmbeddingModel::ParaphraseMLMiniLML12V2),
        other => Err(EncoderError::ModelUnavailable {
            reason: format!(
                "Unknown embedding model '{other}'. Supported: AllMiniLML6V2, AllMiniLML12V2, BGESmallENV15, BGEBaseENV15, MultilingualE5Small, ParaphraseMLMiniLML12V2"
            ),
        }),
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".eventdex"))
        .join("eventdex")
        .join("models")
}
