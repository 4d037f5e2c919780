//! FNV-1a feature hashing encoder.
//!
//! Lexical rather than semantic, but needs no model files, so it is the
//! offline fallback and the encoder used throughout the test suite.

use crate::embedding::Encoder;
use crate::error::EncoderResult;
use crate::vector::{VectorDimension, normalize};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic bag-of-words encoder.
///
/// Each lowercase alphanumeric token is hashed into one bucket with a
/// hash-derived sign, then the vector is scaled to unit length.
#[derive(Debug, Clone)]
pub struct HashEncoder {
    dimension: VectorDimension,
    model_id: String,
}

impl HashEncoder {
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            model_id: format!("fnv1a-{}", dimension.get()),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let dim = self.dimension.get();
        let mut embedding = vec![0.0f32; dim];

        for token in tokens(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % dim as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        normalize(&mut embedding);
        embedding
    }
}

impl Default for HashEncoder {
    fn default() -> Self {
        Self::new(VectorDimension::dimension_384())
    }
}

impl Encoder for HashEncoder {
    fn generate_embeddings(&self, texts: &[&str]) -> EncoderResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}
