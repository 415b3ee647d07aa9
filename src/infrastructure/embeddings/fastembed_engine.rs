use std::str::FromStr;

use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use parking_lot::Mutex;
use tracing::info;

use crate::{application::services::EmbeddingEngine, domain::DomainError};

/// fastembed's export of all-MiniLM-L6-v2.
pub const DEFAULT_FASTEMBED_MODEL: &str = "Qdrant/all-MiniLM-L6-v2-onnx";

/// Embedding engine backed by `fastembed`'s `TextEmbedding`.
///
/// One loaded model is shared behind a `Mutex`; `embed` needs `&mut self`.
pub struct FastEmbedEngine {
    model_label: String,
    dimensions: usize,
    inner: Mutex<TextEmbedding>,
}

impl FastEmbedEngine {
    /// Loads `model_name` (a fastembed model code such as
    /// `Qdrant/all-MiniLM-L6-v2-onnx`), downloading it on first use.
    pub fn try_new(model_name: impl AsRef<str>) -> Result<Self, DomainError> {
        let (label, model, dimensions) = resolve_model(model_name.as_ref())?;

        let text_embedding =
            TextEmbedding::try_new(TextInitOptions::new(model)).map_err(|err| {
                DomainError::embedding(format!("failed to load fastembed model `{label}`: {err}"))
            })?;

        info!(target: "reflect_rag::embedding", model = %label, dimensions, "fastembed model ready");
        Ok(Self {
            model_label: label,
            dimensions,
            inner: Mutex::new(text_embedding),
        })
    }
}

/// Maps a model code to fastembed's enum and its output dimensionality
/// without loading weights.
fn resolve_model(name: &str) -> Result<(String, EmbeddingModel, usize), DomainError> {
    let label = name.trim();
    if label.is_empty() {
        return Err(DomainError::validation("fastembed model name cannot be empty"));
    }

    let model = EmbeddingModel::from_str(label).map_err(|err| {
        DomainError::other(format!("unknown fastembed model `{label}`: {err}"))
    })?;
    let dimensions = TextEmbedding::get_model_info(&model)
        .map_err(|err| {
            DomainError::other(format!("no metadata for fastembed model `{label}`: {err}"))
        })?
        .dim;

    Ok((label.to_string(), model, dimensions))
}

/// One vector per input, each of the advertised width.
fn check_output(vectors: &[Vec<f32>], inputs: usize, dimensions: usize) -> Result<(), DomainError> {
    if vectors.len() != inputs {
        return Err(DomainError::embedding(format!(
            "fastembed returned {} embeddings for {inputs} inputs",
            vectors.len()
        )));
    }
    match vectors.iter().find(|vector| vector.len() != dimensions) {
        Some(bad) => Err(DomainError::embedding(format!(
            "unexpected embedding dimension (expected {dimensions}, got {})",
            bad.len()
        ))),
        None => Ok(()),
    }
}

impl EmbeddingEngine for FastEmbedEngine {
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(DomainError::validation("text payload cannot be empty"));
        }

        let vectors = self
            .inner
            .lock()
            .embed(texts.to_vec(), None)
            .map_err(|err| DomainError::embedding(format!("fastembed inference failed: {err}")))?;
        check_output(&vectors, texts.len(), self.dimensions)?;
        Ok(vectors)
    }

    fn model(&self) -> &str {
        &self.model_label
    }

    fn dims(&self) -> Option<usize> {
        Some(self.dimensions)
    }
}
