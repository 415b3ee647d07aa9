use std::collections::HashSet;

use parking_lot::RwLock;

use crate::{
    application::services::VectorIndex,
    domain::{Document, DomainError, IndexedDocument, RetrievedChunk},
};

use super::{ensure_dims, rank, validate_batch};

#[derive(Default)]
struct Inner {
    entries: Vec<IndexedDocument>,
    ids: HashSet<String>,
    dims: Option<usize>,
}

/// Ephemeral index kept in process memory.
#[derive(Default)]
pub struct MemoryVectorIndex {
    inner: RwLock<Inner>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorIndex for MemoryVectorIndex {
    fn add(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        documents: &[String],
    ) -> Result<(), DomainError> {
        let batch_dims = validate_batch(ids, vectors, documents)?;

        let mut inner = self.inner.write();
        if let Some(existing) = ids.iter().find(|id| inner.ids.contains(id.as_str())) {
            return Err(DomainError::validation(format!(
                "document `{existing}` is already indexed"
            )));
        }
        if let Some(dims) = inner.dims {
            ensure_dims(dims, vectors)?;
        }
        if inner.dims.is_none() {
            inner.dims = batch_dims;
        }

        for ((id, vector), body) in ids.iter().zip(vectors).zip(documents) {
            inner.ids.insert(id.clone());
            inner.entries.push(IndexedDocument::new(
                Document::new(id.as_str(), body.as_str()),
                vector.clone(),
            ));
        }

        Ok(())
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, DomainError> {
        let inner = self.inner.read();
        rank(&inner.entries, vector, k)
    }

    fn len(&self) -> Result<usize, DomainError> {
        Ok(self.inner.read().entries.len())
    }
}
