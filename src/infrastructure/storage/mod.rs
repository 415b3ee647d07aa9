//! Vector index adapters.
//!
//! `MemoryVectorIndex` lives for the process lifetime; `SledVectorIndex`
//! persists the corpus to an embedded sled database. Both rank by exhaustive
//! cosine similarity, which is fine for the small corpora this tool targets.

pub mod memory_index;
pub mod sled_index;

pub use memory_index::MemoryVectorIndex;
pub use sled_index::SledVectorIndex;

use std::collections::HashSet;

use crate::domain::{DomainError, IndexedDocument, RetrievedChunk};

/// Checks that an `add` batch is well formed and returns its vector dimensionality.
fn validate_batch(
    ids: &[String],
    vectors: &[Vec<f32>],
    documents: &[String],
) -> Result<Option<usize>, DomainError> {
    if ids.len() != vectors.len() || ids.len() != documents.len() {
        return Err(DomainError::validation(format!(
            "mismatched batch lengths: {} ids, {} vectors, {} documents",
            ids.len(),
            vectors.len(),
            documents.len()
        )));
    }

    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if id.trim().is_empty() {
            return Err(DomainError::validation("document id is required"));
        }
        if !seen.insert(id.as_str()) {
            return Err(DomainError::validation(format!(
                "duplicate document id `{id}` in batch"
            )));
        }
    }

    let dims = vectors.first().map(Vec::len);
    if let Some(expected) = dims {
        if expected == 0 {
            return Err(DomainError::embedding("vectors cannot be empty"));
        }
        ensure_dims(expected, vectors)?;
    }

    Ok(dims)
}

fn ensure_dims(expected: usize, vectors: &[Vec<f32>]) -> Result<(), DomainError> {
    match vectors.iter().find(|v| v.len() != expected) {
        Some(bad) => Err(DomainError::embedding(format!(
            "embedding dimension mismatch: index holds {expected}, got {}",
            bad.len()
        ))),
        None => Ok(()),
    }
}

/// Cosine similarity in [-1, 1]; a zero vector scores 0 against everything.
fn cosine_similarity(query: &[f32], candidate: &[f32]) -> Result<f32, DomainError> {
    if query.len() != candidate.len() {
        return Err(DomainError::embedding(format!(
            "embedding dimension mismatch: query {} vs candidate {}",
            query.len(),
            candidate.len()
        )));
    }

    let mut dot = 0.0f32;
    let mut q_norm = 0.0f32;
    let mut c_norm = 0.0f32;

    for (q, c) in query.iter().zip(candidate.iter()) {
        dot += q * c;
        q_norm += q * q;
        c_norm += c * c;
    }

    let denom = q_norm.sqrt() * c_norm.sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / denom).clamp(-1.0, 1.0))
}

/// Scores entries (given in insertion order) and keeps the best `k`.
///
/// The sort is stable, so equal scores keep insertion order.
fn rank<'a>(
    entries: impl IntoIterator<Item = &'a IndexedDocument>,
    query: &[f32],
    k: usize,
) -> Result<Vec<RetrievedChunk>, DomainError> {
    if k == 0 {
        return Ok(Vec::new());
    }

    let mut scored = Vec::new();
    for entry in entries {
        let score = cosine_similarity(query, &entry.vector)?;
        scored.push(RetrievedChunk {
            id: entry.document.id.clone(),
            text: entry.document.body.clone(),
            score,
        });
    }

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Document;

    #[test]
    fn test_cosine_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap(), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).is_err());
    }

    #[test]
    fn test_validate_batch() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let docs = vec!["one".to_string(), "two".to_string()];

        let dims = validate_batch(&ids, &[vec![1.0, 0.0], vec![0.0, 1.0]], &docs).unwrap();
        assert_eq!(dims, Some(2));

        assert!(validate_batch(&ids, &[vec![1.0]], &docs).is_err());
        assert!(validate_batch(&ids, &[vec![1.0], vec![1.0, 0.0]], &docs).is_err());

        let dup = vec!["a".to_string(), "a".to_string()];
        assert!(validate_batch(&dup, &[vec![1.0], vec![1.0]], &docs).is_err());
        assert_eq!(validate_batch(&[], &[], &[]).unwrap(), None);
    }

    #[test]
    fn test_rank_orders_by_score_then_insertion() {
        let entries = vec![
            IndexedDocument::new(Document::new("a", "first"), vec![0.0, 1.0]),
            IndexedDocument::new(Document::new("b", "second"), vec![1.0, 0.0]),
            IndexedDocument::new(Document::new("c", "third"), vec![1.0, 0.0]),
        ];

        let ranked = rank(&entries, &[1.0, 0.0], 2).unwrap();
        let ids: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(rank(&entries, &[1.0, 0.0], 0).unwrap().is_empty());
    }
}
