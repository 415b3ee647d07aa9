use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A corpus entry: an identifier unique within the corpus and its text body.
///
/// Documents are immutable once added to an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub body: String,
}

impl Document {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: sanitize_single_line(id),
            body: body.into(),
        }
    }

    /// Builds documents with positional ids (`d_0`, `d_1`, ...).
    pub fn numbered(bodies: impl IntoIterator<Item = impl Into<String>>) -> Vec<Self> {
        bodies
            .into_iter()
            .enumerate()
            .map(|(idx, body)| Self::new(format!("d_{idx}"), body))
            .collect()
    }
}

/// Persisted index entry: the document, its vector and when it was added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub document: Document,
    pub vector: Vec<f32>,
    pub added_at: DateTime<Utc>,
}

impl IndexedDocument {
    pub fn new(document: Document, vector: Vec<f32>) -> Self {
        Self {
            document,
            vector,
            added_at: Utc::now(),
        }
    }
}

/// A chunk returned by a nearest-neighbour query, with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub score: f32,
}

/// Relevance outcome for a single retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkVerdict {
    pub chunk: RetrievedChunk,
    pub relevant: bool,
}

/// Terminal state of a reflective request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Answer,
    Refuse,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Answer => f.write_str("ANSWER"),
            Decision::Refuse => f.write_str("REFUSE"),
        }
    }
}

fn sanitize_single_line(input: impl Into<String>) -> String {
    input
        .into()
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
