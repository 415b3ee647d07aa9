//! Domain layer: core entities and value objects for the reflective pipeline.

pub mod errors;
pub mod models;

pub use errors::DomainError;
pub use models::{ChunkVerdict, Decision, Document, IndexedDocument, RetrievedChunk};
