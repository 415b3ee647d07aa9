//! Service layer orchestrating the relevance gate and injected collaborators.

mod reflective_service;
mod relevance;
mod synthesis;

pub use reflective_service::{
    AnswererConfig, EmbeddingEngine, ReflectiveAnswerer, VectorIndex, DEFAULT_TOP_K,
};
pub use relevance::{KeywordOverlapGate, RelevanceJudge, DEFAULT_MIN_OVERLAP};
pub use synthesis::{AnswerSynthesizer, ContextEchoSynthesizer, DEFAULT_PREVIEW_CHARS};
