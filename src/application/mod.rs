//! Application layer wiring DTOs and services for the reflective pipeline.

pub mod dtos;
pub mod services;

pub use dtos::{ReflectiveOutcome, SynthesizedAnswer};
pub use services::{
    AnswerSynthesizer, AnswererConfig, ContextEchoSynthesizer, EmbeddingEngine,
    KeywordOverlapGate, ReflectiveAnswerer, RelevanceJudge, VectorIndex,
};
