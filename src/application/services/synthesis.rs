use crate::{
    application::dtos::SynthesizedAnswer,
    domain::{DomainError, RetrievedChunk},
};

/// Default number of context characters echoed by the mock answer.
pub const DEFAULT_PREVIEW_CHARS: usize = 80;

/// Produces the final answer from the chunks that passed the relevance gate.
///
/// A language-model backed generator can implement this; the crate ships only
/// [`ContextEchoSynthesizer`], which never generates anything.
pub trait AnswerSynthesizer: Send + Sync {
    fn synthesize(
        &self,
        query: &str,
        relevant: &[RetrievedChunk],
    ) -> Result<SynthesizedAnswer, DomainError>;
}

/// Mock answer: joins relevant chunk texts with spaces and echoes a prefix.
#[derive(Debug, Clone, Copy)]
pub struct ContextEchoSynthesizer {
    preview_chars: usize,
}

impl ContextEchoSynthesizer {
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }
}

impl Default for ContextEchoSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_CHARS)
    }
}

impl AnswerSynthesizer for ContextEchoSynthesizer {
    fn synthesize(
        &self,
        _query: &str,
        relevant: &[RetrievedChunk],
    ) -> Result<SynthesizedAnswer, DomainError> {
        let context = relevant
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let preview: String = context.chars().take(self.preview_chars).collect();

        Ok(SynthesizedAnswer::mock(format!(
            "Based on context: {preview}..."
        )))
    }
}
