use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{Decision, RetrievedChunk};

/// Reason reported on every refusal.
pub const REFUSAL_REASON: &str = "No relevant context found.";

/// Guidance printed with a refusal. No retry is ever executed.
pub const RETRY_SUGGESTION: &str = "In production, you might rewrite the query and retry.";

const ANSWER_NOTE: &str = "Self-reflective RAG refuses or retries when context is irrelevant.";

/// Answer text together with whether it came from the context-echo mock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedAnswer {
    pub text: String,
    pub mock: bool,
}

impl SynthesizedAnswer {
    pub fn mock(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mock: true,
        }
    }

    pub fn generated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mock: false,
        }
    }
}

/// Result of a single reflective request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "UPPERCASE")]
pub enum ReflectiveOutcome {
    Refuse {
        query: String,
        reason: String,
    },
    Answer {
        query: String,
        relevant_chunks: Vec<RetrievedChunk>,
        answer: SynthesizedAnswer,
    },
}

impl ReflectiveOutcome {
    pub fn refuse(query: impl Into<String>) -> Self {
        Self::Refuse {
            query: query.into(),
            reason: REFUSAL_REASON.to_string(),
        }
    }

    pub fn answer(
        query: impl Into<String>,
        relevant_chunks: Vec<RetrievedChunk>,
        answer: SynthesizedAnswer,
    ) -> Self {
        Self::Answer {
            query: query.into(),
            relevant_chunks,
            answer,
        }
    }

    pub fn decision(&self) -> Decision {
        match self {
            Self::Refuse { .. } => Decision::Refuse,
            Self::Answer { .. } => Decision::Answer,
        }
    }

    pub fn query(&self) -> &str {
        match self {
            Self::Refuse { query, .. } | Self::Answer { query, .. } => query,
        }
    }

    /// Chunks that passed the relevance gate; empty on refusal.
    pub fn relevant_chunks(&self) -> &[RetrievedChunk] {
        match self {
            Self::Refuse { .. } => &[],
            Self::Answer {
                relevant_chunks, ..
            } => relevant_chunks,
        }
    }

    /// The synthesized answer; `None` on refusal.
    pub fn synthesized(&self) -> Option<&SynthesizedAnswer> {
        match self {
            Self::Refuse { .. } => None,
            Self::Answer { answer, .. } => Some(answer),
        }
    }
}

/// Plain-text report written to stdout by the CLI.
impl fmt::Display for ReflectiveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Query: {}", self.query())?;
        match self {
            Self::Refuse { reason, .. } => {
                writeln!(f, "Decision: {} - {}", Decision::Refuse, reason)?;
                write!(f, "-> {RETRY_SUGGESTION}")
            }
            Self::Answer {
                relevant_chunks,
                answer,
                ..
            } => {
                let texts: Vec<String> = relevant_chunks
                    .iter()
                    .map(|chunk| quote_literal(&chunk.text))
                    .collect();
                writeln!(f, "Relevant chunks: [{}]", texts.join(", "))?;
                let label = if answer.mock { "Answer (mock)" } else { "Answer" };
                writeln!(f, "{label}: {}", answer.text)?;
                write!(f, "-> {ANSWER_NOTE}")
            }
        }
    }
}

/// Quotes `text` as a string literal for the chunk list: single quotes unless the
/// text contains a single quote and no double quote.
fn quote_literal(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
