use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    application::{
        dtos::ReflectiveOutcome,
        services::{
            relevance::RelevanceJudge,
            synthesis::{AnswerSynthesizer, ContextEchoSynthesizer, DEFAULT_PREVIEW_CHARS},
        },
    },
    domain::{ChunkVerdict, Document, DomainError, RetrievedChunk},
};

/// Number of candidates retrieved per query unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 3;

/// Retrieval settings for [`ReflectiveAnswerer`].
#[derive(Debug, Clone)]
pub struct AnswererConfig {
    pub top_k: usize,
    pub answer_preview_chars: usize,
}

impl Default for AnswererConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            answer_preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

impl AnswererConfig {
    /// Rejects `top_k == 0`, which could never retrieve anything to judge.
    pub fn try_new(top_k: usize, answer_preview_chars: usize) -> Result<Self, DomainError> {
        if top_k == 0 {
            return Err(DomainError::validation("top_k must be at least 1"));
        }
        Ok(Self {
            top_k,
            answer_preview_chars,
        })
    }
}

/// Abstraction over any embedding engine (hash embedder, FastEmbed, remote models).
pub trait EmbeddingEngine: Send + Sync {
    /// Encodes a batch of texts, returning one vector per input in order.
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError>;

    fn model(&self) -> &str;

    fn dims(&self) -> Option<usize> {
        None
    }
}

/// Contract for the nearest-neighbour index holding the corpus.
pub trait VectorIndex: Send + Sync {
    /// Adds `(id, vector, document)` triples; the three slices are parallel.
    fn add(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        documents: &[String],
    ) -> Result<(), DomainError>;

    /// Returns at most `k` chunks ranked by descending similarity.
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, DomainError>;

    fn len(&self) -> Result<usize, DomainError>;

    fn is_empty(&self) -> Result<bool, DomainError> {
        Ok(self.len()? == 0)
    }
}

/// Orchestrates retrieval, relevance gating and the answer-or-refuse decision.
pub struct ReflectiveAnswerer {
    embedder: Arc<dyn EmbeddingEngine>,
    index: Arc<dyn VectorIndex>,
    judge: Arc<dyn RelevanceJudge>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    config: AnswererConfig,
}

impl ReflectiveAnswerer {
    /// Wires the collaborators with the mock [`ContextEchoSynthesizer`].
    pub fn new(
        embedder: Arc<dyn EmbeddingEngine>,
        index: Arc<dyn VectorIndex>,
        judge: Arc<dyn RelevanceJudge>,
        config: AnswererConfig,
    ) -> Self {
        let synthesizer = Arc::new(ContextEchoSynthesizer::new(config.answer_preview_chars));
        Self {
            embedder,
            index,
            judge,
            synthesizer,
            config,
        }
    }

    /// Replaces the answer step, e.g. with a real generator.
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn config(&self) -> &AnswererConfig {
        &self.config
    }

    /// Embeds and indexes `documents` with a single embedder call.
    pub fn load_corpus(&self, documents: &[Document]) -> Result<usize, DomainError> {
        if documents.is_empty() {
            return Ok(0);
        }
        Self::validate_corpus(documents)?;

        let ids: Vec<String> = documents.iter().map(|doc| doc.id.clone()).collect();
        let bodies: Vec<String> = documents.iter().map(|doc| doc.body.clone()).collect();

        let vectors = self.embedder.encode(&bodies)?;
        if vectors.len() != bodies.len() {
            return Err(DomainError::embedding(format!(
                "embedder returned {} vectors for {} documents",
                vectors.len(),
                bodies.len()
            )));
        }

        self.index.add(&ids, &vectors, &bodies)?;

        info!(
            target: "reflect_rag::answerer",
            documents = documents.len(),
            model = %self.embedder.model(),
            "corpus loaded"
        );
        Ok(documents.len())
    }

    /// Runs one request: embed, retrieve, gate, then answer or refuse.
    pub fn answer(&self, query: &str) -> Result<ReflectiveOutcome, DomainError> {
        let candidates = self.retrieve(query)?;
        let relevant: Vec<RetrievedChunk> = self
            .judge(query, candidates)
            .into_iter()
            .filter(|verdict| verdict.relevant)
            .map(|verdict| verdict.chunk)
            .collect();

        if relevant.is_empty() {
            warn!(
                target: "reflect_rag::answerer",
                query,
                "no retrieved chunk passed the relevance gate"
            );
            return Ok(ReflectiveOutcome::refuse(query));
        }

        let answer = self.synthesizer.synthesize(query, &relevant)?;
        info!(
            target: "reflect_rag::answerer",
            query,
            relevant = relevant.len(),
            "answering from relevant context"
        );

        Ok(ReflectiveOutcome::answer(query, relevant, answer))
    }

    /// Applies the relevance judge to each chunk, keeping retrieval order.
    pub fn judge(&self, query: &str, chunks: Vec<RetrievedChunk>) -> Vec<ChunkVerdict> {
        chunks
            .into_iter()
            .map(|chunk| {
                let relevant = self.judge.is_relevant(query, &chunk.text);
                debug!(
                    target: "reflect_rag::answerer",
                    id = %chunk.id,
                    score = chunk.score,
                    relevant,
                    "relevance verdict"
                );
                ChunkVerdict { chunk, relevant }
            })
            .collect()
    }

    fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, DomainError> {
        let vector = if query.trim().is_empty() {
            self.neutral_vector()?
        } else {
            self.embedder
                .encode(&[query.trim().to_string()])?
                .into_iter()
                .next()
                .ok_or_else(|| DomainError::embedding("embedder returned no vector for query"))?
        };

        let candidates = self.index.query(&vector, self.config.top_k)?;
        debug!(
            target: "reflect_rag::answerer",
            retrieved = candidates.len(),
            top_k = self.config.top_k,
            "candidates retrieved"
        );
        Ok(candidates)
    }

    /// Zero vector used to rank an empty query; every chunk then scores 0 and
    /// keeps insertion order.
    fn neutral_vector(&self) -> Result<Vec<f32>, DomainError> {
        let dims = self.embedder.dims().ok_or_else(|| {
            DomainError::embedding(format!(
                "embedder `{}` cannot encode an empty query and reports no dimensionality",
                self.embedder.model()
            ))
        })?;
        debug!(target: "reflect_rag::answerer", dims, "empty query, using zero vector");
        Ok(vec![0.0; dims])
    }

    fn validate_corpus(documents: &[Document]) -> Result<(), DomainError> {
        let mut seen = HashSet::with_capacity(documents.len());
        for doc in documents {
            if doc.id.is_empty() {
                return Err(DomainError::validation("document id is required"));
            }
            if doc.body.trim().is_empty() {
                return Err(DomainError::validation(format!(
                    "document `{}` has an empty body",
                    doc.id
                )));
            }
            if !seen.insert(doc.id.as_str()) {
                return Err(DomainError::validation(format!(
                    "duplicate document id `{}`",
                    doc.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        application::{dtos::SynthesizedAnswer, services::KeywordOverlapGate},
        domain::Decision,
    };

    const QUERY: &str = "What is the capital of France?";

    /// Returns the same vector for every input.
    struct ConstantEmbedder;

    impl EmbeddingEngine for ConstantEmbedder {
        fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn model(&self) -> &str {
            "test/constant"
        }

        fn dims(&self) -> Option<usize> {
            Some(2)
        }
    }

    struct FailingEmbedder;

    impl EmbeddingEngine for FailingEmbedder {
        fn encode(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
            Err(DomainError::embedding("model offline"))
        }

        fn model(&self) -> &str {
            "test/failing"
        }

        fn dims(&self) -> Option<usize> {
            Some(2)
        }
    }

    /// Serves a fixed candidate list and records what was added.
    #[derive(Default)]
    struct CannedIndex {
        candidates: Vec<RetrievedChunk>,
        added: Mutex<Vec<String>>,
    }

    impl CannedIndex {
        fn with_texts(texts: &[&str]) -> Self {
            let candidates = texts
                .iter()
                .enumerate()
                .map(|(idx, text)| RetrievedChunk {
                    id: format!("d_{idx}"),
                    text: text.to_string(),
                    score: 1.0 - idx as f32 * 0.1,
                })
                .collect();
            Self {
                candidates,
                added: Mutex::new(Vec::new()),
            }
        }
    }

    impl VectorIndex for CannedIndex {
        fn add(
            &self,
            ids: &[String],
            _vectors: &[Vec<f32>],
            _documents: &[String],
        ) -> Result<(), DomainError> {
            self.added.lock().extend(ids.iter().cloned());
            Ok(())
        }

        fn query(&self, _vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, DomainError> {
            Ok(self.candidates.iter().take(k).cloned().collect())
        }

        fn len(&self) -> Result<usize, DomainError> {
            Ok(self.added.lock().len())
        }
    }

    fn answerer(index: CannedIndex) -> ReflectiveAnswerer {
        ReflectiveAnswerer::new(
            Arc::new(ConstantEmbedder),
            Arc::new(index),
            Arc::new(KeywordOverlapGate::default()),
            AnswererConfig::default(),
        )
    }

    #[test]
    fn test_refuses_when_nothing_relevant() {
        let service = answerer(CannedIndex::with_texts(&[
            "RAG combines retrieval with LLM generation.",
            "Chunking splits documents for embedding.",
        ]));

        let outcome = service.answer(QUERY).unwrap();
        assert_eq!(outcome.decision(), Decision::Refuse);
        assert!(outcome.synthesized().is_none());
        assert!(outcome.relevant_chunks().is_empty());
    }

    #[test]
    fn test_answers_with_exactly_the_relevant_chunks() {
        let service = answerer(CannedIndex::with_texts(&[
            "RAG combines retrieval with LLM generation.",
            "The capital of France is Paris.",
            "Chunking splits documents for embedding.",
        ]));

        let outcome = service.answer(QUERY).unwrap();
        assert_eq!(outcome.decision(), Decision::Answer);
        let texts: Vec<&str> = outcome
            .relevant_chunks()
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect();
        assert_eq!(texts, vec!["The capital of France is Paris."]);
        assert!(outcome.synthesized().map(|a| a.mock).unwrap_or(false));
    }

    #[test]
    fn test_repeated_calls_are_stable() {
        let service = answerer(CannedIndex::with_texts(&[
            "The capital of France is Paris.",
            "France has a capital city.",
        ]));

        let first = service.answer(QUERY).unwrap();
        let second = service.answer(QUERY).unwrap();
        assert_eq!(first.decision(), second.decision());
        assert_eq!(first.relevant_chunks(), second.relevant_chunks());
    }

    #[test]
    fn test_top_k_limits_candidates() {
        let index = CannedIndex::with_texts(&[
            "Unrelated text.",
            "The capital of France is Paris.",
        ]);
        let service = ReflectiveAnswerer::new(
            Arc::new(ConstantEmbedder),
            Arc::new(index),
            Arc::new(KeywordOverlapGate::default()),
            AnswererConfig::try_new(1, DEFAULT_PREVIEW_CHARS).unwrap(),
        );

        assert_eq!(service.answer(QUERY).unwrap().decision(), Decision::Refuse);
    }

    #[test]
    fn test_zero_top_k_is_rejected() {
        let err = AnswererConfig::try_new(0, DEFAULT_PREVIEW_CHARS).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(AnswererConfig::try_new(2, 10).unwrap().top_k, 2);
    }

    #[test]
    fn test_empty_query_with_zero_threshold_answers_without_encoding() {
        let service = ReflectiveAnswerer::new(
            Arc::new(FailingEmbedder),
            Arc::new(CannedIndex::with_texts(&[
                "The capital of France is Paris.",
                "Chunking splits documents for embedding.",
            ])),
            Arc::new(KeywordOverlapGate::new(0)),
            AnswererConfig::default(),
        );

        let outcome = service.answer("   ").unwrap();
        assert_eq!(outcome.decision(), Decision::Answer);
        assert_eq!(outcome.relevant_chunks().len(), 2);
    }

    #[test]
    fn test_empty_query_is_refused_by_default_gate() {
        let service = answerer(CannedIndex::with_texts(&["The capital of France is Paris."]));

        let outcome = service.answer("").unwrap();
        assert_eq!(outcome.decision(), Decision::Refuse);
        assert!(outcome.synthesized().is_none());
    }

    #[test]
    fn test_empty_query_consults_custom_judge() {
        let service = ReflectiveAnswerer::new(
            Arc::new(ConstantEmbedder),
            Arc::new(CannedIndex::with_texts(&["anything at all"])),
            Arc::new(|_: &str, _: &str| true),
            AnswererConfig::default(),
        );

        assert_eq!(service.answer("").unwrap().decision(), Decision::Answer);
    }

    #[test]
    fn test_empty_query_needs_known_dimensions() {
        struct Opaque;
        impl EmbeddingEngine for Opaque {
            fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
                Ok(texts.iter().map(|_| vec![1.0]).collect())
            }

            fn model(&self) -> &str {
                "test/opaque"
            }
        }

        let service = ReflectiveAnswerer::new(
            Arc::new(Opaque),
            Arc::new(CannedIndex::with_texts(&["anything"])),
            Arc::new(KeywordOverlapGate::new(0)),
            AnswererConfig::default(),
        );

        let err = service.answer(" ").unwrap_err();
        assert!(matches!(err, DomainError::Embedding(_)));
    }

    #[test]
    fn test_embedder_failure_is_an_error_not_a_refusal() {
        let service = ReflectiveAnswerer::new(
            Arc::new(FailingEmbedder),
            Arc::new(CannedIndex::default()),
            Arc::new(KeywordOverlapGate::default()),
            AnswererConfig::default(),
        );

        let err = service.answer(QUERY).unwrap_err();
        assert!(matches!(err, DomainError::Embedding(_)));
    }

    #[test]
    fn test_custom_judge_is_used() {
        let service = ReflectiveAnswerer::new(
            Arc::new(ConstantEmbedder),
            Arc::new(CannedIndex::with_texts(&["anything at all"])),
            Arc::new(|_: &str, _: &str| true),
            AnswererConfig::default(),
        );

        assert_eq!(service.answer(QUERY).unwrap().decision(), Decision::Answer);
    }

    #[test]
    fn test_custom_synthesizer_replaces_mock() {
        struct Fixed;
        impl AnswerSynthesizer for Fixed {
            fn synthesize(
                &self,
                _query: &str,
                _relevant: &[RetrievedChunk],
            ) -> Result<SynthesizedAnswer, DomainError> {
                Ok(SynthesizedAnswer::generated("Paris."))
            }
        }

        let service = answerer(CannedIndex::with_texts(&["The capital of France is Paris."]))
            .with_synthesizer(Arc::new(Fixed));

        let outcome = service.answer(QUERY).unwrap();
        let answer = outcome.synthesized().unwrap();
        assert!(!answer.mock);
        assert_eq!(answer.text, "Paris.");
    }

    #[test]
    fn test_load_corpus_rejects_duplicates() {
        let service = answerer(CannedIndex::default());
        let docs = vec![Document::new("a", "one"), Document::new("a", "two")];

        let err = service.load_corpus(&docs).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn test_load_corpus_rejects_blank_bodies() {
        let service = answerer(CannedIndex::default());
        let err = service
            .load_corpus(&[Document::new("a", "  ")])
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn test_load_corpus_adds_all_documents() {
        let index = Arc::new(CannedIndex::default());
        let service = ReflectiveAnswerer::new(
            Arc::new(ConstantEmbedder),
            index.clone(),
            Arc::new(KeywordOverlapGate::default()),
            AnswererConfig::default(),
        );

        let loaded = service
            .load_corpus(&Document::numbered(["one", "two", "three"]))
            .unwrap();
        assert_eq!(loaded, 3);
        assert_eq!(index.len().unwrap(), 3);
        assert_eq!(service.load_corpus(&[]).unwrap(), 0);
    }

    #[test]
    fn test_judge_reports_every_chunk() {
        let service = answerer(CannedIndex::default());
        let chunks = CannedIndex::with_texts(&[
            "The capital of France is Paris.",
            "Chunking splits documents for embedding.",
        ])
        .candidates;

        let verdicts = service.judge(QUERY, chunks);
        assert_eq!(verdicts.len(), 2);
        assert!(verdicts[0].relevant);
        assert!(!verdicts[1].relevant);
    }
}
