use std::collections::BTreeSet;

/// Default number of distinct query terms a chunk must contain.
pub const DEFAULT_MIN_OVERLAP: usize = 2;

/// Tokens of this many characters or fewer are dropped as a stop-word proxy.
const MAX_IGNORED_TOKEN_CHARS: usize = 2;

/// Capability deciding whether a retrieved chunk is relevant to a query.
///
/// The keyword gate below is a placeholder; a model-based judge can be plugged
/// in through this trait without touching the answerer. Plain closures
/// `Fn(&str, &str) -> bool` implement it too.
pub trait RelevanceJudge: Send + Sync {
    fn is_relevant(&self, query: &str, chunk: &str) -> bool;
}

impl<F> RelevanceJudge for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn is_relevant(&self, query: &str, chunk: &str) -> bool {
        self(query, chunk)
    }
}

/// Keyword-overlap heuristic: a chunk is relevant when at least `min_overlap`
/// distinct query terms occur as substrings of it (case-insensitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordOverlapGate {
    min_overlap: usize,
}

impl KeywordOverlapGate {
    pub fn new(min_overlap: usize) -> Self {
        Self { min_overlap }
    }

    pub fn min_overlap(&self) -> usize {
        self.min_overlap
    }

    /// Lower-cased whitespace tokens longer than two characters, deduplicated.
    ///
    /// Attached punctuation is kept, so `"France?"` yields the term `"france?"`.
    pub fn query_terms(query: &str) -> BTreeSet<String> {
        query
            .split_whitespace()
            .map(str::to_lowercase)
            .filter(|token| token.chars().count() > MAX_IGNORED_TOKEN_CHARS)
            .collect()
    }

    /// Query terms found in `chunk`, in sorted order.
    pub fn matched_terms(query: &str, chunk: &str) -> Vec<String> {
        let haystack = chunk.to_lowercase();
        Self::query_terms(query)
            .into_iter()
            .filter(|term| haystack.contains(term.as_str()))
            .collect()
    }

    pub fn overlap(query: &str, chunk: &str) -> usize {
        Self::matched_terms(query, chunk).len()
    }
}

impl Default for KeywordOverlapGate {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_OVERLAP)
    }
}

impl RelevanceJudge for KeywordOverlapGate {
    fn is_relevant(&self, query: &str, chunk: &str) -> bool {
        Self::overlap(query, chunk) >= self.min_overlap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUERY: &str = "What is the capital of France?";

    #[test]
    fn test_query_terms_drop_short_tokens_and_duplicates() {
        let terms = KeywordOverlapGate::query_terms("What is the THE capital of France?");
        let expected: BTreeSet<String> = ["what", "the", "capital", "france?"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(terms, expected);
    }

    #[test]
    fn test_relevant_chunk_passes() {
        let gate = KeywordOverlapGate::default();
        let chunk = "The capital of France is Paris.";
        assert_eq!(
            KeywordOverlapGate::matched_terms(QUERY, chunk),
            vec!["capital".to_string(), "the".to_string()]
        );
        assert!(gate.is_relevant(QUERY, chunk));
    }

    #[test]
    fn test_unrelated_chunk_fails() {
        let gate = KeywordOverlapGate::default();
        let chunk = "RAG combines retrieval with LLM generation.";
        assert_eq!(KeywordOverlapGate::overlap(QUERY, chunk), 0);
        assert!(!gate.is_relevant(QUERY, chunk));
    }

    #[test]
    fn test_zero_threshold_accepts_everything() {
        let gate = KeywordOverlapGate::new(0);
        assert!(gate.is_relevant(QUERY, "completely unrelated"));
        assert!(gate.is_relevant("", ""));
    }

    #[test]
    fn test_query_without_long_tokens_never_matches() {
        let chunk = "is of an to at by it";
        for threshold in 1..4 {
            let gate = KeywordOverlapGate::new(threshold);
            assert!(!gate.is_relevant("is of an", chunk));
            assert!(!gate.is_relevant("", chunk));
            assert!(!gate.is_relevant("   ", chunk));
        }
    }

    #[test]
    fn test_token_length_counts_characters() {
        // "ün" is two characters but three bytes.
        assert!(KeywordOverlapGate::query_terms("ün").is_empty());
        assert_eq!(KeywordOverlapGate::query_terms("für").len(), 1);
    }

    #[test]
    fn test_substring_matching() {
        let gate = KeywordOverlapGate::new(1);
        assert!(gate.is_relevant("chunk", "Chunking splits documents."));
    }

    #[test]
    fn test_verdict_is_deterministic() {
        let gate = KeywordOverlapGate::default();
        let chunk = "The capital of France is Paris.";
        let first = gate.is_relevant(QUERY, chunk);
        for _ in 0..5 {
            assert_eq!(gate.is_relevant(QUERY, chunk), first);
        }
    }

    #[test]
    fn test_closure_is_a_judge() {
        let judge = |_: &str, chunk: &str| chunk.contains("Paris");
        assert!(judge.is_relevant(QUERY, "Paris"));
        assert!(!RelevanceJudge::is_relevant(&judge, QUERY, "Berlin"));
    }
}
