//! Verifies generated answers against retrieved evidence
//!
//! Claims are sentences of the answer; each is checked for lexical overlap
//! (stop-word filtered, synonym aware) and for embedding similarity against
//! every chunk. Malformed inputs degrade the affected claim to unsupported
//! instead of failing the whole verification.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::Arc;

use crate::providers::EmbeddingProvider;
use crate::types::RetrievedChunk;
use crate::verification::types::{
    AnswerVerification, Claim, ClaimType, ClaimVerification, CorrectionKind, CorrectionSuggestion,
    SupportingChunk,
};

/// Minimum sentence length considered a claim
const MIN_CLAIM_CHARS: usize = 10;
/// Supporting chunks recorded per claim
const MAX_SUPPORTING_CHUNKS: usize = 3;
/// Confidence assigned when lexical overlap alone establishes support
const OVERLAP_CONFIDENCE: f32 = 0.95;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were",
];

/// Fixed domain synonym table; a synonym hit counts half a word of overlap
const SYNONYMS: &[(&str, &[&str])] = &[
    ("machine learning", &["ml", "machine-learning", "artificial intelligence", "ai"]),
    ("computers", &["computer", "systems", "machines"]),
    ("learn", &["learning", "understand", "process"]),
    ("data", &["information", "dataset", "examples"]),
    ("enables", &["allows", "permits", "makes possible"]),
    ("patterns", &["structures", "relationships", "regularities"]),
];

/// Verification engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Minimum embedding similarity for a chunk to support a claim
    pub support_threshold: f32,
    /// Minimum adjusted lexical overlap ratio for support
    pub overlap_threshold: f32,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            support_threshold: 0.7,
            overlap_threshold: 0.3,
        }
    }
}

/// Verifies generated answers against retrieved sources
pub struct VerificationEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    config: VerifierConfig,
}

impl VerificationEngine {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_config(embedder, VerifierConfig::default())
    }

    pub fn with_config(embedder: Arc<dyn EmbeddingProvider>, config: VerifierConfig) -> Self {
        Self { embedder, config }
    }

    /// Verify an answer against retrieved chunks
    pub async fn verify_answer(
        &self,
        answer: &str,
        chunks: &[RetrievedChunk],
        query: Option<&str>,
    ) -> AnswerVerification {
        let claims = extract_claims(answer);

        let mut results = Vec::with_capacity(claims.len());
        let mut unsupported = Vec::new();

        for claim in &claims {
            let result = self.verify_claim(claim, chunks).await;
            if !result.supported {
                unsupported.push(claim.clone());
            }
            results.push(result);
        }

        let supported_count = results.iter().filter(|r| r.supported).count();
        // A zero-claim answer is scored against one pseudo-claim: the
        // denominator is max(total_claims, 1), so an empty answer comes out
        // fully unsupported rather than dividing by zero.
        let total_claims = claims.len().max(1);

        let support_ratio = supported_count as f32 / total_claims as f32;
        let hallucination_score = 1.0 - support_ratio;

        let mut metadata = serde_json::Map::new();
        metadata.insert("total_claims".into(), JsonValue::from(total_claims));
        metadata.insert("supported_claims".into(), JsonValue::from(supported_count));
        metadata.insert("unsupported_claims".into(), JsonValue::from(unsupported.len()));
        metadata.insert("num_chunks_used".into(), JsonValue::from(chunks.len()));
        metadata.insert(
            "verification_method".into(),
            JsonValue::from("lexical_overlap+embedding_similarity"),
        );
        if let Some(q) = query {
            metadata.insert("query".into(), JsonValue::from(q));
        }

        AnswerVerification {
            answer: answer.to_string(),
            claims,
            results,
            support_ratio,
            hallucination_score,
            unsupported_claims: unsupported,
            metadata,
        }
    }

    async fn verify_claim(&self, claim: &Claim, chunks: &[RetrievedChunk]) -> ClaimVerification {
        // Opinions are not checked against evidence; they count as supported
        // and never enter the failure accounting.
        if claim.claim_type == ClaimType::Opinion {
            return ClaimVerification {
                claim: claim.clone(),
                supported: true,
                supporting_chunks: Vec::new(),
                confidence: 1.0,
                explanation: "opinion claim, no verification needed".to_string(),
            };
        }

        let claim_embedding = match self.embedder.embed(&claim.text).await {
            Ok(v) => Some(v),
            // Embedding failure degrades this claim instead of raising
            Err(_) => None,
        };

        let mut supporting = Vec::new();
        let mut max_similarity = 0.0f32;

        for chunk in chunks {
            // Missing chunk text recovers locally as no lexical evidence
            if has_text_overlap(&claim.text, &chunk.text, self.config.overlap_threshold) {
                supporting.push(SupportingChunk {
                    chunk_id: chunk.id.clone(),
                    score: chunk.score,
                });
                max_similarity = max_similarity.max(OVERLAP_CONFIDENCE);
                continue;
            }

            if let Some(claim_vec) = &claim_embedding {
                if let Ok(chunk_vec) = self.embedder.embed(&chunk.text).await {
                    let similarity = self.embedder.similarity(claim_vec, &chunk_vec);
                    if similarity >= self.config.support_threshold {
                        supporting.push(SupportingChunk {
                            chunk_id: chunk.id.clone(),
                            score: chunk.score,
                        });
                        max_similarity = max_similarity.max(similarity);
                    }
                }
            }
        }

        supporting.truncate(MAX_SUPPORTING_CHUNKS);
        let supported = !supporting.is_empty();
        let confidence = if supported { max_similarity } else { 0.0 };
        let explanation = if supported {
            format!(
                "supported by {} source(s) with confidence {:.2}",
                supporting.len(),
                confidence
            )
        } else {
            "no supporting evidence found in retrieved sources".to_string()
        };

        ClaimVerification {
            claim: claim.clone(),
            supported,
            supporting_chunks: supporting,
            confidence,
            explanation,
        }
    }

    /// Suggest removals or replacements for the unsupported claims
    pub fn suggest_corrections(&self, verification: &AnswerVerification) -> Vec<CorrectionSuggestion> {
        let mut suggestions = Vec::new();

        for unsupported in &verification.unsupported_claims {
            let result = match verification.results.iter().find(|r| &r.claim == unsupported) {
                Some(r) => r,
                None => continue,
            };

            let replacement = find_related_supported(unsupported, &verification.results);
            suggestions.push(CorrectionSuggestion {
                claim_text: unsupported.text.clone(),
                span: unsupported.span,
                kind: if replacement.is_some() {
                    CorrectionKind::Replace
                } else {
                    CorrectionKind::Remove
                },
                explanation: result.explanation.clone(),
                suggested_text: replacement,
            });
        }

        suggestions
    }

    /// Render the answer with unsupported claims marked inline plus a
    /// trailing support summary
    pub fn annotate_answer(&self, verification: &AnswerVerification) -> String {
        let mut annotated = verification.answer.clone();

        // Rewrite back-to-front so earlier spans stay valid
        let mut spans: Vec<(usize, usize)> = verification
            .unsupported_claims
            .iter()
            .filter_map(|c| c.span)
            .collect();
        spans.sort_by_key(|&(start, _)| std::cmp::Reverse(start));

        for (start, end) in spans {
            if end <= annotated.len() {
                let original = annotated[start..end].to_string();
                annotated.replace_range(start..end, &format!("[UNSUPPORTED: {}]", original));
            }
        }

        annotated.push_str(&format!(
            "\n\n[Verification: {:.0}% of claims supported by sources]",
            verification.support_ratio * 100.0
        ));
        annotated
    }
}

/// Split an answer into claims: one per sentence, skipping fragments shorter
/// than `MIN_CLAIM_CHARS`
pub fn extract_claims(answer: &str) -> Vec<Claim> {
    let mut claims = Vec::new();

    for (idx, sentence) in split_sentences(answer).into_iter().enumerate() {
        let trimmed = sentence.trim();
        if trimmed.len() < MIN_CLAIM_CHARS {
            continue;
        }

        let span = answer
            .find(trimmed)
            .map(|start| (start, start + trimmed.len()));

        claims.push(Claim {
            text: trimmed.to_string(),
            sentence_idx: idx,
            span,
            claim_type: classify_claim_type(trimmed),
        });
    }

    claims
}

/// Split on sentence-terminal punctuation followed by whitespace
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            if chars.peek().map_or(true, |next| next.is_whitespace()) {
                let sentence = current.trim().to_string();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                current.clear();
            }
        }
    }

    let tail = current.trim().to_string();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

fn classify_claim_type(sentence: &str) -> ClaimType {
    let lower = sentence.to_lowercase();
    let words: HashSet<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let any_word = |list: &[&str]| list.iter().any(|w| words.contains(w));

    if any_word(&["is", "are", "was", "were", "equals"]) {
        ClaimType::Factual
    } else if any_word(&["think", "believe", "feel", "opinion"]) {
        ClaimType::Opinion
    } else if lower.contains("how to") || any_word(&["steps", "first", "then", "finally"]) {
        ClaimType::Procedural
    } else if any_word(&["because", "therefore", "thus", "hence"]) {
        ClaimType::Causal
    } else if sentence.contains('?') {
        ClaimType::Question
    } else {
        ClaimType::Statement
    }
}

/// Stop-word-filtered lexical overlap extended by the synonym table
fn has_text_overlap(claim_text: &str, chunk_text: &str, threshold: f32) -> bool {
    let stopwords: HashSet<&str> = STOPWORDS.iter().copied().collect();
    let claim_lower = claim_text.to_lowercase();
    let chunk_lower = chunk_text.to_lowercase();

    let claim_words: HashSet<&str> = claim_lower
        .split_whitespace()
        .filter(|w| !stopwords.contains(w))
        .collect();
    let chunk_words: HashSet<&str> = chunk_lower
        .split_whitespace()
        .filter(|w| !stopwords.contains(w))
        .collect();

    if claim_words.is_empty() {
        return false;
    }

    let direct_overlap = claim_words.intersection(&chunk_words).count();

    // Synonyms only extend coverage to claim words that found no direct
    // match; a directly-matched word never counts twice.
    let mut synonym_overlap = 0usize;
    for word in claim_words.iter().filter(|w| !chunk_words.contains(*w)) {
        for (key, syn_list) in SYNONYMS {
            let word_in_group =
                key.split_whitespace().any(|k| k == *word) || syn_list.iter().any(|s| s == word);
            if word_in_group {
                let chunk_has_group = chunk_lower.contains(key)
                    || syn_list.iter().any(|s| chunk_lower.contains(s));
                if chunk_has_group {
                    synonym_overlap += 1;
                    break;
                }
            }
        }
    }

    let adjusted =
        (direct_overlap as f32 + synonym_overlap as f32 * 0.5) / claim_words.len() as f32;
    adjusted >= threshold
}

fn find_related_supported(claim: &Claim, results: &[ClaimVerification]) -> Option<String> {
    let stopwords: HashSet<&str> = STOPWORDS.iter().copied().collect();
    let claim_lower = claim.text.to_lowercase();
    let keywords: HashSet<&str> = claim_lower
        .split_whitespace()
        .filter(|w| !stopwords.contains(w))
        .collect();

    let mut best: Option<(usize, String)> = None;
    for result in results {
        if !result.supported || &result.claim == claim {
            continue;
        }
        let other_lower = result.claim.text.to_lowercase();
        let other_words: HashSet<&str> = other_lower.split_whitespace().collect();
        let overlap = keywords.intersection(&other_words).count();
        if overlap > 0 && best.as_ref().map_or(true, |(b, _)| overlap > *b) {
            best = Some((overlap, result.claim.text.clone()));
        }
    }

    best.map(|(_, text)| text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("First sentence. Second one! Third? tail");
        assert_eq!(sentences.len(), 4);
        assert_eq!(sentences[0], "First sentence.");
        assert_eq!(sentences[3], "tail");
    }

    #[test]
    fn test_extract_claims_drops_short_fragments() {
        let claims = extract_claims("Yes. Machine learning finds patterns in data.");
        assert_eq!(claims.len(), 1);
        assert!(claims[0].text.starts_with("Machine learning"));
    }

    #[test]
    fn test_claim_type_classification() {
        assert_eq!(classify_claim_type("AI was founded in 1956."), ClaimType::Factual);
        assert_eq!(classify_claim_type("I believe this will work."), ClaimType::Opinion);
        assert_eq!(
            classify_claim_type("First mix the batter, then bake it."),
            ClaimType::Procedural
        );
        assert_eq!(
            classify_claim_type("The engine stalled because the pump failed."),
            ClaimType::Causal
        );
        assert_eq!(classify_claim_type("Could this change anything?"), ClaimType::Question);
        assert_eq!(classify_claim_type("Carbon forms many compounds."), ClaimType::Statement);
    }

    #[test]
    fn test_text_overlap_direct() {
        assert!(has_text_overlap(
            "AI was founded in 1956 at Dartmouth.",
            "AI research was founded in 1956 at Dartmouth College.",
            0.3
        ));
    }

    #[test]
    fn test_text_overlap_rejects_unrelated() {
        assert!(!has_text_overlap(
            "Aliens invented AI on Mars in 2050.",
            "AI research was founded in 1956 at Dartmouth College.",
            0.5
        ));
    }

    #[test]
    fn test_text_overlap_synonyms_count_half() {
        // "ml" only matches through the machine-learning synonym group
        assert!(has_text_overlap(
            "ml finds patterns",
            "machine learning discovers patterns",
            0.3
        ));
    }

    #[test]
    fn test_claim_spans_locate_text() {
        let answer = "Water boils at 100C. It freezes at 0C.";
        let claims = extract_claims(answer);
        for claim in &claims {
            let (start, end) = claim.span.expect("span");
            assert_eq!(&answer[start..end], claim.text);
        }
    }
}
