//! Intent-adaptive retrieval controller
//!
//! Classifies the query, picks a policy, and runs the retrieval pipeline:
//! query expansion, merge/dedupe, MMR diversification, multi-hop expansion,
//! re-ranking, threshold filtering. Each stage produces a fresh chunk list;
//! nothing is mutated in place across stage boundaries.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::intent::{IntentClassification, IntentClassifier, QueryIntent};
use crate::providers::{EmbeddingProvider, VectorSearch};
use crate::retrieval::policy::{PolicyTable, RetrievalPolicy};
use crate::types::{sort_chunks_desc, RetrievedChunk};

/// Chunks fetched per variant, as a multiple of policy.k
const OVERFETCH_FACTOR: usize = 2;
/// Maximum query variants after expansion (original included)
const MAX_EXPANDED_QUERIES: usize = 3;
/// Maximum entity terms followed during the multi-hop pass
const MAX_HOP_TERMS: usize = 5;
/// Chunks kept per multi-hop term
const CHUNKS_PER_HOP: usize = 2;

/// Policy descriptor echoed on the retrieval outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDescriptor {
    pub k: usize,
    pub multi_hop: bool,
    pub strategy: String,
}

/// Retrieval metadata echoed on the outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalMetadata {
    pub chunks_returned: usize,
    pub query_expanded: bool,
    pub reranked: bool,
    pub min_score_threshold: f32,
}

/// Result of one retrieval run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    /// Sorted descending by score, at most `k` entries
    pub chunks: Vec<RetrievedChunk>,
    pub intent: QueryIntent,
    pub intent_confidence: f32,
    pub policy: PolicyDescriptor,
    pub metadata: RetrievalMetadata,
}

/// Controls retrieval behavior based on query intent
pub struct RetrievalController {
    classifier: IntentClassifier,
    policies: PolicyTable,
    embedder: Arc<dyn EmbeddingProvider>,
    search: Arc<dyn VectorSearch>,
    entity_re: Regex,
    quoted_re: Regex,
    digit_re: Regex,
}

impl RetrievalController {
    pub fn new(
        policies: PolicyTable,
        embedder: Arc<dyn EmbeddingProvider>,
        search: Arc<dyn VectorSearch>,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(),
            policies,
            embedder,
            search,
            entity_re: Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b").unwrap(),
            quoted_re: Regex::new(r#""([^"]+)""#).unwrap(),
            digit_re: Regex::new(r"\d").unwrap(),
        }
    }

    /// Retrieve chunks for a query. Search-collaborator failures propagate
    /// unmodified; an empty chunk list is a valid outcome.
    pub async fn retrieve(
        &self,
        query: &str,
        filters: Option<&HashMap<String, String>>,
        override_k: Option<usize>,
        override_policy: Option<RetrievalPolicy>,
    ) -> Result<RetrievalOutcome> {
        let classification = self.classifier.classify(query);

        let mut policy = override_policy
            .unwrap_or_else(|| self.policies.policy_for(classification.primary_intent).clone());
        if let Some(k) = override_k {
            policy.k = k.max(1);
        }

        let variants = if policy.expand_query {
            self.expand_query(query, &classification)
        } else {
            vec![query.to_string()]
        };

        let mut merged: Vec<RetrievedChunk> = Vec::new();
        for variant in &variants {
            let chunks = self
                .search_single(variant, policy.k * OVERFETCH_FACTOR, filters)
                .await?;
            merged.extend(chunks);
        }

        let deduped = dedupe_chunks(merged);

        let selected = if policy.diversity_factor > 0.0 {
            diversify(&deduped, policy.k, policy.diversity_factor)
        } else {
            deduped.iter().take(policy.k).cloned().collect()
        };

        let hopped = if policy.multi_hop && policy.depth > 1 {
            self.multi_hop(&selected, &policy, filters).await?
        } else {
            selected
        };

        let ranked = if policy.rerank {
            rerank_chunks(query, &hopped, classification.primary_intent, &self.digit_re)
        } else {
            hopped
        };

        let mut filtered: Vec<RetrievedChunk> = ranked
            .into_iter()
            .filter(|c| c.score >= policy.min_score_threshold)
            .collect();
        filtered.truncate(policy.k);

        Ok(RetrievalOutcome {
            metadata: RetrievalMetadata {
                chunks_returned: filtered.len(),
                query_expanded: policy.expand_query,
                reranked: policy.rerank,
                min_score_threshold: policy.min_score_threshold,
            },
            chunks: filtered,
            intent: classification.primary_intent,
            intent_confidence: classification.confidence,
            policy: PolicyDescriptor {
                k: policy.k,
                multi_hop: policy.multi_hop,
                strategy: policy.strategy.to_string(),
            },
        })
    }

    async fn search_single(
        &self,
        query: &str,
        k: usize,
        filters: Option<&HashMap<String, String>>,
    ) -> Result<Vec<RetrievedChunk>> {
        let embedding = self
            .embedder
            .embed(query)
            .await
            .context("failed to embed query")?;
        self.search.search(&embedding, k, filters).await
    }

    /// Generate up to two extra query variants, depending on intent
    fn expand_query(&self, query: &str, classification: &IntentClassification) -> Vec<String> {
        let mut expanded = vec![query.to_string()];

        match classification.primary_intent {
            QueryIntent::Comparative => {
                for entity in self.extract_entities(query) {
                    expanded.push(format!("What is {}?", entity));
                }
            }
            QueryIntent::Causal => {
                expanded.push(query.to_lowercase().replace("why", "what causes"));
                expanded.push(query.to_lowercase().replace("why", "what is the result of"));
            }
            QueryIntent::Exploratory => {
                for keyword in classification.keywords.iter().take(2) {
                    expanded.push(format!("{} {}", keyword, query));
                }
            }
            _ => {}
        }

        expanded.truncate(MAX_EXPANDED_QUERIES);
        expanded
    }

    /// Capitalized runs and quoted phrases, up to 3
    fn extract_entities(&self, query: &str) -> Vec<String> {
        let mut entities: Vec<String> = self
            .entity_re
            .find_iter(query)
            .map(|m| m.as_str().to_string())
            .collect();
        for capture in self.quoted_re.captures_iter(query) {
            entities.push(capture[1].to_string());
        }
        entities.truncate(3);
        entities
    }

    /// Follow-up retrievals seeded by entities extracted from the top chunks
    async fn multi_hop(
        &self,
        initial: &[RetrievedChunk],
        policy: &RetrievalPolicy,
        filters: Option<&HashMap<String, String>>,
    ) -> Result<Vec<RetrievedChunk>> {
        let mut terms: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for chunk in initial.iter().take(3) {
            for m in self.entity_re.find_iter(&chunk.text) {
                let term = m.as_str().to_string();
                if seen.insert(term.clone()) {
                    terms.push(term);
                }
            }
        }
        terms.truncate(MAX_HOP_TERMS);

        let mut all = initial.to_vec();
        for term in &terms {
            let hop_chunks = self
                .search_single(term, policy.k * OVERFETCH_FACTOR, filters)
                .await?;
            all.extend(hop_chunks.into_iter().take(CHUNKS_PER_HOP));
        }

        Ok(dedupe_chunks(all))
    }
}

/// Merge duplicates keeping the max score per id, then sort descending.
/// The stable sort breaks ties by original discovery order.
fn dedupe_chunks(chunks: Vec<RetrievedChunk>) -> Vec<RetrievedChunk> {
    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<RetrievedChunk> = Vec::new();

    for chunk in chunks {
        match by_id.get(&chunk.id) {
            Some(&idx) => {
                if chunk.score > unique[idx].score {
                    unique[idx].score = chunk.score;
                }
            }
            None => {
                by_id.insert(chunk.id.clone(), unique.len());
                unique.push(chunk);
            }
        }
    }

    sort_chunks_desc(&mut unique);
    unique
}

/// Maximal-Marginal-Relevance selection: greedily pick the chunk maximizing
/// `diversity x relevance - (1 - diversity) x max_similarity_to_selected`
/// until `k` are chosen or candidates run out. Output is re-sorted descending
/// by score.
fn diversify(chunks: &[RetrievedChunk], k: usize, diversity_factor: f32) -> Vec<RetrievedChunk> {
    if chunks.is_empty() {
        return Vec::new();
    }

    let mut selected = vec![chunks[0].clone()];
    let mut candidates: Vec<RetrievedChunk> = chunks[1..].to_vec();

    while selected.len() < k && !candidates.is_empty() {
        let mut best_idx = 0;
        let mut best_mmr = f32::NEG_INFINITY;

        for (idx, candidate) in candidates.iter().enumerate() {
            let max_sim = selected
                .iter()
                .map(|s| text_similarity(&candidate.text, &s.text))
                .fold(0.0f32, f32::max);
            let mmr = diversity_factor * candidate.score - (1.0 - diversity_factor) * max_sim;
            if mmr > best_mmr {
                best_mmr = mmr;
                best_idx = idx;
            }
        }

        selected.push(candidates.remove(best_idx));
    }

    sort_chunks_desc(&mut selected);
    selected
}

/// Jaccard similarity over lowercase word sets
pub(crate) fn text_similarity(a: &str, b: &str) -> f32 {
    let words_a: HashSet<String> = a.to_lowercase().split_whitespace().map(String::from).collect();
    let words_b: HashSet<String> = b.to_lowercase().split_whitespace().map(String::from).collect();

    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    intersection as f32 / union as f32
}

/// Intent-aware re-ranking: blend the original score with keyword overlap,
/// boosting numeric evidence for factual queries and multi-entity phrasing
/// for comparative ones. Produces a fresh sorted list.
fn rerank_chunks(
    query: &str,
    chunks: &[RetrievedChunk],
    intent: QueryIntent,
    digit_re: &Regex,
) -> Vec<RetrievedChunk> {
    let query_words: HashSet<String> = query
        .to_lowercase()
        .split_whitespace()
        .map(String::from)
        .collect();

    let mut ranked: Vec<RetrievedChunk> = chunks
        .iter()
        .map(|chunk| {
            let text_lower = chunk.text.to_lowercase();
            let text_words: HashSet<&str> = text_lower.split_whitespace().collect();

            let mut overlap = if query_words.is_empty() {
                0.0
            } else {
                let hits = query_words
                    .iter()
                    .filter(|w| text_words.contains(w.as_str()))
                    .count();
                hits as f32 / query_words.len() as f32
            };

            match intent {
                QueryIntent::Factual if digit_re.is_match(&chunk.text) => overlap *= 1.2,
                QueryIntent::Comparative
                    if text_lower.matches(" and ").count() > 1 || text_lower.contains(" vs ") =>
                {
                    overlap *= 1.15
                }
                _ => {}
            }

            let mut reranked = chunk.clone();
            reranked.score = (chunk.score * 0.7 + overlap * 0.3).min(1.0);
            reranked
        })
        .collect();

    sort_chunks_desc(&mut ranked);
    ranked
}
