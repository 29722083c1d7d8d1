//! Per-intent retrieval policies
//!
//! One fixed policy per intent, built once at startup into an immutable
//! table and injected into the controller.

use serde::Serialize;
use std::collections::HashMap;

use crate::intent::QueryIntent;

/// Retrieval policy for a single intent
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalPolicy {
    /// Number of chunks to return; always >= 1
    pub k: usize,
    /// Search depth; depth > 1 enables the multi-hop pass
    pub depth: usize,
    pub multi_hop: bool,
    pub rerank: bool,
    /// Relevance/diversity trade-off in [0, 1]; 0 disables MMR
    pub diversity_factor: f32,
    /// Minimum score a chunk must reach to be returned, in [0, 1]
    pub min_score_threshold: f32,
    pub expand_query: bool,
    /// Short label describing the retrieval strategy
    pub strategy: &'static str,
}

/// Immutable intent -> policy map
pub struct PolicyTable {
    policies: HashMap<QueryIntent, RetrievalPolicy>,
    fallback: RetrievalPolicy,
}

impl PolicyTable {
    /// Build the standard policy table
    pub fn standard() -> Self {
        let fallback = RetrievalPolicy {
            k: 5,
            depth: 1,
            multi_hop: false,
            rerank: false,
            diversity_factor: 0.3,
            min_score_threshold: 0.5,
            expand_query: false,
            strategy: "default",
        };

        let mut policies = HashMap::new();
        policies.insert(
            QueryIntent::Factual,
            RetrievalPolicy {
                k: 3,
                depth: 1,
                multi_hop: false,
                rerank: true,
                diversity_factor: 0.1,
                min_score_threshold: 0.7,
                expand_query: false,
                strategy: "precise",
            },
        );
        policies.insert(
            QueryIntent::Comparative,
            RetrievalPolicy {
                k: 8,
                depth: 2,
                multi_hop: true,
                rerank: true,
                diversity_factor: 0.5,
                min_score_threshold: 0.5,
                expand_query: true,
                strategy: "broad",
            },
        );
        policies.insert(
            QueryIntent::Causal,
            RetrievalPolicy {
                k: 6,
                depth: 2,
                multi_hop: true,
                rerank: true,
                diversity_factor: 0.3,
                min_score_threshold: 0.6,
                expand_query: true,
                strategy: "chain",
            },
        );
        policies.insert(
            QueryIntent::Definitional,
            RetrievalPolicy {
                k: 4,
                depth: 1,
                multi_hop: false,
                rerank: true,
                diversity_factor: 0.2,
                min_score_threshold: 0.65,
                expand_query: false,
                strategy: "focused",
            },
        );
        policies.insert(
            QueryIntent::Procedural,
            RetrievalPolicy {
                k: 7,
                depth: 1,
                multi_hop: false,
                rerank: true,
                diversity_factor: 0.2,
                min_score_threshold: 0.6,
                expand_query: false,
                strategy: "sequential",
            },
        );
        policies.insert(
            QueryIntent::Code,
            RetrievalPolicy {
                k: 5,
                depth: 1,
                multi_hop: false,
                rerank: true,
                diversity_factor: 0.1,
                min_score_threshold: 0.7,
                expand_query: false,
                strategy: "technical",
            },
        );
        policies.insert(
            QueryIntent::Exploratory,
            RetrievalPolicy {
                k: 10,
                depth: 2,
                multi_hop: true,
                rerank: false,
                diversity_factor: 0.6,
                min_score_threshold: 0.4,
                expand_query: true,
                strategy: "exploratory",
            },
        );
        policies.insert(QueryIntent::Unknown, fallback.clone());

        Self { policies, fallback }
    }

    /// Policy for an intent; unknown intents get the fallback policy
    pub fn policy_for(&self, intent: QueryIntent) -> &RetrievalPolicy {
        self.policies.get(&intent).unwrap_or(&self.fallback)
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_intent_has_a_policy() {
        let table = PolicyTable::standard();
        for intent in QueryIntent::CLASSIFIABLE {
            let policy = table.policy_for(intent);
            assert!(policy.k >= 1);
            assert!(policy.diversity_factor >= 0.0 && policy.diversity_factor <= 1.0);
            assert!(policy.min_score_threshold >= 0.0 && policy.min_score_threshold <= 1.0);
        }
        assert_eq!(table.policy_for(QueryIntent::Unknown).strategy, "default");
    }

    #[test]
    fn test_factual_policy_is_precise() {
        let table = PolicyTable::standard();
        let policy = table.policy_for(QueryIntent::Factual);
        assert_eq!(policy.k, 3);
        assert!(policy.rerank);
        assert!(!policy.multi_hop);
        assert_eq!(policy.strategy, "precise");
    }

    #[test]
    fn test_exploratory_policy_is_broadest() {
        let table = PolicyTable::standard();
        let policy = table.policy_for(QueryIntent::Exploratory);
        assert_eq!(policy.k, 10);
        assert!(policy.expand_query);
        assert!(policy.multi_hop && policy.depth > 1);
        assert!(!policy.rerank);
    }
}
