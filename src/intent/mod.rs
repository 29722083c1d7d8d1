//! Query intent classification
//!
//! Pure keyword + regex scoring over a fixed table. No learned state, no
//! side effects; identical input always produces identical output.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Query intent categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    /// Direct facts, dates, names
    Factual,
    /// Comparing multiple entities
    Comparative,
    /// Why/how questions
    Causal,
    /// What is X?
    Definitional,
    /// How to do something
    Procedural,
    /// Programming related
    Code,
    /// Open-ended exploration
    Exploratory,
    Unknown,
}

impl QueryIntent {
    /// All classifiable intents, in scoring order. `Unknown` is the fallback
    /// and never scored directly.
    pub const CLASSIFIABLE: [QueryIntent; 7] = [
        QueryIntent::Factual,
        QueryIntent::Comparative,
        QueryIntent::Causal,
        QueryIntent::Definitional,
        QueryIntent::Procedural,
        QueryIntent::Code,
        QueryIntent::Exploratory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::Factual => "factual",
            QueryIntent::Comparative => "comparative",
            QueryIntent::Causal => "causal",
            QueryIntent::Definitional => "definitional",
            QueryIntent::Procedural => "procedural",
            QueryIntent::Code => "code",
            QueryIntent::Exploratory => "exploratory",
            QueryIntent::Unknown => "unknown",
        }
    }
}

/// Intent classification result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentClassification {
    pub primary_intent: QueryIntent,
    /// Confidence in [0, 1]; 0 when the primary intent is Unknown
    pub confidence: f32,
    /// Up to 3 runner-up intents with score > 0.2
    pub secondary_intents: Vec<(QueryIntent, f32)>,
    /// Keywords from the table that matched the query
    pub keywords: Vec<String>,
    /// Surface features extracted from the query text
    pub features: serde_json::Map<String, JsonValue>,
}

/// Score contributed by each matched keyword
const KEYWORD_WEIGHT: f32 = 0.3;
/// Score contributed by each matched pattern
const PATTERN_WEIGHT: f32 = 0.5;
/// Minimum score for a primary intent; below this the query is Unknown
const PRIMARY_THRESHOLD: f32 = 0.3;
/// Minimum score for a secondary intent
const SECONDARY_THRESHOLD: f32 = 0.2;

struct IntentRule {
    intent: QueryIntent,
    keywords: &'static [&'static str],
    patterns: Vec<Regex>,
}

/// Classifies user query intent from a fixed keyword/pattern table
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
    year_re: Regex,
    digit_re: Regex,
    proper_noun_re: Regex,
}

impl IntentClassifier {
    /// Build the classifier. The rule table is compiled once and immutable
    /// afterwards.
    pub fn new() -> Self {
        let compile = |patterns: &[&str]| -> Vec<Regex> {
            patterns
                .iter()
                .map(|p| Regex::new(p).expect("intent pattern must compile"))
                .collect()
        };

        let rules = vec![
            IntentRule {
                intent: QueryIntent::Factual,
                keywords: &["when", "where", "who", "which", "what year", "how many", "how much"],
                patterns: compile(&[
                    r"when (was|did|will)",
                    r"where (is|was|are)",
                    r"who (is|was|are)",
                    r"what (year|date|time)",
                    r"how (many|much|long|far)",
                ]),
            },
            IntentRule {
                intent: QueryIntent::Comparative,
                keywords: &["compare", "difference", "versus", "vs", "better", "worse", "similar"],
                patterns: compile(&[
                    r"(compare|comparison)",
                    r"(difference|differ) between",
                    r"versus|vs\.",
                    r"(better|worse) than",
                    r"(similar|different) (to|from)",
                ]),
            },
            IntentRule {
                intent: QueryIntent::Causal,
                keywords: &["why", "because", "cause", "reason", "effect", "result", "lead to"],
                patterns: compile(&[
                    r"why (does|did|is|are|was)",
                    r"(cause|caused) by",
                    r"(reason|reasons) (for|why)",
                    r"(result|results) (of|in)",
                    r"(lead|leads|led) to",
                ]),
            },
            IntentRule {
                intent: QueryIntent::Definitional,
                keywords: &["what is", "what are", "define", "definition", "meaning"],
                patterns: compile(&[
                    r"what (is|are) (a|an|the)?\s*\w+",
                    r"define\s+\w+",
                    r"definition of",
                    r"meaning of",
                    r"what does \w+ mean",
                ]),
            },
            IntentRule {
                intent: QueryIntent::Procedural,
                keywords: &["how to", "steps", "process", "method", "procedure", "tutorial"],
                patterns: compile(&[
                    r"how (to|do)",
                    r"(steps|process) (to|for)",
                    r"(method|procedure) (for|to)",
                    r"tutorial (on|for)",
                    r"(guide|instructions) (to|for)",
                ]),
            },
            IntentRule {
                intent: QueryIntent::Code,
                keywords: &["code", "function", "algorithm", "implement", "program", "syntax", "error", "debug"],
                patterns: compile(&[
                    r"(code|coding|program)",
                    r"(function|method|class)",
                    r"(algorithm|implementation)",
                    r"(syntax|error|bug|debug)",
                    r"(python|java|javascript|c\+\+|rust)",
                ]),
            },
            IntentRule {
                intent: QueryIntent::Exploratory,
                keywords: &["tell me about", "explain", "describe", "overview", "summary"],
                patterns: compile(&[
                    r"tell me (about|more)",
                    r"explain\s+\w+",
                    r"describe\s+\w+",
                    r"(overview|summary) of",
                    r"what can you tell",
                ]),
            },
        ];

        Self {
            rules,
            year_re: Regex::new(r"\b\d{4}\b").unwrap(),
            digit_re: Regex::new(r"\d+").unwrap(),
            proper_noun_re: Regex::new(r"[A-Z][a-z]+ [A-Z][a-z]+").unwrap(),
        }
    }

    /// Classify a query. Score per intent is
    /// `0.3 x keywords matched + 0.5 x patterns matched`, capped at 1.0.
    pub fn classify(&self, query: &str) -> IntentClassification {
        let query_lower = query.to_lowercase();

        let mut matched_keywords = Vec::new();
        let mut scored: Vec<(QueryIntent, f32)> = Vec::with_capacity(self.rules.len());

        for rule in &self.rules {
            let mut score = 0.0f32;

            for keyword in rule.keywords {
                if query_lower.contains(keyword) {
                    score += KEYWORD_WEIGHT;
                    matched_keywords.push(keyword.to_string());
                }
            }

            for pattern in &rule.patterns {
                if pattern.is_match(&query_lower) {
                    score += PATTERN_WEIGHT;
                }
            }

            scored.push((rule.intent, score.min(1.0)));
        }

        // Stable sort keeps table order on ties, so the output is
        // deterministic for any input.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let (primary_intent, confidence) = if scored[0].1 > PRIMARY_THRESHOLD {
            scored[0]
        } else {
            (QueryIntent::Unknown, 0.0)
        };

        let secondary_intents: Vec<(QueryIntent, f32)> = scored[1..]
            .iter()
            .take(3)
            .filter(|(_, score)| *score > SECONDARY_THRESHOLD)
            .copied()
            .collect();

        IntentClassification {
            primary_intent,
            confidence,
            secondary_intents,
            keywords: matched_keywords,
            features: self.extract_features(query),
        }
    }

    fn extract_features(&self, query: &str) -> serde_json::Map<String, JsonValue> {
        let mut features = serde_json::Map::new();
        features.insert("query_length".into(), JsonValue::from(query.len()));
        features.insert(
            "word_count".into(),
            JsonValue::from(query.split_whitespace().count()),
        );
        features.insert("has_question_mark".into(), JsonValue::from(query.contains('?')));
        features.insert("has_numbers".into(), JsonValue::from(self.digit_re.is_match(query)));
        features.insert(
            "has_quotes".into(),
            JsonValue::from(query.contains('"') || query.contains('\'')),
        );
        features.insert("is_multiline".into(), JsonValue::from(query.contains('\n')));

        if self.year_re.is_match(query) {
            features.insert("has_year".into(), JsonValue::from(true));
        }
        if self.proper_noun_re.is_match(query) {
            features.insert("has_proper_noun".into(), JsonValue::from(true));
        }

        features
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factual_query() {
        let classifier = IntentClassifier::new();
        let result = classifier.classify("When was AI founded?");
        assert_eq!(result.primary_intent, QueryIntent::Factual);
        assert!(result.confidence > 0.3);
    }

    #[test]
    fn test_comparative_query() {
        let classifier = IntentClassifier::new();
        let result = classifier.classify("What is the difference between Rust and Go?");
        assert_eq!(result.primary_intent, QueryIntent::Comparative);
    }

    #[test]
    fn test_unknown_query_has_zero_confidence() {
        let classifier = IntentClassifier::new();
        let result = classifier.classify("xyzzy plugh");
        assert_eq!(result.primary_intent, QueryIntent::Unknown);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_secondary_intents_bounded() {
        let classifier = IntentClassifier::new();
        let result =
            classifier.classify("Explain why the code comparison between Python and Java matters");
        assert!(result.secondary_intents.len() <= 3);
        for (_, score) in &result.secondary_intents {
            assert!(*score > 0.2);
        }
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = IntentClassifier::new();
        let query = "How many planets are in the solar system?";
        let a = classifier.classify(query);
        let b = classifier.classify(query);
        assert_eq!(a.primary_intent, b.primary_intent);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.secondary_intents, b.secondary_intents);
        assert_eq!(a.keywords, b.keywords);
    }

    #[test]
    fn test_feature_extraction() {
        let classifier = IntentClassifier::new();
        let result = classifier.classify("When was John McCarthy born? 1927?");
        assert_eq!(result.features["has_question_mark"], true);
        assert_eq!(result.features["has_numbers"], true);
        assert_eq!(result.features["has_year"], true);
        assert_eq!(result.features["has_proper_noun"], true);
    }

    #[test]
    fn test_score_capped_at_one() {
        let classifier = IntentClassifier::new();
        let result = classifier
            .classify("when was it, where is it, who is he, what year, how many, how much");
        assert!(result.confidence <= 1.0);
    }
}
