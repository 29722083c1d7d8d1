//! Stateful reflection loop over generated answers
//!
//! Verifies the current answer, then accepts, retries, escalates, or
//! refuses. The loop performs at most `max_iterations` verification passes;
//! success is judged on the last one measured. Loop state (current answer,
//! current chunks, decision trail) lives in an explicit record rather than
//! agent fields.

use anyhow::{Context, Result};

use crate::providers::Generator;
use crate::reflection::types::{ReflectionAction, ReflectionDecision, ReflectionResult};
use crate::retrieval::RetrievalController;
use crate::types::RetrievedChunk;
use crate::verification::{AnswerVerification, VerificationEngine};

/// Default verification passes before giving up
pub const DEFAULT_MAX_ITERATIONS: usize = 3;
/// Default maximum acceptable hallucination score
pub const DEFAULT_HALLUCINATION_THRESHOLD: f32 = 0.3;
/// Temperature raise applied for the escalation retry
const ESCALATION_TEMPERATURE_STEP: f32 = 0.2;
/// Support ratio below which refusing beats another retry
const REFUSAL_SUPPORT_FLOOR: f32 = 0.2;

/// Mutable state threaded through the loop iterations
struct LoopState {
    answer: String,
    chunks: Vec<RetrievedChunk>,
    decisions: Vec<ReflectionDecision>,
}

/// Agent that reflects on generated answers and improves or refuses them
pub struct ReflectionAgent {
    verifier: VerificationEngine,
    max_iterations: usize,
    hallucination_threshold: f32,
}

impl ReflectionAgent {
    pub fn new(verifier: VerificationEngine) -> Self {
        Self::with_limits(verifier, DEFAULT_MAX_ITERATIONS, DEFAULT_HALLUCINATION_THRESHOLD)
    }

    pub fn with_limits(
        verifier: VerificationEngine,
        max_iterations: usize,
        hallucination_threshold: f32,
    ) -> Self {
        Self {
            verifier,
            max_iterations: max_iterations.max(1),
            hallucination_threshold,
        }
    }

    /// Run the bounded accept/retry/refuse loop. Generation or retrieval
    /// failures propagate and abort the request. Without a generator the
    /// loop terminates on the initial verification.
    pub async fn reflect_on_answer(
        &self,
        answer: &str,
        query: &str,
        chunks: &[RetrievedChunk],
        generator: Option<&dyn Generator>,
        retriever: Option<&RetrievalController>,
    ) -> Result<ReflectionResult> {
        let original_answer = answer.to_string();
        let mut state = LoopState {
            answer: answer.to_string(),
            chunks: chunks.to_vec(),
            decisions: Vec::new(),
        };

        let mut iterations = 0usize;
        let mut last_verification: Option<AnswerVerification> = None;

        while iterations < self.max_iterations {
            iterations += 1;

            let verification = self
                .verifier
                .verify_answer(&state.answer, &state.chunks, Some(query))
                .await;

            let decision = self.make_decision(&verification, iterations);
            state.decisions.push(decision.clone());

            match decision.action {
                ReflectionAction::Accept => {
                    return Ok(ReflectionResult {
                        original_answer,
                        final_answer: state.answer,
                        verification,
                        decisions: state.decisions,
                        iterations,
                        success: true,
                    });
                }
                ReflectionAction::Refuse => {
                    let refusal = refusal_message(query, &verification);
                    return Ok(ReflectionResult {
                        original_answer,
                        final_answer: refusal,
                        verification,
                        decisions: state.decisions,
                        iterations,
                        success: false,
                    });
                }
                ReflectionAction::Regenerate => {
                    let Some(generator) = generator else {
                        last_verification = Some(verification);
                        break;
                    };
                    let result = generator
                        .generate(query, &state.chunks, None)
                        .await
                        .context("regeneration failed")?;
                    state.answer = result.answer;
                }
                ReflectionAction::Broaden => {
                    let (Some(generator), Some(retriever)) = (generator, retriever) else {
                        last_verification = Some(verification);
                        break;
                    };
                    let outcome = retriever
                        .retrieve(query, None, Some(state.chunks.len() * 2), None)
                        .await
                        .context("broadened retrieval failed")?;
                    state.chunks = outcome.chunks;
                    let result = generator
                        .generate(query, &state.chunks, None)
                        .await
                        .context("regeneration after broadening failed")?;
                    state.answer = result.answer;
                }
                ReflectionAction::Escalate => {
                    let Some(generator) = generator else {
                        last_verification = Some(verification);
                        break;
                    };
                    // The raise applies to this call only; the generator's
                    // base temperature is never touched.
                    let raised =
                        (generator.base_temperature() + ESCALATION_TEMPERATURE_STEP).min(1.0);
                    let result = generator
                        .generate(query, &state.chunks, Some(raised))
                        .await
                        .context("escalated generation failed")?;
                    state.answer = result.answer;
                }
            }

            last_verification = Some(verification);
        }

        // Loop budget exhausted (or a needed collaborator was absent):
        // success is judged on the last verification measured in the loop.
        // The fallback arm is unreachable while max_iterations >= 1.
        let verification = match last_verification {
            Some(verification) => verification,
            None => {
                self.verifier
                    .verify_answer(&state.answer, &state.chunks, Some(query))
                    .await
            }
        };
        let success = verification.hallucination_score <= self.hallucination_threshold;

        Ok(ReflectionResult {
            original_answer,
            final_answer: state.answer,
            verification,
            decisions: state.decisions,
            iterations,
            success,
        })
    }

    fn make_decision(
        &self,
        verification: &AnswerVerification,
        iteration: usize,
    ) -> ReflectionDecision {
        let hallucination = verification.hallucination_score;
        let support = verification.support_ratio;

        if hallucination <= self.hallucination_threshold {
            return ReflectionDecision {
                action: ReflectionAction::Accept,
                confidence: support,
                reasoning: format!(
                    "answer is well-supported ({:.0}% of claims verified)",
                    support * 100.0
                ),
            };
        }

        if iteration == 1 {
            return ReflectionDecision {
                action: ReflectionAction::Regenerate,
                confidence: 0.5,
                reasoning: format!(
                    "high hallucination score ({:.0}%), trying regeneration",
                    hallucination * 100.0
                ),
            };
        }

        if iteration == 2 {
            return ReflectionDecision {
                action: ReflectionAction::Broaden,
                confidence: 0.3,
                reasoning: "regeneration did not help, broadening retrieval".to_string(),
            };
        }

        if support < REFUSAL_SUPPORT_FLOOR {
            return ReflectionDecision {
                action: ReflectionAction::Refuse,
                confidence: 0.1,
                reasoning: "insufficient source support for query".to_string(),
            };
        }

        ReflectionDecision {
            action: ReflectionAction::Escalate,
            confidence: 0.2,
            reasoning: "retrying with raised temperature".to_string(),
        }
    }

    /// Human-readable rendering of the reflection process
    pub fn explain_decision(&self, result: &ReflectionResult) -> String {
        let mut lines = Vec::new();

        if result.success {
            lines.push(format!(
                "answer verified after {} iteration(s)",
                result.iterations
            ));
        } else {
            lines.push(format!(
                "answer could not be fully verified after {} iteration(s)",
                result.iterations
            ));
        }

        lines.push(format!(
            "support ratio: {:.0}%, hallucination score: {:.0}%",
            result.verification.support_ratio * 100.0,
            result.verification.hallucination_score * 100.0
        ));

        lines.push("decision trail:".to_string());
        for (i, decision) in result.decisions.iter().enumerate() {
            lines.push(format!(
                "  {}. {}: {}",
                i + 1,
                decision.action.as_str(),
                decision.reasoning
            ));
        }

        if !result.verification.unsupported_claims.is_empty() {
            lines.push("unsupported claims:".to_string());
            for claim in result.verification.unsupported_claims.iter().take(3) {
                lines.push(format!("  - {}", claim.text));
            }
        }

        lines.join("\n")
    }
}

/// Fixed refusal template citing the unsupported-claim count
fn refusal_message(query: &str, verification: &AnswerVerification) -> String {
    format!(
        "I cannot provide a reliable answer to your query: '{}'. \
         Based on the available sources, {} out of {} claims could not be \
         verified. Please provide more specific information or rephrase \
         your query.",
        query,
        verification.unsupported_claims.len(),
        verification.claims.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::EmbeddingProvider;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NullEmbedder;

    #[async_trait]
    impl EmbeddingProvider for NullEmbedder {
        fn model_id(&self) -> &str {
            "null"
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0])
        }
    }

    fn agent(max_iterations: usize) -> ReflectionAgent {
        let verifier = VerificationEngine::new(Arc::new(NullEmbedder));
        ReflectionAgent::with_limits(verifier, max_iterations, DEFAULT_HALLUCINATION_THRESHOLD)
    }

    fn verification_with(support_ratio: f32, claim_count: usize) -> AnswerVerification {
        AnswerVerification {
            answer: "test".to_string(),
            claims: Vec::new(),
            results: Vec::new(),
            support_ratio,
            hallucination_score: 1.0 - support_ratio,
            unsupported_claims: (0..claim_count)
                .map(|i| crate::verification::Claim {
                    text: format!("claim {}", i),
                    sentence_idx: i,
                    span: None,
                    claim_type: crate::verification::ClaimType::Statement,
                })
                .collect(),
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_decision_accept_when_supported() {
        let agent = agent(3);
        let decision = agent.make_decision(&verification_with(0.9, 0), 1);
        assert_eq!(decision.action, ReflectionAction::Accept);
    }

    #[test]
    fn test_decision_ladder() {
        let agent = agent(3);
        let bad = verification_with(0.0, 2);
        assert_eq!(agent.make_decision(&bad, 1).action, ReflectionAction::Regenerate);
        assert_eq!(agent.make_decision(&bad, 2).action, ReflectionAction::Broaden);
        assert_eq!(agent.make_decision(&bad, 3).action, ReflectionAction::Refuse);

        let mediocre = verification_with(0.5, 1);
        assert_eq!(agent.make_decision(&mediocre, 3).action, ReflectionAction::Escalate);
    }

    #[tokio::test]
    async fn test_no_generator_terminates_on_first_verification() {
        let agent = agent(3);
        let result = agent
            .reflect_on_answer(
                "Nothing in the sources backs this claim at all.",
                "test query",
                &[],
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(result.iterations, 1);
        assert_eq!(result.decisions.len(), 1);
        assert!(!result.success);
    }

    #[test]
    fn test_refusal_message_cites_counts() {
        let verification = verification_with(0.0, 3);
        let message = refusal_message("who?", &verification);
        assert!(message.contains("3 out of 0"));
        assert!(message.contains("who?"));
    }
}
