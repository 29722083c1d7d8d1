//! Reflection decision types

use serde::{Deserialize, Serialize};

use crate::verification::AnswerVerification;

/// Action the reflection agent takes after a verification pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReflectionAction {
    /// Answer is well-supported; terminal
    Accept,
    /// Regenerate with the same chunks
    Regenerate,
    /// Re-retrieve with doubled k, then regenerate
    Broaden,
    /// One retry at raised temperature
    Escalate,
    /// No reliable answer possible; terminal
    Refuse,
}

impl ReflectionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReflectionAction::Accept => "accept",
            ReflectionAction::Regenerate => "regenerate",
            ReflectionAction::Broaden => "broaden",
            ReflectionAction::Escalate => "escalate",
            ReflectionAction::Refuse => "refuse",
        }
    }
}

/// One decision in the reflection trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionDecision {
    pub action: ReflectionAction,
    pub confidence: f32,
    pub reasoning: String,
}

/// Outcome of the whole reflection loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionResult {
    pub original_answer: String,
    pub final_answer: String,
    /// The last verification measured inside the loop
    pub verification: AnswerVerification,
    /// Ordered decision trail, one entry per verification pass
    pub decisions: Vec<ReflectionDecision>,
    pub iterations: usize,
    pub success: bool,
}
