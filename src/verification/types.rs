//! Claim-level verification types

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Kind of claim a sentence makes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimType {
    Factual,
    Opinion,
    Procedural,
    Causal,
    Question,
    Statement,
}

/// One verifiable span of the generated answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub text: String,
    pub sentence_idx: usize,
    /// Byte range of the claim within the answer, when locatable
    pub span: Option<(usize, usize)>,
    pub claim_type: ClaimType,
}

/// Reference to a chunk that supports a claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportingChunk {
    pub chunk_id: String,
    pub score: f32,
}

/// Verification verdict for a single claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimVerification {
    pub claim: Claim,
    pub supported: bool,
    /// At most 3 supporting chunks
    pub supporting_chunks: Vec<SupportingChunk>,
    pub confidence: f32,
    pub explanation: String,
}

/// Aggregate verification verdict for a whole answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerVerification {
    pub answer: String,
    pub claims: Vec<Claim>,
    pub results: Vec<ClaimVerification>,
    /// supported / max(total_claims, 1)
    pub support_ratio: f32,
    /// Always exactly 1 - support_ratio
    pub hallucination_score: f32,
    pub unsupported_claims: Vec<Claim>,
    pub metadata: serde_json::Map<String, JsonValue>,
}

/// Suggested fix for an unsupported claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionSuggestion {
    pub claim_text: String,
    pub span: Option<(usize, usize)>,
    pub kind: CorrectionKind,
    pub explanation: String,
    /// Replacement text, present only for `Replace`
    pub suggested_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionKind {
    Remove,
    Replace,
}
