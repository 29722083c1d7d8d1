//! Claim-level answer verification

mod engine;
mod types;

pub use engine::{extract_claims, VerificationEngine, VerifierConfig};
pub use types::{
    AnswerVerification, Claim, ClaimType, ClaimVerification, CorrectionKind, CorrectionSuggestion,
    SupportingChunk,
};
