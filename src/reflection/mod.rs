//! Reflection loop: accept, retry, escalate, or refuse

mod agent;
mod types;

pub use agent::{ReflectionAgent, DEFAULT_HALLUCINATION_THRESHOLD, DEFAULT_MAX_ITERATIONS};
pub use types::{ReflectionAction, ReflectionDecision, ReflectionResult};
