//! Intent-adaptive retrieval

mod controller;
mod policy;

pub use controller::{PolicyDescriptor, RetrievalController, RetrievalMetadata, RetrievalOutcome};
pub use policy::{PolicyTable, RetrievalPolicy};
