//! Content policy checks run before and after summarization.

mod guards;
mod pre_llm;

pub use guards::{PaywallDetector, PolicyGuard};
pub use pre_llm::PreLlmChecker;
