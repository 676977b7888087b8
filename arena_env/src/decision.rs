//! Decision query capability: the "reasoning" side of an agent.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{Decision, DecisionRequest};

/// The interface the orchestrator uses to ask an agent what it does this round.
///
/// # Implementations
///
/// - **Production**: wraps a language model client and renders the request
///   into a prompt (outside this workspace)
/// - **Simulation**: scripted or seeded-random agents in `arena_sim`
///
/// # Contract
///
/// The returned text is free-form and is handed to the action parser as-is.
/// Implementations may fail or return garbage; the orchestrator tolerates
/// both and applies its own timeout around every call.
#[async_trait]
pub trait DecisionQuery: Send + Sync + 'static {
    /// Produces the raw reply for one agent in one round.
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, EnvError>;

    /// Returns a label for logging (e.g. model family).
    fn name(&self) -> &str;
}
