//! Arena Capability Abstraction Layer
//!
//! This crate defines the external capabilities the Arena core consumes,
//! so that the same round loop can run against real collaborators
//! (language models, a real settlement system) or against the simulation
//! harness.
//!
//! # Capabilities
//!
//! - **Decision queries**: `DecisionQuery` turns a `DecisionRequest` into
//!   free-form text
//! - **Ledger**: `Ledger` holds authoritative balances and moves funds
//!
//! Neither capability is trusted to behave: both may fail, hang, or (for
//! decision queries) return unusable text. The core wraps every call in a
//! timeout and recovers locally.
//!
//! # Example
//!
//! ```ignore
//! use arena_env::{AccountRef, InMemoryLedger, Ledger};
//!
//! let ledger = InMemoryLedger::new(16_000);
//! ledger.fund(&AccountRef::new("acct-1"), 1_000).await?;
//! ```

mod decision;
mod error;
mod ledger;
mod memory_impl;
mod types;

pub use decision::DecisionQuery;
pub use error::EnvError;
pub use ledger::Ledger;
pub use memory_impl::InMemoryLedger;
pub use types::{
    AccountRef, AgentId, Decision, DecisionRequest, MessageView, RateLimits, TokenUsage,
};
