//! Arena Core - Round-Based Multi-Agent Economic Simulation
//!
//! A closed population of agents repeatedly proposes free-text actions.
//! Each round the core:
//! 1. **Parses** replies into a small action language (`SEND`, `MESSAGE`, `BROADCAST`, `PASS`)
//! 2. **Limits** each agent's actions with per-kind quotas
//! 3. **Executes** transfers one at a time against the external ledger
//! 4. **Routes** broadcasts and private messages, then logs the round
//!
//! The reasoning capability and the ledger live behind the traits of
//! `arena_env`. After the last round the `Analyzer` computes inequality,
//! network, faction, deception and trajectory metrics over the event log.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod event_log;
pub mod identity;
pub mod orchestrator;
pub mod parser;
pub mod persistence;
pub mod rate_limit;
pub mod router;
pub mod transfer;
pub mod types;

// Re-export key types for convenience
pub use analyzer::{gini, AnalysisReport, Analyzer};
pub use config::{load_config, ArenaConfig};
pub use error::ArenaError;
pub use event_log::{AgentActions, AgentBalance, EventLog, RoundSummary};
pub use identity::IdentityMap;
pub use orchestrator::{AgentSeat, Orchestrator, QueryStats, RunPhase, RunReport};
pub use parser::parse;
pub use persistence::{EventSink, MemoryEventStore, SledEventStore};
pub use rate_limit::{apply_limits, LimitOutcome};
pub use router::MessageRouter;
pub use transfer::{BalanceCache, TransferExecutor};
pub use types::{
    Action, ActionKind, Agent, Channel, Message, RejectReason, Transfer, TransferFailure,
    TransferOutcome,
};
