//! Arena Deterministic Simulation Harness
//!
//! Runs complete Arena experiments against simulated decision makers and a
//! simulated ledger, so that a whole run is reproducible from one seed.
//!
//! # Sources of non-determinism
//!
//! - **Decisions**: seeded random agents biased by priming, plus scripted,
//!   flaky and slow wrappers
//! - **Ledger**: in-memory accounts behind a fault gate (unreachable ledger,
//!   failing accounts, dropped transfers, latency)
//! - **Randomness**: all entropy derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ Orchestrator (arena_core)                            │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │                        │                            │
//! │  ┌────▼────┐              ┌────▼────┐                       │
//! │  │  Agent  │    ...       │  Agent  │   DecisionQuery       │
//! │  │   #1    │              │   #N    │                       │
//! │  └─────────┘              └─────────┘                       │
//! │       │                                                     │
//! │  ┌────▼──────────────────────────────┐                      │
//! │  │ SimLedger  ◄── SimLedgerController │                      │
//! │  └───────────────────────────────────┘                      │
//! └─────────────────────────────────────────────────────────────┘
//!                │
//!          InvariantOracle (conservation, accounting)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use arena_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 16)
//!     .with_rounds(100)
//!     .run(ScenarioId::MixedPriming)
//!     .await;
//! assert!(result.passed);
//! ```

mod agent;
mod exporter;
mod ledger;
mod oracle;
mod priming;
mod runner;
pub mod scenarios;
mod seeds;
mod world;

pub use agent::{FlakyAgent, RandomAgent, ScriptedAgent, SlowAgent};
pub use exporter::SimExport;
pub use ledger::{SimLedger, SimLedgerController};
pub use oracle::{InvariantOracle, Violation};
pub use priming::{Disposition, Priming};
pub use runner::{ScenarioResult, ScenarioRunner};
pub use seeds::DeterministicSeeds;
pub use world::{SimConfig, SimWorld};
