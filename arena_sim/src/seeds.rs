//! Deterministic seed derivation for simulated agents.

use arena_env::{AccountRef, AgentId};

/// Derives every per-agent and per-subsystem seed from one master seed.
///
/// Derived values are:
/// - Deterministic: same master seed, same values
/// - Unique: each agent gets its own seed, identity and account
/// - Isolated: changing the agent count doesn't affect other agents' values
#[derive(Debug, Clone, Copy)]
pub struct DeterministicSeeds {
    master_seed: u64,
}

impl DeterministicSeeds {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Seed for an agent's behaviour RNG.
    pub fn agent_seed(&self, index: u64) -> u64 {
        self.master_seed
            .wrapping_mul(0x9e3779b97f4a7c15) // Golden ratio prime
            .wrapping_add(index.wrapping_mul(0x517cc1b727220a95))
    }

    pub fn agent_id(&self, index: u64) -> AgentId {
        AgentId::from_seed(self.agent_seed(index))
    }

    pub fn account(&self, index: u64) -> AccountRef {
        AccountRef::new(format!("sim-{:016x}", self.agent_seed(index)))
    }

    /// Seed for ledger fault injection, separate from agent behaviour.
    pub fn fault_seed(&self) -> u64 {
        self.master_seed.wrapping_mul(0x3c6ef372fe94f82b)
    }
}
