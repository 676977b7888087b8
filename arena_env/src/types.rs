//! Common types shared between the Arena core and its capabilities.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identity of an underlying agent.
///
/// Never shown to other agents; peers only ever see the display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    /// Creates a new random AgentId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic AgentId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Opaque handle to an account held by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountRef(pub String);

impl AccountRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-round quotas for each rate-limited action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    /// Maximum valid SEND actions per agent per round
    pub max_transfers: u32,

    /// Maximum MESSAGE actions per agent per round
    pub max_private_messages: u32,

    /// Maximum BROADCAST actions per agent per round
    pub max_broadcasts: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            max_transfers: 3,
            max_private_messages: 3,
            max_broadcasts: 1,
        }
    }
}

/// A message as presented to an agent in its history window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub round: u32,
    pub from: String,
    /// None for broadcasts
    pub to: Option<String>,
    pub content: String,
}

/// Everything an agent is told before it decides on a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// Underlying identity (for routing to the right model/account)
    pub agent_id: AgentId,

    /// The agent's own display name
    pub display_name: String,

    /// Balance from the start-of-round refresh
    pub balance: u64,

    /// Current round (1-based)
    pub round: u32,

    /// Total rounds in the run
    pub total_rounds: u32,

    /// Display names of every other agent
    pub peers: Vec<String>,

    /// Peers eliminated so far (balance reached zero)
    pub eliminated_peers: Vec<String>,

    /// Broadcasts from the lookback window
    pub public_history: Vec<MessageView>,

    /// Private messages to or from this agent in the lookback window
    pub private_history: Vec<MessageView>,

    /// Rate-limit rules in force
    pub limits: RateLimits,

    /// Smallest amount a SEND may carry
    pub min_transfer_amount: u64,

    /// Optional strategy guidance text
    pub guidance: Option<String>,
}

/// Token accounting reported by a decision query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Raw reply from a decision query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Free-form text, parsed by the core's action parser
    pub text: String,

    pub usage: TokenUsage,
}

impl Decision {
    /// Creates a decision with no token accounting.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }
}
