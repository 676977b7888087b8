//! Round Event Log - the permanent, append-only record of a run.

use serde::{Deserialize, Serialize};

use crate::types::{Action, Message, Transfer};

/// Balance of one agent at a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentBalance {
    pub agent: String,
    pub balance: u64,
}

/// Everything one agent did in one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentActions {
    pub agent: String,

    /// Actions that passed validation and rate limiting
    pub allowed: Vec<Action>,

    /// Invalid or over-quota actions, with reasons
    pub rejected: Vec<Action>,
}

/// Snapshot of one closed round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: u32,

    /// Balances after the start-of-round refresh, presentation order
    pub balances_before: Vec<AgentBalance>,

    /// Balances after the end-of-round refresh, presentation order
    pub balances_after: Vec<AgentBalance>,

    pub actions: Vec<AgentActions>,

    /// Every attempted transfer, applied or rejected, in execution order
    pub transfers: Vec<Transfer>,

    pub messages: Vec<Message>,

    /// Agents whose balance went from positive to zero this round
    pub newly_eliminated: Vec<String>,

    /// Agents whose decision query failed and were defaulted to PASS
    pub failed_queries: Vec<String>,
}

impl RoundSummary {
    pub fn total_before(&self) -> u64 {
        self.balances_before.iter().map(|b| b.balance).sum()
    }

    pub fn total_after(&self) -> u64 {
        self.balances_after.iter().map(|b| b.balance).sum()
    }

    pub fn applied_transfers(&self) -> impl Iterator<Item = &Transfer> {
        self.transfers.iter().filter(|t| t.is_applied())
    }

    /// Units moved by applied transfers this round.
    pub fn applied_volume(&self) -> u64 {
        self.applied_transfers().map(|t| t.amount).sum()
    }

    pub fn balance_after(&self, agent: &str) -> Option<u64> {
        self.balances_after
            .iter()
            .find(|b| b.agent == agent)
            .map(|b| b.balance)
    }
}

/// Append-only sequence of round summaries for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    rounds: Vec<RoundSummary>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, summary: RoundSummary) {
        self.rounds.push(summary);
    }

    pub fn rounds(&self) -> &[RoundSummary] {
        &self.rounds
    }

    pub fn last(&self) -> Option<&RoundSummary> {
        self.rounds.last()
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn transfers(&self) -> impl Iterator<Item = &Transfer> {
        self.rounds.iter().flat_map(|r| r.transfers.iter())
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.rounds.iter().flat_map(|r| r.messages.iter())
    }

    /// Balances after the last round, or empty if no round ran.
    pub fn final_balances(&self) -> &[AgentBalance] {
        self.rounds
            .last()
            .map(|r| r.balances_after.as_slice())
            .unwrap_or(&[])
    }
}
