//! Data model shared by every Arena component.
//!
//! All participants are referred to by display name. The underlying
//! `AgentId` only appears on `Agent` and in decision requests.

use arena_env::{AccountRef, AgentId, MessageView};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// AGENTS
// =============================================================================

/// One participant as seen by the balance cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,

    /// Anonymized name, fixed for the run
    pub display_name: String,

    /// Handle to the ledger account
    pub account: AccountRef,

    /// Last known balance (refreshed at round boundaries)
    pub balance: u64,

    /// Set once the balance reaches zero; never cleared
    pub eliminated: bool,
}

// =============================================================================
// ACTIONS
// =============================================================================

/// Why a parsed action will not be carried out.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("amount must be positive")]
    NonPositiveAmount,

    #[error("amount out of range")]
    AmountOutOfRange,

    #[error("unknown target")]
    UnknownTarget,

    #[error("self-transfer")]
    SelfTransfer,

    #[error("self-message")]
    SelfMessage,

    #[error("rate limit exceeded")]
    RateLimitExceeded,
}

/// What an action asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    /// `SEND <amount> TO <agent>`
    Transfer { target: String, amount: i64 },

    /// `MESSAGE <agent> "<text>"`
    DirectMessage { target: String, content: String },

    /// `BROADCAST "<text>"`
    Broadcast { content: String },

    /// `PASS`, or the implicit action for an empty/unusable reply
    Pass,
}

/// A parsed action from one agent in one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Display name of the acting agent
    pub source: String,

    #[serde(flatten)]
    pub kind: ActionKind,

    /// Present when the action is invalid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectReason>,
}

impl Action {
    pub fn pass(source: &str) -> Self {
        Self::new(source, ActionKind::Pass)
    }

    pub fn transfer(source: &str, target: &str, amount: i64) -> Self {
        Self::new(
            source,
            ActionKind::Transfer {
                target: target.to_string(),
                amount,
            },
        )
    }

    pub fn direct_message(source: &str, target: &str, content: &str) -> Self {
        Self::new(
            source,
            ActionKind::DirectMessage {
                target: target.to_string(),
                content: content.to_string(),
            },
        )
    }

    pub fn broadcast(source: &str, content: &str) -> Self {
        Self::new(
            source,
            ActionKind::Broadcast {
                content: content.to_string(),
            },
        )
    }

    fn new(source: &str, kind: ActionKind) -> Self {
        Self {
            source: source.to_string(),
            kind,
            rejection: None,
        }
    }

    /// Marks the action invalid. The first reason recorded is kept.
    pub fn reject(mut self, reason: RejectReason) -> Self {
        if self.rejection.is_none() {
            self.rejection = Some(reason);
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        self.rejection.is_none()
    }

    pub fn is_pass(&self) -> bool {
        matches!(self.kind, ActionKind::Pass)
    }

    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            ActionKind::Transfer { target, .. } | ActionKind::DirectMessage { target, .. } => {
                Some(target)
            }
            _ => None,
        }
    }

    pub fn amount(&self) -> Option<i64> {
        match self.kind {
            ActionKind::Transfer { amount, .. } => Some(amount),
            _ => None,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match &self.kind {
            ActionKind::DirectMessage { content, .. } | ActionKind::Broadcast { content } => {
                Some(content)
            }
            _ => None,
        }
    }
}

// =============================================================================
// TRANSFERS
// =============================================================================

/// Why the transfer executor refused or failed to move funds.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferFailure {
    #[error("unknown source")]
    UnknownSource,

    #[error("unknown target")]
    UnknownTarget,

    #[error("self-transfer")]
    SelfTransfer,

    #[error("source eliminated")]
    Eliminated,

    #[error("amount {amount} below minimum {minimum}")]
    BelowMinimum { amount: u64, minimum: u64 },

    #[error("insufficient balance: has {balance}, needs {requested}")]
    InsufficientBalance { balance: u64, requested: u64 },

    #[error("ledger failure: {0}")]
    Ledger(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransferOutcome {
    Applied,
    Rejected { reason: TransferFailure },
}

/// A single attempt to move funds. Either fully applied or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub round: u32,
    pub from: String,
    pub to: String,
    pub amount: u64,
    #[serde(flatten)]
    pub outcome: TransferOutcome,
}

impl Transfer {
    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, TransferOutcome::Applied)
    }

    pub fn failure(&self) -> Option<&TransferFailure> {
        match &self.outcome {
            TransferOutcome::Applied => None,
            TransferOutcome::Rejected { reason } => Some(reason),
        }
    }
}

// =============================================================================
// MESSAGES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub round: u32,
    pub from: String,
    /// None for broadcasts
    pub to: Option<String>,
    pub content: String,
    pub channel: Channel,
}

impl Message {
    /// Converts to the form shown to agents in their history.
    pub fn to_view(&self) -> MessageView {
        MessageView {
            round: self.round,
            from: self.from.clone(),
            to: self.to.clone(),
            content: self.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_keeps_first_reason() {
        let action = Action::transfer("Agent-1", "Agent-1", 0)
            .reject(RejectReason::NonPositiveAmount)
            .reject(RejectReason::SelfTransfer);
        assert_eq!(action.rejection, Some(RejectReason::NonPositiveAmount));
        assert!(!action.is_valid());
    }

    #[test]
    fn test_reason_display_strings() {
        assert_eq!(RejectReason::SelfTransfer.to_string(), "self-transfer");
        assert_eq!(RejectReason::RateLimitExceeded.to_string(), "rate limit exceeded");
        assert_eq!(
            TransferFailure::InsufficientBalance { balance: 100, requested: 200 }.to_string(),
            "insufficient balance: has 100, needs 200"
        );
    }

    #[test]
    fn test_action_serializes_flat() {
        let action = Action::transfer("Agent-1", "Agent-3", 50);
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "transfer");
        assert_eq!(json["amount"], 50);
        assert!(json.get("rejection").is_none());
    }
}
