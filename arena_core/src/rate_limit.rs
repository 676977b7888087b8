//! Rate Limiter - per-round quotas on transfers, private messages and broadcasts.

use arena_env::RateLimits;

use crate::types::{Action, ActionKind, RejectReason};

/// Result of applying quotas to one agent's actions for one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimitOutcome {
    /// Valid actions within quota, in parse order
    pub allowed: Vec<Action>,

    /// Invalid actions and actions over quota, in parse order
    pub rejected: Vec<Action>,
}

#[derive(Debug, Default)]
struct QuotaCounter {
    transfers: u32,
    private_messages: u32,
    broadcasts: u32,
}

impl QuotaCounter {
    /// Consumes one unit of quota for the action's kind, if any is left.
    fn try_consume(&mut self, kind: &ActionKind, limits: &RateLimits) -> bool {
        let (used, limit) = match kind {
            ActionKind::Transfer { .. } => (&mut self.transfers, limits.max_transfers),
            ActionKind::DirectMessage { .. } => {
                (&mut self.private_messages, limits.max_private_messages)
            }
            ActionKind::Broadcast { .. } => (&mut self.broadcasts, limits.max_broadcasts),
            ActionKind::Pass => return true,
        };
        if *used >= limit {
            return false;
        }
        *used += 1;
        true
    }
}

/// Splits one agent's actions into allowed and rejected.
///
/// Already-invalid actions go straight to `rejected` without consuming
/// quota; `PASS` never consumes quota.
pub fn apply_limits(actions: Vec<Action>, limits: &RateLimits) -> LimitOutcome {
    let mut counter = QuotaCounter::default();
    let mut outcome = LimitOutcome::default();

    for action in actions {
        if !action.is_valid() {
            outcome.rejected.push(action);
        } else if counter.try_consume(&action.kind, limits) {
            outcome.allowed.push(action);
        } else {
            outcome
                .rejected
                .push(action.reject(RejectReason::RateLimitExceeded));
        }
    }
    outcome
}
