//! Invariant oracle for simulated runs.
//!
//! The oracle knows the ground truth the core cannot see: how many units
//! the settlement authority put into circulation. It replays every round of
//! the event log and checks the economic invariants against that.

use std::collections::{HashMap, HashSet};

use arena_core::{EventLog, RoundSummary};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A broken invariant, located by round.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    #[error("round {round}: total {actual} differs from supply {expected}")]
    SupplyChanged { round: u32, expected: u64, actual: u64 },

    #[error("round {round}: {agent} ended at {actual}, transfers imply {expected}")]
    BalanceMismatch {
        round: u32,
        agent: String,
        expected: i128,
        actual: u64,
    },

    #[error("round {round}: {agent} eliminated more than once")]
    DoubleElimination { round: u32, agent: String },

    #[error("round {round}: rounds out of order (previous {previous})")]
    RoundOrder { round: u32, previous: u32 },
}

/// Checks conservation, per-agent accounting, elimination monotonicity
/// and round ordering.
pub struct InvariantOracle {
    expected_supply: u64,
}

impl InvariantOracle {
    /// `expected_supply` is the sum of all balances once setup funded them.
    pub fn new(expected_supply: u64) -> Self {
        Self { expected_supply }
    }

    pub fn check(&self, log: &EventLog) -> Vec<Violation> {
        let mut violations = Vec::new();
        let mut eliminated: HashSet<&str> = HashSet::new();
        let mut previous = 0;

        for round in log.rounds() {
            if round.round <= previous {
                violations.push(Violation::RoundOrder {
                    round: round.round,
                    previous,
                });
            }
            previous = round.round;

            for total in [round.total_before(), round.total_after()] {
                if total != self.expected_supply {
                    violations.push(Violation::SupplyChanged {
                        round: round.round,
                        expected: self.expected_supply,
                        actual: total,
                    });
                }
            }

            violations.extend(check_accounting(round));

            for agent in &round.newly_eliminated {
                if !eliminated.insert(agent.as_str()) {
                    violations.push(Violation::DoubleElimination {
                        round: round.round,
                        agent: agent.clone(),
                    });
                }
            }
        }
        violations
    }
}

/// Each agent's after-balance must equal before, minus applied outgoing,
/// plus applied incoming transfers. Rejected transfers move nothing.
fn check_accounting(round: &RoundSummary) -> Vec<Violation> {
    let mut expected: HashMap<&str, i128> = round
        .balances_before
        .iter()
        .map(|b| (b.agent.as_str(), b.balance as i128))
        .collect();

    for transfer in round.applied_transfers() {
        *expected.entry(transfer.from.as_str()).or_default() -= transfer.amount as i128;
        *expected.entry(transfer.to.as_str()).or_default() += transfer.amount as i128;
    }

    round
        .balances_after
        .iter()
        .filter_map(|b| {
            let expected = expected.get(b.agent.as_str()).copied().unwrap_or(0);
            (expected != b.balance as i128).then(|| Violation::BalanceMismatch {
                round: round.round,
                agent: b.agent.clone(),
                expected,
                actual: b.balance,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::{AgentBalance, Transfer, TransferOutcome};
    use proptest::prelude::*;

    fn balances(values: &[u64]) -> Vec<AgentBalance> {
        values
            .iter()
            .enumerate()
            .map(|(i, &balance)| AgentBalance {
                agent: format!("Agent-{}", i + 1),
                balance,
            })
            .collect()
    }

    fn round(n: u32, before: &[u64], after: &[u64], transfers: Vec<Transfer>) -> RoundSummary {
        RoundSummary {
            round: n,
            balances_before: balances(before),
            balances_after: balances(after),
            actions: Vec::new(),
            transfers,
            messages: Vec::new(),
            newly_eliminated: Vec::new(),
            failed_queries: Vec::new(),
        }
    }

    fn applied(from: &str, to: &str, amount: u64) -> Transfer {
        Transfer {
            round: 1,
            from: from.into(),
            to: to.into(),
            amount,
            outcome: TransferOutcome::Applied,
        }
    }

    #[test]
    fn test_clean_log_has_no_violations() {
        let mut log = EventLog::new();
        log.append(round(1, &[100, 100], &[70, 130], vec![applied("Agent-1", "Agent-2", 30)]));
        log.append(round(2, &[70, 130], &[70, 130], Vec::new()));

        assert!(InvariantOracle::new(200).check(&log).is_empty());
    }

    #[test]
    fn test_detects_leaked_units() {
        let mut log = EventLog::new();
        log.append(round(1, &[100, 100], &[100, 90], Vec::new()));

        let violations = InvariantOracle::new(200).check(&log);
        assert!(violations.contains(&Violation::SupplyChanged {
            round: 1,
            expected: 200,
            actual: 190
        }));
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::BalanceMismatch { agent, .. } if agent == "Agent-2")));
    }

    #[test]
    fn test_detects_unrecorded_transfer() {
        let mut log = EventLog::new();
        log.append(round(1, &[100, 100], &[50, 150], Vec::new()));

        let violations = InvariantOracle::new(200).check(&log);
        assert_eq!(violations.len(), 2);
        assert_eq!(
            violations[0].to_string(),
            "round 1: Agent-1 ended at 50, transfers imply 100"
        );
    }

    #[test]
    fn test_detects_double_elimination_and_order() {
        let mut log = EventLog::new();
        let mut first = round(1, &[0, 200], &[0, 200], Vec::new());
        first.newly_eliminated = vec!["Agent-1".into()];
        let mut second = first.clone();
        second.round = 1;
        log.append(first);
        log.append(second);

        let violations = InvariantOracle::new(200).check(&log);
        assert!(violations.contains(&Violation::RoundOrder { round: 1, previous: 1 }));
        assert!(violations.contains(&Violation::DoubleElimination {
            round: 1,
            agent: "Agent-1".into()
        }));
    }

    proptest! {
        #[test]
        fn prop_affordable_transfers_keep_log_clean(
            moves in prop::collection::vec((0usize..4, 0usize..4, 0u64..200), 0..60)
        ) {
            let mut current = vec![100u64; 4];
            let mut log = EventLog::new();

            for (i, chunk) in moves.chunks(3).enumerate() {
                let before = current.clone();
                let mut transfers = Vec::new();
                for &(from, to, amount) in chunk {
                    if from == to || amount == 0 || amount > current[from] {
                        continue;
                    }
                    current[from] -= amount;
                    current[to] += amount;
                    transfers.push(applied(
                        &format!("Agent-{}", from + 1),
                        &format!("Agent-{}", to + 1),
                        amount,
                    ));
                }
                log.append(round(i as u32 + 1, &before, &current, transfers));
            }

            prop_assert!(InvariantOracle::new(400).check(&log).is_empty());
        }
    }
}
