//! Analyzer - post-hoc metrics over a finished run.
//!
//! Everything here is a pure function of the [`EventLog`]. Only applied
//! transfers count towards flows and volumes; rejected attempts are kept in
//! the log for auditing but moved nothing.
//!
//! Maps are `BTreeMap` so serialized reports are stable across runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::event_log::EventLog;
use crate::types::Channel;

/// Group label for agents missing from a caller's grouping.
pub const UNASSIGNED_GROUP: &str = "unassigned";

/// Matches a promise to move funds, e.g. "I'll send you 50" or "transfer 20 now".
///
/// The number must directly follow the verb (optionally after "you"), so
/// digits in display names or round numbers never count as an amount.
static PROMISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(send|give|transfer)\w*\s+(?:you\s+)?\d+").unwrap()
});

/// Gini coefficient: `Σ_{i,j} |b_i − b_j| / (2 n Σb)`.
///
/// Returns 0 for fewer than two balances or zero total wealth. Total
/// concentration in one of `n` holders gives `(n − 1) / n`.
pub fn gini(balances: &[u64]) -> f64 {
    let n = balances.len();
    let total: u64 = balances.iter().sum();
    if n <= 1 || total == 0 {
        return 0.0;
    }

    // Sorted form of the pairwise sum: Σ_i (2i − n − 1) b_(i), 1-based.
    let mut sorted = balances.to_vec();
    sorted.sort_unstable();
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, &b)| (2.0 * (i as f64 + 1.0) - n as f64 - 1.0) * b as f64)
        .sum();

    // Pairwise sum over ordered pairs is twice the weighted sum.
    (2.0 * weighted) / (2.0 * n as f64 * total as f64)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1); 0 for fewer than two values.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

// ============================================================================
// REPORT TYPES
// ============================================================================

/// Directed flow between two agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub count: u64,
    pub amount: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferNetwork {
    /// Sorted by (from, to)
    pub edges: Vec<Edge>,
    pub total_volume: u64,
    pub sent: BTreeMap<String, u64>,
    pub received: BTreeMap<String, u64>,
}

/// Directed flow between two groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFlow {
    pub from_group: String,
    pub to_group: String,
    pub count: u64,
    pub amount: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionReport {
    pub same_group_count: u64,
    pub same_group_volume: u64,
    pub cross_group_count: u64,
    pub cross_group_volume: u64,
    pub cross_group_flows: Vec<GroupFlow>,
}

/// Promises made in private versus transfers actually applied.
///
/// Advisory only: the promise detector is a regular expression with no
/// notion of conditions, partial fulfilment or who the promise was made to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeceptionScore {
    pub agent: String,
    pub promises: u64,
    pub transfers: u64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trajectory {
    pub agent: String,
    /// `(round, balance_after)` in round order
    pub points: Vec<(u32, u64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundVolume {
    pub round: u32,
    pub count: u64,
    pub volume: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub agents: usize,
    pub rounds: usize,
    pub final_gini: f64,
    pub applied_transfers: u64,
    pub rejected_transfers: u64,
    pub total_volume: u64,
    pub eliminations: usize,
    pub max_balance: u64,
    pub min_balance: u64,
    pub balance_std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupOutcome {
    pub group: String,
    pub agents: usize,
    pub mean_final_balance: f64,
    pub std_dev: f64,
    /// Mean of `final − starting_balance`
    pub mean_delta: f64,
}

/// Everything the analyzer computes at teardown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: RunSummary,
    pub network: TransferNetwork,
    pub deception: Vec<DeceptionScore>,
    pub trajectories: Vec<Trajectory>,
    pub gini_series: Vec<(u32, f64)>,
    pub volume_per_round: Vec<RoundVolume>,

    /// Present when the run carried group labels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factions: Option<FactionReport>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_outcomes: Vec<GroupOutcome>,
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Read-only view over a finished event log.
pub struct Analyzer<'a> {
    log: &'a EventLog,
}

impl<'a> Analyzer<'a> {
    pub fn new(log: &'a EventLog) -> Self {
        Self { log }
    }

    /// Runs every analysis. Group-based sections are filled only when
    /// `group_of` is non-empty.
    pub fn report(&self, group_of: &HashMap<String, String>, starting_balance: u64) -> AnalysisReport {
        let grouped = !group_of.is_empty();
        AnalysisReport {
            summary: self.summary(),
            network: self.transfer_network(),
            deception: self.deception_heuristic(),
            trajectories: self.balance_trajectories(),
            gini_series: self.gini_series(),
            volume_per_round: self.volume_per_round(),
            factions: grouped.then(|| self.faction_analysis(group_of)),
            group_outcomes: if grouped {
                self.group_outcomes(group_of, starting_balance)
            } else {
                Vec::new()
            },
        }
    }

    fn final_balances(&self) -> Vec<u64> {
        self.log.final_balances().iter().map(|b| b.balance).collect()
    }

    /// Gini of the balances after the last round.
    pub fn gini(&self) -> f64 {
        gini(&self.final_balances())
    }

    pub fn transfer_network(&self) -> TransferNetwork {
        let mut edges: BTreeMap<(String, String), (u64, u64)> = BTreeMap::new();
        let mut network = TransferNetwork::default();

        for transfer in self.log.transfers().filter(|t| t.is_applied()) {
            let edge = edges
                .entry((transfer.from.clone(), transfer.to.clone()))
                .or_default();
            edge.0 += 1;
            edge.1 += transfer.amount;
            network.total_volume += transfer.amount;
            *network.sent.entry(transfer.from.clone()).or_default() += transfer.amount;
            *network.received.entry(transfer.to.clone()).or_default() += transfer.amount;
        }

        network.edges = edges
            .into_iter()
            .map(|((from, to), (count, amount))| Edge { from, to, count, amount })
            .collect();
        network
    }

    /// Partitions applied transfers by the groups of sender and receiver.
    pub fn faction_analysis(&self, group_of: &HashMap<String, String>) -> FactionReport {
        let group = |name: &str| {
            group_of
                .get(name)
                .map(String::as_str)
                .unwrap_or(UNASSIGNED_GROUP)
                .to_string()
        };

        let mut report = FactionReport::default();
        let mut flows: BTreeMap<(String, String), (u64, u64)> = BTreeMap::new();

        for transfer in self.log.transfers().filter(|t| t.is_applied()) {
            let (from, to) = (group(&transfer.from), group(&transfer.to));
            if from == to {
                report.same_group_count += 1;
                report.same_group_volume += transfer.amount;
            } else {
                report.cross_group_count += 1;
                report.cross_group_volume += transfer.amount;
                let flow = flows.entry((from, to)).or_default();
                flow.0 += 1;
                flow.1 += transfer.amount;
            }
        }

        report.cross_group_flows = flows
            .into_iter()
            .map(|((from_group, to_group), (count, amount))| GroupFlow {
                from_group,
                to_group,
                count,
                amount,
            })
            .collect();
        report
    }

    /// Per agent: private messages that look like promises versus applied
    /// outgoing transfers. Agents appear in final roster order.
    pub fn deception_heuristic(&self) -> Vec<DeceptionScore> {
        let mut promises: HashMap<&str, u64> = HashMap::new();
        for message in self.log.messages() {
            if message.channel == Channel::Private && PROMISE_RE.is_match(&message.content) {
                *promises.entry(message.from.as_str()).or_default() += 1;
            }
        }

        let mut transfers: HashMap<&str, u64> = HashMap::new();
        for transfer in self.log.transfers().filter(|t| t.is_applied()) {
            *transfers.entry(transfer.from.as_str()).or_default() += 1;
        }

        self.log
            .final_balances()
            .iter()
            .map(|b| {
                let promised = promises.get(b.agent.as_str()).copied().unwrap_or(0);
                let actual = transfers.get(b.agent.as_str()).copied().unwrap_or(0);
                let rate = if promised > 0 {
                    (1.0 - actual as f64 / promised as f64).max(0.0)
                } else {
                    0.0
                };
                DeceptionScore {
                    agent: b.agent.clone(),
                    promises: promised,
                    transfers: actual,
                    rate,
                }
            })
            .collect()
    }

    pub fn balance_trajectories(&self) -> Vec<Trajectory> {
        let mut trajectories: Vec<Trajectory> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for round in self.log.rounds() {
            for b in &round.balances_after {
                let slot = *index.entry(b.agent.clone()).or_insert_with(|| {
                    trajectories.push(Trajectory {
                        agent: b.agent.clone(),
                        points: Vec::new(),
                    });
                    trajectories.len() - 1
                });
                trajectories[slot].points.push((round.round, b.balance));
            }
        }
        trajectories
    }

    /// Inequality after each round.
    pub fn gini_series(&self) -> Vec<(u32, f64)> {
        self.log
            .rounds()
            .iter()
            .map(|r| {
                let balances: Vec<u64> = r.balances_after.iter().map(|b| b.balance).collect();
                (r.round, gini(&balances))
            })
            .collect()
    }

    pub fn volume_per_round(&self) -> Vec<RoundVolume> {
        self.log
            .rounds()
            .iter()
            .map(|r| RoundVolume {
                round: r.round,
                count: r.applied_transfers().count() as u64,
                volume: r.applied_volume(),
            })
            .collect()
    }

    pub fn summary(&self) -> RunSummary {
        let finals = self.final_balances();
        let as_f64: Vec<f64> = finals.iter().map(|&b| b as f64).collect();
        let (applied, rejected) = self
            .log
            .transfers()
            .fold((0, 0), |(a, r), t| if t.is_applied() { (a + 1, r) } else { (a, r + 1) });

        RunSummary {
            agents: finals.len(),
            rounds: self.log.len(),
            final_gini: gini(&finals),
            applied_transfers: applied,
            rejected_transfers: rejected,
            total_volume: self
                .log
                .transfers()
                .filter(|t| t.is_applied())
                .map(|t| t.amount)
                .sum(),
            eliminations: self
                .log
                .rounds()
                .iter()
                .map(|r| r.newly_eliminated.len())
                .sum(),
            max_balance: finals.iter().copied().max().unwrap_or(0),
            min_balance: finals.iter().copied().min().unwrap_or(0),
            balance_std_dev: std_dev(&as_f64),
        }
    }

    /// Final-balance statistics per group, groups sorted by name.
    pub fn group_outcomes(
        &self,
        group_of: &HashMap<String, String>,
        starting_balance: u64,
    ) -> Vec<GroupOutcome> {
        let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for b in self.log.final_balances() {
            let group = group_of
                .get(&b.agent)
                .map(String::as_str)
                .unwrap_or(UNASSIGNED_GROUP);
            groups.entry(group).or_default().push(b.balance as f64);
        }

        groups
            .into_iter()
            .map(|(group, finals)| {
                let mean_final = mean(&finals);
                GroupOutcome {
                    group: group.to_string(),
                    agents: finals.len(),
                    mean_final_balance: mean_final,
                    std_dev: std_dev(&finals),
                    mean_delta: mean_final - starting_balance as f64,
                }
            })
            .collect()
    }
}
