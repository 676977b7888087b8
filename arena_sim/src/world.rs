//! SimWorld - builds the agents, ledger and orchestrator for one scenario.

use std::sync::Arc;
use std::time::Duration;

use arena_core::{AgentSeat, ArenaConfig, Orchestrator};
use arena_env::{AccountRef, DecisionQuery, EnvError, Ledger};

use crate::agent::{FlakyAgent, RandomAgent, ScriptedAgent, SlowAgent};
use crate::ledger::{SimLedger, SimLedgerController};
use crate::priming::Priming;
use crate::scenarios::ScenarioId;
use crate::seeds::DeterministicSeeds;

/// Query timeout used by the flaky scenario so slow agents trip it quickly.
const FLAKY_QUERY_TIMEOUT_MS: u64 = 100;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Number of agents to spawn
    pub num_agents: usize,

    pub scenario: ScenarioId,

    /// Core run configuration (rounds, balances, limits, timeouts)
    pub arena: ArenaConfig,

    /// Per-round failure probability for flaky agents and dropped transfers
    pub fault_rate: f64,
}

impl Default for SimConfig {
    /// The reference experiment: 16 agents, 100 rounds, 1000 units each.
    fn default() -> Self {
        Self {
            seed: 42,
            num_agents: 16,
            scenario: ScenarioId::Baseline,
            arena: ArenaConfig::default(),
            fault_rate: 0.1,
        }
    }
}

/// The SimWorld - container for one simulated run.
pub struct SimWorld {
    pub config: SimConfig,
    pub seeds: DeterministicSeeds,
    pub ledger: Arc<SimLedger>,

    /// Fault injection handle for `ledger`
    pub ledger_controller: SimLedgerController,

    /// Seats in spawn order
    agents: Vec<AgentSeat>,
}

impl SimWorld {
    pub fn new(mut config: SimConfig) -> Self {
        if config.scenario == ScenarioId::Flaky {
            config.arena.query_timeout_ms = config.arena.query_timeout_ms.min(FLAKY_QUERY_TIMEOUT_MS);
        }
        config.arena.seed = config.seed;

        let seeds = DeterministicSeeds::new(config.seed);
        let supply = config.num_agents as u64 * config.arena.starting_balance;
        let ledger = Arc::new(SimLedger::new(supply, seeds.fault_seed()));
        let ledger_controller = ledger.controller();

        match config.scenario {
            ScenarioId::Flaky => ledger_controller.set_transfer_loss(config.fault_rate),
            ScenarioId::UnreachableLedger => ledger_controller.set_unreachable(true),
            _ => {}
        }

        let agents = (0..config.num_agents)
            .map(|i| build_agent(&config, &seeds, i as u64))
            .collect();

        Self {
            config,
            seeds,
            ledger,
            ledger_controller,
            agents,
        }
    }

    pub fn seats(&self) -> Vec<AgentSeat> {
        self.agents.clone()
    }

    pub fn accounts(&self) -> Vec<AccountRef> {
        self.agents.iter().map(|a| a.account.clone()).collect()
    }

    /// Units in circulation: everything the settlement authority can fund.
    pub fn total_supply(&self) -> u64 {
        self.config.num_agents as u64 * self.config.arena.starting_balance
    }

    pub fn run_id(&self) -> String {
        format!("{}-{:016x}", self.config.scenario.name(), self.config.seed)
    }

    /// Builds an orchestrator over this world's agents and ledger.
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.config.arena.clone(),
            self.seats(),
            Arc::clone(&self.ledger) as Arc<dyn Ledger>,
        )
        .with_run_id(self.run_id())
    }

    /// Returns every account's balance to the settlement authority.
    pub async fn recover_all(&self) -> Result<u64, EnvError> {
        let mut recovered = 0;
        for account in self.accounts() {
            recovered += self.ledger.recover(&account).await?;
        }
        Ok(recovered)
    }
}

fn build_agent(config: &SimConfig, seeds: &DeterministicSeeds, index: u64) -> AgentSeat {
    let agent_seed = seeds.agent_seed(index);
    let random = |priming: Priming| -> Arc<dyn DecisionQuery> {
        Arc::new(RandomAgent::new(priming, agent_seed))
    };

    let (priming, group, query): (Option<Priming>, &str, Arc<dyn DecisionQuery>) =
        match config.scenario {
            ScenarioId::Baseline | ScenarioId::UnreachableLedger => {
                (Some(Priming::Neutral), "neutral", random(Priming::Neutral))
            }
            ScenarioId::MixedPriming => {
                let all = Priming::all();
                let priming = all[index as usize % all.len()];
                (Some(priming), priming.name(), random(priming))
            }
            ScenarioId::Flaky => {
                let inner = random(Priming::Neutral);
                let query: Arc<dyn DecisionQuery> = match index % 4 {
                    1 => Arc::new(FlakyAgent::with_rate(
                        inner,
                        config.arena.rounds,
                        config.fault_rate,
                        agent_seed,
                    )),
                    3 => Arc::new(SlowAgent::new(
                        inner,
                        config.arena.query_timeout() + Duration::from_millis(50),
                        5,
                    )),
                    _ => inner,
                };
                (Some(Priming::Neutral), "neutral", query)
            }
            ScenarioId::Elimination => {
                if index % 2 == 0 {
                    let spender: Arc<dyn DecisionQuery> =
                        Arc::new(ScriptedAgent::repeating("SEND {balance} TO {peer}"));
                    (None, "spender", spender)
                } else {
                    (Some(Priming::Competitive), "competitive", random(Priming::Competitive))
                }
            }
        };

    let mut seat = AgentSeat::new(seeds.agent_id(index), seeds.account(index), query)
        .with_group(group);
    if let Some(priming) = priming {
        seat = seat.with_guidance(priming.guidance());
    }
    seat
}
