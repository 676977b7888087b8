//! Round Orchestrator - drives a run from setup to teardown.
//!
//! ```text
//!   Setup ──► Running(1) ──► … ──► Running(N) ──► Teardown ──► Completed
//!     │                                                 │
//!     └──────────────────► Failed ◄─────────────────────┘
//! ```
//!
//! # Per-Round Protocol
//!
//! 1. Refresh balances from the ledger
//! 2. Query every agent (eliminated ones too) with bounded concurrency
//! 3. Parse replies, apply rate limits
//! 4. Execute transfers one at a time, agent order shuffled per round
//! 5. Route broadcasts and private messages
//! 6. Refresh again, detect eliminations, append the round summary
//!
//! Nothing inside a round is fatal. Failed or timed-out queries become a
//! single PASS, rejected transfers are recorded with their reason, and sink
//! failures are logged.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arena_env::{
    AccountRef, AgentId, Decision, DecisionQuery, DecisionRequest, EnvError, Ledger,
};
use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analyzer::{AnalysisReport, Analyzer};
use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::event_log::{AgentActions, AgentBalance, EventLog, RoundSummary};
use crate::identity::IdentityMap;
use crate::parser::parse;
use crate::persistence::EventSink;
use crate::rate_limit::apply_limits;
use crate::router::MessageRouter;
use crate::transfer::{with_timeout, TransferExecutor};
use crate::types::{Action, ActionKind, Agent, Message, Transfer};

// ============================================================================
// PUBLIC TYPES
// ============================================================================

/// One participant registered with the orchestrator.
#[derive(Clone)]
pub struct AgentSeat {
    pub id: AgentId,

    /// Ledger account holding this agent's balance
    pub account: AccountRef,

    /// Reasoning capability answering for this agent
    pub query: Arc<dyn DecisionQuery>,

    /// Faction label used by the group analyses
    pub group: Option<String>,

    /// Strategy guidance passed verbatim in every request
    pub guidance: Option<String>,
}

impl AgentSeat {
    pub fn new(id: AgentId, account: AccountRef, query: Arc<dyn DecisionQuery>) -> Self {
        Self {
            id,
            account,
            query,
            group: None,
            guidance: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = Some(guidance.into());
        self
    }
}

impl std::fmt::Debug for AgentSeat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSeat")
            .field("id", &self.id)
            .field("account", &self.account)
            .field("query", &self.query.name())
            .field("group", &self.group)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Setup,
    Running(u32),
    Teardown,
    Completed,
    Failed,
}

/// Decision query accounting for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    pub calls: u64,
    pub failures: u64,
    /// Subset of `failures`
    pub timeouts: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl QueryStats {
    fn record(&mut self, result: &Result<Decision, EnvError>) {
        self.calls += 1;
        match result {
            Ok(decision) => {
                self.input_tokens += decision.usage.input_tokens;
                self.output_tokens += decision.usage.output_tokens;
            }
            Err(e) => {
                self.failures += 1;
                if e.is_timeout() {
                    self.timeouts += 1;
                }
            }
        }
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub phase: RunPhase,
    pub config: ArenaConfig,

    /// Display name -> faction label, for agents that carry one
    pub groups: BTreeMap<String, String>,

    pub log: EventLog,
    pub analysis: AnalysisReport,
    pub stats: QueryStats,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Per-run state created by setup.
struct RunState {
    identities: Arc<IdentityMap>,

    /// Seat index for each display name, presentation order
    roster: Vec<(String, usize)>,

    executor: TransferExecutor,
    router: MessageRouter,
    log: EventLog,
    stats: QueryStats,

    /// Transfer-order shuffling, independent of identity assignment
    rng: ChaCha8Rng,
}

pub struct Orchestrator {
    run_id: String,
    config: ArenaConfig,
    seats: Vec<AgentSeat>,
    ledger: Arc<dyn Ledger>,
    identities: Option<IdentityMap>,
    sink: Option<Arc<dyn EventSink>>,
    phase: RunPhase,
}

impl Orchestrator {
    pub fn new(config: ArenaConfig, seats: Vec<AgentSeat>, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            config,
            seats,
            ledger,
            identities: None,
            sink: None,
            phase: RunPhase::Setup,
        }
    }

    /// Uses explicit display names instead of a seeded assignment.
    ///
    /// Every seat's identity must appear in the map.
    pub fn with_identity_map(mut self, identities: IdentityMap) -> Self {
        self.identities = Some(identities);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Runs every round and the teardown analysis.
    ///
    /// Only setup failures are returned as errors; the phase is left at
    /// `Failed` in that case.
    pub async fn run(&mut self) -> Result<RunReport, ArenaError> {
        self.phase = RunPhase::Setup;
        let mut state = match self.setup().await {
            Ok(state) => state,
            Err(e) => {
                error!("Run {} failed during setup: {}", self.run_id, e);
                self.phase = RunPhase::Failed;
                return Err(e);
            }
        };

        info!(
            "Run {} started: {} agents, {} rounds",
            self.run_id,
            state.roster.len(),
            self.config.rounds
        );

        for round in 1..=self.config.rounds {
            self.phase = RunPhase::Running(round);
            self.run_round(&mut state, round).await;
        }

        self.phase = RunPhase::Teardown;
        let report = self.teardown(state);
        self.phase = RunPhase::Completed;
        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------------

    async fn setup(&mut self) -> Result<RunState, ArenaError> {
        self.config.validate()?;
        if self.seats.is_empty() {
            return Err(ArenaError::setup("no agents registered"));
        }

        let identities = match self.identities.take() {
            Some(map) => map,
            None => {
                let ids: Vec<AgentId> = self.seats.iter().map(|s| s.id).collect();
                IdentityMap::assign(&ids, self.config.seed)
            }
        };
        if identities.len() != self.seats.len() {
            return Err(ArenaError::setup(format!(
                "identity map has {} names for {} agents",
                identities.len(),
                self.seats.len()
            )));
        }
        let identities = Arc::new(identities);

        let seat_of: HashMap<AgentId, usize> =
            self.seats.iter().enumerate().map(|(i, s)| (s.id, i)).collect();

        let mut roster = Vec::with_capacity(self.seats.len());
        let mut agents = Vec::with_capacity(self.seats.len());
        for name in identities.names() {
            let seat = identities
                .id_of(name)
                .and_then(|id| seat_of.get(&id).copied())
                .ok_or_else(|| ArenaError::setup(format!("{} has no registered agent", name)))?;
            roster.push((name.clone(), seat));
            agents.push(Agent {
                id: self.seats[seat].id,
                display_name: name.clone(),
                account: self.seats[seat].account.clone(),
                balance: 0,
                eliminated: false,
            });
        }

        if self.config.fund_accounts {
            for (name, seat) in &roster {
                let account = &self.seats[*seat].account;
                with_timeout(
                    self.config.ledger_timeout(),
                    self.ledger.fund(account, self.config.starting_balance),
                )
                .await
                .map_err(|e| ArenaError::setup(format!("funding {} ({}): {}", name, account, e)))?;
                debug!("Funded {} with {}", name, self.config.starting_balance);
            }
        }

        let mut executor = TransferExecutor::new(
            Arc::clone(&self.ledger),
            Arc::clone(&identities),
            agents,
            self.config.min_transfer_amount,
            self.config.ledger_timeout(),
        );
        let refresh = executor.refresh().await;
        if let Some((name, e)) = refresh.failures.into_iter().next() {
            return Err(ArenaError::setup(format!("initial balance of {}: {}", name, e)));
        }

        Ok(RunState {
            router: MessageRouter::new(Arc::clone(&identities)),
            identities,
            roster,
            executor,
            log: EventLog::new(),
            stats: QueryStats::default(),
            rng: ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_mul(0x9e3779b97f4a7c15)),
        })
    }

    // ------------------------------------------------------------------------
    // Round
    // ------------------------------------------------------------------------

    async fn run_round(&self, state: &mut RunState, round: u32) {
        let start = state.executor.refresh().await;
        let balances_before = balances(&state.executor);

        let requests = self.build_requests(state, round);
        let replies = self.query_all(requests).await;

        // Parse and limit, roster order.
        let mut actions = Vec::with_capacity(state.roster.len());
        let mut failed_queries = Vec::new();
        for ((name, _), result) in state.roster.iter().zip(replies) {
            state.stats.record(&result);
            let parsed = match result {
                Ok(decision) => parse(&decision.text, state.identities.names(), name),
                Err(e) => {
                    warn!("Round {}: query for {} failed, defaulting to PASS: {}", round, name, e);
                    failed_queries.push(name.clone());
                    vec![Action::pass(name)]
                }
            };
            let outcome = apply_limits(parsed, &self.config.limits);
            for rejected in &outcome.rejected {
                debug!("Round {}: {} action rejected: {:?}", round, name, rejected);
            }
            actions.push(AgentActions {
                agent: name.clone(),
                allowed: outcome.allowed,
                rejected: outcome.rejected,
            });
        }

        let transfers = self.execute_transfers(state, round, &actions).await;
        let messages = route_messages(&mut state.router, round, &actions);

        let end = state.executor.refresh().await;
        let mut newly_eliminated = start.newly_eliminated;
        newly_eliminated.extend(end.newly_eliminated);

        let summary = RoundSummary {
            round,
            balances_before,
            balances_after: balances(&state.executor),
            actions,
            transfers,
            messages,
            newly_eliminated,
            failed_queries,
        };

        info!(
            "Round {}/{}: {} transfers applied ({} units), {} rejected, {} messages, {} eliminated",
            round,
            self.config.rounds,
            summary.applied_transfers().count(),
            summary.applied_volume(),
            summary.transfers.len() - summary.applied_transfers().count(),
            summary.messages.len(),
            summary.newly_eliminated.len()
        );

        self.persist(&summary);
        state.log.append(summary);
    }

    fn build_requests(
        &self,
        state: &RunState,
        round: u32,
    ) -> Vec<(Arc<dyn DecisionQuery>, DecisionRequest)> {
        let lookback = self.config.message_lookback;
        let cache = state.executor.cache();
        let public_history: Vec<_> = state
            .router
            .public_messages(round, lookback)
            .into_iter()
            .map(Message::to_view)
            .collect();

        state
            .roster
            .iter()
            .map(|(name, seat)| {
                let seat = &self.seats[*seat];
                let peers: Vec<String> = state
                    .roster
                    .iter()
                    .map(|(n, _)| n)
                    .filter(|n| *n != name)
                    .cloned()
                    .collect();
                let eliminated_peers = peers
                    .iter()
                    .filter(|n| cache.get(n.as_str()).is_some_and(|a| a.eliminated))
                    .cloned()
                    .collect();
                let request = DecisionRequest {
                    agent_id: seat.id,
                    display_name: name.clone(),
                    balance: state.executor.balance(name).unwrap_or(0),
                    round,
                    total_rounds: self.config.rounds,
                    peers,
                    eliminated_peers,
                    public_history: public_history.clone(),
                    private_history: state
                        .router
                        .private_messages_for(name, round, lookback)
                        .into_iter()
                        .map(Message::to_view)
                        .collect(),
                    limits: self.config.limits,
                    min_transfer_amount: self.config.min_transfer_amount,
                    guidance: seat.guidance.clone(),
                };
                (Arc::clone(&seat.query), request)
            })
            .collect()
    }

    /// Fans out queries with bounded concurrency; results come back in
    /// request order regardless of completion order.
    async fn query_all(
        &self,
        requests: Vec<(Arc<dyn DecisionQuery>, DecisionRequest)>,
    ) -> Vec<Result<Decision, EnvError>> {
        let timeout = self.config.query_timeout();
        let count = requests.len();

        let mut completed: Vec<(usize, Result<Decision, EnvError>)> = stream::iter(
            requests.into_iter().enumerate(),
        )
        .map(|(i, (query, request))| async move {
            let result = match tokio::time::timeout(timeout, query.decide(&request)).await {
                Ok(result) => result,
                Err(_) => Err(EnvError::Timeout(timeout.as_millis() as u64)),
            };
            (i, result)
        })
        .buffer_unordered(self.config.concurrency)
        .collect()
        .await;

        completed.sort_by_key(|(i, _)| *i);
        debug_assert_eq!(completed.len(), count);
        completed.into_iter().map(|(_, result)| result).collect()
    }

    /// Applies allowed SENDs sequentially, agents in a freshly shuffled order.
    async fn execute_transfers(
        &self,
        state: &mut RunState,
        round: u32,
        actions: &[AgentActions],
    ) -> Vec<Transfer> {
        let mut order: Vec<usize> = (0..actions.len()).collect();
        order.shuffle(&mut state.rng);

        let mut transfers = Vec::new();
        for i in order {
            for action in &actions[i].allowed {
                let ActionKind::Transfer { target, amount } = &action.kind else {
                    continue;
                };
                let Ok(amount) = u64::try_from(*amount) else {
                    continue;
                };
                let transfer = state
                    .executor
                    .execute(round, &action.source, target, amount)
                    .await;
                transfers.push(transfer);
            }
        }
        transfers
    }

    fn persist(&self, summary: &RoundSummary) {
        let Some(sink) = &self.sink else {
            return;
        };
        if let Err(e) = sink.record_round(&self.run_id, summary) {
            warn!("Round {}: failed to persist summary: {}", summary.round, e);
        }
        for transfer in &summary.transfers {
            if let Err(e) = sink.record_transfer(&self.run_id, transfer) {
                warn!("Round {}: failed to persist transfer: {}", summary.round, e);
            }
        }
        for message in &summary.messages {
            if let Err(e) = sink.record_message(&self.run_id, message) {
                warn!("Round {}: failed to persist message: {}", summary.round, e);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    fn teardown(&self, state: RunState) -> RunReport {
        let groups: BTreeMap<String, String> = state
            .roster
            .iter()
            .filter_map(|(name, seat)| {
                self.seats[*seat]
                    .group
                    .as_ref()
                    .map(|group| (name.clone(), group.clone()))
            })
            .collect();
        let group_of: HashMap<String, String> = groups.clone().into_iter().collect();

        let analysis = Analyzer::new(&state.log).report(&group_of, self.config.starting_balance);
        info!(
            "Run {} complete: final gini {:.4}, {} transfers, {} eliminations",
            self.run_id,
            analysis.summary.final_gini,
            analysis.summary.applied_transfers,
            analysis.summary.eliminations
        );

        RunReport {
            run_id: self.run_id.clone(),
            phase: RunPhase::Completed,
            config: self.config.clone(),
            groups,
            log: state.log,
            analysis,
            stats: state.stats,
        }
    }
}

fn balances(executor: &TransferExecutor) -> Vec<AgentBalance> {
    executor
        .snapshot()
        .into_iter()
        .map(|(agent, balance)| AgentBalance { agent, balance })
        .collect()
}

/// Routes allowed messages in roster order and returns what was recorded.
fn route_messages(router: &mut MessageRouter, round: u32, actions: &[AgentActions]) -> Vec<Message> {
    let mut routed = Vec::new();
    for action in actions.iter().flat_map(|a| a.allowed.iter()) {
        match &action.kind {
            ActionKind::Broadcast { content } => {
                routed.push(router.add_broadcast(round, &action.source, content));
            }
            ActionKind::DirectMessage { target, content } => {
                if let Some(message) = router.add_private_message(round, &action.source, target, content) {
                    routed.push(message);
                }
            }
            ActionKind::Transfer { .. } | ActionKind::Pass => {}
        }
    }
    routed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryEventStore;
    use crate::types::{Channel, TransferFailure};
    use approx::assert_relative_eq;
    use arena_env::{InMemoryLedger, TokenUsage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replies with a fixed script, one entry per round, then PASS.
    struct Script {
        replies: Vec<&'static str>,
        seen: Mutex<Vec<DecisionRequest>>,
    }

    impl Script {
        fn new(replies: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                replies: replies.to_vec(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl DecisionQuery for Script {
        async fn decide(&self, request: &DecisionRequest) -> Result<Decision, EnvError> {
            self.seen.lock().unwrap().push(request.clone());
            let reply = self
                .replies
                .get(request.round as usize - 1)
                .copied()
                .unwrap_or("PASS");
            Ok(Decision::from_text(reply).with_usage(TokenUsage {
                input_tokens: 10,
                output_tokens: 2,
            }))
        }

        fn name(&self) -> &str {
            "script"
        }
    }

    struct Failing;

    #[async_trait]
    impl DecisionQuery for Failing {
        async fn decide(&self, _request: &DecisionRequest) -> Result<Decision, EnvError> {
            Err(EnvError::query("model unavailable"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct Sleepy;

    #[async_trait]
    impl DecisionQuery for Sleepy {
        async fn decide(&self, _request: &DecisionRequest) -> Result<Decision, EnvError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Decision::from_text("SEND 1 TO Agent-1"))
        }

        fn name(&self) -> &str {
            "sleepy"
        }
    }

    /// Tracks how many calls are in flight at once.
    #[derive(Default)]
    struct Counting {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl DecisionQuery for Counting {
        async fn decide(&self, _request: &DecisionRequest) -> Result<Decision, EnvError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Decision::from_text("PASS"))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn config(rounds: u32, starting_balance: u64) -> ArenaConfig {
        ArenaConfig {
            rounds,
            starting_balance,
            query_timeout_ms: 1_000,
            ..ArenaConfig::default()
        }
    }

    /// Seats named `Agent-1 … Agent-N` in the order given.
    fn arena(
        config: ArenaConfig,
        queries: Vec<Arc<dyn DecisionQuery>>,
        ledger: Arc<InMemoryLedger>,
    ) -> Orchestrator {
        let mut seats = Vec::new();
        let mut pairs = Vec::new();
        for (i, query) in queries.into_iter().enumerate() {
            let id = AgentId::from_seed(i as u64);
            seats.push(AgentSeat::new(id, AccountRef::new(format!("acct-{}", i + 1)), query));
            pairs.push((id, format!("Agent-{}", i + 1)));
        }
        Orchestrator::new(config, seats, ledger)
            .with_identity_map(IdentityMap::from_pairs(pairs).unwrap())
            .with_run_id("test-run")
    }

    #[tokio::test]
    async fn test_single_round_end_to_end() {
        let ledger = InMemoryLedger::shared(400);
        let mut orchestrator = arena(
            config(1, 100),
            vec![
                Script::new(&["SEND 30 TO Agent-2"]),
                Script::new(&["PASS"]),
                Script::new(&["SEND 200 TO Agent-4"]),
                Script::new(&[""]),
            ],
            ledger.clone(),
        );

        let report = orchestrator.run().await.unwrap();
        assert_eq!(orchestrator.phase(), RunPhase::Completed);

        let round = report.log.last().unwrap();
        let after: Vec<u64> = round.balances_after.iter().map(|b| b.balance).collect();
        assert_eq!(after, vec![70, 130, 100, 100]);
        assert_eq!(round.total_before(), round.total_after());

        assert_eq!(round.transfers.len(), 2);
        let applied: Vec<_> = round.applied_transfers().collect();
        assert_eq!(applied.len(), 1);
        assert_eq!((applied[0].from.as_str(), applied[0].to.as_str()), ("Agent-1", "Agent-2"));

        let rejected = round.transfers.iter().find(|t| !t.is_applied()).unwrap();
        assert_eq!(rejected.from, "Agent-3");
        assert_eq!(
            rejected.failure(),
            Some(&TransferFailure::InsufficientBalance { balance: 100, requested: 200 })
        );

        assert_relative_eq!(report.analysis.summary.final_gini, 0.1125, epsilon = 1e-9);
        assert_eq!(ledger.total_supply().await, 400);
        assert_eq!(report.stats.calls, 4);
        assert_eq!(report.stats.input_tokens, 40);
    }

    #[tokio::test]
    async fn test_failed_query_defaults_to_pass() {
        let ledger = InMemoryLedger::shared(200);
        let mut orchestrator = arena(
            config(2, 100),
            vec![Arc::new(Failing), Script::new(&["SEND 10 TO Agent-1"])],
            ledger,
        );

        let report = orchestrator.run().await.unwrap();
        let first = &report.log.rounds()[0];
        assert_eq!(first.failed_queries, vec!["Agent-1".to_string()]);
        assert!(first.actions[0].allowed[0].is_pass());
        assert_eq!(first.balance_after("Agent-1"), Some(110));
        assert_eq!(report.stats.calls, 4);
        assert_eq!(report.stats.failures, 2);
        assert_eq!(report.stats.timeouts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_query_times_out() {
        let ledger = InMemoryLedger::shared(200);
        let mut orchestrator = arena(
            config(1, 100),
            vec![Script::new(&["PASS"]), Arc::new(Sleepy)],
            ledger,
        );

        let report = orchestrator.run().await.unwrap();
        assert_eq!(report.stats.timeouts, 1);
        assert_eq!(report.log.rounds()[0].failed_queries, vec!["Agent-2".to_string()]);
        assert!(report.log.rounds()[0].transfers.is_empty());
    }

    #[tokio::test]
    async fn test_setup_failure_is_fatal() {
        // Reserve covers only one of the two accounts.
        let ledger = InMemoryLedger::shared(100);
        let mut orchestrator = arena(
            config(3, 100),
            vec![Script::new(&[]), Script::new(&[])],
            ledger,
        );

        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, ArenaError::Setup(_)));
        assert_eq!(orchestrator.phase(), RunPhase::Failed);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let ledger = InMemoryLedger::shared(100);
        let mut orchestrator = arena(config(0, 100), vec![Script::new(&[])], ledger);
        assert!(matches!(orchestrator.run().await, Err(ArenaError::Config(_))));
    }

    #[tokio::test]
    async fn test_messages_visible_next_round_only() {
        let ledger = InMemoryLedger::shared(300);
        let listener = Script::new(&[]);
        let mut orchestrator = arena(
            config(2, 100),
            vec![
                Script::new(&["BROADCAST \"hello all\"\nMESSAGE Agent-2 \"psst\""]),
                listener.clone(),
                Script::new(&[]),
            ],
            ledger,
        );

        let report = orchestrator.run().await.unwrap();
        let messages = &report.log.rounds()[0].messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].channel, Channel::Public);

        let seen = listener.seen.lock().unwrap();
        assert!(seen[0].public_history.is_empty());
        assert_eq!(seen[1].public_history.len(), 1);
        assert_eq!(seen[1].public_history[0].content, "hello all");
        assert_eq!(seen[1].private_history.len(), 1);
        assert_eq!(seen[1].peers, vec!["Agent-1".to_string(), "Agent-3".to_string()]);
    }

    #[tokio::test]
    async fn test_elimination_keeps_agent_queried() {
        let ledger = InMemoryLedger::shared(200);
        let spender = Script::new(&["SEND 100 TO Agent-2", "SEND 5 TO Agent-2\nBROADCAST \"still here\""]);
        let observer = Script::new(&[]);
        let mut orchestrator = arena(
            config(3, 100),
            vec![spender.clone(), observer.clone()],
            ledger,
        );

        let report = orchestrator.run().await.unwrap();
        let rounds = report.log.rounds();
        assert_eq!(rounds[0].newly_eliminated, vec!["Agent-1".to_string()]);
        assert!(rounds[1].newly_eliminated.is_empty());

        // Eliminated agents can still talk but cannot pay.
        assert_eq!(rounds[1].messages.len(), 1);
        assert!(!rounds[1].transfers[0].is_applied());

        assert_eq!(spender.seen.lock().unwrap().len(), 3);
        let seen = observer.seen.lock().unwrap();
        assert_eq!(seen[1].eliminated_peers, vec!["Agent-1".to_string()]);
        assert_eq!(report.analysis.summary.eliminations, 1);
    }

    #[tokio::test]
    async fn test_rounds_are_persisted() {
        let ledger = InMemoryLedger::shared(200);
        let store = Arc::new(MemoryEventStore::new());
        let mut orchestrator = arena(
            config(4, 100),
            vec![Script::new(&["SEND 10 TO Agent-2"]), Script::new(&[])],
            ledger,
        )
        .with_sink(store.clone());

        let report = orchestrator.run().await.unwrap();
        assert_eq!(store.rounds("test-run").len(), 4);
        assert_eq!(store.transfers("test-run").len(), 1);
        assert_eq!(store.rounds("test-run"), report.log.rounds().to_vec());
    }

    #[tokio::test]
    async fn test_balances_conserved_every_round() {
        let ledger = InMemoryLedger::shared(400);
        let mut orchestrator = arena(
            config(5, 100),
            vec![
                Script::new(&["SEND 60 TO Agent-2\nSEND 60 TO Agent-3", "SEND 40 TO Agent-4"]),
                Script::new(&["SEND 100 TO Agent-1", "SEND 999 TO Agent-3"]),
                Script::new(&["SEND 0 TO Agent-1\nSEND 5 TO agent-2"]),
                Script::new(&["SEND 25 TO Agent-4\nSEND 25 TO Agent-1"]),
            ],
            ledger.clone(),
        );

        let report = orchestrator.run().await.unwrap();
        for round in report.log.rounds() {
            assert_eq!(round.total_before(), 400);
            assert_eq!(round.total_after(), 400);
        }
        assert_eq!(ledger.total_supply().await, 400);
    }

    #[tokio::test]
    async fn test_seeded_identity_assignment_covers_every_seat() {
        let ledger = InMemoryLedger::shared(500);
        let seats: Vec<AgentSeat> = (0..5)
            .map(|i| {
                AgentSeat::new(
                    AgentId::from_seed(i),
                    AccountRef::new(format!("acct-{}", i)),
                    Script::new(&[]),
                )
                .with_group(if i % 2 == 0 { "even" } else { "odd" })
            })
            .collect();
        let mut orchestrator = Orchestrator::new(config(1, 100), seats, ledger);

        let report = orchestrator.run().await.unwrap();
        let names: Vec<&str> = report.log.final_balances().iter().map(|b| b.agent.as_str()).collect();
        assert_eq!(names, vec!["Agent-1", "Agent-2", "Agent-3", "Agent-4", "Agent-5"]);
        assert_eq!(report.groups.len(), 5);
        assert_eq!(report.analysis.group_outcomes.len(), 2);
    }

    #[tokio::test]
    async fn test_eliminated_agent_cannot_send_after_refund() {
        let ledger = InMemoryLedger::shared(200);
        let mut orchestrator = arena(
            config(3, 100),
            vec![
                Script::new(&["SEND 100 TO Agent-2", "PASS", "SEND 10 TO Agent-2"]),
                Script::new(&["PASS", "SEND 50 TO Agent-1"]),
            ],
            ledger,
        );

        let report = orchestrator.run().await.unwrap();
        let rounds = report.log.rounds();
        assert_eq!(rounds[0].newly_eliminated, vec!["Agent-1".to_string()]);
        assert_eq!(rounds[1].balance_after("Agent-1"), Some(50));

        let third = &rounds[2];
        assert_eq!(third.transfers.len(), 1);
        assert_eq!(third.transfers[0].failure(), Some(&TransferFailure::Eliminated));
        assert_eq!(third.balance_after("Agent-1"), Some(50));
        assert!(third.newly_eliminated.is_empty());
    }

    fn ring(seed: u64) -> Orchestrator {
        let queries: Vec<Arc<dyn DecisionQuery>> = (1..=8)
            .map(|i| -> Arc<dyn DecisionQuery> {
                let reply: &'static str = match i % 8 + 1 {
                    1 => "SEND 1 TO Agent-1",
                    2 => "SEND 1 TO Agent-2",
                    3 => "SEND 1 TO Agent-3",
                    4 => "SEND 1 TO Agent-4",
                    5 => "SEND 1 TO Agent-5",
                    6 => "SEND 1 TO Agent-6",
                    7 => "SEND 1 TO Agent-7",
                    _ => "SEND 1 TO Agent-8",
                };
                Script::new(&[reply; 6])
            })
            .collect();
        let config = ArenaConfig {
            seed,
            ..config(6, 100)
        };
        arena(config, queries, InMemoryLedger::shared(800))
    }

    fn execution_orders(report: &RunReport) -> Vec<Vec<String>> {
        report
            .log
            .rounds()
            .iter()
            .map(|r| r.transfers.iter().map(|t| t.from.clone()).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_transfer_order_is_shuffled_per_round() {
        let roster: Vec<String> = (1..=8).map(|i| format!("Agent-{}", i)).collect();

        let orders = execution_orders(&ring(7).run().await.unwrap());
        assert!(orders.iter().all(|o| o.len() == 8));
        assert!(orders.iter().any(|o| *o != roster));
        assert!(orders.windows(2).any(|w| w[0] != w[1]));

        let same = execution_orders(&ring(7).run().await.unwrap());
        assert_eq!(orders, same);

        let other = execution_orders(&ring(8).run().await.unwrap());
        assert_ne!(orders, other);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_concurrency_is_bounded() {
        let counting = Arc::new(Counting::default());
        let queries: Vec<Arc<dyn DecisionQuery>> = (0..10)
            .map(|_| counting.clone() as Arc<dyn DecisionQuery>)
            .collect();
        let config = ArenaConfig {
            concurrency: 3,
            ..config(2, 100)
        };
        let mut orchestrator = arena(config, queries, InMemoryLedger::shared(1_000));

        let report = orchestrator.run().await.unwrap();
        assert_eq!(report.stats.calls, 20);
        assert_eq!(counting.peak.load(Ordering::SeqCst), 3);
        assert_eq!(counting.in_flight.load(Ordering::SeqCst), 0);
    }
}
