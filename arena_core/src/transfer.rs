//! Transfer Executor - validates and applies balance-moving actions.
//!
//! # Balance Cache
//!
//! The executor keeps a read-through cache of every agent's balance. The
//! ledger is the source of truth; the cache is refreshed at each round
//! boundary and otherwise only updated optimistically after a transfer the
//! ledger accepted. Staleness window: one round. The ledger is assumed to
//! have no other writer during a run.
//!
//! # Validation Order
//!
//! First failure wins, nothing is mutated on rejection:
//! 1. target resolves to a known agent distinct from the source
//! 2. source has not been eliminated
//! 3. amount >= configured minimum
//! 4. cached source balance >= amount

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arena_env::{EnvError, Ledger};
use tracing::{debug, warn};

use crate::identity::IdentityMap;
use crate::types::{Agent, Transfer, TransferFailure, TransferOutcome};

/// Read-through cache of agent balances, in presentation order.
#[derive(Debug, Clone)]
pub struct BalanceCache {
    agents: Vec<Agent>,
    index: HashMap<String, usize>,
}

impl BalanceCache {
    pub fn new(agents: Vec<Agent>) -> Self {
        let index = agents
            .iter()
            .enumerate()
            .map(|(i, agent)| (agent.display_name.clone(), i))
            .collect();
        Self { agents, index }
    }

    pub fn get(&self, name: &str) -> Option<&Agent> {
        self.index.get(name).map(|&i| &self.agents[i])
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Agent> {
        match self.index.get(name) {
            Some(&i) => self.agents.get_mut(i),
            None => None,
        }
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }
}

/// Outcome of a round-boundary refresh.
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Agents whose balance could not be read (cache kept as-is)
    pub failures: Vec<(String, EnvError)>,

    /// Agents flagged as eliminated by this refresh
    pub newly_eliminated: Vec<String>,
}

/// Validates transfers and applies them through the ledger, one at a time.
pub struct TransferExecutor {
    ledger: Arc<dyn Ledger>,
    identities: Arc<IdentityMap>,
    cache: BalanceCache,
    min_amount: u64,
    timeout: Duration,
}

impl TransferExecutor {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        identities: Arc<IdentityMap>,
        agents: Vec<Agent>,
        min_amount: u64,
        timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            identities,
            cache: BalanceCache::new(agents),
            min_amount,
            timeout,
        }
    }

    pub fn cache(&self) -> &BalanceCache {
        &self.cache
    }

    pub fn balance(&self, name: &str) -> Option<u64> {
        self.cache.get(name).map(|a| a.balance)
    }

    /// Balances in presentation order.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        self.cache
            .agents()
            .iter()
            .map(|a| (a.display_name.clone(), a.balance))
            .collect()
    }

    /// Reloads every cached balance from the ledger.
    ///
    /// A failed read keeps the previous cached value and is reported.
    /// Elimination is monotonic: an agent is marked the first time a
    /// refresh reads zero and stays marked. The cache may already show
    /// zero from an optimistic update, so the flag, not the old balance,
    /// decides what is new.
    pub async fn refresh(&mut self) -> RefreshReport {
        let mut report = RefreshReport::default();
        let ledger = Arc::clone(&self.ledger);
        let timeout = self.timeout;

        for agent in self.cache.agents.iter_mut() {
            match with_timeout(timeout, ledger.balance(&agent.account)).await {
                Ok(balance) => {
                    agent.balance = balance;
                    if balance == 0 && !agent.eliminated {
                        agent.eliminated = true;
                        report.newly_eliminated.push(agent.display_name.clone());
                    }
                }
                Err(e) => {
                    warn!("Balance refresh failed for {}: {}", agent.display_name, e);
                    report.failures.push((agent.display_name.clone(), e));
                }
            }
        }
        report
    }

    /// Attempts one transfer. Never fails: problems become a rejected `Transfer`.
    pub async fn execute(&mut self, round: u32, from: &str, to: &str, amount: u64) -> Transfer {
        let (from, to) = match self.validate(from, to, amount) {
            Ok(pair) => pair,
            Err((from, to, reason)) => {
                debug!("Round {}: {} -> {} ({}) rejected: {}", round, from, to, amount, reason);
                return rejected(round, from, to, amount, reason);
            }
        };

        let (Some(source), Some(dest)) = (self.cache.get(&from), self.cache.get(&to)) else {
            return rejected(round, from, to, amount, TransferFailure::UnknownTarget);
        };
        let (from_account, to_account) = (source.account.clone(), dest.account.clone());

        let result = with_timeout(
            self.timeout,
            self.ledger.transfer(&from_account, &to_account, amount),
        )
        .await;

        match result {
            Ok(()) => {
                if let Some(source) = self.cache.get_mut(&from) {
                    source.balance -= amount;
                }
                if let Some(dest) = self.cache.get_mut(&to) {
                    dest.balance += amount;
                }
                debug!("Round {}: {} -> {} ({}) applied", round, from, to, amount);
                Transfer {
                    round,
                    from,
                    to,
                    amount,
                    outcome: TransferOutcome::Applied,
                }
            }
            Err(e) => {
                warn!("Round {}: ledger refused {} -> {} ({}): {}", round, from, to, amount, e);
                rejected(round, from, to, amount, TransferFailure::Ledger(e.to_string()))
            }
        }
    }

    /// Returns canonical (from, to) names or the first failure.
    fn validate(
        &self,
        from: &str,
        to: &str,
        amount: u64,
    ) -> Result<(String, String), (String, String, TransferFailure)> {
        let fail = |from: &str, to: &str, reason| Err((from.to_string(), to.to_string(), reason));

        let Some(from) = self.identities.resolve(from) else {
            return fail(from, to, TransferFailure::UnknownSource);
        };
        let Some(to) = self.identities.resolve(to) else {
            return fail(from, to, TransferFailure::UnknownTarget);
        };
        if from == to {
            return fail(from, to, TransferFailure::SelfTransfer);
        }
        if self.cache.get(from).is_some_and(|a| a.eliminated) {
            return fail(from, to, TransferFailure::Eliminated);
        }
        if amount < self.min_amount {
            return fail(
                from,
                to,
                TransferFailure::BelowMinimum { amount, minimum: self.min_amount },
            );
        }
        let balance = self.balance(from).unwrap_or(0);
        if balance < amount {
            return fail(
                from,
                to,
                TransferFailure::InsufficientBalance { balance, requested: amount },
            );
        }
        Ok((from.to_string(), to.to_string()))
    }
}

fn rejected(round: u32, from: String, to: String, amount: u64, reason: TransferFailure) -> Transfer {
    Transfer {
        round,
        from,
        to,
        amount,
        outcome: TransferOutcome::Rejected { reason },
    }
}

/// Runs a ledger call under a timeout, folding expiry into `EnvError::Timeout`.
pub(crate) async fn with_timeout<T>(
    timeout: Duration,
    call: impl std::future::Future<Output = Result<T, EnvError>>,
) -> Result<T, EnvError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(EnvError::Timeout(timeout.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_env::{AccountRef, AgentId, InMemoryLedger};
    use async_trait::async_trait;

    async fn setup(balances: &[u64]) -> (Arc<InMemoryLedger>, TransferExecutor) {
        let ledger = InMemoryLedger::shared(balances.iter().sum());
        let mut pairs = Vec::new();
        let mut agents = Vec::new();
        for (i, &balance) in balances.iter().enumerate() {
            let id = AgentId::from_seed(i as u64);
            let name = format!("Agent-{}", i + 1);
            let account = AccountRef::new(format!("acct-{}", i + 1));
            ledger.fund(&account, balance).await.unwrap();
            pairs.push((id, name.clone()));
            agents.push(Agent {
                id,
                display_name: name,
                account,
                balance,
                eliminated: false,
            });
        }
        let identities = Arc::new(IdentityMap::from_pairs(pairs).unwrap());
        let executor = TransferExecutor::new(
            ledger.clone(),
            identities,
            agents,
            5,
            Duration::from_millis(500),
        );
        (ledger, executor)
    }

    #[tokio::test]
    async fn test_applied_transfer_updates_cache_and_ledger() {
        let (ledger, mut executor) = setup(&[100, 100]).await;
        let transfer = executor.execute(1, "Agent-1", "agent-2", 30).await;

        assert!(transfer.is_applied());
        assert_eq!(transfer.to, "Agent-2");
        assert_eq!(executor.balance("Agent-1"), Some(70));
        assert_eq!(executor.balance("Agent-2"), Some(130));
        assert_eq!(ledger.balance(&AccountRef::new("acct-2")).await.unwrap(), 130);
    }

    #[tokio::test]
    async fn test_rejections_leave_cache_untouched() {
        let (_ledger, mut executor) = setup(&[100, 100]).await;
        let before = executor.snapshot();

        let below = executor.execute(1, "Agent-1", "Agent-2", 4).await;
        assert_eq!(
            below.failure(),
            Some(&TransferFailure::BelowMinimum { amount: 4, minimum: 5 })
        );

        let over = executor.execute(1, "Agent-1", "Agent-2", 101).await;
        assert_eq!(
            over.failure(),
            Some(&TransferFailure::InsufficientBalance { balance: 100, requested: 101 })
        );

        let unknown = executor.execute(1, "Agent-1", "Agent-7", 10).await;
        assert_eq!(unknown.failure(), Some(&TransferFailure::UnknownTarget));

        let own = executor.execute(1, "Agent-1", "AGENT-1", 10).await;
        assert_eq!(own.failure(), Some(&TransferFailure::SelfTransfer));

        assert_eq!(executor.snapshot(), before);
    }

    #[tokio::test]
    async fn test_target_is_checked_before_amount() {
        let (_ledger, mut executor) = setup(&[100, 100]).await;
        let transfer = executor.execute(1, "Agent-1", "Agent-9", 1_000).await;
        assert_eq!(transfer.failure(), Some(&TransferFailure::UnknownTarget));
    }

    struct BrokenLedger;

    #[async_trait]
    impl Ledger for BrokenLedger {
        async fn balance(&self, _account: &AccountRef) -> Result<u64, EnvError> {
            Err(EnvError::ledger("offline"))
        }
        async fn transfer(&self, _from: &AccountRef, _to: &AccountRef, _amount: u64) -> Result<(), EnvError> {
            Err(EnvError::ledger("offline"))
        }
        async fn fund(&self, _account: &AccountRef, _amount: u64) -> Result<(), EnvError> {
            Err(EnvError::ledger("offline"))
        }
        async fn recover(&self, _account: &AccountRef) -> Result<u64, EnvError> {
            Err(EnvError::ledger("offline"))
        }
    }

    #[tokio::test]
    async fn test_ledger_failure_is_a_rejected_transfer() {
        let (_ledger, executor) = setup(&[100, 100]).await;
        let mut executor = TransferExecutor::new(
            Arc::new(BrokenLedger),
            executor.identities.clone(),
            executor.cache.agents().to_vec(),
            1,
            Duration::from_millis(100),
        );

        let transfer = executor.execute(1, "Agent-1", "Agent-2", 10).await;
        assert!(matches!(transfer.failure(), Some(TransferFailure::Ledger(_))));
        assert_eq!(executor.balance("Agent-1"), Some(100));

        let report = executor.refresh().await;
        assert_eq!(report.failures.len(), 2);
        assert_eq!(executor.balance("Agent-2"), Some(100));
    }

    #[tokio::test]
    async fn test_eliminated_source_cannot_send_after_refunding() {
        let (ledger, mut executor) = setup(&[50, 50]).await;
        assert!(executor.execute(1, "Agent-1", "Agent-2", 50).await.is_applied());
        executor.refresh().await;

        ledger
            .transfer(&AccountRef::new("acct-2"), &AccountRef::new("acct-1"), 20)
            .await
            .unwrap();
        executor.refresh().await;
        assert_eq!(executor.balance("Agent-1"), Some(20));

        let transfer = executor.execute(2, "Agent-1", "Agent-2", 10).await;
        assert_eq!(transfer.failure(), Some(&TransferFailure::Eliminated));
        assert_eq!(executor.balance("Agent-1"), Some(20));

        // Receiving is still allowed.
        assert!(executor.execute(2, "Agent-2", "Agent-1", 10).await.is_applied());
    }

    #[tokio::test]
    async fn test_refresh_marks_elimination_once() {
        let (ledger, mut executor) = setup(&[50, 50]).await;
        ledger
            .transfer(&AccountRef::new("acct-1"), &AccountRef::new("acct-2"), 50)
            .await
            .unwrap();

        let report = executor.refresh().await;
        assert_eq!(report.newly_eliminated, vec!["Agent-1".to_string()]);
        assert!(executor.cache().get("Agent-1").unwrap().eliminated);

        let again = executor.refresh().await;
        assert!(again.newly_eliminated.is_empty());
    }
}
