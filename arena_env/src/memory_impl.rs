//! Reference implementation of `Ledger` held entirely in memory.

use crate::error::EnvError;
use crate::types::AccountRef;
use crate::Ledger;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<AccountRef, u64>,

    /// Funds held by the settlement authority
    reserve: u64,
}

/// In-memory ledger backed by a tokio mutex.
///
/// Used by the simulation harness and by tests. Every operation is atomic
/// with respect to every other operation on the same ledger.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    /// Creates a ledger whose settlement authority holds `reserve`.
    pub fn new(reserve: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                accounts: HashMap::new(),
                reserve,
            })),
        }
    }

    /// Creates an Arc-wrapped ledger for sharing across tasks.
    pub fn shared(reserve: u64) -> Arc<Self> {
        Arc::new(Self::new(reserve))
    }

    /// Opens an empty account. Opening an existing account is a no-op.
    pub async fn open_account(&self, account: &AccountRef) {
        let mut state = self.state.lock().await;
        state.accounts.entry(account.clone()).or_insert(0);
    }

    /// Returns the settlement authority's current reserve.
    pub async fn reserve(&self) -> u64 {
        self.state.lock().await.reserve
    }

    /// Returns accounts plus reserve; constant except for bugs.
    pub async fn total_supply(&self) -> u64 {
        let state = self.state.lock().await;
        state.accounts.values().sum::<u64>() + state.reserve
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn balance(&self, account: &AccountRef) -> Result<u64, EnvError> {
        let state = self.state.lock().await;
        state
            .accounts
            .get(account)
            .copied()
            .ok_or_else(|| EnvError::unknown_account(account))
    }

    async fn transfer(&self, from: &AccountRef, to: &AccountRef, amount: u64) -> Result<(), EnvError> {
        let mut state = self.state.lock().await;

        if !state.accounts.contains_key(to) {
            return Err(EnvError::unknown_account(to));
        }
        let balance = *state
            .accounts
            .get(from)
            .ok_or_else(|| EnvError::unknown_account(from))?;
        if balance < amount {
            return Err(EnvError::InsufficientFunds { balance, requested: amount });
        }

        if let Some(source) = state.accounts.get_mut(from) {
            *source -= amount;
        }
        if let Some(dest) = state.accounts.get_mut(to) {
            *dest += amount;
        }
        Ok(())
    }

    async fn fund(&self, account: &AccountRef, amount: u64) -> Result<(), EnvError> {
        let mut state = self.state.lock().await;
        if state.reserve < amount {
            return Err(EnvError::ledger(format!(
                "reserve {} cannot fund {} with {}",
                state.reserve, account, amount
            )));
        }
        state.reserve -= amount;
        *state.accounts.entry(account.clone()).or_insert(0) += amount;
        Ok(())
    }

    async fn recover(&self, account: &AccountRef) -> Result<u64, EnvError> {
        let mut state = self.state.lock().await;
        let recovered = match state.accounts.get_mut(account) {
            Some(balance) => std::mem::take(balance),
            None => return Err(EnvError::unknown_account(account)),
        };
        state.reserve += recovered;
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(name: &str) -> AccountRef {
        AccountRef::new(name)
    }

    #[tokio::test]
    async fn test_fund_moves_reserve_into_account() {
        let ledger = InMemoryLedger::new(1_000);
        ledger.fund(&acct("a"), 400).await.unwrap();

        assert_eq!(ledger.balance(&acct("a")).await.unwrap(), 400);
        assert_eq!(ledger.reserve().await, 600);
        assert_eq!(ledger.total_supply().await, 1_000);
    }

    #[tokio::test]
    async fn test_fund_beyond_reserve_fails() {
        let ledger = InMemoryLedger::new(10);
        assert!(ledger.fund(&acct("a"), 11).await.is_err());
        assert_eq!(ledger.reserve().await, 10);
    }

    #[tokio::test]
    async fn test_transfer_is_all_or_nothing() {
        let ledger = InMemoryLedger::new(200);
        ledger.fund(&acct("a"), 100).await.unwrap();
        ledger.fund(&acct("b"), 100).await.unwrap();

        ledger.transfer(&acct("a"), &acct("b"), 30).await.unwrap();
        assert_eq!(ledger.balance(&acct("a")).await.unwrap(), 70);
        assert_eq!(ledger.balance(&acct("b")).await.unwrap(), 130);

        let err = ledger.transfer(&acct("a"), &acct("b"), 71).await.unwrap_err();
        assert_eq!(err, EnvError::InsufficientFunds { balance: 70, requested: 71 });
        assert_eq!(ledger.balance(&acct("a")).await.unwrap(), 70);
        assert_eq!(ledger.total_supply().await, 200);
    }

    #[tokio::test]
    async fn test_unknown_accounts_are_rejected() {
        let ledger = InMemoryLedger::new(100);
        ledger.fund(&acct("a"), 50).await.unwrap();

        assert!(matches!(
            ledger.balance(&acct("ghost")).await,
            Err(EnvError::UnknownAccount(_))
        ));
        assert!(ledger.transfer(&acct("a"), &acct("ghost"), 1).await.is_err());
        assert_eq!(ledger.balance(&acct("a")).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_recover_returns_funds_to_reserve() {
        let ledger = InMemoryLedger::new(100);
        ledger.open_account(&acct("a")).await;
        ledger.fund(&acct("a"), 60).await.unwrap();

        assert_eq!(ledger.recover(&acct("a")).await.unwrap(), 60);
        assert_eq!(ledger.balance(&acct("a")).await.unwrap(), 0);
        assert_eq!(ledger.reserve().await, 100);
    }
}
