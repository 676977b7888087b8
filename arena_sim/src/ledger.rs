//! Simulated ledger with fault injection.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arena_env::{AccountRef, EnvError, InMemoryLedger, Ledger};
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Ledger controller for fault injection.
///
/// Cloning shares the same fault state, so a controller handed to a test
/// keeps steering a ledger already owned by the orchestrator.
#[derive(Clone)]
pub struct SimLedgerController {
    /// Accounts whose reads and transfers fail
    failing_accounts: Arc<Mutex<HashSet<AccountRef>>>,

    /// Every call fails while set
    unreachable: Arc<AtomicBool>,

    /// Probability that a transfer is dropped, with its RNG
    transfer_loss: Arc<Mutex<(f64, ChaCha8Rng)>>,

    /// Delay before every call
    latency: Arc<Mutex<Duration>>,
}

impl SimLedgerController {
    pub fn new(seed: u64) -> Self {
        Self {
            failing_accounts: Arc::new(Mutex::new(HashSet::new())),
            unreachable: Arc::new(AtomicBool::new(false)),
            transfer_loss: Arc::new(Mutex::new((0.0, ChaCha8Rng::seed_from_u64(seed)))),
            latency: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn fail_account(&self, account: &AccountRef) {
        self.failing_accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account.clone());
    }

    pub fn restore_account(&self, account: &AccountRef) {
        self.failing_accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(account);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Sets the probability (0.0 - 1.0) that a transfer is dropped.
    pub fn set_transfer_loss(&self, rate: f64) {
        self.transfer_loss
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .0 = rate.clamp(0.0, 1.0);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Heals every injected fault.
    pub fn heal_all(&self) {
        self.failing_accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.set_unreachable(false);
        self.set_transfer_loss(0.0);
        self.set_latency(Duration::ZERO);
    }

    async fn gate(&self, accounts: &[&AccountRef]) -> Result<(), EnvError> {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(EnvError::ledger("ledger unreachable"));
        }
        let failing = self
            .failing_accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(account) = accounts.iter().find(|a| failing.contains(**a)) {
            return Err(EnvError::ledger(format!("account {} unavailable", account)));
        }
        Ok(())
    }

    fn drop_transfer(&self) -> bool {
        let mut loss = self
            .transfer_loss
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let rate = loss.0;
        rate > 0.0 && loss.1.gen_bool(rate)
    }
}

/// In-memory ledger behind a fault-injecting gate.
pub struct SimLedger {
    inner: InMemoryLedger,
    controller: SimLedgerController,
}

impl SimLedger {
    /// Creates a ledger whose settlement authority holds `reserve`.
    pub fn new(reserve: u64, fault_seed: u64) -> Self {
        Self {
            inner: InMemoryLedger::new(reserve),
            controller: SimLedgerController::new(fault_seed),
        }
    }

    pub fn controller(&self) -> SimLedgerController {
        self.controller.clone()
    }

    /// Accounts plus reserve, read around any injected faults.
    pub async fn total_supply(&self) -> u64 {
        self.inner.total_supply().await
    }

    pub async fn reserve(&self) -> u64 {
        self.inner.reserve().await
    }
}

#[async_trait]
impl Ledger for SimLedger {
    async fn balance(&self, account: &AccountRef) -> Result<u64, EnvError> {
        self.controller.gate(&[account]).await?;
        self.inner.balance(account).await
    }

    async fn transfer(&self, from: &AccountRef, to: &AccountRef, amount: u64) -> Result<(), EnvError> {
        self.controller.gate(&[from, to]).await?;
        if self.controller.drop_transfer() {
            return Err(EnvError::ledger("transfer dropped"));
        }
        self.inner.transfer(from, to, amount).await
    }

    async fn fund(&self, account: &AccountRef, amount: u64) -> Result<(), EnvError> {
        self.controller.gate(&[account]).await?;
        self.inner.fund(account, amount).await
    }

    async fn recover(&self, account: &AccountRef) -> Result<u64, EnvError> {
        self.controller.gate(&[account]).await?;
        self.inner.recover(account).await
    }
}
