//! Ledger capability: the authoritative store of account balances.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::AccountRef;

/// Abstraction over the settlement mechanism that actually holds funds.
///
/// The core is agnostic to how balances are moved; it only requires that a
/// successful `transfer` moves exactly `amount` and a failed one moves nothing.
///
/// # Money Flow
///
/// ```text
///  Settlement authority            Accounts
///        |                            |
///        |-- fund(acct, n) ---------->|   (setup, outside the round loop)
///        |                            |-- transfer(a, b, n) --> b
///        |<-- recover(acct) ----------|   (teardown, outside the round loop)
/// ```
#[async_trait]
pub trait Ledger: Send + Sync + 'static {
    /// Returns the authoritative balance of an account.
    async fn balance(&self, account: &AccountRef) -> Result<u64, EnvError>;

    /// Moves `amount` from one account to another, all or nothing.
    ///
    /// # Returns
    /// * `Ok(())` - Funds moved
    /// * `Err(EnvError::InsufficientFunds)` - Source cannot cover the amount
    /// * `Err(EnvError::LedgerError)` - Any other settlement failure
    async fn transfer(&self, from: &AccountRef, to: &AccountRef, amount: u64) -> Result<(), EnvError>;

    /// Credits an account from the settlement authority's reserve.
    async fn fund(&self, account: &AccountRef, amount: u64) -> Result<(), EnvError>;

    /// Returns an account's whole balance to the settlement authority.
    ///
    /// # Returns
    /// The amount recovered.
    async fn recover(&self, account: &AccountRef) -> Result<u64, EnvError>;
}
