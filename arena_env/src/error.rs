//! Error types for the Arena capability layer.

use thiserror::Error;

/// Errors raised by external capabilities (decision queries, ledger).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvError {
    /// The decision query failed or returned nothing usable
    #[error("Decision query failed: {0}")]
    QueryFailed(String),

    /// The ledger rejected or could not complete an operation
    #[error("Ledger error: {0}")]
    LedgerError(String),

    /// The ledger has no account with this reference
    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    /// The source account cannot cover the requested amount
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a query failure.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }

    /// Creates a ledger failure.
    pub fn ledger(msg: impl Into<String>) -> Self {
        Self::LedgerError(msg.into())
    }

    /// Creates an unknown-account error.
    pub fn unknown_account(account: impl std::fmt::Display) -> Self {
        Self::UnknownAccount(account.to_string())
    }

    /// Returns true if this error came from an expired timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
