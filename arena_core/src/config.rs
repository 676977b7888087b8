//! Run configuration, loadable from TOML.

use std::fs;
use std::path::Path;
use std::time::Duration;

use arena_env::RateLimits;
use serde::{Deserialize, Serialize};

use crate::error::ArenaError;

/// Configuration for one Arena run.
///
/// Missing fields take the defaults of the reference experiment
/// (100 rounds, 1000 units per agent).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArenaConfig {
    /// Number of rounds to run
    pub rounds: u32,

    /// Units credited to every account at setup
    pub starting_balance: u64,

    /// Whether setup funds accounts from the settlement authority.
    /// Disable when balances already exist on the ledger.
    pub fund_accounts: bool,

    /// Maximum concurrent decision queries
    pub concurrency: usize,

    /// Smallest amount a SEND may carry
    pub min_transfer_amount: u64,

    /// Per-round quotas
    pub limits: RateLimits,

    /// How many past rounds of messages an agent sees
    pub message_lookback: u32,

    /// Timeout for a single decision query
    pub query_timeout_ms: u64,

    /// Timeout for a single ledger call
    pub ledger_timeout_ms: u64,

    /// Seed for identity assignment and per-round transfer order
    pub seed: u64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            rounds: 100,
            starting_balance: 1_000,
            fund_accounts: true,
            concurrency: 4,
            min_transfer_amount: 1,
            limits: RateLimits::default(),
            message_lookback: 3,
            query_timeout_ms: 30_000,
            ledger_timeout_ms: 5_000,
            seed: 42,
        }
    }
}

impl ArenaConfig {
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.rounds == 0 {
            return Err(ArenaError::config("rounds must be > 0"));
        }
        if self.concurrency == 0 {
            return Err(ArenaError::config("concurrency must be > 0"));
        }
        if self.min_transfer_amount == 0 {
            return Err(ArenaError::config("min_transfer_amount must be > 0"));
        }
        if self.query_timeout_ms == 0 || self.ledger_timeout_ms == 0 {
            return Err(ArenaError::config("timeouts must be > 0"));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ArenaConfig::default()`.
pub fn load_config(path: &Path) -> Result<ArenaConfig, ArenaError> {
    if !path.exists() {
        let cfg = ArenaConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| ArenaError::config(format!("read {}: {}", path.display(), e)))?;
    let cfg: ArenaConfig = toml::from_str(&contents)
        .map_err(|e| ArenaError::config(format!("parse {}: {}", path.display(), e)))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ArenaConfig::default());
    }

    #[test]
    fn load_partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("arena.toml");
        fs::write(
            &path,
            "rounds = 10\nstarting_balance = 100\n\n[limits]\nmax_transfers = 1\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.rounds, 10);
        assert_eq!(cfg.starting_balance, 100);
        assert_eq!(cfg.limits.max_transfers, 1);
        assert_eq!(cfg.limits.max_broadcasts, RateLimits::default().max_broadcasts);
        assert_eq!(cfg.concurrency, 4);
    }

    #[test]
    fn validate_rejects_zero_rounds_and_concurrency() {
        let cfg = ArenaConfig { rounds: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(ArenaError::Config(_))));

        let cfg = ArenaConfig { concurrency: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("arena.toml");
        fs::write(&path, "rounds = \"many\"\n").expect("write");
        assert!(load_config(&path).is_err());
    }
}
