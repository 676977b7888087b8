//! Append-only persistence for round summaries, transfers and messages.
//!
//! Sinks are write-only from the orchestrator's point of view. A failing
//! sink is logged and never aborts a round; the in-memory event log stays
//! the authoritative record for analysis.

use std::path::Path;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ArenaError;
use crate::event_log::RoundSummary;
use crate::types::{Message, Transfer};

/// Trait for append-only run storage, keyed by run identifier.
///
/// Implementations must be thread-safe.
pub trait EventSink: Send + Sync {
    fn record_round(&self, run_id: &str, summary: &RoundSummary) -> Result<(), ArenaError>;

    fn record_transfer(&self, run_id: &str, transfer: &Transfer) -> Result<(), ArenaError>;

    fn record_message(&self, run_id: &str, message: &Message) -> Result<(), ArenaError>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Sink that keeps everything in memory (tests, dry runs).
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    rounds: Mutex<Vec<(String, RoundSummary)>>,
    transfers: Mutex<Vec<(String, Transfer)>>,
    messages: Mutex<Vec<(String, Message)>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rounds(&self, run_id: &str) -> Vec<RoundSummary> {
        select(&self.rounds, run_id)
    }

    pub fn transfers(&self, run_id: &str) -> Vec<Transfer> {
        select(&self.transfers, run_id)
    }

    pub fn messages(&self, run_id: &str) -> Vec<Message> {
        select(&self.messages, run_id)
    }
}

fn select<T: Clone>(entries: &Mutex<Vec<(String, T)>>, run_id: &str) -> Vec<T> {
    entries
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .iter()
        .filter(|(run, _)| run == run_id)
        .map(|(_, entry)| entry.clone())
        .collect()
}

fn push<T>(entries: &Mutex<Vec<(String, T)>>, run_id: &str, entry: T) -> Result<(), ArenaError> {
    entries
        .lock()
        .map_err(|_| ArenaError::storage("memory store lock poisoned"))?
        .push((run_id.to_string(), entry));
    Ok(())
}

impl EventSink for MemoryEventStore {
    fn record_round(&self, run_id: &str, summary: &RoundSummary) -> Result<(), ArenaError> {
        push(&self.rounds, run_id, summary.clone())
    }

    fn record_transfer(&self, run_id: &str, transfer: &Transfer) -> Result<(), ArenaError> {
        push(&self.transfers, run_id, transfer.clone())
    }

    fn record_message(&self, run_id: &str, message: &Message) -> Result<(), ArenaError> {
        push(&self.messages, run_id, message.clone())
    }
}

// ============================================================================
// SLED STORE
// ============================================================================

/// Sled-based persistent event store
///
/// Values are JSON. Keys sort by run, kind, round, then insertion order:
/// `<run>/round/<round>`, `<run>/transfer/<round>/<seq>`,
/// `<run>/message/<round>/<seq>`.
pub struct SledEventStore {
    db: sled::Db,
}

impl SledEventStore {
    /// Open a persistent store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ArenaError> {
        let db = sled::open(path)
            .map_err(|e| ArenaError::storage(format!("Failed to open sled DB: {}", e)))?;
        Ok(Self { db })
    }

    /// Create a temporary store (for testing)
    #[cfg(test)]
    pub fn open_temp() -> Result<Self, ArenaError> {
        let config = sled::Config::new().temporary(true);
        let db = config
            .open()
            .map_err(|e| ArenaError::storage(format!("Failed to open temp DB: {}", e)))?;
        Ok(Self { db })
    }

    /// Reads back every round summary of a run, in round order.
    pub fn rounds(&self, run_id: &str) -> Result<Vec<RoundSummary>, ArenaError> {
        self.scan(&format!("{}/round/", run_id))
    }

    pub fn transfers(&self, run_id: &str) -> Result<Vec<Transfer>, ArenaError> {
        self.scan(&format!("{}/transfer/", run_id))
    }

    pub fn messages(&self, run_id: &str) -> Result<Vec<Message>, ArenaError> {
        self.scan(&format!("{}/message/", run_id))
    }

    fn scan<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, ArenaError> {
        let mut entries = Vec::new();
        for result in self.db.scan_prefix(prefix.as_bytes()) {
            let (_, value) = result
                .map_err(|e| ArenaError::storage(format!("Iteration failed: {}", e)))?;
            let entry = serde_json::from_slice(&value)
                .map_err(|e| ArenaError::storage(format!("Corrupt entry under {}: {}", prefix, e)))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    fn insert<T: Serialize>(&self, key: String, value: &T) -> Result<(), ArenaError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| ArenaError::storage(format!("Serialize failed: {}", e)))?;
        self.db
            .insert(key.as_bytes(), bytes)
            .map_err(|e| ArenaError::storage(format!("Insert failed: {}", e)))?;
        Ok(())
    }

    fn next_seq(&self) -> Result<u64, ArenaError> {
        self.db
            .generate_id()
            .map_err(|e| ArenaError::storage(format!("Id generation failed: {}", e)))
    }
}

impl EventSink for SledEventStore {
    fn record_round(&self, run_id: &str, summary: &RoundSummary) -> Result<(), ArenaError> {
        self.insert(format!("{}/round/{:06}", run_id, summary.round), summary)?;
        self.db
            .flush()
            .map_err(|e| ArenaError::storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }

    fn record_transfer(&self, run_id: &str, transfer: &Transfer) -> Result<(), ArenaError> {
        let seq = self.next_seq()?;
        self.insert(format!("{}/transfer/{:06}/{:012}", run_id, transfer.round, seq), transfer)
    }

    fn record_message(&self, run_id: &str, message: &Message) -> Result<(), ArenaError> {
        let seq = self.next_seq()?;
        self.insert(format!("{}/message/{:06}/{:012}", run_id, message.round, seq), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::AgentBalance;
    use crate::types::{Channel, TransferOutcome};

    fn summary(round: u32) -> RoundSummary {
        RoundSummary {
            round,
            balances_before: vec![AgentBalance { agent: "Agent-1".into(), balance: 10 }],
            balances_after: vec![AgentBalance { agent: "Agent-1".into(), balance: 10 }],
            actions: Vec::new(),
            transfers: Vec::new(),
            messages: Vec::new(),
            newly_eliminated: Vec::new(),
            failed_queries: Vec::new(),
        }
    }

    fn transfer(round: u32, amount: u64) -> Transfer {
        Transfer {
            round,
            from: "Agent-1".into(),
            to: "Agent-2".into(),
            amount,
            outcome: TransferOutcome::Applied,
        }
    }

    #[test]
    fn test_memory_store_separates_runs() {
        let store = MemoryEventStore::new();
        store.record_round("a", &summary(1)).unwrap();
        store.record_round("b", &summary(1)).unwrap();
        store.record_transfer("a", &transfer(1, 5)).unwrap();

        assert_eq!(store.rounds("a").len(), 1);
        assert_eq!(store.transfers("a").len(), 1);
        assert!(store.transfers("b").is_empty());
    }

    #[test]
    fn test_sled_store_round_trips_in_order() {
        let store = SledEventStore::open_temp().unwrap();
        for round in [2, 1, 10] {
            store.record_round("run-1", &summary(round)).unwrap();
        }
        store.record_transfer("run-1", &transfer(1, 5)).unwrap();
        store.record_transfer("run-1", &transfer(1, 7)).unwrap();
        store.record_round("run-2", &summary(1)).unwrap();

        let rounds: Vec<u32> = store.rounds("run-1").unwrap().iter().map(|r| r.round).collect();
        assert_eq!(rounds, vec![1, 2, 10]);

        let amounts: Vec<u64> = store.transfers("run-1").unwrap().iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![5, 7]);
        assert_eq!(store.rounds("run-2").unwrap().len(), 1);
    }

    #[test]
    fn test_sled_store_messages() {
        let store = SledEventStore::open_temp().unwrap();
        let message = Message {
            round: 3,
            from: "Agent-1".into(),
            to: None,
            content: "hello".into(),
            channel: Channel::Public,
        };
        store.record_message("run", &message).unwrap();
        assert_eq!(store.messages("run").unwrap(), vec![message]);
    }
}
