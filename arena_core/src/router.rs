//! Message Router - the append-only message log and its history windows.

use std::sync::Arc;

use tracing::debug;

use crate::identity::IdentityMap;
use crate::types::{Channel, Message};

/// Owns every message sent during a run.
///
/// History queries cover rounds `[max(1, current - lookback), current)`.
/// The current round is always excluded: when agents are queried, nobody
/// has acted yet this round.
pub struct MessageRouter {
    identities: Arc<IdentityMap>,
    log: Vec<Message>,
}

impl MessageRouter {
    pub fn new(identities: Arc<IdentityMap>) -> Self {
        Self {
            identities,
            log: Vec::new(),
        }
    }

    /// Appends a public message.
    pub fn add_broadcast(&mut self, round: u32, from: &str, content: &str) -> Message {
        let message = Message {
            round,
            from: self.canonical(from),
            to: None,
            content: content.to_string(),
            channel: Channel::Public,
        };
        self.log.push(message.clone());
        message
    }

    /// Appends a private message.
    ///
    /// Returns `None` (and records nothing) if `to` is not a known agent.
    pub fn add_private_message(
        &mut self,
        round: u32,
        from: &str,
        to: &str,
        content: &str,
    ) -> Option<Message> {
        let Some(to) = self.identities.resolve(to) else {
            debug!("Dropping private message from {} to unknown {}", from, to);
            return None;
        };
        let message = Message {
            round,
            from: self.canonical(from),
            to: Some(to.to_string()),
            content: content.to_string(),
            channel: Channel::Private,
        };
        self.log.push(message.clone());
        Some(message)
    }

    /// Broadcasts visible at `current_round`.
    pub fn public_messages(&self, current_round: u32, lookback: u32) -> Vec<&Message> {
        self.window(current_round, lookback)
            .filter(|m| m.channel == Channel::Public)
            .collect()
    }

    /// Private messages sent to or by `agent` visible at `current_round`.
    pub fn private_messages_for(
        &self,
        agent: &str,
        current_round: u32,
        lookback: u32,
    ) -> Vec<&Message> {
        let Some(agent) = self.identities.resolve(agent) else {
            return Vec::new();
        };
        self.window(current_round, lookback)
            .filter(|m| m.channel == Channel::Private)
            .filter(|m| m.from == agent || m.to.as_deref() == Some(agent))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    fn window(&self, current_round: u32, lookback: u32) -> impl Iterator<Item = &Message> {
        let start = current_round.saturating_sub(lookback).max(1);
        self.log
            .iter()
            .filter(move |m| m.round >= start && m.round < current_round)
    }

    fn canonical(&self, name: &str) -> String {
        self.identities
            .resolve(name)
            .unwrap_or(name)
            .to_string()
    }
}
