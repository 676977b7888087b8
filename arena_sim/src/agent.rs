//! Simulated decision makers.
//!
//! Stand-ins for the real reasoning capability. Each implements
//! `DecisionQuery` and answers with free-form text in the action language,
//! including the occasional malformed line a real model would produce.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arena_env::{Decision, DecisionQuery, DecisionRequest, EnvError, TokenUsage};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::priming::Priming;

/// Rough token estimate for a request, so usage totals are non-trivial.
fn usage_for(request: &DecisionRequest, reply: &str) -> TokenUsage {
    let history = request.public_history.len() + request.private_history.len();
    TokenUsage {
        input_tokens: 200 + 20 * request.peers.len() as u64 + 30 * history as u64,
        output_tokens: (reply.len() as u64 / 4).max(1),
    }
}

// ============================================================================
// SCRIPTED
// ============================================================================

/// Replies from a fixed script, one entry per round.
///
/// Rounds past the end of the script get the fallback reply. Replies may
/// use `{balance}`, `{peer}` (first peer) and `{round}` placeholders.
pub struct ScriptedAgent {
    replies: Vec<String>,
    fallback: String,
}

impl ScriptedAgent {
    pub fn new<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            fallback: "PASS".to_string(),
        }
    }

    /// Gives the same reply every round.
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self {
            replies: Vec::new(),
            fallback: reply.into(),
        }
    }

    fn reply_for(&self, request: &DecisionRequest) -> String {
        let template = self
            .replies
            .get(request.round.saturating_sub(1) as usize)
            .unwrap_or(&self.fallback);
        template
            .replace("{balance}", &request.balance.to_string())
            .replace("{peer}", request.peers.first().map(String::as_str).unwrap_or(""))
            .replace("{round}", &request.round.to_string())
    }
}

#[async_trait]
impl DecisionQuery for ScriptedAgent {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, EnvError> {
        let reply = self.reply_for(request);
        let usage = usage_for(request, &reply);
        Ok(Decision::from_text(reply).with_usage(usage))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ============================================================================
// RANDOM
// ============================================================================

/// Seeded random agent whose behaviour is biased by its priming.
pub struct RandomAgent {
    priming: Priming,
    name: String,
    rng: Mutex<ChaCha8Rng>,
}

impl RandomAgent {
    pub fn new(priming: Priming, seed: u64) -> Self {
        Self {
            priming,
            name: format!("random-{}", priming.name()),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    pub fn priming(&self) -> Priming {
        self.priming
    }

    fn compose(&self, request: &DecisionRequest) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let disposition = self.priming.disposition();
        let mut lines = Vec::new();

        if rng.gen_bool(0.05) {
            lines.push(self.noise(&mut rng));
        }

        let max_amount = ((request.balance as f64) * disposition.generosity).floor() as u64;
        for _ in 0..request.limits.max_transfers {
            if max_amount == 0 || !rng.gen_bool(disposition.send) {
                break;
            }
            if let Some(peer) = self.pick_peer(request, &mut rng) {
                let amount = rng.gen_range(1..=max_amount);
                lines.push(format!("SEND {} TO {}", amount, peer));
            }
        }

        if rng.gen_bool(disposition.promise) {
            if let Some(peer) = self.pick_peer(request, &mut rng) {
                let amount = rng.gen_range(5..=50);
                lines.push(format!(
                    "MESSAGE {} \"If you back me, I'll send you {} next round.\"",
                    peer, amount
                ));
            }
        }

        if rng.gen_bool(disposition.broadcast) {
            lines.push(format!("BROADCAST \"{}\"", self.slogan(&mut rng)));
        }

        if lines.is_empty() {
            lines.push("PASS".to_string());
        }
        lines.join("\n")
    }

    /// Prefers peers that are still solvent.
    fn pick_peer<'r>(&self, request: &'r DecisionRequest, rng: &mut ChaCha8Rng) -> Option<&'r str> {
        let solvent: Vec<&String> = request
            .peers
            .iter()
            .filter(|p| !request.eliminated_peers.contains(p))
            .collect();
        let pool: Vec<&String> = if solvent.is_empty() {
            request.peers.iter().collect()
        } else {
            solvent
        };
        pool.choose(rng).copied().map(String::as_str)
    }

    fn slogan(&self, rng: &mut ChaCha8Rng) -> &'static str {
        let slogans: &[&'static str] = match self.priming {
            Priming::Neutral => &["Round update: holding steady.", "Open to trades."],
            Priming::Competitive => &["I'm not giving anything away.", "May the best agent win."],
            Priming::Cooperative => &["Anyone running low, ask and I'll help.", "We all do better together."],
            Priming::Strategic => &["Looking for reliable partners.", "Remember who kept their word."],
        };
        slogans.choose(rng).copied().unwrap_or("PASS")
    }

    fn noise(&self, rng: &mut ChaCha8Rng) -> String {
        let noise = [
            "Let me think about this carefully.",
            "SEND lots TO everyone",
            "# weighing my options",
            "MESSAGE nobody \"hello?\"",
            "BROADCAST \"\"",
        ];
        noise.choose(rng).copied().unwrap_or_default().to_string()
    }
}

#[async_trait]
impl DecisionQuery for RandomAgent {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, EnvError> {
        let reply = self.compose(request);
        let usage = usage_for(request, &reply);
        Ok(Decision::from_text(reply).with_usage(usage))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// FAULTY
// ============================================================================

/// Fails on chosen rounds, otherwise defers to the wrapped agent.
pub struct FlakyAgent {
    inner: Arc<dyn DecisionQuery>,
    failing_rounds: HashSet<u32>,
}

impl FlakyAgent {
    pub fn new(inner: Arc<dyn DecisionQuery>, failing_rounds: impl IntoIterator<Item = u32>) -> Self {
        Self {
            inner,
            failing_rounds: failing_rounds.into_iter().collect(),
        }
    }

    /// Picks each of `1..=rounds` independently with probability `rate`.
    pub fn with_rate(inner: Arc<dyn DecisionQuery>, rounds: u32, rate: f64, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let rate = rate.clamp(0.0, 1.0);
        let failing: Vec<u32> = (1..=rounds).filter(|_| rng.gen_bool(rate)).collect();
        Self::new(inner, failing)
    }

    pub fn fails_on(&self, round: u32) -> bool {
        self.failing_rounds.contains(&round)
    }
}

#[async_trait]
impl DecisionQuery for FlakyAgent {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, EnvError> {
        if self.fails_on(request.round) {
            return Err(EnvError::query(format!("simulated outage in round {}", request.round)));
        }
        self.inner.decide(request).await
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Sleeps before answering on every `every`-th round.
pub struct SlowAgent {
    inner: Arc<dyn DecisionQuery>,
    delay: Duration,
    every: u32,
}

impl SlowAgent {
    pub fn new(inner: Arc<dyn DecisionQuery>, delay: Duration, every: u32) -> Self {
        Self {
            inner,
            delay,
            every: every.max(1),
        }
    }
}

#[async_trait]
impl DecisionQuery for SlowAgent {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, EnvError> {
        if request.round % self.every == 0 {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.decide(request).await
    }

    fn name(&self) -> &str {
        "slow"
    }
}
