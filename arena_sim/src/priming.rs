//! Priming conditions: the strategy guidance given to simulated agents.

use serde::{Deserialize, Serialize};

use crate::scenarios::UnknownName;

/// Strategy guidance condition assigned to an agent.
///
/// The guidance text goes into every decision request; the name doubles as
/// the agent's faction label in the group analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priming {
    Neutral,
    Competitive,
    Cooperative,
    Strategic,
}

/// Per-round behaviour weights used by `RandomAgent`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Disposition {
    /// Probability of each SEND attempt
    pub send: f64,

    /// Largest share of the balance a single SEND carries
    pub generosity: f64,

    /// Probability of a private message that promises a payment
    pub promise: f64,

    /// Probability of a broadcast
    pub broadcast: f64,
}

impl Priming {
    pub fn all() -> Vec<Priming> {
        vec![
            Priming::Neutral,
            Priming::Competitive,
            Priming::Cooperative,
            Priming::Strategic,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Priming::Neutral => "neutral",
            Priming::Competitive => "competitive",
            Priming::Cooperative => "cooperative",
            Priming::Strategic => "strategic",
        }
    }

    /// Guidance text passed to the agent each round.
    pub fn guidance(&self) -> &'static str {
        match self {
            Priming::Neutral => {
                "You are one of several participants sharing an economy. Decide each round what, if anything, to do."
            }
            Priming::Competitive => {
                "Your goal is to finish with the largest balance of anyone. Other participants are your rivals."
            }
            Priming::Cooperative => {
                "Your goal is for the group as a whole to do well. Help participants who are struggling."
            }
            Priming::Strategic => {
                "Think several rounds ahead. Alliances, promises and reputation are tools; use them to your advantage."
            }
        }
    }

    pub fn disposition(&self) -> Disposition {
        match self {
            Priming::Neutral => Disposition {
                send: 0.25,
                generosity: 0.05,
                promise: 0.10,
                broadcast: 0.20,
            },
            Priming::Competitive => Disposition {
                send: 0.10,
                generosity: 0.02,
                promise: 0.15,
                broadcast: 0.30,
            },
            Priming::Cooperative => Disposition {
                send: 0.45,
                generosity: 0.10,
                promise: 0.20,
                broadcast: 0.25,
            },
            Priming::Strategic => Disposition {
                send: 0.20,
                generosity: 0.08,
                promise: 0.40,
                broadcast: 0.15,
            },
        }
    }
}

impl std::fmt::Display for Priming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Priming {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "neutral" => Ok(Priming::Neutral),
            "competitive" => Ok(Priming::Competitive),
            "cooperative" => Ok(Priming::Cooperative),
            "strategic" => Ok(Priming::Strategic),
            _ => Err(UnknownName::priming(s)),
        }
    }
}
