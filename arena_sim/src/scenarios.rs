//! Named simulation scenarios.

use thiserror::Error;

/// A name on the command line that matches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnknownName {
    #[error("Unknown scenario: {0}")]
    Scenario(String),

    #[error("Unknown priming: {0}")]
    Priming(String),
}

impl UnknownName {
    pub fn scenario(name: &str) -> Self {
        Self::Scenario(name.to_string())
    }

    pub fn priming(name: &str) -> Self {
        Self::Priming(name.to_string())
    }
}

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// ARENA-001: every agent neutrally primed (Condition A)
    Baseline,

    /// ARENA-002: primings assigned round-robin (Condition B)
    MixedPriming,

    /// ARENA-003: failing and slow agents plus a lossy ledger
    Flaky,

    /// ARENA-004: half the agents spend everything they have
    Elimination,

    /// ARENA-005: ledger down from the start; setup must fail
    UnreachableLedger,
}

impl ScenarioId {
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::MixedPriming,
            ScenarioId::Flaky,
            ScenarioId::Elimination,
            ScenarioId::UnreachableLedger,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::MixedPriming => "mixed_priming",
            ScenarioId::Flaky => "flaky",
            ScenarioId::Elimination => "elimination",
            ScenarioId::UnreachableLedger => "unreachable_ledger",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "All agents neutral, seeded random behaviour",
            ScenarioId::MixedPriming => {
                "Neutral, competitive, cooperative and strategic agents side by side"
            }
            ScenarioId::Flaky => {
                "Queries that fail or time out, transfers dropped by the ledger"
            }
            ScenarioId::Elimination => "Aggressive spenders drain themselves to zero",
            ScenarioId::UnreachableLedger => "Ledger unreachable at setup, run must abort",
        }
    }

    /// True if a correct run of this scenario ends in a setup error.
    pub fn expects_setup_failure(&self) -> bool {
        matches!(self, ScenarioId::UnreachableLedger)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "baseline" | "neutral" | "arena-001" => Ok(ScenarioId::Baseline),
            "mixed_priming" | "mixed" | "arena-002" => Ok(ScenarioId::MixedPriming),
            "flaky" | "arena-003" => Ok(ScenarioId::Flaky),
            "elimination" | "arena-004" => Ok(ScenarioId::Elimination),
            "unreachable_ledger" | "unreachable" | "arena-005" => {
                Ok(ScenarioId::UnreachableLedger)
            }
            _ => Err(UnknownName::scenario(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_scenario_parses_from_its_name() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>().unwrap(), scenario);
        }
    }

    #[test]
    fn test_aliases_and_unknown() {
        assert_eq!("MIXED".parse::<ScenarioId>().unwrap(), ScenarioId::MixedPriming);
        assert_eq!("arena-005".parse::<ScenarioId>().unwrap(), ScenarioId::UnreachableLedger);
        assert_eq!(
            "chaos".parse::<ScenarioId>().unwrap_err().to_string(),
            "Unknown scenario: chaos"
        );
    }
}
