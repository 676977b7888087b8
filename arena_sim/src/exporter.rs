//! JSON exporter for offline analysis.
//!
//! Exports a finished scenario run, rounds and analysis included, as one
//! JSON document.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use arena_core::{AnalysisReport, QueryStats, RoundSummary};
use serde::{Deserialize, Serialize};

use crate::oracle::Violation;
use crate::runner::ScenarioResult;

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub violations: Vec<Violation>,

    /// Every round, in order
    pub rounds: Vec<RoundSummary>,

    /// Display name -> group label
    pub groups: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisReport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<QueryStats>,
}

impl SimExport {
    /// Builds an export from a scenario result.
    pub fn from_result(result: &ScenarioResult) -> Self {
        let report = result.report.as_ref();
        Self {
            scenario: result.scenario.name().to_string(),
            seed: result.seed,
            run_id: report.map(|r| r.run_id.clone()),
            passed: result.passed,
            failure_reason: result.failure_reason.clone(),
            violations: result.violations.clone(),
            rounds: report.map(|r| r.log.rounds().to_vec()).unwrap_or_default(),
            groups: report.map(|r| r.groups.clone()).unwrap_or_default(),
            analysis: report.map(|r| r.analysis.clone()),
            stats: report.map(|r| r.stats),
        }
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ScenarioRunner;
    use crate::scenarios::ScenarioId;

    #[tokio::test]
    async fn test_export_writes_rounds_and_analysis() {
        let result = ScenarioRunner::new(42, 4)
            .with_rounds(5)
            .run(ScenarioId::MixedPriming)
            .await;
        let export = SimExport::from_result(&result);
        assert_eq!(export.rounds.len(), 5);
        assert_eq!(export.groups.len(), 4);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        export.write_to_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["scenario"], "mixed_priming");
        assert_eq!(value["rounds"].as_array().unwrap().len(), 5);
        assert!(value["analysis"]["summary"]["final_gini"].is_number());
        assert!(value.get("violations").is_none());
    }

    #[tokio::test]
    async fn test_export_of_aborted_run_has_no_rounds() {
        let result = ScenarioRunner::new(1, 2)
            .with_rounds(3)
            .run(ScenarioId::UnreachableLedger)
            .await;
        let export = SimExport::from_result(&result);
        assert!(export.rounds.is_empty());
        assert!(export.analysis.is_none());
        assert!(export.run_id.is_none());
    }
}
