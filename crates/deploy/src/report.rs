//! Final report of a run.

use std::fmt;

use chrono::{DateTime, Utc};
use comfy_table::{Table, presets::UTF8_FULL};
use serde::Serialize;

use crate::deployer::{DeployDecision, DeployOutcome};
use crate::registry::DeploymentRecord;
use crate::verifier::{CheckOutcome, VerificationResult};

/// Everything a run produced. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub deployment: DeploymentRecord,
    pub decision: DeployDecision,
    pub verification: Vec<VerificationResult>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregates the outputs of a run into a [`RunReport`].
pub struct Reporter;

impl Reporter {
    pub fn report(outcome: DeployOutcome, results: Vec<VerificationResult>) -> RunReport {
        RunReport {
            deployment: outcome.record,
            decision: outcome.decision,
            verification: results,
            timestamp: Utc::now(),
        }
    }
}

impl RunReport {
    /// True when every check succeeded (vacuously true without checks).
    pub fn fully_verified(&self) -> bool {
        self.verification.iter().all(VerificationResult::is_success)
    }

    pub fn failed_checks(&self) -> usize {
        self.verification.iter().filter(|r| !r.is_success()).count()
    }

    /// Emit the report as log lines. The address is always logged.
    pub fn emit(&self) {
        for result in &self.verification {
            match &result.outcome {
                CheckOutcome::Success(value) => {
                    tracing::info!(method = %result.method_name, "✓ {}: {}", result.method_name, value);
                }
                CheckOutcome::Failure(cause) => {
                    tracing::warn!(method = %result.method_name, "✗ {}: {}", result.method_name, cause);
                }
            }
        }

        if !self.fully_verified() {
            tracing::warn!(
                failed = self.failed_checks(),
                total = self.verification.len(),
                "Deployment only partially verified"
            );
        }

        tracing::info!(
            contract = %self.deployment.contract_name,
            address = %self.deployment.address,
            network = %self.deployment.network,
            decision = %self.decision,
            "Contract \"{}\" {} at address: {}",
            self.deployment.contract_name,
            self.decision,
            self.deployment.address
        );
    }

    /// Render the report as a table.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Field", "Value"]);

        table.add_row(vec!["Contract".to_string(), self.deployment.contract_name.clone()]);
        table.add_row(vec!["Network".to_string(), format!(
            "{} (chain {})",
            self.deployment.network, self.deployment.chain_id
        )]);
        table.add_row(vec!["Address".to_string(), self.deployment.address.to_string()]);
        table.add_row(vec!["Status".to_string(), self.decision.to_string()]);
        table.add_row(vec![
            "Transaction".to_string(),
            self.deployment.transaction_hash.to_string(),
        ]);

        for result in &self.verification {
            let value = match &result.outcome {
                CheckOutcome::Success(value) => format!("✓ {value}"),
                CheckOutcome::Failure(cause) => format!("✗ {cause}"),
            };
            table.add_row(vec![format!("{}()", result.method_name), value]);
        }

        table
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::sample_record;

    fn outcome() -> DeployOutcome {
        DeployOutcome {
            record: sample_record("localhost", "f1"),
            decision: DeployDecision::Deployed,
        }
    }

    #[test]
    fn test_report_keeps_order_and_record() {
        let results = vec![
            VerificationResult {
                method_name: "greeting".to_string(),
                outcome: CheckOutcome::Success("Building Unstoppable Apps!!!".to_string()),
            },
            VerificationResult {
                method_name: "premium".to_string(),
                outcome: CheckOutcome::Failure("execution reverted".to_string()),
            },
        ];

        let report = Reporter::report(outcome(), results.clone());

        assert_eq!(report.deployment, sample_record("localhost", "f1"));
        assert_eq!(report.verification, results);
        assert!(!report.fully_verified());
        assert_eq!(report.failed_checks(), 1);
    }

    #[test]
    fn test_no_checks_is_fully_verified() {
        let report = Reporter::report(outcome(), vec![]);
        assert!(report.fully_verified());
    }

    #[test]
    fn test_table_shows_address_and_values() {
        let report = Reporter::report(
            outcome(),
            vec![VerificationResult {
                method_name: "greeting".to_string(),
                outcome: CheckOutcome::Success("Building Unstoppable Apps!!!".to_string()),
            }],
        );

        let rendered = report.to_string();
        assert!(rendered.contains(&report.deployment.address.to_string()));
        assert!(rendered.contains("greeting()"));
        assert!(rendered.contains("Building Unstoppable Apps!!!"));
        assert!(rendered.contains("deployed"));
    }

    #[test]
    fn test_report_json() {
        let report = Reporter::report(outcome(), vec![]);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["decision"], "deployed");
        assert_eq!(json["deployment"]["contractName"], "YourContract");
        assert!(json["timestamp"].is_string());
    }
}
