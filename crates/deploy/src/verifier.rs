//! Read-only checks against a deployed instance.

use serde::Serialize;

use crate::artifact::{self, ContractArtifact};
use crate::chain::{CallRequest, ChainClient};
use crate::registry::DeploymentRecord;

/// Result of a single check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "lowercase")]
pub enum CheckOutcome {
    /// The call returned; the decoded value rendered as text.
    Success(String),
    /// The call could not be made, reverted, or returned undecodable data.
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub method_name: String,
    #[serde(flatten)]
    pub outcome: CheckOutcome,
}

impl VerificationResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CheckOutcome::Success(_))
    }
}

/// Calls read-only methods of a deployed contract.
///
/// Checks are advisory: a failing check is recorded and the next one still runs.
pub struct PostDeployVerifier<'a, C> {
    client: &'a C,
    artifact: &'a ContractArtifact,
}

impl<'a, C: ChainClient> PostDeployVerifier<'a, C> {
    pub fn new(client: &'a C, artifact: &'a ContractArtifact) -> Self {
        Self { client, artifact }
    }

    /// Run `checks` in order, one result per check.
    pub async fn verify(
        &self,
        record: &DeploymentRecord,
        checks: &[String],
    ) -> Vec<VerificationResult> {
        let mut results = Vec::with_capacity(checks.len());

        for method in checks {
            let outcome = match self.check(record, method).await {
                Ok(value) => {
                    tracing::debug!(method = %method, value = %value, "Check passed");
                    CheckOutcome::Success(value)
                }
                Err(e) => {
                    tracing::warn!(method = %method, address = %record.address, error = %format!("{e:#}"), "Check failed");
                    CheckOutcome::Failure(format!("{e:#}"))
                }
            };

            results.push(VerificationResult {
                method_name: method.clone(),
                outcome,
            });
        }

        results
    }

    async fn check(&self, record: &DeploymentRecord, method: &str) -> anyhow::Result<String> {
        let function = self.artifact.read_only_method(method)?;
        let data = artifact::encode_call(function)?;

        let output = self
            .client
            .call(CallRequest {
                from: Some(record.deployer),
                to: record.address,
                data,
            })
            .await?;

        if output.is_empty() && !function.outputs.is_empty() {
            anyhow::bail!("empty return data (no contract at {}?)", record.address);
        }

        artifact::decode_output(function, &output)
    }
}
