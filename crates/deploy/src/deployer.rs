//! The deploy-or-reuse decision and contract creation.

use alloy_core::primitives::B256;
use serde::{Deserialize, Serialize};

use crate::artifact::ContractArtifact;
use crate::chain::{ChainClient, TransactionReceipt, TransactionRequest};
use crate::config::DeployOptions;
use crate::error::StepError;
use crate::fingerprint::DeploymentFingerprint;
use crate::registry::{DeploymentRecord, DeploymentRegistry};
use crate::{SignerIdentity, rpc};

/// What to deploy and with which identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub contract_name: String,
    /// Constructor arguments in declaration order, coerced using the ABI.
    #[serde(default)]
    pub constructor_args: Vec<String>,
    pub signer_role: String,
}

/// Whether the run created a new instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeployDecision {
    Reused,
    Deployed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub record: DeploymentRecord,
    pub decision: DeployDecision,
}

/// Deploys a contract unless a live deployment with the same fingerprint exists.
pub struct Deployer<'a, C, R> {
    client: &'a C,
    registry: &'a mut R,
    network: &'a str,
    chain_id: u64,
    options: &'a DeployOptions,
}

impl<'a, C, R> Deployer<'a, C, R>
where
    C: ChainClient,
    R: DeploymentRegistry,
{
    pub fn new(
        client: &'a C,
        registry: &'a mut R,
        network: &'a str,
        chain_id: u64,
        options: &'a DeployOptions,
    ) -> Self {
        Self {
            client,
            registry,
            network,
            chain_id,
            options,
        }
    }

    /// Return the live deployment for `spec`, creating it first if needed.
    ///
    /// A stored record is reused only when its fingerprint matches the artifact and
    /// arguments, it was made on the connected chain, and code still exists at its
    /// address. Otherwise a creation transaction is submitted and, once confirmed,
    /// the new record replaces the old one.
    pub async fn deploy(
        &mut self,
        spec: &DeploymentSpec,
        artifact: &ContractArtifact,
        signer: &SignerIdentity,
    ) -> Result<DeployOutcome, StepError> {
        let encoded_args = artifact
            .encode_constructor_args(&spec.constructor_args)
            .map_err(StepError::Configuration)?;
        let fingerprint =
            DeploymentFingerprint::new(&artifact.bytecode, &encoded_args).compute_hash();

        if self.options.force {
            status!(self.options.log, contract = %spec.contract_name, "Redeploy forced, skipping registry lookup");
        } else if let Some(record) = self
            .registry
            .lookup(&spec.contract_name, self.network)
            .map_err(StepError::Registry)?
        {
            match self.stale_reason(&record, &fingerprint).await? {
                None => {
                    status!(
                        self.options.log,
                        contract = %spec.contract_name,
                        address = %record.address,
                        network = %self.network,
                        "Reusing existing deployment"
                    );
                    return Ok(DeployOutcome {
                        record,
                        decision: DeployDecision::Reused,
                    });
                }
                Some(reason) => {
                    status!(
                        self.options.log,
                        contract = %spec.contract_name,
                        previous_address = %record.address,
                        reason,
                        "Existing deployment is stale, redeploying"
                    );
                }
            }
        }

        let tx = TransactionRequest {
            from: signer.address,
            to: None,
            data: artifact.creation_code(&encoded_args),
        };

        status!(
            self.options.log,
            contract = %spec.contract_name,
            from = %signer.address,
            network = %self.network,
            "Deploying contract..."
        );

        let tx_hash = self.client.send_transaction(tx).await.map_err(|e| {
            StepError::Deployment(e.context("Failed to submit creation transaction"))
        })?;

        tracing::debug!(tx_hash = %tx_hash, "Creation transaction submitted");

        if self.options.auto_mine {
            if let Err(e) = self.client.mine().await {
                tracing::warn!(error = %e, "Failed to request a block, waiting for the node to mine");
            }
        }

        let receipt = self.wait_for_confirmation(tx_hash).await?;

        if !receipt.succeeded() {
            return Err(StepError::deployment(format!(
                "creation transaction {tx_hash} reverted"
            )));
        }

        let address = receipt.contract_address.ok_or_else(|| {
            StepError::deployment(format!(
                "receipt of {tx_hash} has no contract address"
            ))
        })?;

        let record = DeploymentRecord {
            contract_name: spec.contract_name.clone(),
            address,
            fingerprint,
            network: self.network.to_string(),
            chain_id: self.chain_id,
            deployer: signer.address,
            transaction_hash: tx_hash,
            block_number: receipt.block_number(),
            constructor_args: spec.constructor_args.clone(),
            deployed_at: u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        };

        self.registry
            .record(&spec.contract_name, self.network, record.clone())
            .map_err(StepError::Registry)?;

        status!(
            self.options.log,
            contract = %spec.contract_name,
            address = %address,
            tx_hash = %tx_hash,
            gas_used = ?receipt.gas_used.map(|g| g.to::<u64>()),
            "Contract deployed"
        );

        Ok(DeployOutcome {
            record,
            decision: DeployDecision::Deployed,
        })
    }

    /// Why `record` cannot be reused, or `None` when it is still live.
    async fn stale_reason(
        &self,
        record: &DeploymentRecord,
        fingerprint: &str,
    ) -> Result<Option<&'static str>, StepError> {
        if record.fingerprint != fingerprint {
            return Ok(Some("fingerprint changed"));
        }
        if record.chain_id != self.chain_id {
            return Ok(Some("chain id changed"));
        }

        let code = self.client.code_at(record.address).await.map_err(|e| {
            StepError::Deployment(e.context(format!(
                "Failed to fetch code at {}",
                record.address
            )))
        })?;
        if code.is_empty() {
            return Ok(Some("no code at recorded address"));
        }

        Ok(None)
    }

    async fn wait_for_confirmation(&self, tx_hash: B256) -> Result<TransactionReceipt, StepError> {
        let name = format!("confirmation of {tx_hash}");
        rpc::poll_until(
            &name,
            self.options.confirmation_timeout(),
            self.options.poll_interval(),
            || self.client.transaction_receipt(tx_hash),
        )
        .await
        .map_err(StepError::Deployment)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::MemoryRegistry;
    use crate::artifact::tests::your_contract;
    use crate::testing::MockChain;

    const OWNER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn spec() -> DeploymentSpec {
        DeploymentSpec {
            contract_name: "YourContract".to_string(),
            constructor_args: vec![OWNER.to_string()],
            signer_role: "deployer".to_string(),
        }
    }

    fn signer(chain: &MockChain) -> SignerIdentity {
        SignerIdentity {
            role: "deployer".to_string(),
            address: chain.accounts_list()[0],
        }
    }

    fn options() -> DeployOptions {
        DeployOptions {
            confirmation_timeout_secs: 1,
            poll_interval_ms: 10,
            ..Default::default()
        }
    }

    async fn deploy_once(
        chain: &MockChain,
        registry: &mut MemoryRegistry,
        options: &DeployOptions,
        spec: &DeploymentSpec,
        artifact: &ContractArtifact,
    ) -> Result<DeployOutcome, StepError> {
        Deployer::new(chain, registry, "localhost", 31337, options)
            .deploy(spec, artifact, &signer(chain))
            .await
    }

    #[tokio::test]
    async fn test_second_deploy_reuses_record() {
        let chain = MockChain::new();
        let mut registry = MemoryRegistry::new();
        let options = options();
        let artifact = your_contract();

        let first = deploy_once(&chain, &mut registry, &options, &spec(), &artifact)
            .await
            .unwrap();
        let second = deploy_once(&chain, &mut registry, &options, &spec(), &artifact)
            .await
            .unwrap();

        assert_eq!(first.decision, DeployDecision::Deployed);
        assert_eq!(second.decision, DeployDecision::Reused);
        assert_eq!(first.record, second.record);
        assert_eq!(chain.sent().len(), 1);
        assert_eq!(registry.writes(), 1);
    }

    #[tokio::test]
    async fn test_creation_payload_and_record() {
        let chain = MockChain::new();
        let mut registry = MemoryRegistry::new();
        let options = options();
        let artifact = your_contract();

        let outcome = deploy_once(&chain, &mut registry, &options, &spec(), &artifact)
            .await
            .unwrap();

        let sent = chain.sent();
        assert_eq!(sent[0].from, chain.accounts_list()[0]);
        assert_eq!(sent[0].to, None);
        assert!(sent[0].data.starts_with(&artifact.bytecode));
        assert_eq!(sent[0].data.len(), artifact.bytecode.len() + 32);

        assert_eq!(outcome.record.network, "localhost");
        assert_eq!(outcome.record.chain_id, 31337);
        assert_eq!(outcome.record.constructor_args, vec![OWNER.to_string()]);
        assert_eq!(
            registry.lookup("YourContract", "localhost").unwrap(),
            Some(outcome.record)
        );
    }

    #[tokio::test]
    async fn test_fingerprint_change_forces_redeploy() {
        let chain = MockChain::new();
        let mut registry = MemoryRegistry::new();
        let options = options();
        let artifact = your_contract();

        let first = deploy_once(&chain, &mut registry, &options, &spec(), &artifact)
            .await
            .unwrap();

        let mut code = artifact.bytecode.to_vec();
        code.push(0x00);
        let mut recompiled = artifact.clone();
        recompiled.bytecode = code.into();
        let second = deploy_once(&chain, &mut registry, &options, &spec(), &recompiled)
            .await
            .unwrap();

        assert_eq!(second.decision, DeployDecision::Deployed);
        assert_ne!(first.record.address, second.record.address);
        assert_ne!(first.record.fingerprint, second.record.fingerprint);
        assert_eq!(chain.sent().len(), 2);
        assert_eq!(
            registry.lookup("YourContract", "localhost").unwrap(),
            Some(second.record)
        );
    }

    #[tokio::test]
    async fn test_changed_arguments_force_redeploy() {
        let chain = MockChain::new();
        let mut registry = MemoryRegistry::new();
        let options = options();
        let artifact = your_contract();

        deploy_once(&chain, &mut registry, &options, &spec(), &artifact)
            .await
            .unwrap();
        let mut other = spec();
        other.constructor_args = vec!["0x70997970C51812dc3A010C7d01b50e0d17dc79C8".to_string()];
        let outcome = deploy_once(&chain, &mut registry, &options, &other, &artifact)
            .await
            .unwrap();

        assert_eq!(outcome.decision, DeployDecision::Deployed);
        assert_eq!(chain.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_wiped_chain_forces_redeploy() {
        let chain = MockChain::new();
        let mut registry = MemoryRegistry::new();
        let options = options();
        let artifact = your_contract();

        deploy_once(&chain, &mut registry, &options, &spec(), &artifact)
            .await
            .unwrap();
        chain.wipe_code();
        let outcome = deploy_once(&chain, &mut registry, &options, &spec(), &artifact)
            .await
            .unwrap();

        assert_eq!(outcome.decision, DeployDecision::Deployed);
        assert_eq!(registry.writes(), 2);
    }

    #[tokio::test]
    async fn test_other_chain_id_forces_redeploy() {
        let chain = MockChain::new();
        let mut registry = MemoryRegistry::new();
        let options = options();
        let artifact = your_contract();

        deploy_once(&chain, &mut registry, &options, &spec(), &artifact)
            .await
            .unwrap();
        let outcome = Deployer::new(&chain, &mut registry, "localhost", 1337, &options)
            .deploy(&spec(), &artifact, &signer(&chain))
            .await
            .unwrap();

        assert_eq!(outcome.decision, DeployDecision::Deployed);
        assert_eq!(outcome.record.chain_id, 1337);
    }

    #[tokio::test]
    async fn test_force_skips_reuse() {
        let chain = MockChain::new();
        let mut registry = MemoryRegistry::new();
        let artifact = your_contract();

        deploy_once(&chain, &mut registry, &options(), &spec(), &artifact)
            .await
            .unwrap();
        let forced = DeployOptions {
            force: true,
            ..options()
        };
        let outcome = deploy_once(&chain, &mut registry, &forced, &spec(), &artifact)
            .await
            .unwrap();

        assert_eq!(outcome.decision, DeployDecision::Deployed);
        assert_eq!(chain.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_confirmation_timeout_persists_nothing() {
        let chain = MockChain::new().never_confirming();
        let mut registry = MemoryRegistry::new();
        let options = DeployOptions {
            confirmation_timeout_secs: 0,
            poll_interval_ms: 10,
            ..Default::default()
        };

        let started = std::time::Instant::now();
        let err = deploy_once(&chain, &mut registry, &options, &spec(), &your_contract())
            .await
            .unwrap_err();

        assert!(err.is_deployment());
        assert!(err.to_string().contains("Timeout waiting for confirmation"));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(registry.is_empty());
        assert_eq!(registry.writes(), 0);
    }

    #[tokio::test]
    async fn test_reverted_creation_fails() {
        let chain = MockChain::new().reverting();
        let mut registry = MemoryRegistry::new();

        let err = deploy_once(&chain, &mut registry, &options(), &spec(), &your_contract())
            .await
            .unwrap_err();

        assert!(err.is_deployment());
        assert!(err.to_string().contains("reverted"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_bad_arguments_are_configuration_errors() {
        let chain = MockChain::new();
        let mut registry = MemoryRegistry::new();
        let mut bad = spec();
        bad.constructor_args = vec!["0xDEPLOYER".to_string()];

        let err = deploy_once(&chain, &mut registry, &options(), &bad, &your_contract())
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_auto_mine_requests_block() {
        let chain = MockChain::new();
        let mut registry = MemoryRegistry::new();

        deploy_once(&chain, &mut registry, &options(), &spec(), &your_contract())
            .await
            .unwrap();
        assert_eq!(chain.mined(), 1);

        let manual = DeployOptions {
            auto_mine: false,
            force: true,
            ..options()
        };
        deploy_once(&chain, &mut registry, &manual, &spec(), &your_contract())
            .await
            .unwrap();
        assert_eq!(chain.mined(), 1);
    }
}
