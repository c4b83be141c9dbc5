//! One deploy-and-verify run.
//!
//! A run moves through fixed stages:
//!
//! ```text
//! Start -> AccountResolved -> DeployDecided{Reused|Deployed} -> Verified -> Reported
//! ```
//!
//! A failure while resolving the signer or deploying ends the run in `Failed`.
//! Failed checks during verification are recorded in the report and the run
//! still reaches `Reported`.

use serde::Serialize;

use crate::accounts::{AccountResolver, NamedAccounts, SignerIdentity};
use crate::artifact::ArtifactSource;
use crate::chain::ChainClient;
use crate::config::{DeployOptions, NetworkConfig};
use crate::deployer::{DeployDecision, Deployer, DeploymentSpec};
use crate::error::{RunFailure, StepError};
use crate::registry::DeploymentRegistry;
use crate::report::{Reporter, RunReport};
use crate::verifier::PostDeployVerifier;

/// Stages a run can fail in, named after the state reached when they complete.
///
/// Verification and reporting cannot fail: failed checks are data in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum RunStage {
    #[strum(serialize = "account resolution")]
    AccountResolved,
    #[strum(serialize = "deployment")]
    DeployDecided,
}

/// Observable state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Start,
    AccountResolved,
    DeployDecided(DeployDecision),
    Verified,
    Reported,
    Failed(RunStage),
}

/// Prefix of constructor arguments that name an account role.
pub const ROLE_ARG_PREFIX: char = '@';

/// Wires the components of a run together.
///
/// The registry is owned by the run: it is the single writer for its store.
pub struct DeploymentRun<C, R, A> {
    client: C,
    registry: R,
    artifacts: A,
    network: NetworkConfig,
    accounts: NamedAccounts,
    options: DeployOptions,
    state: RunState,
}

impl<C, R, A> DeploymentRun<C, R, A>
where
    C: ChainClient,
    R: DeploymentRegistry,
    A: ArtifactSource,
{
    pub fn new(
        client: C,
        registry: R,
        artifacts: A,
        network: NetworkConfig,
        accounts: NamedAccounts,
        options: DeployOptions,
    ) -> Self {
        Self {
            client,
            registry,
            artifacts,
            network,
            accounts,
            options,
            state: RunState::Start,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn options_mut(&mut self) -> &mut DeployOptions {
        &mut self.options
    }

    fn advance(&mut self, state: RunState) {
        tracing::trace!(from = ?self.state, to = ?state, "Run state transition");
        self.state = state;
    }

    fn fail(&mut self, stage: RunStage, error: StepError) -> RunFailure {
        tracing::error!(stage = %stage, error = %error, "Run failed");
        self.advance(RunState::Failed(stage));
        RunFailure { stage, error }
    }

    /// Execute the run: resolve the signer, deploy or reuse, verify, report.
    pub async fn execute(
        &mut self,
        spec: &DeploymentSpec,
        checks: &[String],
    ) -> Result<RunReport, RunFailure> {
        self.advance(RunState::Start);

        let resolved = self.resolve(spec).await;
        let Resolved {
            signer,
            spec,
            chain_id,
        } = match resolved {
            Ok(resolved) => resolved,
            Err(e) => return Err(self.fail(RunStage::AccountResolved, e)),
        };
        self.advance(RunState::AccountResolved);

        let artifact = match self.artifacts.load(&spec.contract_name) {
            Ok(artifact) => artifact,
            Err(e) => return Err(self.fail(RunStage::DeployDecided, StepError::Configuration(e))),
        };

        let deployed = {
            let mut deployer = Deployer::new(
                &self.client,
                &mut self.registry,
                &self.network.name,
                chain_id,
                &self.options,
            );
            deployer.deploy(&spec, &artifact, &signer).await
        };
        let outcome = match deployed {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail(RunStage::DeployDecided, e)),
        };
        self.advance(RunState::DeployDecided(outcome.decision));

        status!(self.options.log, checks = checks.len(), "Verifying deployment...");
        let results = PostDeployVerifier::new(&self.client, &artifact)
            .verify(&outcome.record, checks)
            .await;
        self.advance(RunState::Verified);

        let report = Reporter::report(outcome, results);
        self.advance(RunState::Reported);

        Ok(report)
    }

    /// Check the network, resolve the signer and substitute `@role` arguments.
    async fn resolve(&self, spec: &DeploymentSpec) -> Result<Resolved, StepError> {
        let chain_id = self.client.chain_id().await.map_err(|e| {
            StepError::Configuration(e.context(format!(
                "Cannot reach network '{}' at {}",
                self.network.name, self.network.rpc_url
            )))
        })?;

        if let Some(expected) = self.network.chain_id {
            if expected != chain_id {
                return Err(StepError::configuration(format!(
                    "network '{}' expects chain id {} but the node reports {}",
                    self.network.name, expected, chain_id
                )));
            }
        }

        status!(
            self.options.log,
            network = %self.network.name,
            chain_id,
            role = %spec.signer_role,
            "Resolving signer..."
        );

        let resolver = AccountResolver::new(&self.accounts, &self.network.name, &self.client);
        let signer = resolver.resolve(&spec.signer_role).await?;

        let mut constructor_args = Vec::with_capacity(spec.constructor_args.len());
        for arg in &spec.constructor_args {
            match arg.strip_prefix(ROLE_ARG_PREFIX) {
                Some(role) if role == signer.role => {
                    constructor_args.push(signer.address.to_string())
                }
                Some(role) => constructor_args.push(resolver.address(role).await?.to_string()),
                None => constructor_args.push(arg.clone()),
            }
        }

        Ok(Resolved {
            signer,
            spec: DeploymentSpec {
                constructor_args,
                ..spec.clone()
            },
            chain_id,
        })
    }
}

/// Output of the account resolution stage.
struct Resolved {
    signer: SignerIdentity,
    /// The input spec with `@role` arguments replaced by addresses.
    spec: DeploymentSpec,
    chain_id: u64,
}
