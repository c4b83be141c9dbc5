//! scaffold-deploy - Deploy-and-verify step for a single contract.
//!
//! This crate deploys a compiled contract to a network unless a live deployment with
//! the same bytecode and constructor arguments already exists, then calls read-only
//! methods on the instance to check that it responds.
//!
//! # Example
//!
//! ```no_run
//! use scaffold_deploy::{ArtifactDir, DeploymentRun, FileRegistry, RpcChainClient, StepConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = StepConfig::default();
//! let client = RpcChainClient::new(config.network.rpc_url.clone())?;
//! let mut run = DeploymentRun::new(
//!     client,
//!     FileRegistry::new(&config.paths.deployments),
//!     ArtifactDir::new(&config.paths.artifacts),
//!     config.network.clone(),
//!     config.accounts.clone(),
//!     config.options.clone(),
//! );
//! let report = run.execute(&config.deploy.spec(), &config.deploy.checks).await?;
//! report.emit();
//! # Ok(())
//! # }
//! ```

/// Per-step status line: `info` when logging is enabled, `debug` otherwise.
macro_rules! status {
    ($log:expr, $($arg:tt)+) => {
        if $log {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

mod accounts;
pub use accounts::{AccountResolver, AccountSpec, NamedAccounts, RoleAccounts, SignerIdentity};

mod artifact;
pub use artifact::{ArtifactDir, ArtifactSource, ContractArtifact};

mod chain;
pub use chain::{CallRequest, ChainClient, TransactionReceipt, TransactionRequest};

mod config;
pub use config::{
    CONFIG_FILENAME, DEFAULT_CONTRACT, DEFAULT_NETWORK, DEFAULT_RPC_URL, DEFAULT_SIGNER_ROLE,
    DeployOptions, DeployTarget, NetworkConfig, PathsConfig, StepConfig, config_file,
};

mod deployer;
pub use deployer::{DeployDecision, DeployOutcome, Deployer, DeploymentSpec};

mod error;
pub use error::{RunFailure, StepError};

mod fingerprint;
pub use fingerprint::DeploymentFingerprint;

mod registry;
pub use registry::{DeploymentRecord, DeploymentRegistry, FileRegistry, MemoryRegistry};

mod report;
pub use report::{Reporter, RunReport};

pub mod rpc;
pub use rpc::RpcChainClient;

mod run;
pub use run::{DeploymentRun, RunStage, RunState};

mod verifier;
pub use verifier::{CheckOutcome, PostDeployVerifier, VerificationResult};

#[cfg(test)]
mod testing;
