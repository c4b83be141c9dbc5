use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::accounts::{AccountSpec, NamedAccounts, RoleAccounts};
use crate::deployer::DeploymentSpec;

/// The default name for the configuration file.
pub const CONFIG_FILENAME: &str = "Scaffold.toml";

/// Default network name.
pub const DEFAULT_NETWORK: &str = "localhost";
/// Default RPC endpoint of a local development node.
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
/// Default contract deployed when none is configured.
pub const DEFAULT_CONTRACT: &str = "YourContract";
/// Default signer role.
pub const DEFAULT_SIGNER_ROLE: &str = "deployer";

/// The network the step runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Name used as the registry key (`localhost`, `sepolia`, ...).
    pub name: String,
    pub rpc_url: Url,
    /// When set, the connected node must report this chain ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NETWORK.to_string(),
            rpc_url: Url::parse(DEFAULT_RPC_URL).expect("default RPC URL is valid"),
            chain_id: None,
        }
    }
}

/// Behaviour switches of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployOptions {
    /// Emit per-step status at `info` (otherwise at `debug`).
    pub log: bool,
    /// Ask the node to mine right after submitting the creation transaction.
    pub auto_mine: bool,
    /// Deploy even if a live deployment exists.
    pub force: bool,
    /// Maximum time to wait for the creation receipt.
    pub confirmation_timeout_secs: u64,
    /// Delay between two receipt polls.
    pub poll_interval_ms: u64,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            log: true,
            auto_mine: true,
            force: false,
            confirmation_timeout_secs: 60,
            poll_interval_ms: 500,
        }
    }
}

impl DeployOptions {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// The contract to deploy and the checks to run afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployTarget {
    pub contract: String,
    /// Constructor arguments. `@<role>` is replaced by the address of that role.
    pub args: Vec<String>,
    pub signer: String,
    /// Read-only methods called after deployment.
    pub checks: Vec<String>,
}

impl Default for DeployTarget {
    fn default() -> Self {
        Self {
            contract: DEFAULT_CONTRACT.to_string(),
            args: vec![format!("@{DEFAULT_SIGNER_ROLE}")],
            signer: DEFAULT_SIGNER_ROLE.to_string(),
            checks: vec!["greeting".to_string()],
        }
    }
}

impl DeployTarget {
    pub fn spec(&self) -> DeploymentSpec {
        DeploymentSpec {
            contract_name: self.contract.clone(),
            constructor_args: self.args.clone(),
            signer_role: self.signer.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Compiler output directory.
    pub artifacts: PathBuf,
    /// Root of the deployment registry.
    pub deployments: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            artifacts: PathBuf::from("artifacts"),
            deployments: PathBuf::from("deployments"),
        }
    }
}

/// Complete configuration of the deploy-and-verify step.
///
/// Serialized to/from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default = "default_accounts")]
    pub accounts: NamedAccounts,
    #[serde(default)]
    pub deploy: DeployTarget,
    #[serde(default)]
    pub options: DeployOptions,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// The deployer is the first account of the node.
fn default_accounts() -> NamedAccounts {
    NamedAccounts::from([(
        DEFAULT_SIGNER_ROLE.to_string(),
        RoleAccounts::with_default(AccountSpec::Index { index: 0 }),
    )])
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            accounts: default_accounts(),
            deploy: DeployTarget::default(),
            options: DeployOptions::default(),
            paths: PathsConfig::default(),
        }
    }
}

/// Locate the configuration file for `path`: the file itself, or [`CONFIG_FILENAME`]
/// inside it when `path` is a directory.
pub fn config_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(CONFIG_FILENAME)
    } else {
        path.to_path_buf()
    }
}

impl StepConfig {
    /// Write the configuration as TOML to `path` (a file, or a directory that receives
    /// [`CONFIG_FILENAME`]). Returns the file written.
    pub fn save(&self, path: &Path) -> Result<PathBuf> {
        let file = config_file(path);
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(&file, content)
            .with_context(|| format!("Failed to write configuration to {}", file.display()))?;

        tracing::debug!(path = %file.display(), "Configuration written");
        Ok(file)
    }
}
