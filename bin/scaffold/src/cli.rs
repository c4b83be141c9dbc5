use clap::Parser;
use scaffold_deploy::StepConfig;
use tracing::level_filters::LevelFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "scaffold")]
#[command(
    author,
    version,
    about = "Deploy a contract (or reuse its live deployment) and check that it responds"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "SCAFFOLD_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a configuration file (or a directory containing Scaffold.toml).
    ///
    /// Defaults to ./Scaffold.toml when it exists.
    #[arg(long, alias = "conf", env = "SCAFFOLD_CONFIG")]
    pub config: Option<String>,

    /// Write the effective configuration to this file (or directory) and exit.
    #[arg(long, value_name = "PATH")]
    pub save_config: Option<String>,

    /// Name of the target network, used as the deployment registry key.
    #[arg(short, long)]
    pub network: Option<String>,

    /// JSON-RPC endpoint of the target network.
    #[arg(long, alias = "rpc")]
    pub rpc_url: Option<Url>,

    /// Name of the contract artifact to deploy.
    #[arg(short, long)]
    pub contract: Option<String>,

    /// Constructor argument, in declaration order. `@<role>` expands to that account.
    ///
    /// Replaces the configured arguments when given at least once.
    #[arg(long = "arg", value_name = "VALUE")]
    pub args: Vec<String>,

    /// Role of the account sending the creation transaction.
    #[arg(short, long)]
    pub signer: Option<String>,

    /// Read-only method to call after deployment.
    ///
    /// Replaces the configured checks when given at least once.
    #[arg(long = "check", value_name = "METHOD")]
    pub checks: Vec<String>,

    /// Deploy a new instance even if a live deployment exists.
    #[arg(long, env = "SCAFFOLD_REDEPLOY")]
    pub redeploy: bool,

    /// Do not ask the node to mine after submitting the creation transaction.
    #[arg(long)]
    pub no_auto_mine: bool,

    /// Only report the result, without per-step status.
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the report as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Apply command line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut StepConfig) {
        if let Some(network) = &self.network {
            config.network.name = network.clone();
        }
        if let Some(rpc_url) = &self.rpc_url {
            config.network.rpc_url = rpc_url.clone();
        }
        if let Some(contract) = &self.contract {
            config.deploy.contract = contract.clone();
        }
        if !self.args.is_empty() {
            config.deploy.args = self.args.clone();
        }
        if let Some(signer) = &self.signer {
            config.deploy.signer = signer.clone();
        }
        if !self.checks.is_empty() {
            config.deploy.checks = self.checks.clone();
        }
        if self.redeploy {
            config.options.force = true;
        }
        if self.no_auto_mine {
            config.options.auto_mine = false;
        }
        if self.quiet {
            config.options.log = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "scaffold",
            "--network",
            "sepolia",
            "--contract",
            "Token",
            "--arg",
            "@deployer",
            "--arg",
            "1000",
            "--check",
            "totalSupply",
            "--redeploy",
            "--quiet",
        ]);

        let mut config = StepConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.network.name, "sepolia");
        assert_eq!(config.deploy.contract, "Token");
        assert_eq!(config.deploy.args, vec!["@deployer", "1000"]);
        assert_eq!(config.deploy.checks, vec!["totalSupply"]);
        assert_eq!(config.deploy.signer, "deployer");
        assert!(config.options.force);
        assert!(!config.options.log);
        assert!(config.options.auto_mine);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let cli = Cli::parse_from(["scaffold"]);

        let mut config = StepConfig::default();
        cli.apply(&mut config);

        assert_eq!(config, StepConfig::default());
    }
}
