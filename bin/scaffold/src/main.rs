//! scaffold deploys a contract, or reuses its live deployment, then checks that it responds.

mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use cli::Cli;
use scaffold_deploy::{
    ArtifactDir, CONFIG_FILENAME, DeploymentRun, FileRegistry, RpcChainClient, StepConfig,
    config_file,
};

/// Layer the configuration: defaults, then the TOML file, then `SCAFFOLD_*` variables.
///
/// Nested keys use a double underscore: `SCAFFOLD_NETWORK__RPC_URL`.
fn load_config(path: Option<&Path>) -> Result<StepConfig> {
    let mut figment = Figment::from(Serialized::defaults(StepConfig::default()));

    match path {
        Some(path) => {
            let file = config_file(path);
            if !file.exists() {
                anyhow::bail!("Configuration file not found: {}", file.display());
            }
            figment = figment.merge(Toml::file(file));
        }
        None => figment = figment.merge(Toml::file(CONFIG_FILENAME)),
    }

    figment
        .merge(
            Env::prefixed("SCAFFOLD_")
                .split("__")
                .ignore(&["verbosity", "config", "redeploy"]),
        )
        .extract()
        .context("Failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr: stdout carries the report.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_config(cli.config.as_deref().map(Path::new))?;
    cli.apply(&mut config);

    if let Some(path) = &cli.save_config {
        let file = config.save(&PathBuf::from(path))?;
        tracing::info!(path = %file.display(), "Configuration saved");
        return Ok(());
    }

    tracing::debug!(
        network = %config.network.name,
        rpc_url = %config.network.rpc_url,
        contract = %config.deploy.contract,
        "Configuration loaded"
    );

    let client = RpcChainClient::new(config.network.rpc_url.clone())?;
    let registry = FileRegistry::new(config.paths.deployments.clone());
    let artifacts = ArtifactDir::new(config.paths.artifacts.clone());

    let mut run = DeploymentRun::new(
        client,
        registry,
        artifacts,
        config.network.clone(),
        config.accounts.clone(),
        config.options.clone(),
    );

    let report = run
        .execute(&config.deploy.spec(), &config.deploy.checks)
        .await
        .with_context(|| format!("Deployment of {} failed", config.deploy.contract))?;

    report.emit();

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else if config.options.log {
        println!("{report}");
    }

    Ok(())
}
