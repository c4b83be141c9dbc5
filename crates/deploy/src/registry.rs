//! Persisted deployments, keyed by (contract name, network).

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

/// A contract instance created by a previous run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub contract_name: String,
    pub address: Address,
    /// Hash of the creation bytecode and constructor arguments that produced this instance.
    pub fingerprint: String,
    pub network: String,
    pub chain_id: u64,
    pub deployer: Address,
    pub transaction_hash: B256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Constructor arguments as given, before encoding.
    #[serde(default)]
    pub constructor_args: Vec<String>,
    /// Unix timestamp of the deployment.
    pub deployed_at: u64,
    /// Version of the tool that created the record.
    pub tool_version: String,
}

/// Store of deployment records.
///
/// `lookup` never mutates. `record` is the only writer and replaces any existing
/// entry for the key. Callers serialize runs for the same key.
pub trait DeploymentRegistry {
    fn lookup(&self, contract_name: &str, network: &str) -> Result<Option<DeploymentRecord>>;

    fn record(
        &mut self,
        contract_name: &str,
        network: &str,
        record: DeploymentRecord,
    ) -> Result<()>;
}

/// Registry kept in memory, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    records: BTreeMap<(String, String), DeploymentRecord>,
    writes: usize,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `record` calls.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DeploymentRegistry for MemoryRegistry {
    fn lookup(&self, contract_name: &str, network: &str) -> Result<Option<DeploymentRecord>> {
        Ok(self
            .records
            .get(&(contract_name.to_string(), network.to_string()))
            .cloned())
    }

    fn record(
        &mut self,
        contract_name: &str,
        network: &str,
        record: DeploymentRecord,
    ) -> Result<()> {
        self.records
            .insert((contract_name.to_string(), network.to_string()), record);
        self.writes += 1;
        Ok(())
    }
}

/// Name of the per-network chain ID marker file.
pub const CHAIN_ID_FILENAME: &str = ".chainId";
const LOCK_FILENAME: &str = ".lock";

/// Registry stored on disk as `<root>/<network>/<ContractName>.json`.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    root: PathBuf,
}

impl FileRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn network_dir(&self, network: &str) -> Result<PathBuf> {
        Ok(self.root.join(path_component("network", network)?))
    }

    pub fn record_path(&self, contract_name: &str, network: &str) -> Result<PathBuf> {
        let name = path_component("contract name", contract_name)?;
        Ok(self.network_dir(network)?.join(format!("{name}.json")))
    }

    fn lock(&self, network: &str) -> Result<File> {
        let dir = self.network_dir(network)?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create deployments directory {}", dir.display()))?;

        let lock_path = dir.join(LOCK_FILENAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;

        file.lock_exclusive()
            .with_context(|| format!("Failed to lock {}", lock_path.display()))?;

        Ok(file)
    }
}

/// Registry keys become file names and must stay inside the registry root.
fn path_component<'a>(kind: &str, value: &'a str) -> Result<&'a str> {
    if value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\'])
        || value.starts_with('.')
    {
        anyhow::bail!("Invalid {kind} '{value}' for the deployment registry");
    }
    Ok(value)
}

/// Write `content` next to `path` then move it into place.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

impl DeploymentRegistry for FileRegistry {
    fn lookup(&self, contract_name: &str, network: &str) -> Result<Option<DeploymentRecord>> {
        let path = self.record_path(contract_name, network)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read deployment record {}", path.display()))?;
        let record: DeploymentRecord = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse deployment record {}", path.display()))?;

        if record.contract_name != contract_name || record.network != network {
            anyhow::bail!(
                "Deployment record {} belongs to {} on {}",
                path.display(),
                record.contract_name,
                record.network
            );
        }

        Ok(Some(record))
    }

    fn record(
        &mut self,
        contract_name: &str,
        network: &str,
        record: DeploymentRecord,
    ) -> Result<()> {
        let path = self.record_path(contract_name, network)?;
        let lock = self.lock(network)?;

        let json = serde_json::to_string_pretty(&record)
            .context("Failed to serialize deployment record")?;
        write_atomic(&path, &json)?;

        let chain_id_path = self.network_dir(network)?.join(CHAIN_ID_FILENAME);
        std::fs::write(&chain_id_path, record.chain_id.to_string())
            .with_context(|| format!("Failed to write {}", chain_id_path.display()))?;

        FileExt::unlock(&lock).context("Failed to release deployments lock")?;

        tracing::debug!(
            contract = %contract_name,
            network = %network,
            address = %record.address,
            path = %path.display(),
            "Deployment recorded"
        );

        Ok(())
    }
}
