//! Named accounts: logical roles mapped to signing identities per network.

use std::collections::BTreeMap;

use alloy_core::primitives::Address;
use alloy_signer_local::{MnemonicBuilder, coins_bip39::English};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::chain::ChainClient;
use crate::error::StepError;

/// How an account is obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountSpec {
    /// Account derived from a BIP-39 mnemonic at `m/44'/60'/0'/0/{index}`.
    Mnemonic { mnemonic: String, index: u32 },
    /// The n-th account managed by the node (`eth_accounts`).
    Index { index: usize },
    /// An explicit address the node can sign for.
    Address { address: String },
}

/// Accounts configured for a role: a default plus per-network overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAccounts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<AccountSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, AccountSpec>,
}

impl RoleAccounts {
    pub fn with_default(spec: AccountSpec) -> Self {
        Self {
            default: Some(spec),
            networks: BTreeMap::new(),
        }
    }

    fn for_network(&self, network: &str) -> Option<&AccountSpec> {
        self.networks.get(network).or(self.default.as_ref())
    }
}

/// Role name to account configuration.
pub type NamedAccounts = BTreeMap<String, RoleAccounts>;

/// A concrete identity transactions are sent from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignerIdentity {
    pub role: String,
    pub address: Address,
}

/// Resolves role names against the named accounts of the active network.
pub struct AccountResolver<'a, C> {
    accounts: &'a NamedAccounts,
    network: &'a str,
    client: &'a C,
}

impl<'a, C: ChainClient> AccountResolver<'a, C> {
    pub fn new(accounts: &'a NamedAccounts, network: &'a str, client: &'a C) -> Self {
        Self {
            accounts,
            network,
            client,
        }
    }

    /// Map `role` to a signer.
    ///
    /// Creation transactions go through `eth_sendTransaction`, so the resolved
    /// address must be one the node signs for.
    ///
    /// Fails with [`StepError::Configuration`] for an unknown role, a role with no
    /// account on the active network, or an account the node does not manage.
    pub async fn resolve(&self, role: &str) -> Result<SignerIdentity, StepError> {
        let address = self.address(role).await?;

        let managed = self.client.accounts().await.map_err(|e| {
            StepError::Configuration(e.context("Failed to list node accounts"))
        })?;
        if !managed.contains(&address) {
            return Err(StepError::configuration(format!(
                "account {} of role '{}' is not managed by the node on network '{}'",
                address, role, self.network
            )));
        }

        tracing::debug!(role = %role, address = %address, network = %self.network, "Resolved signer");

        Ok(SignerIdentity {
            role: role.to_string(),
            address,
        })
    }

    /// Map `role` to its address on the active network, without requiring a signer.
    pub async fn address(&self, role: &str) -> Result<Address, StepError> {
        let role_accounts = self.accounts.get(role).ok_or_else(|| {
            StepError::configuration(format!("unknown signer role '{role}'"))
        })?;

        let spec = role_accounts.for_network(self.network).ok_or_else(|| {
            StepError::configuration(format!(
                "no account configured for role '{}' on network '{}'",
                role, self.network
            ))
        })?;

        self.address_of(spec).await.map_err(|e| {
            StepError::Configuration(e.context(format!("cannot resolve account for role '{role}'")))
        })
    }

    async fn address_of(&self, spec: &AccountSpec) -> anyhow::Result<Address> {
        match spec {
            AccountSpec::Address { address } => address
                .parse()
                .with_context(|| format!("invalid address '{address}'")),
            AccountSpec::Index { index } => {
                let accounts = self
                    .client
                    .accounts()
                    .await
                    .context("Failed to list node accounts")?;
                accounts.get(*index).copied().with_context(|| {
                    format!(
                        "account index {} out of range (node manages {} account(s))",
                        index,
                        accounts.len()
                    )
                })
            }
            AccountSpec::Mnemonic { mnemonic, index } => derive_address(mnemonic, *index),
        }
    }
}

/// Address of the account at `index` of a BIP-39 mnemonic.
pub fn derive_address(mnemonic: &str, index: u32) -> anyhow::Result<Address> {
    let signer = MnemonicBuilder::<English>::default()
        .phrase(mnemonic)
        .index(index)
        .context("invalid derivation index")?
        .build()
        .context("invalid mnemonic")?;

    // The signer crate may pull a different primitives version; go through bytes.
    Ok(Address::from_slice(signer.address().as_slice()))
}
