//! Chain access used by the deploy-and-verify step.

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes, U64};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A transaction submitted through a node-managed signer (`eth_sendTransaction`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub from: Address,
    /// `None` for contract creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    pub data: Bytes,
}

/// A read-only call (`eth_call`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
}

/// The subset of a transaction receipt needed to confirm a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// `0x1` on success, `0x0` on revert. Absent on pre-Byzantium chains.
    #[serde(default)]
    pub status: Option<U64>,
    #[serde(default)]
    pub gas_used: Option<U64>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.is_none_or(|status| status != U64::ZERO)
    }

    pub fn block_number(&self) -> Option<u64> {
        self.block_number.map(|n| n.to::<u64>())
    }
}

/// Network client the core talks to.
///
/// Implemented over JSON-RPC by [`RpcChainClient`](crate::RpcChainClient). Retry
/// policy, if any, belongs to the implementation.
pub trait ChainClient: Send + Sync {
    /// The chain ID reported by the node.
    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Accounts the node can sign for.
    fn accounts(&self) -> impl Future<Output = Result<Vec<Address>>> + Send;

    /// Runtime code at `address` on the latest block.
    fn code_at(&self, address: Address) -> impl Future<Output = Result<Bytes>> + Send;

    /// Submit a transaction, returning its hash.
    fn send_transaction(
        &self,
        tx: TransactionRequest,
    ) -> impl Future<Output = Result<B256>> + Send;

    /// The receipt of a transaction, `None` while it is pending.
    fn transaction_receipt(
        &self,
        hash: B256,
    ) -> impl Future<Output = Result<Option<TransactionReceipt>>> + Send;

    /// Execute a read-only call against the latest block.
    fn call(&self, call: CallRequest) -> impl Future<Output = Result<Bytes>> + Send;

    /// Ask a development node to mine a block now.
    fn mine(&self) -> impl Future<Output = Result<()>> + Send;
}
