//! JSON-RPC transport and the [`ChainClient`] implementation built on it.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U64};
use anyhow::Context;
use backon::{ExponentialBuilder, Retryable};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::chain::{CallRequest, ChainClient, TransactionReceipt, TransactionRequest};

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of retries for idempotent reads.
const READ_RETRIES: usize = 3;

/// Delay before the first read retry; doubles on each attempt.
const READ_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Error returned by the node itself, as opposed to a transport failure.
#[derive(Debug, thiserror::Error)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or returned an error response.
/// Node-side errors are returned as [`RpcError`].
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        return Err(parse_rpc_error(error).into());
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

fn parse_rpc_error(error: &Value) -> RpcError {
    let mut message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("unknown")
        .to_string();

    // Revert payloads are carried in `data`, either as a bare hex string or nested.
    let data = error
        .get("data")
        .and_then(|d| d.as_str().or_else(|| d.get("data").and_then(|d| d.as_str())));
    if let Some(data) = data {
        message = format!("{message} (data: {data})");
    }

    RpcError {
        code: error.get("code").and_then(|c| c.as_i64()).unwrap_or_default(),
        message,
    }
}

/// [`ChainClient`] talking to a node over HTTP JSON-RPC.
///
/// Reads are retried with exponential backoff on transport failures. Transaction
/// submission is sent exactly once.
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    client: reqwest::Client,
    url: Url,
    backoff: ExponentialBuilder,
}

impl RpcChainClient {
    pub fn new(url: Url) -> Result<Self, anyhow::Error> {
        Ok(Self {
            client: create_client()?,
            url,
            backoff: read_backoff(READ_RETRY_DELAY),
        })
    }

    /// Override the delay before the first read retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.backoff = read_backoff(delay);
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, anyhow::Error> {
        json_rpc_call(&self.client, self.url.as_str(), method, params).await
    }

    /// Idempotent request retried while the failure is not a node-side error.
    async fn read<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, anyhow::Error> {
        (|| self.request(method, params.clone()))
            .retry(self.backoff)
            .when(|e: &anyhow::Error| e.downcast_ref::<RpcError>().is_none())
            .notify(|e: &anyhow::Error, after: Duration| {
                tracing::debug!(error = %e, method, retry_in = ?after, "RPC read failed, retrying...");
            })
            .await
    }
}

fn read_backoff(min_delay: Duration) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(min_delay)
        .with_max_times(READ_RETRIES)
}

impl ChainClient for RpcChainClient {
    async fn chain_id(&self) -> anyhow::Result<u64> {
        let id: U64 = self.read("eth_chainId", vec![]).await?;
        Ok(id.to::<u64>())
    }

    async fn accounts(&self) -> anyhow::Result<Vec<Address>> {
        self.read("eth_accounts", vec![]).await
    }

    async fn code_at(&self, address: Address) -> anyhow::Result<Bytes> {
        self.read(
            "eth_getCode",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> anyhow::Result<B256> {
        self.request("eth_sendTransaction", vec![serde_json::to_value(&tx)?])
            .await
    }

    async fn transaction_receipt(&self, hash: B256) -> anyhow::Result<Option<TransactionReceipt>> {
        self.read("eth_getTransactionReceipt", vec![serde_json::json!(hash)])
            .await
    }

    async fn call(&self, call: CallRequest) -> anyhow::Result<Bytes> {
        self.read(
            "eth_call",
            vec![serde_json::to_value(&call)?, serde_json::json!("latest")],
        )
        .await
    }

    async fn mine(&self) -> anyhow::Result<()> {
        let _: Value = self.request("evm_mine", vec![]).await?;
        Ok(())
    }
}

/// Poll `check_fn` until it yields a value or `timeout` elapses.
///
/// # Arguments
/// * `name` - What is being waited for (for error messages)
/// * `timeout` - Maximum time to wait
/// * `interval` - Delay between two checks
/// * `check_fn` - Returns `Ok(Some(_))` when done, `Ok(None)` to keep waiting
///
/// Errors from `check_fn` are logged and polling continues. On timeout, the last
/// error seen is kept as the cause.
pub async fn poll_until<T, F, Fut>(
    name: &str,
    timeout: Duration,
    interval: Duration,
    check_fn: F,
) -> Result<T, anyhow::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Option<T>, anyhow::Error>>,
{
    let start = tokio::time::Instant::now();
    let mut last_error = None;

    loop {
        match check_fn().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {
                tracing::trace!(target_name = %name, "Still waiting...");
            }
            Err(e) => {
                tracing::debug!(error = %e, target_name = %name, "Check failed, retrying...");
                last_error = Some(e);
            }
        }

        if start.elapsed() + interval > timeout {
            let message = format!("Timeout waiting for {} after {:?}", name, timeout);
            return Err(match last_error {
                Some(e) => e.context(message),
                None => anyhow::anyhow!(message),
            });
        }

        tokio::time::sleep(interval).await;
    }
}
