//! Blockchain RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Connect to a JSON-RPC endpoint over HTTP or WebSocket
//! - Query chain state (block number, balances, receipts, logs)
//! - Execute calls and submit signed transactions
//! - Map transport failures and node rejections into [`ChainError`]

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::{Filter, TransactionRequest};
use alloy::sol_types::{decode_revert_reason, Revert};
use alloy::transports::{RpcError, TransportErrorKind};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::types::{BlockchainResult, ChainError, LogFilter, RawLog, Receipt};
use crate::config::ChainConfig;
use crate::observability::metrics;

/// Stream of logs pushed by the transport.
pub type LogStream = BoxStream<'static, RawLog>;

/// The chain access the facade is built on.
///
/// Every method is a single request against the node; none of them retry.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> BlockchainResult<u64>;

    async fn block_number(&self) -> BlockchainResult<u64>;

    /// Native balance at the latest block, in wei.
    async fn balance(&self, address: Address) -> BlockchainResult<U256>;

    /// `eth_call`. Reverts surface as [`ChainError::ContractCall`].
    async fn call(&self, request: TransactionRequest) -> BlockchainResult<Bytes>;

    async fn estimate_gas(&self, request: TransactionRequest) -> BlockchainResult<u64>;

    /// Gas price in wei.
    async fn gas_price(&self) -> BlockchainResult<u128>;

    /// Pending transaction count, used as the next nonce.
    async fn transaction_count(&self, address: Address) -> BlockchainResult<u64>;

    async fn send_raw_transaction(&self, raw: &[u8]) -> BlockchainResult<TxHash>;

    /// `None` while the transaction is not yet mined.
    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<Receipt>>;

    async fn logs(&self, filter: &LogFilter) -> BlockchainResult<Vec<RawLog>>;

    /// Push subscription, when the transport supports one.
    async fn subscribe_logs(&self, _filter: &LogFilter) -> BlockchainResult<Option<LogStream>> {
        Ok(None)
    }
}

/// Alloy-backed [`ChainClient`].
#[derive(Clone)]
pub struct RpcChainClient {
    provider: Arc<dyn Provider + Send + Sync>,
    endpoint: String,
    pubsub: bool,
    timeout_duration: Duration,
}

impl RpcChainClient {
    /// Connect to the configured endpoint. `ws://` and `wss://` URLs get a
    /// persistent socket with log subscriptions, anything else uses HTTP.
    pub async fn connect(config: &ChainConfig) -> BlockchainResult<Self> {
        let url: url::Url = config.endpoint_url.parse().map_err(|e| {
            ChainError::Transport(format!("Invalid RPC URL '{}': {}", config.endpoint_url, e))
        })?;
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let pubsub = matches!(url.scheme(), "ws" | "wss");

        let provider: Arc<dyn Provider + Send + Sync> = if pubsub {
            let connect = ProviderBuilder::new().connect_ws(WsConnect::new(url.as_str()));
            let provider = timeout(timeout_duration, connect)
                .await
                .map_err(|_| {
                    ChainError::Transport(format!(
                        "WebSocket connect timed out after {} seconds",
                        config.rpc_timeout_secs
                    ))
                })?
                .map_err(|e| ChainError::Transport(format!("WebSocket connect failed: {}", e)))?;
            Arc::new(provider)
        } else {
            Arc::new(ProviderBuilder::new().connect_http(url))
        };

        tracing::info!(
            rpc_url = %config.endpoint_url,
            pubsub = pubsub,
            "Chain client connected"
        );

        Ok(Self {
            provider,
            endpoint: config.endpoint_url.clone(),
            pubsub,
            timeout_duration,
        })
    }

    /// Whether the transport can push logs.
    pub fn is_pubsub(&self) -> bool {
        self.pubsub
    }

    async fn request<T, F>(&self, method: &'static str, fut: F) -> Result<T, RpcFailure>
    where
        F: IntoFuture<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let result = match timeout(self.timeout_duration, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(RpcFailure::Rpc(e)),
            Err(_) => Err(RpcFailure::Timeout(self.timeout_duration.as_secs())),
        };
        metrics::record_rpc_request(method, result.is_ok());
        if let Err(e) = &result {
            tracing::debug!(method = method, error = %e, "RPC request failed");
        }
        result
    }

    fn filter(filter: &LogFilter) -> Filter {
        let mut out = Filter::new()
            .address(filter.address)
            .event_signature(filter.topic0);
        if let Some(from) = filter.from_block {
            out = out.from_block(from);
        }
        if let Some(to) = filter.to_block {
            out = out.to_block(to);
        }
        out
    }
}

/// JSON-RPC error code nodes use for a reverted execution.
const EXECUTION_ERROR_CODE: i64 = 3;

/// Reason text from a node revert message, without the generic prefix.
fn revert_message(message: &str) -> Option<String> {
    let reason = message
        .strip_prefix("execution reverted:")
        .unwrap_or(message)
        .trim();
    if reason.is_empty() || reason.eq_ignore_ascii_case("execution reverted") {
        None
    } else {
        Some(reason.to_string())
    }
}

/// Failure of one RPC round-trip before it is classified.
enum RpcFailure {
    Rpc(RpcError<TransportErrorKind>),
    Timeout(u64),
}

impl std::fmt::Display for RpcFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcFailure::Rpc(e) => write!(f, "{}", e),
            RpcFailure::Timeout(secs) => write!(f, "request timed out after {} seconds", secs),
        }
    }
}

impl RpcFailure {
    /// Transport-level classification for read requests.
    fn transport(self) -> ChainError {
        ChainError::Transport(self.to_string())
    }

    /// An `eth_call` error response counts as a revert only when the node
    /// marks it as one. Any other error response is a transport failure.
    fn call(self) -> ChainError {
        match self {
            RpcFailure::Rpc(e) => {
                let Some(payload) = e.as_error_resp() else {
                    return ChainError::Transport(e.to_string());
                };
                let decoded = payload.as_decoded_error::<Revert>().map(|r| r.reason).or_else(|| {
                    payload
                        .as_revert_data()
                        .and_then(|data| decode_revert_reason(&data))
                });
                if let Some(reason) = decoded {
                    return ChainError::reverted(Some(reason));
                }
                let message: &str = &payload.message;
                if payload.code == EXECUTION_ERROR_CODE
                    || message.to_ascii_lowercase().contains("revert")
                {
                    return ChainError::reverted(revert_message(message));
                }
                ChainError::Transport(e.to_string())
            }
            timeout => timeout.transport(),
        }
    }

    /// A node error response on a write path is a rejected submission.
    fn submission(self, stage: &str) -> ChainError {
        match self {
            RpcFailure::Rpc(e) => match e.as_error_resp() {
                Some(payload) => ChainError::Submission(format!("{}: {}", stage, payload.message)),
                None => ChainError::Transport(e.to_string()),
            },
            timeout => timeout.transport(),
        }
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn chain_id(&self) -> BlockchainResult<u64> {
        self.request("eth_chainId", self.provider.get_chain_id())
            .await
            .map_err(RpcFailure::transport)
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        self.request("eth_blockNumber", self.provider.get_block_number())
            .await
            .map_err(RpcFailure::transport)
    }

    async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        self.request("eth_getBalance", self.provider.get_balance(address))
            .await
            .map_err(RpcFailure::transport)
    }

    async fn call(&self, request: TransactionRequest) -> BlockchainResult<Bytes> {
        self.request("eth_call", self.provider.call(request))
            .await
            .map_err(RpcFailure::call)
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> BlockchainResult<u64> {
        self.request("eth_estimateGas", self.provider.estimate_gas(request))
            .await
            .map_err(|e| e.submission("gas estimation failed"))
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.request("eth_gasPrice", self.provider.get_gas_price())
            .await
            .map_err(RpcFailure::transport)
    }

    async fn transaction_count(&self, address: Address) -> BlockchainResult<u64> {
        self.request(
            "eth_getTransactionCount",
            self.provider.get_transaction_count(address).pending(),
        )
        .await
        .map_err(RpcFailure::transport)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> BlockchainResult<TxHash> {
        let pending = self
            .request("eth_sendRawTransaction", self.provider.send_raw_transaction(raw))
            .await
            .map_err(|e| e.submission("transaction rejected"))?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<Receipt>> {
        let receipt = self
            .request(
                "eth_getTransactionReceipt",
                self.provider.get_transaction_receipt(tx_hash),
            )
            .await
            .map_err(RpcFailure::transport)?;
        Ok(receipt.and_then(Receipt::from_rpc))
    }

    async fn logs(&self, filter: &LogFilter) -> BlockchainResult<Vec<RawLog>> {
        let filter = Self::filter(filter);
        let logs = self
            .request("eth_getLogs", self.provider.get_logs(&filter))
            .await
            .map_err(RpcFailure::transport)?;
        Ok(logs.into_iter().map(RawLog::from).collect())
    }

    async fn subscribe_logs(&self, filter: &LogFilter) -> BlockchainResult<Option<LogStream>> {
        if !self.pubsub {
            return Ok(None);
        }
        let filter = Self::filter(filter);
        let subscription = self
            .request("eth_subscribe", self.provider.subscribe_logs(&filter))
            .await
            .map_err(RpcFailure::transport)?;
        Ok(Some(subscription.into_stream().map(RawLog::from).boxed()))
    }
}

impl std::fmt::Debug for RpcChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChainClient")
            .field("rpc_url", &self.endpoint)
            .field("pubsub", &self.pubsub)
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}
