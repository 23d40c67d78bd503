//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so a minimal file (or none) is enough for a
//! local Anvil chain.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SecretString;

/// Root configuration for the facade and its binaries.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FacadeConfig {
    /// Endpoint and chain settings.
    pub chain: ChainConfig,

    /// Signing key material.
    pub signer: SignerConfig,

    /// Receipt wait settings.
    pub receipts: ReceiptConfig,

    /// Event watch settings.
    pub watch: WatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Contracts loaded at startup.
    pub contracts: Vec<ContractConfig>,
}

impl FacadeConfig {
    /// Look up a configured contract by name.
    pub fn contract(&self, name: &str) -> Option<&ContractConfig> {
        self.contracts.iter().find(|c| c.name == name)
    }
}

/// Chain endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint URL (http, https, ws or wss).
    pub endpoint_url: String,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Gas price multiplier (1.0 = node price, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://localhost:8545".to_string(),
            chain_id: 31337,
            rpc_timeout_secs: 10,
            gas_price_multiplier: 1.2,
            max_gas_price_gwei: 500,
        }
    }
}

/// Signer configuration. The key is never serialized back out.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SignerConfig {
    /// Hex private key, with or without 0x prefix.
    #[serde(skip_serializing)]
    pub private_key: Option<SecretString>,
}

/// Receipt wait configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReceiptConfig {
    /// Maximum time to wait for a receipt, in seconds.
    pub timeout_secs: u64,

    /// Receipt polling interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Blocks on top of the inclusion block before a receipt is returned.
    pub confirmations: u64,
}

impl ReceiptConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            poll_interval_ms: 1000,
            confirmations: 0,
        }
    }
}

/// Event watch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Block polling interval in milliseconds when the transport cannot push.
    pub poll_interval_ms: u64,

    /// Capacity of the channel between log producer and callback consumer.
    pub channel_capacity: usize,
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 4000,
            channel_capacity: 256,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// A contract the binaries can address by name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractConfig {
    /// Name used on the command line and in logs.
    pub name: String,

    /// Deployed address.
    pub address: String,

    /// Path to the ABI JSON (bare array or compiler artifact).
    pub abi_path: String,
}
