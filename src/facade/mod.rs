//! Chain interaction facade.
//!
//! # Data Flow
//! ```text
//! FacadeConfig
//!     → RpcChainClient (reads, raw submission, logs)
//!     → Wallet (signing, optional)
//!     → ChainFacade
//!         read_contract / get_balance / get_block_number   (single round-trip)
//!         write_contract / send_value → wait_for_receipt   (two suspension points)
//!         watch_event → EventWatch                         (standing subscription)
//!         parse_logs                                       (pure)
//! ```
//!
//! The facade performs no retries. Nonces are read from the node per write, so
//! concurrent writes from one signer can race.

pub mod logs;
pub mod transaction;
pub mod watch;

use alloy::dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::abi::ContractDescriptor;
use crate::blockchain::client::{ChainClient, RpcChainClient};
use crate::blockchain::types::{
    parse_address, BlockchainResult, CallFailure, ChainError, ChainId, DecodedLog, RawLog,
};
use crate::blockchain::wallet::{TransactionSigner, Wallet};
use crate::config::FacadeConfig;

pub use logs::{parse_logs, parse_logs_counted, ParsedLogs};
pub use transaction::WaitOptions;
pub use watch::EventWatch;

/// Uniform read / write / watch surface over a chain client.
#[derive(Clone)]
pub struct ChainFacade {
    client: Arc<dyn ChainClient>,
    signer: Option<Arc<dyn TransactionSigner>>,
    config: FacadeConfig,
}

impl ChainFacade {
    /// Build a facade over an existing client.
    pub fn new(client: Arc<dyn ChainClient>, config: FacadeConfig) -> Self {
        Self {
            client,
            signer: None,
            config,
        }
    }

    /// Attach the default signer used by [`ContractHandle::write`].
    pub fn with_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Connect to the configured endpoint and load the configured signer, if any.
    pub async fn connect(config: FacadeConfig) -> BlockchainResult<Self> {
        let client = RpcChainClient::connect(&config.chain).await?;
        let signer = match &config.signer.private_key {
            Some(key) => Some(Arc::new(Wallet::from_secret(key, config.chain.chain_id)?)
                as Arc<dyn TransactionSigner>),
            None => None,
        };

        let facade = Self {
            client: Arc::new(client),
            signer,
            config,
        };

        match facade.verify_chain_id().await {
            Ok(()) => tracing::info!(
                chain_id = facade.config.chain.chain_id,
                signer = ?facade.signer.as_ref().map(|s| s.address()),
                "Chain facade ready"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                "Chain facade ready but chain verification failed"
            ),
        }

        Ok(facade)
    }

    /// The default signer, or a signing error when none is configured.
    pub fn signer(&self) -> BlockchainResult<&dyn TransactionSigner> {
        self.signer
            .as_deref()
            .ok_or_else(|| ChainError::Signing("No signer configured".to_string()))
    }

    /// Load a contract listed in the configuration.
    pub fn load_contract(&self, name: &str) -> BlockchainResult<ContractDescriptor> {
        let contract = self
            .config
            .contract(name)
            .ok_or_else(|| ChainError::Abi(format!("Contract '{}' is not configured", name)))?;
        ContractDescriptor::from_file(&contract.name, &contract.address, Path::new(&contract.abi_path))
    }

    /// Load a configured contract, falling back to a fixed address and ABI path
    /// when the configuration does not list it.
    pub fn load_contract_or(
        &self,
        name: &str,
        address: &str,
        abi_path: &str,
    ) -> BlockchainResult<ContractDescriptor> {
        if self.config.contract(name).is_some() {
            return self.load_contract(name);
        }
        ContractDescriptor::from_file(name, address, Path::new(abi_path))
    }

    /// Bind a descriptor to this facade.
    pub fn contract<'a>(&'a self, descriptor: &'a ContractDescriptor) -> ContractHandle<'a> {
        ContractHandle {
            facade: self,
            descriptor,
        }
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let actual = ChainId(self.client.chain_id().await?);
        let expected = ChainId(self.config.chain.chain_id);
        if actual != expected {
            return Err(ChainError::ChainMismatch {
                expected: expected.into(),
                actual: actual.into(),
            });
        }
        Ok(())
    }

    /// Current chain head height.
    pub async fn get_block_number(&self) -> BlockchainResult<u64> {
        self.client.block_number().await
    }

    /// Native balance of a textual address, in wei.
    pub async fn get_balance(&self, address: &str) -> BlockchainResult<U256> {
        let address = parse_address(address)?;
        self.get_balance_of(address).await
    }

    /// Native balance of `address`, in wei.
    pub async fn get_balance_of(&self, address: Address) -> BlockchainResult<U256> {
        self.client.balance(address).await
    }

    /// Execute a view call.
    ///
    /// A single return value is returned as is; several are wrapped in a tuple.
    pub async fn read_contract(
        &self,
        descriptor: &ContractDescriptor,
        method: &str,
        args: &[DynSolValue],
    ) -> BlockchainResult<DynSolValue> {
        let function = descriptor.function(method, args.len())?;
        let input = function
            .abi_encode_input(args)
            .map_err(|e| call_error(method, CallFailure::Arguments(e.to_string())))?;

        let request = TransactionRequest::default()
            .with_to(descriptor.address())
            .with_input(input);

        let output = self
            .client
            .call(request)
            .await
            .map_err(|e| e.with_method(method))?;

        let mut values = function
            .abi_decode_output(&output)
            .map_err(|e| call_error(method, CallFailure::Decode(e.to_string())))?;

        tracing::debug!(
            contract = descriptor.name(),
            method = method,
            outputs = values.len(),
            "Contract read"
        );

        Ok(if values.len() == 1 {
            values.remove(0)
        } else {
            DynSolValue::Tuple(values)
        })
    }

    /// Decode `logs` against an event of `descriptor`. See [`parse_logs`].
    pub fn parse_logs(
        &self,
        descriptor: &ContractDescriptor,
        event: &str,
        logs: &[RawLog],
    ) -> BlockchainResult<Vec<DecodedLog>> {
        parse_logs(descriptor, event, logs)
    }
}

impl std::fmt::Debug for ChainFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainFacade")
            .field("chain_id", &self.config.chain.chain_id)
            .field("rpc_url", &self.config.chain.endpoint_url)
            .field("signer", &self.signer.as_ref().map(|s| s.address()))
            .finish()
    }
}

/// A descriptor bound to a facade and its default signer.
#[derive(Clone, Copy)]
pub struct ContractHandle<'a> {
    facade: &'a ChainFacade,
    descriptor: &'a ContractDescriptor,
}

impl<'a> ContractHandle<'a> {
    pub async fn read(&self, method: &str, args: &[DynSolValue]) -> BlockchainResult<DynSolValue> {
        self.facade.read_contract(self.descriptor, method, args).await
    }

    /// Submit a write signed by the facade's default signer.
    pub async fn write(&self, method: &str, args: &[DynSolValue]) -> BlockchainResult<TxHash> {
        let signer = self.facade.signer()?;
        self.facade
            .write_contract(self.descriptor, method, args, signer)
            .await
    }
}

/// Shortest polling period. Tokio intervals reject a zero period.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub(crate) fn poll_period(requested: Duration) -> Duration {
    requested.max(MIN_POLL_INTERVAL)
}

pub(crate) fn call_error(method: &str, failure: CallFailure) -> ChainError {
    ChainError::ContractCall {
        method: method.to_string(),
        failure,
    }
}
