//! Chain access collaborators.
//!
//! # Data Flow
//! ```text
//! FacadeConfig (endpoint URL, chain id, private key)
//!     → wallet.rs (key loading, transaction signing)
//!     → client.rs (RPC connection with timeouts, HTTP or WebSocket)
//!     → abi.rs (contract descriptors, method/event dispatch tables)
//! ```
//!
//! # Security Constraints
//! - Private keys never leave the signer and are never logged
//! - All RPC calls have configurable timeouts

pub mod abi;
pub mod client;
pub mod types;
pub mod wallet;

pub use abi::ContractDescriptor;
pub use client::{ChainClient, LogStream, RpcChainClient};
pub use types::{
    parse_address, BlockchainResult, CallFailure, ChainError, ChainId, DecodedLog, EventArg,
    LogFilter, RawLog, Receipt,
};
pub use wallet::{TransactionSigner, Wallet};
