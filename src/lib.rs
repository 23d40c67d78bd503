//! Chain interaction facade over an EVM JSON-RPC endpoint.
//!
//! Reads chain state, submits signed contract writes, waits for receipts,
//! decodes event logs and keeps standing event subscriptions, all against
//! contracts described by a JSON ABI.

pub mod blockchain;
pub mod config;
pub mod facade;
pub mod lifecycle;
pub mod observability;

pub use blockchain::{ChainError, ContractDescriptor, Receipt, Wallet};
pub use config::FacadeConfig;
pub use facade::ChainFacade;
