//! Chain-specific types and error definitions.

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes, TxHash, B256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::blockchain::abi::format_value;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Why a contract call could not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallFailure {
    /// The method name is not part of the contract ABI.
    #[error("method not found in ABI")]
    UnknownMethod,

    /// Argument count or types do not match any overload.
    #[error("argument mismatch: {0}")]
    Arguments(String),

    /// The node executed the call and it reverted.
    #[error("execution reverted{}", .0.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    Reverted(Option<String>),

    /// Return data could not be decoded against the ABI outputs.
    #[error("output decoding failed: {0}")]
    Decode(String),
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC endpoint unreachable, request failed or timed out.
    #[error("RPC error: {0}")]
    Transport(String),

    /// Malformed account or contract address.
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    /// Read-side contract failure (ABI mismatch or revert).
    #[error("Contract call `{method}` failed: {failure}")]
    ContractCall { method: String, failure: CallFailure },

    /// Event name is not part of the contract ABI.
    #[error("Event `{0}` not found in ABI")]
    UnknownEvent(String),

    /// ABI document could not be read or parsed.
    #[error("ABI error: {0}")]
    Abi(String),

    /// Signer unavailable or signing rejected.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Network rejected the transaction (nonce, funds, gas).
    #[error("Submission rejected: {0}")]
    Submission(String),

    /// Transaction was not confirmed within the wait bound.
    #[error("Transaction {tx_hash} not confirmed after {waited_secs} seconds")]
    Timeout { tx_hash: TxHash, waited_secs: u64 },

    /// Transaction was mined but reverted on-chain.
    #[error("Transaction {tx_hash} reverted in block {block_number}")]
    TransactionReverted { tx_hash: TxHash, block_number: u64 },

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

impl ChainError {
    /// Attach the method name to a contract call failure raised below the facade.
    pub fn with_method(self, method: &str) -> Self {
        match self {
            ChainError::ContractCall { failure, .. } => ChainError::ContractCall {
                method: method.to_string(),
                failure,
            },
            other => other,
        }
    }

    /// Shorthand for a reverted call with an optional reason.
    pub fn reverted(reason: Option<String>) -> Self {
        ChainError::ContractCall {
            method: String::new(),
            failure: CallFailure::Reverted(reason),
        }
    }
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, ChainError>;

/// Parse a hex address, accepting any letter case.
pub fn parse_address(input: &str) -> BlockchainResult<Address> {
    Address::from_str(input.trim()).map_err(|_| ChainError::InvalidAddress(input.to_string()))
}

/// Raw event emission as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<TxHash>,
    pub log_index: Option<u64>,
    /// Set when a reorg retracted this log.
    pub removed: bool,
}

impl RawLog {
    /// The event signature topic, if any.
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }
}

impl From<alloy::rpc::types::Log> for RawLog {
    fn from(log: alloy::rpc::types::Log) -> Self {
        Self {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            block_number: log.block_number,
            transaction_hash: log.transaction_hash,
            log_index: log.log_index,
            removed: log.removed,
        }
    }
}

/// One named argument of a decoded event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventArg {
    pub name: String,
    pub indexed: bool,
    pub value: DynSolValue,
}

/// A log decoded against an ABI event.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLog {
    /// Event name from the ABI.
    pub event: String,
    /// Emitting contract.
    pub address: Address,
    /// Arguments in ABI declaration order.
    pub args: Vec<EventArg>,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<TxHash>,
    pub log_index: Option<u64>,
}

impl DecodedLog {
    /// Look up an argument value by its ABI name.
    pub fn arg(&self, name: &str) -> Option<&DynSolValue> {
        self.args.iter().find(|a| a.name == name).map(|a| &a.value)
    }
}

impl fmt::Display for DecodedLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.event)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", arg.name, format_value(&arg.value))?;
        }
        write!(f, ") from {}", self.address)?;
        if let Some(block) = self.block_number {
            write!(f, " in block {}", block)?;
        }
        if let Some(hash) = self.transaction_hash {
            write!(f, " tx {}", hash)?;
        }
        Ok(())
    }
}

/// Confirmation record for a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
    pub gas_used: u64,
    /// Logs in emission order.
    pub logs: Vec<RawLog>,
}

impl Receipt {
    /// Convert an RPC receipt. Returns `None` while the transaction has no block.
    pub fn from_rpc(receipt: alloy::rpc::types::TransactionReceipt) -> Option<Self> {
        let block_number = receipt.block_number?;
        Some(Self {
            transaction_hash: receipt.transaction_hash,
            block_number,
            success: receipt.status(),
            gas_used: receipt.gas_used,
            logs: receipt.inner.logs().iter().cloned().map(RawLog::from).collect(),
        })
    }
}

/// Log query used for both polling and push subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    pub topic0: B256,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
}

impl LogFilter {
    pub fn new(address: Address, topic0: B256) -> Self {
        Self {
            address,
            topic0,
            from_block: None,
            to_block: None,
        }
    }

    pub fn blocks(mut self, from: u64, to: u64) -> Self {
        self.from_block = Some(from);
        self.to_block = Some(to);
        self
    }

    /// Whether `log` falls inside this filter.
    pub fn matches(&self, log: &RawLog) -> bool {
        if log.address != self.address || log.topic0() != Some(&self.topic0) {
            return false;
        }
        match (log.block_number, self.from_block, self.to_block) {
            (Some(n), Some(from), Some(to)) => n >= from && n <= to,
            (Some(n), Some(from), None) => n >= from,
            (Some(n), None, Some(to)) => n <= to,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_conversion() {
        let chain_id = ChainId::from(31337u64);
        assert_eq!(chain_id.0, 31337);
        assert_eq!(u64::from(chain_id), 31337);
    }

    #[test]
    fn test_parse_address_case_insensitive() {
        let lower = parse_address("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266").unwrap();
        let mixed = parse_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap();
        assert_eq!(lower, mixed);
        assert_eq!(
            mixed.to_checksum(None),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn test_parse_address_rejects_malformed() {
        for bad in ["", "0x1234", "not-an-address", "0xZZ9Fd6e51aad88F6F4ce6aB8827279cffFb92266"] {
            let err = parse_address(bad).unwrap_err();
            assert!(matches!(err, ChainError::InvalidAddress(_)), "{bad}");
        }
    }

    #[test]
    fn test_error_display() {
        let err = ChainError::GasPriceTooHigh {
            current_gwei: 600,
            max_gwei: 500,
        };
        assert!(err.to_string().contains("600"));

        let err = ChainError::reverted(Some("Counter: underflow".into())).with_method("decrement");
        assert_eq!(
            err.to_string(),
            "Contract call `decrement` failed: execution reverted: Counter: underflow"
        );

        let err = ChainError::reverted(None).with_method("decrement");
        assert!(err.to_string().ends_with("execution reverted"));
    }

    #[test]
    fn test_with_method_leaves_other_errors() {
        let err = ChainError::Transport("down".into()).with_method("number");
        assert!(matches!(err, ChainError::Transport(_)));
    }

    #[test]
    fn test_decoded_log_display() {
        let log = DecodedLog {
            event: "Transfer".into(),
            address: Address::ZERO,
            args: vec![EventArg {
                name: "value".into(),
                indexed: false,
                value: DynSolValue::Uint(alloy::primitives::U256::from(10), 256),
            }],
            block_number: Some(3),
            transaction_hash: None,
            log_index: Some(0),
        };
        assert_eq!(
            log.to_string(),
            "Transfer(value: 10) from 0x0000000000000000000000000000000000000000 in block 3"
        );
    }

    #[test]
    fn test_log_filter_bounds() {
        let topic = B256::repeat_byte(0xaa);
        let log = RawLog {
            address: Address::ZERO,
            topics: vec![topic],
            data: Bytes::new(),
            block_number: Some(5),
            transaction_hash: None,
            log_index: Some(0),
            removed: false,
        };
        assert!(LogFilter::new(Address::ZERO, topic).matches(&log));
        assert!(LogFilter::new(Address::ZERO, topic).blocks(5, 5).matches(&log));
        assert!(!LogFilter::new(Address::ZERO, topic).blocks(6, 9).matches(&log));
        assert!(!LogFilter::new(Address::ZERO, B256::ZERO).matches(&log));
        assert!(!LogFilter::new(Address::repeat_byte(1), topic).matches(&log));
    }
}
