//! Contract descriptors: address plus ABI, with a name-indexed dispatch table.
//!
//! Method and event names are resolved once when the descriptor is built, so a
//! call never has to scan the ABI. Overloaded functions are grouped by name and
//! selected by argument count at call time.

use alloy::dyn_abi::{DynSolValue, Specifier};
use alloy::json_abi::{Event, Function, JsonAbi, StateMutability};
use alloy::primitives::Address;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::blockchain::types::{parse_address, BlockchainResult, CallFailure, ChainError};

/// Immutable description of a deployed contract.
#[derive(Clone)]
pub struct ContractDescriptor {
    name: String,
    address: Address,
    functions: Arc<HashMap<String, Vec<Function>>>,
    events: Arc<HashMap<String, Event>>,
}

impl ContractDescriptor {
    /// Build a descriptor from an already parsed ABI.
    pub fn new(name: impl Into<String>, address: Address, abi: JsonAbi) -> Self {
        let functions = abi
            .functions()
            .fold(HashMap::<String, Vec<Function>>::new(), |mut map, f| {
                map.entry(f.name.clone()).or_default().push(f.clone());
                map
            });

        // Anonymous events carry no selector topic and cannot be matched.
        let events = abi
            .events()
            .filter(|e| !e.anonymous)
            .map(|e| (e.name.clone(), e.clone()))
            .collect::<HashMap<_, _>>();

        Self {
            name: name.into(),
            address,
            functions: Arc::new(functions),
            events: Arc::new(events),
        }
    }

    /// Parse an ABI document. Accepts a bare ABI array or a compiler artifact
    /// carrying the array under `abi`.
    pub fn from_json(name: impl Into<String>, address: &str, json: &str) -> BlockchainResult<Self> {
        let address = parse_address(address)?;
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ChainError::Abi(format!("Invalid JSON: {}", e)))?;
        let abi_value = match value {
            serde_json::Value::Object(mut obj) if obj.contains_key("abi") => obj.remove("abi").unwrap_or_default(),
            other => other,
        };
        let abi: JsonAbi = serde_json::from_value(abi_value)
            .map_err(|e| ChainError::Abi(format!("Invalid ABI: {}", e)))?;
        Ok(Self::new(name, address, abi))
    }

    /// Load an ABI file from disk.
    pub fn from_file(name: impl Into<String>, address: &str, path: &Path) -> BlockchainResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ChainError::Abi(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_json(name, address, &json)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Whether the ABI declares a method with this name.
    pub fn has_method(&self, method: &str) -> bool {
        self.functions.contains_key(method)
    }

    /// Method names, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a method overload by name and argument count.
    pub fn function(&self, method: &str, arity: usize) -> BlockchainResult<&Function> {
        let overloads = self.functions.get(method).ok_or_else(|| ChainError::ContractCall {
            method: method.to_string(),
            failure: CallFailure::UnknownMethod,
        })?;

        overloads
            .iter()
            .find(|f| f.inputs.len() == arity)
            .ok_or_else(|| ChainError::ContractCall {
                method: method.to_string(),
                failure: CallFailure::Arguments(format!(
                    "expected {} argument(s), got {}",
                    overloads
                        .iter()
                        .map(|f| f.inputs.len().to_string())
                        .collect::<Vec<_>>()
                        .join(" or "),
                    arity
                )),
            })
    }

    /// Resolve an event by name.
    pub fn event(&self, name: &str) -> BlockchainResult<&Event> {
        self.events
            .get(name)
            .ok_or_else(|| ChainError::UnknownEvent(name.to_string()))
    }

    /// Coerce textual arguments (as typed on a command line) into ABI values.
    pub fn coerce_args(&self, method: &str, raw: &[String]) -> BlockchainResult<Vec<DynSolValue>> {
        let function = self.function(method, raw.len())?;
        function
            .inputs
            .iter()
            .zip(raw)
            .map(|(param, text)| {
                let ty = param.resolve().map_err(|e| arg_error(method, e))?;
                ty.coerce_str(text).map_err(|e| arg_error(method, e))
            })
            .collect()
    }
}

/// Whether a function can be executed without a transaction.
pub fn is_view(function: &Function) -> bool {
    matches!(
        function.state_mutability,
        StateMutability::View | StateMutability::Pure
    )
}

/// Render an ABI value for terminal output.
pub fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Address(a) => a.to_checksum(None),
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Uint(u, _) => u.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Bytes(b) => alloy::hex::encode_prefixed(b),
        DynSolValue::FixedBytes(word, size) => alloy::hex::encode_prefixed(&word[..*size]),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => format!(
            "[{}]",
            items.iter().map(format_value).collect::<Vec<_>>().join(", ")
        ),
        DynSolValue::Tuple(items) => format!(
            "({})",
            items.iter().map(format_value).collect::<Vec<_>>().join(", ")
        ),
        other => format!("{:?}", other),
    }
}

fn arg_error(method: &str, e: impl fmt::Display) -> ChainError {
    ChainError::ContractCall {
        method: method.to_string(),
        failure: CallFailure::Arguments(e.to_string()),
    }
}

impl fmt::Debug for ContractDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractDescriptor")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("methods", &self.functions.len())
            .field("events", &self.events.len())
            .finish()
    }
}
