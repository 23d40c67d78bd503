//! Configuration validation.
//!
//! Serde handles syntax; this pass checks value ranges and references and
//! returns every problem found, not just the first.

use std::fmt;

use crate::blockchain::types::parse_address;
use crate::config::schema::FacadeConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &FacadeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match url::Url::parse(&config.chain.endpoint_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https" | "ws" | "wss") => {}
        Ok(url) => errors.push(ValidationError::new(
            "chain.endpoint_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("chain.endpoint_url", e.to_string())),
    }

    if config.chain.chain_id == 0 {
        errors.push(ValidationError::new("chain.chain_id", "must be greater than 0"));
    }
    if config.chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("chain.rpc_timeout_secs", "must be greater than 0"));
    }
    if !(config.chain.gas_price_multiplier.is_finite() && config.chain.gas_price_multiplier >= 1.0) {
        errors.push(ValidationError::new(
            "chain.gas_price_multiplier",
            "must be a finite number >= 1.0",
        ));
    }
    if config.receipts.timeout_secs == 0 {
        errors.push(ValidationError::new("receipts.timeout_secs", "must be greater than 0"));
    }
    if config.receipts.poll_interval_ms == 0 {
        errors.push(ValidationError::new("receipts.poll_interval_ms", "must be greater than 0"));
    }
    if config.watch.poll_interval_ms == 0 {
        errors.push(ValidationError::new("watch.poll_interval_ms", "must be greater than 0"));
    }
    if config.watch.channel_capacity == 0 {
        errors.push(ValidationError::new("watch.channel_capacity", "must be greater than 0"));
    }
    if let Some(key) = &config.signer.private_key {
        if key.is_empty() {
            errors.push(ValidationError::new("signer.private_key", "must not be empty"));
        }
    }

    for (i, contract) in config.contracts.iter().enumerate() {
        let field = format!("contracts[{}]", i);
        if contract.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.name", field), "must not be empty"));
        } else if config.contracts[..i].iter().any(|c| c.name == contract.name) {
            errors.push(ValidationError::new(
                format!("{}.name", field),
                format!("duplicate contract name '{}'", contract.name),
            ));
        }
        if parse_address(&contract.address).is_err() {
            errors.push(ValidationError::new(
                format!("{}.address", field),
                format!("invalid address '{}'", contract.address),
            ));
        }
        if contract.abi_path.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.abi_path", field), "must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
