//! Transaction building, signing, submission and confirmation.
//!
//! # Responsibilities
//! - Encode contract calls and native transfers
//! - Price gas against the configured cap and estimate the gas limit
//! - Hand the request to a signer and submit the raw bytes
//! - Poll for the receipt until mined, reverted or timed out

use alloy::dyn_abi::{DynSolValue, JsonAbiExt};
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::blockchain::abi::ContractDescriptor;
use crate::blockchain::types::{BlockchainResult, CallFailure, ChainError, Receipt};
use crate::blockchain::wallet::TransactionSigner;
use crate::config::ReceiptConfig;
use crate::facade::{call_error, poll_period, ChainFacade};
use crate::observability::metrics;

const GWEI: u128 = 1_000_000_000;

/// Bounds for [`ChainFacade::wait_for_receipt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Give up after this long.
    pub timeout: Duration,
    /// Delay between receipt polls.
    pub poll_interval: Duration,
    /// Blocks required on top of the inclusion block.
    pub confirmations: u64,
}

impl From<&ReceiptConfig> for WaitOptions {
    fn from(config: &ReceiptConfig) -> Self {
        Self {
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
            confirmations: config.confirmations,
        }
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::from(&ReceiptConfig::default())
    }
}

impl ChainFacade {
    /// Encode, sign and submit a state-changing call. Returns as soon as the node
    /// accepts the transaction.
    pub async fn write_contract(
        &self,
        descriptor: &ContractDescriptor,
        method: &str,
        args: &[DynSolValue],
        signer: &dyn TransactionSigner,
    ) -> BlockchainResult<TxHash> {
        let function = descriptor.function(method, args.len())?;
        let input = function
            .abi_encode_input(args)
            .map_err(|e| call_error(method, CallFailure::Arguments(e.to_string())))?;

        let request = TransactionRequest::default()
            .with_to(descriptor.address())
            .with_input(input);

        let tx_hash = self.submit(request, signer).await?;

        tracing::info!(
            contract = descriptor.name(),
            method = method,
            tx_hash = %tx_hash,
            "Contract write submitted"
        );
        Ok(tx_hash)
    }

    /// Transfer native currency.
    pub async fn send_value(
        &self,
        to: Address,
        value: U256,
        signer: &dyn TransactionSigner,
    ) -> BlockchainResult<TxHash> {
        let request = TransactionRequest::default().with_to(to).with_value(value);
        let tx_hash = self.submit(request, signer).await?;

        tracing::info!(to = %to, value = %value, tx_hash = %tx_hash, "Transfer submitted");
        Ok(tx_hash)
    }

    async fn submit(
        &self,
        request: TransactionRequest,
        signer: &dyn TransactionSigner,
    ) -> BlockchainResult<TxHash> {
        let request = self.prepare(request, signer.address()).await?;
        let raw = signer.sign_transaction(request).await?;
        let tx_hash = self.client.send_raw_transaction(&raw).await?;
        metrics::record_transaction_submitted();
        Ok(tx_hash)
    }

    /// Fill nonce, chain id, gas price and gas limit.
    async fn prepare(
        &self,
        request: TransactionRequest,
        from: Address,
    ) -> BlockchainResult<TransactionRequest> {
        let config = &self.config.chain;

        let nonce = self.client.transaction_count(from).await?;

        let gas_price = self.client.gas_price().await?;
        if gas_price > config.max_gas_price_gwei as u128 * GWEI {
            return Err(ChainError::GasPriceTooHigh {
                current_gwei: u64::try_from(gas_price.div_ceil(GWEI)).unwrap_or(u64::MAX),
                max_gwei: config.max_gas_price_gwei,
            });
        }

        // The cap is checked against the node price, before the multiplier.
        let adjusted_gas_price = (gas_price as f64 * config.gas_price_multiplier) as u128;

        let request = request
            .with_from(from)
            .with_nonce(nonce)
            .with_chain_id(config.chain_id)
            .with_gas_price(adjusted_gas_price);

        let gas_limit = self.client.estimate_gas(request.clone()).await?;

        tracing::debug!(
            from = %from,
            nonce = nonce,
            gas_price = adjusted_gas_price,
            gas_limit = gas_limit,
            "Transaction prepared"
        );

        Ok(request.with_gas_limit(gas_limit))
    }

    /// Wait until `tx_hash` is mined with the requested depth.
    ///
    /// Uses the configured receipt bounds when `options` is `None`. A mined but
    /// failed transaction is an error, never a receipt.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        options: Option<WaitOptions>,
    ) -> BlockchainResult<Receipt> {
        let options = options.unwrap_or_else(|| WaitOptions::from(&self.config.receipts));

        let result = timeout(options.timeout, async {
            let mut ticker = interval(poll_period(options.poll_interval));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // Failed polls are retried until the overall timeout.
            loop {
                ticker.tick().await;

                let receipt = match self.client.transaction_receipt(tx_hash).await {
                    Ok(Some(r)) => r,
                    Ok(None) => {
                        tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(tx_hash = %tx_hash, error = %e, "Receipt poll failed");
                        continue;
                    }
                };

                if !receipt.success {
                    return Err(ChainError::TransactionReverted {
                        tx_hash,
                        block_number: receipt.block_number,
                    });
                }

                if options.confirmations == 0 {
                    return Ok(receipt);
                }

                let current_block = match self.client.block_number().await {
                    Ok(block) => block,
                    Err(e) => {
                        tracing::warn!(tx_hash = %tx_hash, error = %e, "Block number poll failed");
                        continue;
                    }
                };
                let confirmations = current_block.saturating_sub(receipt.block_number);
                if confirmations >= options.confirmations {
                    return Ok(receipt);
                }

                tracing::debug!(
                    tx_hash = %tx_hash,
                    confirmations = confirmations,
                    required = options.confirmations,
                    "Waiting for confirmations"
                );
            }
        })
        .await;

        match result {
            Ok(receipt) => {
                if let Ok(r) = &receipt {
                    tracing::info!(
                        tx_hash = %tx_hash,
                        block_number = r.block_number,
                        gas_used = r.gas_used,
                        "Transaction confirmed"
                    );
                }
                receipt
            }
            Err(_) => Err(ChainError::Timeout {
                tx_hash,
                waited_secs: options.timeout.as_secs(),
            }),
        }
    }
}
