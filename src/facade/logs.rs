//! Event log decoding.
//!
//! Logs are matched on topic0 only, so a receipt touching several contracts
//! that emit the same event yields all of them, each tagged with its emitter.

use alloy::dyn_abi::EventExt;
use alloy::json_abi::Event;

use crate::blockchain::abi::ContractDescriptor;
use crate::blockchain::types::{BlockchainResult, DecodedLog, EventArg, RawLog};

/// Result of [`parse_logs_counted`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLogs {
    /// Decoded events in input order.
    pub events: Vec<DecodedLog>,
    /// Logs whose topic matched but whose payload did not decode.
    pub dropped: usize,
}

/// Decode every log in `logs` that carries the selector of `event`.
///
/// Matching logs that fail to decode are skipped; use [`parse_logs_counted`]
/// to learn how many.
pub fn parse_logs(
    descriptor: &ContractDescriptor,
    event: &str,
    logs: &[RawLog],
) -> BlockchainResult<Vec<DecodedLog>> {
    parse_logs_counted(descriptor, event, logs).map(|parsed| parsed.events)
}

/// Like [`parse_logs`], also reporting how many matching logs were dropped.
pub fn parse_logs_counted(
    descriptor: &ContractDescriptor,
    event: &str,
    logs: &[RawLog],
) -> BlockchainResult<ParsedLogs> {
    let abi_event = descriptor.event(event)?;
    let selector = abi_event.selector();

    let mut parsed = ParsedLogs::default();
    for log in logs.iter().filter(|log| log.topic0() == Some(&selector)) {
        match decode_log(abi_event, log) {
            Some(decoded) => parsed.events.push(decoded),
            None => parsed.dropped += 1,
        }
    }

    if parsed.dropped > 0 {
        tracing::debug!(
            event = event,
            dropped = parsed.dropped,
            decoded = parsed.events.len(),
            "Dropped logs that matched the event topic but failed to decode"
        );
    }

    Ok(parsed)
}

/// Decode one log. `None` if topics or data do not fit the event.
pub(crate) fn decode_log(event: &Event, log: &RawLog) -> Option<DecodedLog> {
    let decoded = match event.decode_log_parts(log.topics.iter().copied(), &log.data) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::trace!(event = %event.name, error = %e, "Log decode failed");
            return None;
        }
    };

    let mut indexed = decoded.indexed.into_iter();
    let mut body = decoded.body.into_iter();
    let args = event
        .inputs
        .iter()
        .map(|param| {
            let value = if param.indexed {
                indexed.next()
            } else {
                body.next()
            }?;
            Some(EventArg {
                name: param.name.clone(),
                indexed: param.indexed,
                value,
            })
        })
        .collect::<Option<Vec<_>>>()?;

    Some(DecodedLog {
        event: event.name.clone(),
        address: log.address,
        args,
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
        log_index: log.log_index,
    })
}
