//! Shared utilities for integration tests: an in-memory chain with one
//! counter contract.
#![allow(dead_code)]

use alloy::consensus::transaction::SignerRecoverable;
use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::utils::parse_ether;
use alloy::primitives::{keccak256, Address, Bytes, TxHash, TxKind, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use chain_facade::blockchain::{
    BlockchainResult, ChainClient, ChainError, ContractDescriptor, LogFilter, LogStream, RawLog,
    Receipt, Wallet,
};
use chain_facade::{ChainFacade, FacadeConfig};

pub const CHAIN_ID: u64 = 31337;

/// Anvil account #0.
pub const DEPLOYER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const DEPLOYER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
/// Anvil account #1.
pub const RECIPIENT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

pub const COUNTER_ADDRESS: &str = "0xa513E6E4b8f2a923D98304ec87F64353C4D5C853";

pub const COUNTER_ABI: &str = r#"[
    {"type":"function","name":"number","inputs":[],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
    {"type":"function","name":"increment","inputs":[],"outputs":[],"stateMutability":"nonpayable"},
    {"type":"function","name":"decrement","inputs":[],"outputs":[],"stateMutability":"nonpayable"},
    {"type":"function","name":"setNumber","inputs":[{"name":"newNumber","type":"uint256"}],"outputs":[],"stateMutability":"nonpayable"},
    {"type":"event","name":"Incremented","anonymous":false,"inputs":[
        {"name":"previous","type":"uint256","indexed":true},
        {"name":"current","type":"uint256","indexed":false}]}
]"#;

pub const UNDERFLOW_REASON: &str = "Counter: underflow";

const GWEI: u128 = 1_000_000_000;

pub fn genesis_balance() -> U256 {
    parse_ether("10000").unwrap()
}

pub fn counter() -> ContractDescriptor {
    ContractDescriptor::from_json("Counter", COUNTER_ADDRESS, COUNTER_ABI).unwrap()
}

/// Configuration with short bounds suitable for tests.
pub fn test_config() -> FacadeConfig {
    let mut config = FacadeConfig::default();
    config.chain.chain_id = CHAIN_ID;
    config.receipts.timeout_secs = 5;
    config.receipts.poll_interval_ms = 10;
    config.watch.poll_interval_ms = 20;
    config
}

/// A facade over `chain` signing with the deployer key.
pub fn facade(chain: &Arc<MockChain>) -> ChainFacade {
    facade_with(chain, test_config())
}

/// Facade with the deployer as signer and a caller-tuned config.
pub fn facade_with(chain: &Arc<MockChain>, config: FacadeConfig) -> ChainFacade {
    let wallet = Wallet::from_private_key(DEPLOYER_KEY, CHAIN_ID).unwrap();
    ChainFacade::new(chain.clone(), config).with_signer(Arc::new(wallet))
}

fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn word(value: U256) -> Bytes {
    Bytes::from(value.to_be_bytes::<32>().to_vec())
}

struct State {
    block_number: u64,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    counter: U256,
    receipts: HashMap<TxHash, Receipt>,
    logs: Vec<RawLog>,
    automine: bool,
    offline: bool,
    gas_price: u128,
    subscribers: Vec<(LogFilter, mpsc::UnboundedSender<RawLog>)>,
}

enum Outcome {
    Success(Vec<RawLog>),
    Reverted,
}

/// In-memory chain.
///
/// Mines one block per accepted transaction unless automining is off, in
/// which case transactions are accepted but never mined.
pub struct MockChain {
    state: Mutex<State>,
    counter: Address,
    push: bool,
}

impl MockChain {
    /// Chain whose log delivery is polled.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    /// Chain that also pushes logs to subscribers, as a WebSocket node would.
    pub fn with_push() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    fn build(push: bool) -> Self {
        let balances = [DEPLOYER, RECIPIENT]
            .iter()
            .map(|a| (a.parse().unwrap(), genesis_balance()))
            .collect();

        Self {
            state: Mutex::new(State {
                block_number: 0,
                balances,
                nonces: HashMap::new(),
                counter: U256::ZERO,
                receipts: HashMap::new(),
                logs: Vec::new(),
                automine: true,
                offline: false,
                gas_price: GWEI,
                subscribers: Vec::new(),
            }),
            counter: COUNTER_ADDRESS.parse().unwrap(),
            push,
        }
    }

    pub fn set_automine(&self, automine: bool) {
        self.state.lock().unwrap().automine = automine;
    }

    pub fn set_gas_price_gwei(&self, gwei: u64) {
        self.state.lock().unwrap().gas_price = gwei as u128 * GWEI;
    }

    pub fn set_gas_price_wei(&self, wei: u128) {
        self.state.lock().unwrap().gas_price = wei;
    }

    /// Push every stored log again flagged as removed, as after a reorg.
    pub fn retract_logs(&self) {
        let mut state = self.state.lock().unwrap();
        let retracted: Vec<RawLog> = state
            .logs
            .iter()
            .map(|log| RawLog { removed: true, ..log.clone() })
            .collect();
        state.subscribers.retain(|(filter, sender)| {
            retracted
                .iter()
                .filter(|log| filter.matches(log))
                .all(|log| sender.send(log.clone()).is_ok())
        });
    }

    /// Make every request fail with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// End every push subscription.
    pub fn close_subscriptions(&self) {
        self.state.lock().unwrap().subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        state.subscribers.retain(|(_, tx)| !tx.is_closed());
        state.subscribers.len()
    }

    /// Mine empty blocks.
    pub fn mine(&self, blocks: u64) {
        self.state.lock().unwrap().block_number += blocks;
    }

    pub fn counter_value(&self) -> U256 {
        self.state.lock().unwrap().counter
    }

    fn check_online(&self) -> BlockchainResult<()> {
        if self.state.lock().unwrap().offline {
            return Err(ChainError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    /// Run counter code. Mutates state only on success.
    fn execute(state: &mut State, contract: Address, input: &[u8]) -> Result<(Bytes, Vec<RawLog>), String> {
        if input.len() < 4 {
            return Err("no selector".to_string());
        }
        let (sel, body) = input.split_at(4);
        if sel == selector("number()") {
            Ok((word(state.counter), Vec::new()))
        } else if sel == selector("increment()") {
            let previous = state.counter;
            state.counter += U256::from(1);
            let log = RawLog {
                address: contract,
                topics: vec![
                    keccak256("Incremented(uint256,uint256)".as_bytes()),
                    previous.into(),
                ],
                data: word(state.counter),
                block_number: None,
                transaction_hash: None,
                log_index: None,
                removed: false,
            };
            Ok((Bytes::new(), vec![log]))
        } else if sel == selector("decrement()") {
            if state.counter.is_zero() {
                return Err(UNDERFLOW_REASON.to_string());
            }
            state.counter -= U256::from(1);
            Ok((Bytes::new(), Vec::new()))
        } else if sel == selector("setNumber(uint256)") {
            let value = U256::try_from_be_slice(body).ok_or("bad argument")?;
            state.counter = value;
            Ok((Bytes::new(), Vec::new()))
        } else {
            Err("unknown selector".to_string())
        }
    }

    fn apply(&self, state: &mut State, tx: &TxEnvelope, from: Address) -> Outcome {
        let value = tx.value();
        let sender = state.balances.entry(from).or_default();
        if *sender < value {
            return Outcome::Reverted;
        }
        *sender -= value;

        if let Some(to) = tx.to() {
            *state.balances.entry(to).or_default() += value;
            if to == self.counter {
                let snapshot = state.counter;
                return match Self::execute(state, to, tx.input()) {
                    Ok((_, logs)) => Outcome::Success(logs),
                    Err(_) => {
                        state.counter = snapshot;
                        Outcome::Reverted
                    }
                };
            }
        }
        Outcome::Success(Vec::new())
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> BlockchainResult<u64> {
        self.check_online()?;
        Ok(CHAIN_ID)
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        self.check_online()?;
        Ok(self.state.lock().unwrap().block_number)
    }

    async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        self.check_online()?;
        Ok(self.state.lock().unwrap().balances.get(&address).copied().unwrap_or_default())
    }

    async fn call(&self, request: TransactionRequest) -> BlockchainResult<Bytes> {
        self.check_online()?;
        let to = match request.to {
            Some(TxKind::Call(to)) => to,
            _ => return Err(ChainError::Transport("call without target".to_string())),
        };
        if to != self.counter {
            return Ok(Bytes::new());
        }
        let input = request.input.input().cloned().unwrap_or_default();

        // eth_call never persists state.
        let mut state = self.state.lock().unwrap();
        let snapshot = state.counter;
        let result = Self::execute(&mut state, to, &input);
        state.counter = snapshot;

        result
            .map(|(output, _)| output)
            .map_err(|reason| ChainError::reverted(Some(reason)))
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> BlockchainResult<u64> {
        self.check_online()?;
        Ok(if request.input.input().is_some() { 50_000 } else { 21_000 })
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.check_online()?;
        Ok(self.state.lock().unwrap().gas_price)
    }

    async fn transaction_count(&self, address: Address) -> BlockchainResult<u64> {
        self.check_online()?;
        Ok(self.state.lock().unwrap().nonces.get(&address).copied().unwrap_or_default())
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> BlockchainResult<TxHash> {
        self.check_online()?;
        let tx = TxEnvelope::decode_2718(&mut &raw[..])
            .map_err(|e| ChainError::Submission(format!("undecodable transaction: {}", e)))?;
        let from = tx
            .recover_signer()
            .map_err(|e| ChainError::Submission(format!("bad signature: {}", e)))?;
        if tx.chain_id() != Some(CHAIN_ID) {
            return Err(ChainError::Submission("invalid chain id".to_string()));
        }

        let tx_hash = keccak256(raw);
        let mut state = self.state.lock().unwrap();

        let nonce = state.nonces.entry(from).or_default();
        if tx.nonce() != *nonce {
            return Err(ChainError::Submission(format!(
                "nonce mismatch: expected {}, got {}",
                nonce,
                tx.nonce()
            )));
        }
        *nonce += 1;

        if !state.automine {
            return Ok(tx_hash);
        }

        let outcome = self.apply(&mut state, &tx, from);
        state.block_number += 1;
        let block_number = state.block_number;

        let (success, mut logs) = match outcome {
            Outcome::Success(logs) => (true, logs),
            Outcome::Reverted => (false, Vec::new()),
        };
        for (index, log) in logs.iter_mut().enumerate() {
            log.block_number = Some(block_number);
            log.transaction_hash = Some(tx_hash);
            log.log_index = Some(index as u64);
        }

        state.logs.extend(logs.iter().cloned());
        state.subscribers.retain(|(filter, sender)| {
            logs.iter()
                .filter(|log| filter.matches(log))
                .all(|log| sender.send(log.clone()).is_ok())
        });
        state.receipts.insert(
            tx_hash,
            Receipt {
                transaction_hash: tx_hash,
                block_number,
                success,
                gas_used: tx.gas_limit(),
                logs,
            },
        );

        Ok(tx_hash)
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<Receipt>> {
        self.check_online()?;
        Ok(self.state.lock().unwrap().receipts.get(&tx_hash).cloned())
    }

    async fn logs(&self, filter: &LogFilter) -> BlockchainResult<Vec<RawLog>> {
        self.check_online()?;
        let state = self.state.lock().unwrap();
        Ok(state.logs.iter().filter(|log| filter.matches(log)).cloned().collect())
    }

    async fn subscribe_logs(&self, filter: &LogFilter) -> BlockchainResult<Option<LogStream>> {
        if !self.push {
            return Ok(None);
        }
        self.check_online()?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().unwrap().subscribers.push((filter.clone(), tx));

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|log| (log, rx))
        });
        Ok(Some(stream.boxed()))
    }
}

/// Poll `condition` until it holds or `limit` elapses.
pub async fn eventually<F: Fn() -> bool>(limit: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
