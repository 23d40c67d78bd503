//! Print every `Transfer` emitted by the demo token until interrupted.
//!
//! Uses a push subscription when `RPC_URL` is a `ws://` or `wss://` endpoint
//! and block polling otherwise.

use std::error::Error;
use tokio::sync::mpsc;

use chain_facade::blockchain::abi::format_value;
use chain_facade::config::load_with_env;
use chain_facade::lifecycle::shutdown_signal;
use chain_facade::observability;
use chain_facade::{ChainFacade, FacadeConfig};

const ERC20_ADDRESS: &str = "0xDc64a140Aa3E981100a9becA4E685f962f0cF6C9";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = load_with_env(None)?;
    observability::init(&config.observability);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Error in watch-transfer");
        return Err(e);
    }
    Ok(())
}

async fn run(config: FacadeConfig) -> Result<(), Box<dyn Error>> {
    let facade = ChainFacade::connect(config).await?;
    let token = facade.load_contract_or("MyToken", ERC20_ADDRESS, "abis/MyToken.json")?;

    println!("Listening for transfer event...");

    let (errors_tx, mut errors_rx) = mpsc::unbounded_channel();
    let watch = facade
        .watch_event(
            &token,
            "Transfer",
            |log| {
                let field = |name: &str| log.arg(name).map(format_value).unwrap_or_default();
                println!("Transfer event detected:");
                println!("From: {}", field("from"));
                println!("To: {}", field("to"));
                println!("Value: {}", field("value"));
                if let Some(hash) = log.transaction_hash {
                    println!("transactionHash: {}", hash);
                }
                if let Some(block) = log.block_number {
                    println!("blockNumber: {}", block);
                }
            },
            Some(errors_tx),
        )
        .await?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(e) = errors_rx.recv() => {
                eprintln!("Watch error: {}", e);
            }
        }
    }

    println!("Stopping event listener...");
    watch.unsubscribe().await;
    Ok(())
}
