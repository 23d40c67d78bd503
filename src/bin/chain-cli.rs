use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::TxHash;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chain_facade::blockchain::abi::{format_value, is_view};
use chain_facade::blockchain::{parse_address, Receipt};
use chain_facade::config::{load_with_env, override_endpoint};
use chain_facade::lifecycle::shutdown_signal;
use chain_facade::observability;
use chain_facade::ChainFacade;

#[derive(Parser)]
#[command(name = "chain-cli")]
#[command(about = "Command line access to the chain facade", long_about = None)]
struct Cli {
    /// TOML configuration file (defaults to $CHAIN_FACADE_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured RPC endpoint
    #[arg(short, long)]
    rpc_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current block number
    BlockNumber,
    /// Print the native balance of an address
    Balance { address: String },
    /// Call a view method on a configured contract
    Read {
        contract: String,
        method: String,
        args: Vec<String>,
    },
    /// Submit a state-changing call with the configured signer
    Write {
        contract: String,
        method: String,
        args: Vec<String>,
        /// Wait for the receipt before exiting
        #[arg(short, long)]
        wait: bool,
    },
    /// Transfer native currency, amount in ether
    Send {
        to: String,
        value: String,
        #[arg(short, long)]
        wait: bool,
    },
    /// Wait for the receipt of a submitted transaction
    Receipt { hash: String },
    /// Print events as they are emitted until interrupted
    Watch { contract: String, event: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_with_env(cli.config.as_deref())?;
    if let Some(url) = cli.rpc_url {
        override_endpoint(&mut config, url)?;
    }
    observability::init(&config.observability);

    let facade = ChainFacade::connect(config).await?;

    match cli.command {
        Commands::BlockNumber => {
            println!("{}", facade.get_block_number().await?);
        }
        Commands::Balance { address } => {
            let balance = facade.get_balance(&address).await?;
            println!("{} ETH", format_ether(balance));
        }
        Commands::Read {
            contract,
            method,
            args,
        } => {
            let descriptor = facade.load_contract(&contract)?;
            let args = descriptor.coerce_args(&method, &args)?;
            let value = facade.read_contract(&descriptor, &method, &args).await?;
            println!("{}", format_value(&value));
        }
        Commands::Write {
            contract,
            method,
            args,
            wait,
        } => {
            let descriptor = facade.load_contract(&contract)?;
            if is_view(descriptor.function(&method, args.len())?) {
                return Err(format!("`{}` is a view method, use `read`", method).into());
            }
            let args = descriptor.coerce_args(&method, &args)?;
            let tx_hash = facade.contract(&descriptor).write(&method, &args).await?;
            println!("{}", tx_hash);
            if wait {
                print_receipt(&facade.wait_for_receipt(tx_hash, None).await?);
            }
        }
        Commands::Send { to, value, wait } => {
            let to = parse_address(&to)?;
            let tx_hash = facade
                .send_value(to, parse_ether(&value)?, facade.signer()?)
                .await?;
            println!("{}", tx_hash);
            if wait {
                print_receipt(&facade.wait_for_receipt(tx_hash, None).await?);
            }
        }
        Commands::Receipt { hash } => {
            let tx_hash: TxHash = hash
                .parse()
                .map_err(|e| format!("Invalid transaction hash '{}': {}", hash, e))?;
            print_receipt(&facade.wait_for_receipt(tx_hash, None).await?);
        }
        Commands::Watch { contract, event } => {
            let descriptor = facade.load_contract(&contract)?;
            let watch = facade
                .watch_event(&descriptor, &event, |log| println!("{}", log), None)
                .await?;
            shutdown_signal().await;
            watch.unsubscribe().await;
        }
    }

    Ok(())
}

fn print_receipt(receipt: &Receipt) {
    println!("transaction: {}", receipt.transaction_hash);
    println!("block:       {}", receipt.block_number);
    println!("status:      {}", if receipt.success { "success" } else { "reverted" });
    println!("gas used:    {}", receipt.gas_used);
    println!("logs:        {}", receipt.logs.len());
}
