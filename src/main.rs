//! Chain facade demo.
//!
//! Runs a fixed sequence against a local Anvil node with the demo contracts
//! deployed:
//!
//! ```text
//! block number → balance → native transfer
//!     → MyToken.balanceOf (bound handle, then free function)
//!     → Counter.increment → wait → number
//!     → Counter.increment → wait → number
//!     → MyToken.transfer → wait → decode Transfer logs
//! ```
//!
//! Configuration comes from `CHAIN_FACADE_CONFIG` (optional TOML) and `.env`
//! (`RPC_URL`, `PRIVATE_KEY`, `CHAIN_ID`).

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::U256;
use std::error::Error;

use chain_facade::blockchain::abi::format_value;
use chain_facade::blockchain::parse_address;
use chain_facade::config::load_with_env;
use chain_facade::observability;
use chain_facade::{ChainFacade, FacadeConfig};

const ERC20_ADDRESS: &str = "0xDc64a140Aa3E981100a9becA4E685f962f0cF6C9";
const COUNTER_ADDRESS: &str = "0xa513E6E4b8f2a923D98304ec87F64353C4D5C853";
const FUNDED_ACCOUNT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
const RECIPIENT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = load_with_env(None)?;
    observability::init(&config.observability);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Demo failed");
        return Err(e);
    }
    Ok(())
}

async fn run(config: FacadeConfig) -> Result<(), Box<dyn Error>> {
    let facade = ChainFacade::connect(config).await?;

    let block_number = facade.get_block_number().await?;
    println!("Current Block Number: {}", block_number);

    let balance = facade.get_balance(FUNDED_ACCOUNT).await?;
    println!("Account Balance: {} ETH", format_ether(balance));

    let signer = facade.signer()?;
    let user = signer.address();
    println!("The wallet address is: {}", user);

    let hash1 = facade
        .send_value(parse_address(RECIPIENT)?, parse_ether("0.01")?, signer)
        .await?;
    println!("Transaction hash1 : {}", hash1);

    let erc20 = facade.load_contract_or("MyToken", ERC20_ADDRESS, "abis/MyToken.json")?;
    let token = facade.contract(&erc20);

    let balance1 = token.read("balanceOf", &[DynSolValue::Address(user)]).await?;
    println!("address {} has token balance: {}", user, format_ether(as_uint(&balance1)?));

    let balance2 = facade
        .read_contract(&erc20, "balanceOf", &[DynSolValue::Address(user)])
        .await?;
    println!("address {} has token balance: {}", user, format_ether(as_uint(&balance2)?));

    let counter_descriptor = facade.load_contract_or("Counter", COUNTER_ADDRESS, "abis/Counter.json")?;
    let counter = facade.contract(&counter_descriptor);

    let tx = counter.write("increment", &[]).await?;
    println!("Counter increment tx hash: {}", tx);
    facade.wait_for_receipt(tx, None).await?;

    let number1 = counter.read("number", &[]).await?;
    println!("Counter number after increment: {}", format_value(&number1));

    let tx = facade
        .write_contract(&counter_descriptor, "increment", &[], signer)
        .await?;
    facade.wait_for_receipt(tx, None).await?;

    let number2 = facade.read_contract(&counter_descriptor, "number", &[]).await?;
    println!("Counter number after increment: {}", format_value(&number2));

    let tx2 = token
        .write(
            "transfer",
            &[
                DynSolValue::Address(parse_address(RECIPIENT)?),
                DynSolValue::Uint(parse_ether("10")?, 256),
            ],
        )
        .await?;
    println!("ERC20 transfer tx hash: {}", tx2);

    let receipt2 = facade.wait_for_receipt(tx2, None).await?;
    let transfer_logs = facade.parse_logs(&erc20, "Transfer", &receipt2.logs)?;
    println!("Parsed Transfer event logs:");
    for log in &transfer_logs {
        println!("  {}", log);
    }

    Ok(())
}

fn as_uint(value: &DynSolValue) -> Result<U256, Box<dyn Error>> {
    value
        .as_uint()
        .map(|(v, _)| v)
        .ok_or_else(|| format!("expected uint, got {:?}", value).into())
}
