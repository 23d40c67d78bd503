//! Wallet management and transaction signing.
//!
//! # Security
//! - Key material stays inside the signer; callers only see signed bytes
//! - Keys are never logged or serialized

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{Ethereum, EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;

use crate::blockchain::types::{BlockchainResult, ChainError};
use crate::config::SecretString;

/// Anything able to authorize a transaction on behalf of one account.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// The account transactions are sent from.
    fn address(&self) -> Address;

    /// Sign a fully populated request, returning the EIP-2718 encoded envelope.
    async fn sign_transaction(&self, request: TransactionRequest) -> BlockchainResult<Bytes>;
}

/// Local private-key wallet.
#[derive(Debug, Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    /// * `chain_id` - Chain ID for EIP-155 replay protection
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> BlockchainResult<Self> {
        let key_hex = private_key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| ChainError::Signing(format!("Invalid private key format: {}", e)))?;
        let signer = signer.with_chain_id(Some(chain_id));

        tracing::info!(
            address = %signer.address(),
            chain_id = chain_id,
            "Wallet initialized"
        );

        Ok(Self { signer, chain_id })
    }

    /// Create a wallet from configured key material.
    pub fn from_secret(secret: &SecretString, chain_id: u64) -> BlockchainResult<Self> {
        secret.with_exposed(|key| Self::from_private_key(key, chain_id))
    }

    /// Get the chain ID this wallet signs for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

#[async_trait]
impl TransactionSigner for Wallet {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign_transaction(&self, request: TransactionRequest) -> BlockchainResult<Bytes> {
        if let Some(chain_id) = request.chain_id {
            if chain_id != self.chain_id {
                return Err(ChainError::Signing(format!(
                    "Wallet is bound to chain {}, request targets chain {}",
                    self.chain_id, chain_id
                )));
            }
        }

        let wallet = EthereumWallet::from(self.signer.clone());
        let envelope = <TransactionRequest as TransactionBuilder<Ethereum>>::build(request, &wallet)
            .await
            .map_err(|e| ChainError::Signing(format!("Transaction signing failed: {}", e)))?;

        Ok(envelope.encoded_2718().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::consensus::{Transaction, TxEnvelope};
    use alloy::eips::eip2718::Decodable2718;
    use alloy::primitives::U256;

    // Well-known test private key (Anvil's first account)
    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_wallet_from_private_key() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 31337).unwrap();
        assert_eq!(
            wallet.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
        assert_eq!(wallet.chain_id(), 31337);
    }

    #[test]
    fn test_wallet_with_0x_prefix() {
        let wallet = Wallet::from_private_key(&format!("0x{}", TEST_PRIVATE_KEY), 1).unwrap();
        assert_eq!(
            wallet.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_invalid_private_key() {
        let result = Wallet::from_private_key("invalid_key", 1);
        assert!(matches!(result, Err(ChainError::Signing(_))));
        assert!(result.unwrap_err().to_string().contains("Invalid private key"));
    }

    #[test]
    fn test_debug_hides_key() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 1).unwrap();
        assert!(!format!("{wallet:?}").contains(TEST_PRIVATE_KEY));
    }

    #[tokio::test]
    async fn test_sign_transaction_roundtrips_envelope() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 31337).unwrap();
        let to = Address::repeat_byte(0x11);
        let request = TransactionRequest::default()
            .with_from(wallet.address())
            .with_to(to)
            .with_value(U256::from(7))
            .with_nonce(3)
            .with_gas_limit(21_000)
            .with_gas_price(1_000_000_000)
            .with_chain_id(31337);

        let raw = wallet.sign_transaction(request).await.unwrap();
        let mut buf: &[u8] = raw.as_ref();
        let envelope = TxEnvelope::decode_2718(&mut buf).unwrap();
        assert_eq!(envelope.to(), Some(to));
        assert_eq!(envelope.nonce(), 3);
        assert_eq!(envelope.value(), U256::from(7));
    }

    #[tokio::test]
    async fn test_sign_transaction_rejects_foreign_chain() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 31337).unwrap();
        let request = TransactionRequest::default().with_chain_id(1);
        let err = wallet.sign_transaction(request).await.unwrap_err();
        assert!(matches!(err, ChainError::Signing(_)));
    }
}
