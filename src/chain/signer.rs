use crate::error::{RentchainError, Result};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use tracing::info;
use zeroize::Zeroize;

/// The custodial signing identity shared by every operation on the platform.
///
/// # Security
/// The private key is only used during construction and then immediately
/// zeroized. The key never leaves this type; chain access goes through the
/// middleware built from [`ChainSigner::into_wallet`], owned by the ledger
/// client, which is in turn reachable only through the broadcast queue for
/// mutating calls.
#[derive(Clone, Debug)]
pub struct ChainSigner {
    inner: LocalWallet,
    chain_id: u64,
}

impl ChainSigner {
    /// Create a signer from a private key hex string
    pub fn from_private_key(private_key: &str, chain_id: u64) -> Result<Self> {
        // Remove 0x prefix if present
        let key_hex = private_key.trim_start_matches("0x");

        let mut secure_key = key_hex.to_string();

        let wallet = secure_key
            .parse::<LocalWallet>()
            .map_err(|e| RentchainError::SignerFailure(format!("Invalid private key: {}", e)))?
            .with_chain_id(chain_id);

        // Zeroize the key from memory
        secure_key.zeroize();

        info!(
            "Signer initialized: {:?} (private key zeroized from memory)",
            wallet.address()
        );

        Ok(Self {
            inner: wallet,
            chain_id,
        })
    }

    /// Create a signer from the environment
    pub fn from_env(chain_id: u64) -> Result<Self> {
        let mut private_key = std::env::var("RENTCHAIN__SIGNER__PRIVATE_KEY")
            .or_else(|_| std::env::var("PRIVATE_KEY"))
            .map_err(|_| {
                RentchainError::SignerFailure(
                    "RENTCHAIN__SIGNER__PRIVATE_KEY or PRIVATE_KEY environment variable not set"
                        .to_string(),
                )
            })?;

        let result = Self::from_private_key(&private_key, chain_id);

        private_key.zeroize();

        result
    }

    /// Get the signer address
    pub fn address(&self) -> Address {
        self.inner.address()
    }

    /// Get the chain ID
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Consume into the wallet used to build the signing middleware
    pub fn into_wallet(self) -> LocalWallet {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe51296170827936ea5cce4b76994b0f";

    #[test]
    fn parses_key_with_and_without_prefix() {
        let bare = ChainSigner::from_private_key(TEST_KEY, 11155111).unwrap();
        let prefixed =
            ChainSigner::from_private_key(&format!("0x{}", TEST_KEY), 11155111).unwrap();
        assert_eq!(bare.address(), prefixed.address());
        assert_eq!(bare.chain_id(), 11155111);
    }

    #[test]
    fn rejects_malformed_key() {
        let err = ChainSigner::from_private_key("not-a-key", 1).unwrap_err();
        assert_eq!(err.kind(), "signer_failure");
    }
}
