//! Ledger client backed by an ethers JSON-RPC provider.
//!
//! All mutating submissions carry the nonce and fee bid chosen by the
//! broadcast queue; this adapter never picks a nonce on its own.

use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::LocalWallet;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockNumber, TransactionRequest, H256, U256, U64};
use std::sync::Arc;
use tracing::debug;

use crate::chain::contract::{AgreementArtifact, RentalAgreement};
use crate::chain::signer::ChainSigner;
use crate::chain::traits::{ChainCall, LedgerClient, TxInclusion};
use crate::error::{RentchainError, Result};

type LedgerMiddleware = SignerMiddleware<Provider<Http>, LocalWallet>;

pub struct EthersLedger {
    client: Arc<LedgerMiddleware>,
    artifact: AgreementArtifact,
    signer_address: Address,
}

impl EthersLedger {
    pub fn new(rpc_url: &str, signer: ChainSigner, artifact: AgreementArtifact) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| RentchainError::Chain(format!("invalid RPC url '{}': {}", rpc_url, e)))?;
        let wallet = signer.into_wallet();
        let signer_address = ethers::signers::Signer::address(&wallet);
        let client = Arc::new(SignerMiddleware::new(provider, wallet));

        Ok(Self {
            client,
            artifact,
            signer_address,
        })
    }

    fn agreement(&self, contract: Address) -> RentalAgreement<LedgerMiddleware> {
        RentalAgreement::new(contract, self.client.clone())
    }

    fn build_tx(&self, call: &ChainCall, nonce: u64, fee_per_gas: U256) -> Result<TypedTransaction> {
        let mut tx: TypedTransaction = match call {
            ChainCall::Deploy(params) => {
                let data = self.artifact.deploy_data(params)?;
                TransactionRequest::new().data(data).into()
            }
            ChainCall::Activate { contract, value } => {
                self.agreement(*contract).activate_agreement().value(*value).tx
            }
            ChainCall::Terminate { contract } => self.agreement(*contract).terminate_agreement().tx,
        };
        tx.set_from(self.signer_address);
        tx.set_nonce(nonce);
        tx.set_gas_price(fee_per_gas);
        Ok(tx)
    }
}

/// Map a provider/contract error message onto the failure taxonomy.
fn classify_submit_error(message: String) -> RentchainError {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("insufficient funds") {
        RentchainError::SignerFailure(message)
    } else if lowered.contains("nonce too low")
        || lowered.contains("invalid nonce")
        || lowered.contains("nonce is too low")
        || lowered.contains("replacement transaction underpriced")
    {
        RentchainError::NonceDesync(message)
    } else if lowered.contains("revert") {
        RentchainError::ChainRejected(message)
    } else {
        RentchainError::Chain(message)
    }
}

fn read_err(context: &str, e: impl std::fmt::Display) -> RentchainError {
    RentchainError::Chain(format!("{} read failed: {}", context, e))
}

fn u256_to_u64(value: U256, context: &str) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(RentchainError::Chain(format!(
            "{} out of range: {}",
            context, value
        )));
    }
    Ok(value.low_u64())
}

#[async_trait]
impl LedgerClient for EthersLedger {
    fn signer_address(&self) -> Address {
        self.signer_address
    }

    async fn pending_nonce(&self) -> Result<u64> {
        let nonce = self
            .client
            .get_transaction_count(self.signer_address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| read_err("pending nonce", e))?;
        u256_to_u64(nonce, "pending nonce")
    }

    async fn signer_balance(&self) -> Result<U256> {
        self.client
            .get_balance(self.signer_address, None)
            .await
            .map_err(|e| read_err("signer balance", e))
    }

    async fn gas_price(&self) -> Result<U256> {
        self.client
            .get_gas_price()
            .await
            .map_err(|e| read_err("gas price", e))
    }

    async fn submit(&self, call: ChainCall, nonce: u64, fee_per_gas: U256) -> Result<H256> {
        let tx = self.build_tx(&call, nonce, fee_per_gas)?;
        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|e| classify_submit_error(e.to_string()))?;
        let tx_hash = *pending;
        debug!(
            "Submitted {} tx {:?} (nonce {}, fee {})",
            call.kind(),
            tx_hash,
            nonce,
            fee_per_gas
        );
        Ok(tx_hash)
    }

    async fn inclusion(&self, tx_hash: H256) -> Result<Option<TxInclusion>> {
        let receipt = self
            .client
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| read_err("receipt", e))?;

        Ok(receipt.map(|r| {
            if r.status == Some(U64::from(1)) {
                TxInclusion::Success {
                    contract_address: r.contract_address,
                }
            } else {
                TxInclusion::Reverted {
                    reason: format!("transaction {:?} reverted on inclusion", tx_hash),
                }
            }
        }))
    }

    async fn landlord(&self, contract: Address) -> Result<Address> {
        self.agreement(contract)
            .landlord()
            .call()
            .await
            .map_err(|e| read_err("landlord", e))
    }

    async fn renter(&self, contract: Address) -> Result<Address> {
        self.agreement(contract)
            .renter()
            .call()
            .await
            .map_err(|e| read_err("renter", e))
    }

    async fn content_hash(&self, contract: Address) -> Result<String> {
        self.agreement(contract)
            .property_ipfs_hash()
            .call()
            .await
            .map_err(|e| read_err("propertyIPFSHash", e))
    }

    async fn rent_amount(&self, contract: Address) -> Result<U256> {
        self.agreement(contract)
            .rent_amount()
            .call()
            .await
            .map_err(|e| read_err("rentAmount", e))
    }

    async fn deposit_amount(&self, contract: Address) -> Result<U256> {
        self.agreement(contract)
            .deposit_amount()
            .call()
            .await
            .map_err(|e| read_err("depositAmount", e))
    }

    async fn duration_days(&self, contract: Address) -> Result<u64> {
        let raw = self
            .agreement(contract)
            .rental_duration()
            .call()
            .await
            .map_err(|e| read_err("rentalDuration", e))?;
        u256_to_u64(raw, "rentalDuration")
    }

    async fn is_active(&self, contract: Address) -> Result<bool> {
        self.agreement(contract)
            .is_active()
            .call()
            .await
            .map_err(|e| read_err("isActive", e))
    }

    async fn is_terminated(&self, contract: Address) -> Result<bool> {
        self.agreement(contract)
            .is_terminated()
            .call()
            .await
            .map_err(|e| read_err("isTerminated", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_errors_map_to_taxonomy() {
        assert_eq!(
            classify_submit_error("insufficient funds for gas * price + value".into()).kind(),
            "signer_failure"
        );
        assert_eq!(
            classify_submit_error("nonce too low: next nonce 7".into()).kind(),
            "nonce_desync"
        );
        assert_eq!(
            classify_submit_error("execution reverted: Agreement already active".into()).kind(),
            "chain_rejected"
        );
        assert_eq!(
            classify_submit_error("connection refused".into()).kind(),
            "chain_unavailable"
        );
    }

    #[test]
    fn u256_to_u64_guards_range() {
        assert_eq!(u256_to_u64(U256::from(30u64), "duration").unwrap(), 30);
        assert!(u256_to_u64(U256::MAX, "duration").is_err());
    }
}
