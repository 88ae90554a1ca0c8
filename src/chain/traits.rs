use async_trait::async_trait;
use ethers::types::{Address, H256, U256};

use crate::domain::OperationKind;
use crate::error::Result;

/// Constructor arguments for a fresh agreement contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployParams {
    pub renter: Address,
    pub content_hash: String,
    pub rent_amount: U256,
    pub deposit_amount: U256,
    pub duration_days: u64,
}

/// One chain-mutating call, as admitted to the broadcast queue.
#[derive(Debug, Clone)]
pub enum ChainCall {
    Deploy(DeployParams),
    Activate { contract: Address, value: U256 },
    Terminate { contract: Address },
}

impl ChainCall {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Deploy(_) => OperationKind::Deploy,
            Self::Activate { .. } => OperationKind::Activate,
            Self::Terminate { .. } => OperationKind::Terminate,
        }
    }

    pub fn target(&self) -> Option<Address> {
        match self {
            Self::Deploy(_) => None,
            Self::Activate { contract, .. } | Self::Terminate { contract } => Some(*contract),
        }
    }

    /// Attached payment, zero except for activation.
    pub fn value(&self) -> U256 {
        match self {
            Self::Activate { value, .. } => *value,
            _ => U256::zero(),
        }
    }
}

/// Outcome of a durably included transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxInclusion {
    Success { contract_address: Option<Address> },
    Reverted { reason: String },
}

/// Stateless adapter over the remote ledger endpoint.
///
/// Mutating submissions carry an explicit nonce and fee bid so the broadcast
/// queue stays the sole owner of nonce assignment. Read accessors mirror the
/// agreement contract's read-only surface one call per method, so the read
/// aggregator can issue them concurrently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    fn signer_address(&self) -> Address;

    /// Chain-reported next nonce for the signer, pending txs included
    async fn pending_nonce(&self) -> Result<u64>;

    async fn signer_balance(&self) -> Result<U256>;

    async fn gas_price(&self) -> Result<U256>;

    /// Sign and broadcast. Returns the transaction hash once the endpoint
    /// has accepted the submission; inclusion is observed separately.
    async fn submit(&self, call: ChainCall, nonce: u64, fee_per_gas: U256) -> Result<H256>;

    /// Non-blocking receipt check. `None` until the chain includes the tx.
    async fn inclusion(&self, tx_hash: H256) -> Result<Option<TxInclusion>>;

    async fn landlord(&self, contract: Address) -> Result<Address>;

    async fn renter(&self, contract: Address) -> Result<Address>;

    async fn content_hash(&self, contract: Address) -> Result<String>;

    async fn rent_amount(&self, contract: Address) -> Result<U256>;

    async fn deposit_amount(&self, contract: Address) -> Result<U256>;

    async fn duration_days(&self, contract: Address) -> Result<u64>;

    async fn is_active(&self, contract: Address) -> Result<bool>;

    async fn is_terminated(&self, contract: Address) -> Result<bool>;
}
