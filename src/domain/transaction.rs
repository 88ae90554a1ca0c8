use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::amount::u256_dec;

/// Opaque handle to an admitted broadcast-queue operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle(pub Uuid);

impl TxHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TxHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of chain-mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Deploy,
    Activate,
    Terminate,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Activate => "activate",
            Self::Terminate => "terminate",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of one submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxState {
    Queued,
    Submitted,
    Confirmed,
    Reverted,
    TimedOut,
}

impl TxState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Reverted)
    }
}

/// Broadcast-queue bookkeeping for one admitted operation.
///
/// The nonce is assigned exactly once at admission and reused only by an
/// explicit same-nonce replacement of a TimedOut attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub handle: TxHandle,
    pub nonce: u64,
    pub kind: OperationKind,
    /// Absent for Deploy
    pub target: Option<Address>,
    #[serde(with = "u256_dec")]
    pub value: U256,
    #[serde(with = "u256_dec")]
    pub fee_per_gas: U256,
    pub tx_hash: Option<H256>,
    pub state: TxState,
    pub submitted_at: DateTime<Utc>,
    /// For Deploy, the created contract address once Confirmed
    pub result_address: Option<Address>,
    pub error: Option<String>,
    /// Same-nonce replacements issued for this operation
    pub replacements: u32,
}
