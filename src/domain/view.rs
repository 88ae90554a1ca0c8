use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use super::amount::u256_dec;

/// Authoritative on-chain view of one agreement contract.
///
/// Assembled only as a whole: a partial view is never produced. Amounts are
/// exact smallest-unit integers; display formatting happens outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementView {
    pub landlord: Address,
    pub renter: Address,
    pub content_hash: String,
    #[serde(with = "u256_dec")]
    pub rent_amount: U256,
    #[serde(with = "u256_dec")]
    pub deposit_amount: U256,
    pub duration_days: u64,
    pub is_active: bool,
    pub is_terminated: bool,
}
