//! Exact smallest-unit amounts.
//!
//! Rent and deposit are wei-denominated `U256` values end to end. They enter
//! the system as decimal strings, are summed with checked integer arithmetic,
//! and leave as decimal strings. No floating point anywhere on this path.

use crate::error::{RentchainError, Result};
use ethers::types::U256;

/// Parse a smallest-unit decimal string into a U256 amount.
pub fn parse_amount(raw: &str) -> Result<U256> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RentchainError::Validation("amount must not be empty".into()));
    }
    U256::from_dec_str(trimmed)
        .map_err(|e| RentchainError::Validation(format!("invalid amount '{}': {}", trimmed, e)))
}

/// The payable value of an activation: rent + deposit, exact integer sum.
pub fn activation_value(rent: U256, deposit: U256) -> Result<U256> {
    rent.checked_add(deposit)
        .ok_or_else(|| RentchainError::Validation("rent + deposit overflows U256".into()))
}

/// Serde adapter serializing U256 as a decimal string (and back).
pub mod u256_dec {
    use ethers::types::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        U256::from_dec_str(raw.trim()).map_err(serde::de::Error::custom)
    }
}
