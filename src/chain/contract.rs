//! Agreement contract surface.
//!
//! The contract is a black box with a fixed method surface; the bindings
//! below cover exactly that surface. Deploys additionally need the compiled
//! bytecode, loaded from the Hardhat artifact named in the configuration.

use ethers::abi::{Abi, Token};
use ethers::contract::abigen;
use ethers::types::{Bytes, U256};
use serde_json::Value;
use std::path::Path;

use crate::chain::traits::DeployParams;
use crate::error::{RentchainError, Result};

abigen!(
    RentalAgreement,
    r#"[
        function landlord() external view returns (address)
        function renter() external view returns (address)
        function propertyIPFSHash() external view returns (string)
        function rentAmount() external view returns (uint256)
        function depositAmount() external view returns (uint256)
        function rentalDuration() external view returns (uint256)
        function isActive() external view returns (bool)
        function isTerminated() external view returns (bool)
        function activateAgreement() external payable
        function terminateAgreement() external
    ]"#
);

/// Compiled contract artifact: ABI plus creation bytecode.
#[derive(Debug, Clone)]
pub struct AgreementArtifact {
    abi: Abi,
    bytecode: Bytes,
}

impl AgreementArtifact {
    /// Load a Hardhat-style artifact JSON (`{ "abi": [...], "bytecode": "0x..." }`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let value: Value = serde_json::from_str(&raw)?;

        let abi: Abi = serde_json::from_value(
            value
                .get("abi")
                .cloned()
                .ok_or_else(|| RentchainError::Validation("artifact has no 'abi' field".into()))?,
        )?;

        // Hardhat emits a flat hex string; solc standard JSON nests it under "object".
        let bytecode_field = value
            .get("bytecode")
            .ok_or_else(|| RentchainError::Validation("artifact has no 'bytecode' field".into()))?;
        let bytecode_hex = match bytecode_field {
            Value::String(s) => s.clone(),
            Value::Object(obj) => obj
                .get("object")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    RentchainError::Validation("artifact bytecode object has no 'object'".into())
                })?,
            _ => {
                return Err(RentchainError::Validation(
                    "artifact bytecode is neither string nor object".into(),
                ))
            }
        };

        let bytecode = hex::decode(bytecode_hex.trim_start_matches("0x"))
            .map(Bytes::from)
            .map_err(|e| RentchainError::Validation(format!("invalid artifact bytecode: {}", e)))?;

        if bytecode.is_empty() {
            return Err(RentchainError::Validation(
                "artifact bytecode is empty; compile the contract first".into(),
            ));
        }

        Ok(Self { abi, bytecode })
    }

    #[cfg(test)]
    pub fn from_parts(abi: Abi, bytecode: Bytes) -> Self {
        Self { abi, bytecode }
    }

    /// Creation transaction data: bytecode plus ABI-encoded constructor args.
    pub fn deploy_data(&self, params: &DeployParams) -> Result<Bytes> {
        let tokens = [
            Token::Address(params.renter),
            Token::String(params.content_hash.clone()),
            Token::Uint(params.rent_amount),
            Token::Uint(params.deposit_amount),
            Token::Uint(U256::from(params.duration_days)),
        ];

        let constructor = self.abi.constructor().ok_or_else(|| {
            RentchainError::Validation("artifact ABI declares no constructor".into())
        })?;

        constructor
            .encode_input(self.bytecode.to_vec(), &tokens)
            .map(Bytes::from)
            .map_err(|e| RentchainError::Validation(format!("constructor encoding failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;

    fn test_abi() -> Abi {
        serde_json::from_str(
            r#"[{
                "type": "constructor",
                "stateMutability": "nonpayable",
                "inputs": [
                    {"name": "_renter", "type": "address"},
                    {"name": "_propertyIPFSHash", "type": "string"},
                    {"name": "_rentAmount", "type": "uint256"},
                    {"name": "_depositAmount", "type": "uint256"},
                    {"name": "_rentalDuration", "type": "uint256"}
                ]
            }]"#,
        )
        .unwrap()
    }

    fn params() -> DeployParams {
        DeployParams {
            renter: Address::repeat_byte(0x22),
            content_hash: "QmHash".into(),
            rent_amount: U256::from(500u64),
            deposit_amount: U256::from(1000u64),
            duration_days: 30,
        }
    }

    #[test]
    fn deploy_data_prefixes_bytecode() {
        let artifact = AgreementArtifact::from_parts(test_abi(), Bytes::from(vec![0x60, 0x80]));
        let data = artifact.deploy_data(&params()).unwrap();
        assert!(data.len() > 2);
        assert_eq!(&data[..2], &[0x60, 0x80]);
    }

    #[test]
    fn deploy_data_requires_constructor() {
        let empty_abi: Abi = serde_json::from_str("[]").unwrap();
        let artifact = AgreementArtifact::from_parts(empty_abi, Bytes::from(vec![0x60]));
        assert!(artifact.deploy_data(&params()).is_err());
    }
}
