pub mod aggregator;
pub mod contract;
pub mod ethers_client;
pub mod signer;
pub mod traits;

pub use aggregator::ReadAggregator;
pub use contract::AgreementArtifact;
pub use ethers_client::EthersLedger;
pub use signer::ChainSigner;
pub use traits::{ChainCall, DeployParams, LedgerClient, TxInclusion};

#[cfg(test)]
pub use traits::MockLedgerClient;
