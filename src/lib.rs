pub mod api;
pub mod chain;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod queue;
pub mod services;
pub mod store;

pub use chain::{AgreementArtifact, ChainSigner, EthersLedger, LedgerClient, ReadAggregator};
pub use config::AppConfig;
pub use coordinator::{DeployRequest, LifecycleCoordinator, ReconcileReport};
pub use domain::{AgreementView, Listing, ListingStatus, PendingTransaction};
pub use error::{RentchainError, Result};
pub use queue::{BroadcastQueue, QueueStats, TxOutcome};
pub use services::ReconciliationSweep;
pub use store::{ListingStore, MemoryStore, PostgresStore};
