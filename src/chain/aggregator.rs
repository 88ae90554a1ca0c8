//! Read aggregator: assembles the authoritative on-chain view of an agreement.

use ethers::types::Address;
use std::sync::Arc;
use tracing::debug;

use crate::chain::traits::LedgerClient;
use crate::domain::AgreementView;
use crate::error::{RentchainError, Result};

/// Fetches every read-only accessor of an agreement concurrently and joins
/// the results. Any single read failure fails the whole aggregate: a partial
/// view would corrupt downstream reconciliation decisions.
pub struct ReadAggregator {
    ledger: Arc<dyn LedgerClient>,
}

impl ReadAggregator {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    pub async fn fetch_agreement_view(&self, contract: Address) -> Result<AgreementView> {
        let joined = futures::try_join!(
            self.ledger.landlord(contract),
            self.ledger.renter(contract),
            self.ledger.content_hash(contract),
            self.ledger.rent_amount(contract),
            self.ledger.deposit_amount(contract),
            self.ledger.duration_days(contract),
            self.ledger.is_active(contract),
            self.ledger.is_terminated(contract),
        );

        let (
            landlord,
            renter,
            content_hash,
            rent_amount,
            deposit_amount,
            duration_days,
            is_active,
            is_terminated,
        ) = joined.map_err(|e| {
            RentchainError::AggregationFailure(format!(
                "agreement {:?} view incomplete: {}",
                contract, e
            ))
        })?;

        debug!(
            "Aggregated view for {:?}: active={} terminated={}",
            contract, is_active, is_terminated
        );

        Ok(AgreementView {
            landlord,
            renter,
            content_hash,
            rent_amount,
            deposit_amount,
            duration_days,
            is_active,
            is_terminated,
        })
    }
}
