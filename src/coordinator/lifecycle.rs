//! Agreement Lifecycle Coordinator — orchestrates deploy/activate/terminate
//! against the broadcast queue and owns every Listing status transition.
//!
//! The store is written only from confirmed chain outcomes (and from
//! reconciliation, which follows chain truth). A failed operation leaves the
//! store exactly as it was.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ethers::types::{Address, U256};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chain::traits::{ChainCall, DeployParams};
use crate::chain::ReadAggregator;
use crate::domain::amount::activation_value;
use crate::domain::{Listing, ListingStatus};
use crate::error::{RentchainError, Result};
use crate::queue::{BroadcastQueue, TxOutcome};
use crate::store::ListingStore;

/// Parameters for creating a listing backed by a fresh contract instance.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub title: String,
    pub description: String,
    pub owner: Address,
    pub renter: Address,
    pub content_hash: String,
    pub rent_amount: U256,
    pub deposit_amount: U256,
    pub duration_days: u64,
    pub image_url: Option<String>,
}

/// A drift correction applied by reconciliation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DriftCorrection {
    pub from: ListingStatus,
    pub to: ListingStatus,
}

/// Outcome of one reconciliation pass over a listing.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub listing_id: Uuid,
    pub chain_active: bool,
    pub chain_terminated: bool,
    /// Set when the stored status disagreed with chain truth
    pub drift: Option<DriftCorrection>,
}

/// Removes the in-flight marker when the operation ends, success or not.
struct InflightGuard {
    markers: Arc<DashMap<Uuid, &'static str>>,
    id: Uuid,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.markers.remove(&self.id);
    }
}

pub struct LifecycleCoordinator {
    queue: Arc<BroadcastQueue>,
    store: Arc<dyn ListingStore>,
    aggregator: Arc<ReadAggregator>,
    confirmation_timeout: Duration,
    /// At most one in-flight mutating operation per listing, independent of
    /// the queue-level signer serialization.
    inflight: Arc<DashMap<Uuid, &'static str>>,
}

impl LifecycleCoordinator {
    pub fn new(
        queue: Arc<BroadcastQueue>,
        store: Arc<dyn ListingStore>,
        aggregator: Arc<ReadAggregator>,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            store,
            aggregator,
            confirmation_timeout,
            inflight: Arc::new(DashMap::new()),
        }
    }

    /// Claim the per-listing in-flight marker, or reject the operation.
    fn begin(
        &self,
        id: Uuid,
        label: &'static str,
        current: ListingStatus,
        target: ListingStatus,
    ) -> Result<InflightGuard> {
        match self.inflight.entry(id) {
            Entry::Occupied(occupied) => {
                warn!(
                    "Rejecting {} for listing {}: {} already in flight",
                    label,
                    id,
                    occupied.get()
                );
                Err(RentchainError::InvalidStateTransition {
                    from: current.to_string(),
                    to: target.to_string(),
                })
            }
            Entry::Vacant(vacant) => {
                vacant.insert(label);
                Ok(InflightGuard {
                    markers: self.inflight.clone(),
                    id,
                })
            }
        }
    }

    async fn fetch(&self, id: Uuid) -> Result<Listing> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| RentchainError::NotFound(format!("listing {}", id)))
    }

    /// Deploy a fresh agreement contract and persist the listing once the
    /// deploy confirms. Nothing is persisted for a failed attempt, so the
    /// caller can simply retry with the same parameters.
    pub async fn deploy(&self, request: DeployRequest) -> Result<Listing> {
        if request.content_hash.trim().is_empty() {
            return Err(RentchainError::Validation("content hash must not be empty".into()));
        }
        if request.duration_days == 0 {
            return Err(RentchainError::Validation("duration must be at least one day".into()));
        }

        let mut listing = Listing::draft(
            request.title,
            request.description,
            request.owner,
            request.renter,
            request.content_hash.clone(),
            request.rent_amount,
            request.deposit_amount,
            request.duration_days,
            request.image_url,
        );
        let _guard = self.begin(
            listing.id,
            "deploy",
            ListingStatus::Draft,
            ListingStatus::Available,
        )?;

        let handle = self
            .queue
            .enqueue(ChainCall::Deploy(DeployParams {
                renter: request.renter,
                content_hash: request.content_hash,
                rent_amount: request.rent_amount,
                deposit_amount: request.deposit_amount,
                duration_days: request.duration_days,
            }))
            .await?;

        match self
            .queue
            .await_outcome(handle, self.confirmation_timeout)
            .await?
        {
            TxOutcome::Confirmed(receipt) => {
                let contract = receipt.contract_address.ok_or_else(|| {
                    RentchainError::Internal("deploy receipt carries no contract address".into())
                })?;
                listing.contract_address = Some(contract);
                listing.status = ListingStatus::Available;
                listing.last_known_chain_active = Some(false);
                listing.last_known_chain_terminated = Some(false);
                info!(
                    "Deployed agreement {:?} for listing {}",
                    contract, listing.id
                );
                self.store.insert(listing).await
            }
            TxOutcome::Reverted(reason) => Err(RentchainError::ChainRejected(reason)),
            TxOutcome::TimedOut => {
                // The contract may still land later; the sweep picks it up
                // from the queue's retained deploy record.
                warn!(
                    "Deploy for listing {} not confirmed within {:?}; any late \
                     inclusion is flagged by the reconciliation sweep",
                    listing.id, self.confirmation_timeout
                );
                Err(RentchainError::ConfirmationTimeout {
                    elapsed_secs: self.confirmation_timeout.as_secs(),
                })
            }
        }
    }

    /// Activate a deployed agreement, paying rent + deposit.
    pub async fn activate(&self, listing_id: Uuid) -> Result<Listing> {
        let listing = self.fetch(listing_id).await?;
        let _guard = self.begin(
            listing_id,
            "activate",
            listing.status,
            ListingStatus::Occupied,
        )?;
        // Re-read under the marker: the first read raced other operations.
        let listing = self.fetch(listing_id).await?;

        if !listing.status.can_transition_to(ListingStatus::Occupied) {
            return Err(RentchainError::InvalidStateTransition {
                from: listing.status.to_string(),
                to: ListingStatus::Occupied.to_string(),
            });
        }
        let contract = listing.contract_address.ok_or_else(|| {
            RentchainError::Validation(format!("listing {} has no contract address", listing_id))
        })?;
        let value = activation_value(listing.rent_amount, listing.deposit_amount)?;

        let handle = self
            .queue
            .enqueue(ChainCall::Activate { contract, value })
            .await?;

        match self
            .queue
            .await_outcome(handle, self.confirmation_timeout)
            .await?
        {
            TxOutcome::Confirmed(_) => {
                info!(
                    "Activated agreement {:?} for listing {} (payment {})",
                    contract, listing_id, value
                );
                self.store
                    .update_status(listing_id, ListingStatus::Occupied)
                    .await
            }
            TxOutcome::Reverted(reason) => Err(RentchainError::ChainRejected(reason)),
            TxOutcome::TimedOut => {
                // The funds-bearing transaction may still land; flag the
                // listing so the sweep reconciles it against chain truth.
                self.store
                    .set_needs_reconciliation(listing_id, true)
                    .await?;
                Err(RentchainError::ConfirmationTimeout {
                    elapsed_secs: self.confirmation_timeout.as_secs(),
                })
            }
        }
    }

    /// Terminate an agreement. Terminated is a one-way gate.
    pub async fn terminate(&self, listing_id: Uuid) -> Result<Listing> {
        let listing = self.fetch(listing_id).await?;
        let _guard = self.begin(
            listing_id,
            "terminate",
            listing.status,
            ListingStatus::Terminated,
        )?;
        let listing = self.fetch(listing_id).await?;

        if !listing.status.can_transition_to(ListingStatus::Terminated) {
            return Err(RentchainError::InvalidStateTransition {
                from: listing.status.to_string(),
                to: ListingStatus::Terminated.to_string(),
            });
        }
        let contract = listing.contract_address.ok_or_else(|| {
            RentchainError::Validation(format!("listing {} has no contract address", listing_id))
        })?;

        let handle = self
            .queue
            .enqueue(ChainCall::Terminate { contract })
            .await?;

        match self
            .queue
            .await_outcome(handle, self.confirmation_timeout)
            .await?
        {
            TxOutcome::Confirmed(_) => {
                info!(
                    "Terminated agreement {:?} for listing {}",
                    contract, listing_id
                );
                self.store
                    .update_status(listing_id, ListingStatus::Terminated)
                    .await
            }
            TxOutcome::Reverted(reason) => Err(RentchainError::ChainRejected(reason)),
            TxOutcome::TimedOut => {
                self.store
                    .set_needs_reconciliation(listing_id, true)
                    .await?;
                Err(RentchainError::ConfirmationTimeout {
                    elapsed_secs: self.confirmation_timeout.as_secs(),
                })
            }
        }
    }

    /// Compare the stored projection against chain truth and correct the
    /// store when they diverge. Chain state is always authoritative.
    pub async fn reconcile(&self, listing_id: Uuid) -> Result<ReconcileReport> {
        let listing = self.fetch(listing_id).await?;
        let contract = listing.contract_address.ok_or_else(|| {
            RentchainError::Validation(format!("listing {} has no contract address", listing_id))
        })?;
        let _guard = self.begin(listing_id, "reconcile", listing.status, listing.status)?;
        let listing = self.fetch(listing_id).await?;

        let view = self.aggregator.fetch_agreement_view(contract).await?;
        let expected = if view.is_terminated {
            ListingStatus::Terminated
        } else if view.is_active {
            ListingStatus::Occupied
        } else {
            ListingStatus::Available
        };

        let drift = if listing.status != expected {
            warn!(
                "Drift detected for listing {}: stored {}, chain says {}; correcting",
                listing_id, listing.status, expected
            );
            self.store.update_status(listing_id, expected).await?;
            Some(DriftCorrection {
                from: listing.status,
                to: expected,
            })
        } else {
            None
        };

        self.store
            .record_reconciliation(listing_id, view.is_active, view.is_terminated)
            .await?;

        Ok(ReconcileReport {
            listing_id,
            chain_active: view.is_active,
            chain_terminated: view.is_terminated,
            drift,
        })
    }
}
