//! In-memory listing store, used by tests and storeless deployments.

use async_trait::async_trait;
use chrono::Utc;
use ethers::types::Address;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Listing, ListingStatus};
use crate::error::{RentchainError, Result};
use crate::store::traits::ListingStore;

#[derive(Default)]
pub struct MemoryStore {
    listings: RwLock<HashMap<Uuid, Listing>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(id: Uuid) -> RentchainError {
    RentchainError::NotFound(format!("listing {}", id))
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn insert(&self, listing: Listing) -> Result<Listing> {
        let mut listings = self.listings.write().await;
        if listings.contains_key(&listing.id) {
            return Err(RentchainError::Internal(format!(
                "listing {} already exists",
                listing.id
            )));
        }
        listings.insert(listing.id, listing.clone());
        Ok(listing)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Listing>> {
        Ok(self.listings.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Listing>> {
        let mut all: Vec<_> = self.listings.read().await.values().cloned().collect();
        all.sort_by_key(|l| l.created_at);
        Ok(all)
    }

    async fn list_by_owner(&self, owner: Address) -> Result<Vec<Listing>> {
        let mut owned: Vec<_> = self
            .listings
            .read()
            .await
            .values()
            .filter(|l| l.owner == owner)
            .cloned()
            .collect();
        owned.sort_by_key(|l| l.created_at);
        Ok(owned)
    }

    async fn list_reconcilable(&self) -> Result<Vec<Listing>> {
        let mut candidates: Vec<_> = self
            .listings
            .read()
            .await
            .values()
            .filter(|l| !l.status.is_terminal() && l.contract_address.is_some())
            .cloned()
            .collect();
        // flagged listings first, then oldest reconciliation first
        candidates.sort_by_key(|l| (!l.needs_reconciliation, l.last_reconciled_at));
        Ok(candidates)
    }

    async fn update_status(&self, id: Uuid, status: ListingStatus) -> Result<Listing> {
        let mut listings = self.listings.write().await;
        let listing = listings.get_mut(&id).ok_or_else(|| not_found(id))?;
        if listing.status.is_terminal() && status != listing.status {
            return Err(RentchainError::InvalidStateTransition {
                from: listing.status.to_string(),
                to: status.to_string(),
            });
        }
        listing.status = status;
        listing.updated_at = Utc::now();
        Ok(listing.clone())
    }

    async fn set_needs_reconciliation(&self, id: Uuid, needs: bool) -> Result<()> {
        let mut listings = self.listings.write().await;
        let listing = listings.get_mut(&id).ok_or_else(|| not_found(id))?;
        listing.needs_reconciliation = needs;
        listing.updated_at = Utc::now();
        Ok(())
    }

    async fn record_reconciliation(
        &self,
        id: Uuid,
        active: bool,
        terminated: bool,
    ) -> Result<Listing> {
        let mut listings = self.listings.write().await;
        let listing = listings.get_mut(&id).ok_or_else(|| not_found(id))?;
        listing.last_known_chain_active = Some(active);
        listing.last_known_chain_terminated = Some(terminated);
        listing.last_reconciled_at = Some(Utc::now());
        listing.needs_reconciliation = false;
        listing.updated_at = Utc::now();
        Ok(listing.clone())
    }
}
