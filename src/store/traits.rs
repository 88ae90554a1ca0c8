use async_trait::async_trait;
use ethers::types::Address;
use uuid::Uuid;

use crate::domain::{Listing, ListingStatus};
use crate::error::Result;

/// Off-chain projection of listings. A cache/read-model, never authoritative
/// for chain state.
///
/// Readers are unrestricted. Writers are the coordinator (confirmed
/// outcomes) and the reconciliation pass, both of which hold the per-listing
/// in-flight marker before writing.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Persist a new listing. Fails on id collision.
    async fn insert(&self, listing: Listing) -> Result<Listing>;

    async fn get(&self, id: Uuid) -> Result<Option<Listing>>;

    async fn list(&self) -> Result<Vec<Listing>>;

    async fn list_by_owner(&self, owner: Address) -> Result<Vec<Listing>>;

    /// Reconciliation candidates: non-Terminated listings with a contract
    /// address, flagged ones first.
    async fn list_reconcilable(&self) -> Result<Vec<Listing>>;

    /// Write a new status. Terminated is a one-way gate: any move out of it
    /// is rejected. Forward legality of other moves is the coordinator's
    /// responsibility (reconciliation corrections follow chain truth).
    async fn update_status(&self, id: Uuid, status: ListingStatus) -> Result<Listing>;

    async fn set_needs_reconciliation(&self, id: Uuid, needs: bool) -> Result<()>;

    /// Record the outcome of a reconciliation pass: observed chain flags,
    /// timestamp, and flag clear.
    async fn record_reconciliation(&self, id: Uuid, active: bool, terminated: bool)
        -> Result<Listing>;
}
