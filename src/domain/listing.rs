use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::amount::u256_dec;

/// Off-chain projection status of a listing.
///
/// Transitions are strictly monotonic:
/// Draft -> Available -> Occupied -> Terminated, with Occupied skippable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Created, no contract deployed yet
    Draft,
    /// Contract deployed, agreement not active
    Available,
    /// Agreement activated by the renter payment
    Occupied,
    /// Agreement terminated; terminal forever
    Terminated,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::Terminated => "terminated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// Whether moving to `next` is a legal forward transition.
    pub fn can_transition_to(&self, next: ListingStatus) -> bool {
        use ListingStatus::*;
        matches!(
            (self, next),
            (Draft, Available)
                | (Available, Occupied)
                | (Available, Terminated)
                | (Occupied, Terminated)
        )
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "available" => Ok(Self::Available),
            "occupied" => Ok(Self::Occupied),
            "terminated" => Ok(Self::Terminated),
            _ => Err("invalid status; expected draft|available|occupied|terminated"),
        }
    }
}

/// A rental listing: the off-chain projection of one agreement contract.
///
/// Never authoritative for chain state. `status` reflects the last confirmed
/// chain observation; reconciliation corrects it when they diverge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub owner: Address,
    pub renter: Address,
    /// Opaque reference to the listing media/metadata (IPFS CID)
    pub content_hash: String,
    #[serde(with = "u256_dec")]
    pub rent_amount: U256,
    #[serde(with = "u256_dec")]
    pub deposit_amount: U256,
    pub duration_days: u64,
    /// Set exactly once, by a confirmed deploy
    pub contract_address: Option<Address>,
    pub status: ListingStatus,
    pub image_url: Option<String>,
    /// Set after a ConfirmationTimeout; cleared by a successful reconcile
    pub needs_reconciliation: bool,
    pub last_reconciled_at: Option<DateTime<Utc>>,
    pub last_known_chain_active: Option<bool>,
    pub last_known_chain_terminated: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Construct a fresh Draft. No contract address, nothing persisted yet.
    #[allow(clippy::too_many_arguments)]
    pub fn draft(
        title: String,
        description: String,
        owner: Address,
        renter: Address,
        content_hash: String,
        rent_amount: U256,
        deposit_amount: U256,
        duration_days: u64,
        image_url: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            owner,
            renter,
            content_hash,
            rent_amount,
            deposit_amount,
            duration_days,
            contract_address: None,
            status: ListingStatus::Draft,
            image_url,
            needs_reconciliation: false,
            last_reconciled_at: None,
            last_known_chain_active: None,
            last_known_chain_terminated: None,
            created_at: now,
            updated_at: now,
        }
    }
}
