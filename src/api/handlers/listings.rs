use axum::extract::{Path, State};
use axum::Json;
use ethers::types::Address;
use uuid::Uuid;

use crate::api::state::AppState;
use crate::api::types::{ApiError, CreateListingRequest};
use crate::coordinator::{DeployRequest, ReconcileReport};
use crate::domain::Listing;
use crate::error::RentchainError;

/// GET /api/listings
pub async fn list_listings(
    State(state): State<AppState>,
) -> Result<Json<Vec<Listing>>, ApiError> {
    Ok(Json(state.store.list().await?))
}

/// GET /api/listings/:id
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Listing>, ApiError> {
    let listing = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| RentchainError::NotFound(format!("listing {}", id)))?;
    Ok(Json(listing))
}

/// GET /api/listings/by-owner/:owner
pub async fn listings_by_owner(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<Vec<Listing>>, ApiError> {
    let owner: Address = owner
        .parse()
        .map_err(|_| RentchainError::Validation(format!("invalid owner address '{}'", owner)))?;
    Ok(Json(state.store.list_by_owner(owner).await?))
}

/// POST /api/listings (deploy a fresh agreement contract)
pub async fn create_listing(
    State(state): State<AppState>,
    Json(request): Json<CreateListingRequest>,
) -> Result<Json<Listing>, ApiError> {
    let listing = state
        .coordinator
        .deploy(DeployRequest {
            title: request.title,
            description: request.description,
            owner: request.owner,
            renter: request.renter,
            content_hash: request.content_hash,
            rent_amount: request.rent_amount,
            deposit_amount: request.deposit_amount,
            duration_days: request.duration_days,
            image_url: request.image_url,
        })
        .await?;
    Ok(Json(listing))
}

/// POST /api/listings/:id/activate
pub async fn activate_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Listing>, ApiError> {
    Ok(Json(state.coordinator.activate(id).await?))
}

/// POST /api/listings/:id/terminate
pub async fn terminate_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Listing>, ApiError> {
    Ok(Json(state.coordinator.terminate(id).await?))
}

/// POST /api/listings/:id/reconcile (operator-triggered)
pub async fn reconcile_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReconcileReport>, ApiError> {
    Ok(Json(state.coordinator.reconcile(id).await?))
}
