use axum::extract::{Path, State};
use axum::Json;
use ethers::types::Address;

use crate::api::state::AppState;
use crate::api::types::{AgreementStatusResponse, ApiError};
use crate::domain::AgreementView;
use crate::error::RentchainError;

fn parse_contract(raw: &str) -> Result<Address, RentchainError> {
    raw.parse()
        .map_err(|_| RentchainError::Validation(format!("invalid contract address '{}'", raw)))
}

/// GET /api/agreements/:address (live aggregated view)
pub async fn get_agreement(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<AgreementView>, ApiError> {
    let contract = parse_contract(&address)?;
    Ok(Json(state.aggregator.fetch_agreement_view(contract).await?))
}

/// GET /api/agreements/:address/status
pub async fn get_agreement_status(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<AgreementStatusResponse>, ApiError> {
    let contract = parse_contract(&address)?;
    let view = state.aggregator.fetch_agreement_view(contract).await?;
    Ok(Json(AgreementStatusResponse {
        is_active: view.is_active,
        is_terminated: view.is_terminated,
    }))
}
