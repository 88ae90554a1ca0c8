use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::domain::amount::u256_dec;
use crate::error::RentchainError;

/// Deploy request payload: one listing backed by a fresh contract instance.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateListingRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub owner: Address,
    pub renter: Address,
    pub content_hash: String,
    /// Smallest-unit decimal string
    #[serde(with = "u256_dec")]
    pub rent_amount: U256,
    /// Smallest-unit decimal string
    #[serde(with = "u256_dec")]
    pub deposit_amount: U256,
    pub duration_days: u64,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Quick status projection of one agreement, derived from the full
/// aggregated view (never from partial reads).
#[derive(Debug, Clone, Serialize)]
pub struct AgreementStatusResponse {
    pub is_active: bool,
    pub is_terminated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: i64,
    pub queue_halted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResyncResponse {
    pub next_nonce: u64,
}

/// Structured failure body: stable kind plus human-readable detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub detail: String,
}

/// Error wrapper translating the failure taxonomy into HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub RentchainError);

impl From<RentchainError> for ApiError {
    fn from(err: RentchainError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0.kind() {
            "validation" | "serialization" => StatusCode::BAD_REQUEST,
            "not_found" => StatusCode::NOT_FOUND,
            "invalid_state_transition" | "chain_rejected" => StatusCode::CONFLICT,
            "confirmation_timeout" => StatusCode::GATEWAY_TIMEOUT,
            "chain_unavailable" | "aggregation_failure" => StatusCode::BAD_GATEWAY,
            "queue_halted" | "nonce_desync" | "signer_failure" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            kind: self.0.kind().to_string(),
            detail: self.0.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
