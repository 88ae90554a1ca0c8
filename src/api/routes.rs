use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Listing endpoints
        .route("/api/listings", get(handlers::list_listings))
        .route("/api/listings", post(handlers::create_listing))
        .route("/api/listings/by-owner/:owner", get(handlers::listings_by_owner))
        .route("/api/listings/:id", get(handlers::get_listing))
        .route("/api/listings/:id/activate", post(handlers::activate_listing))
        .route("/api/listings/:id/terminate", post(handlers::terminate_listing))
        .route("/api/listings/:id/reconcile", post(handlers::reconcile_listing))
        // Agreement endpoints
        .route("/api/agreements/:address", get(handlers::get_agreement))
        .route(
            "/api/agreements/:address/status",
            get(handlers::get_agreement_status),
        )
        // System endpoints
        .route("/api/system/health", get(handlers::get_health))
        .route("/api/system/queue", get(handlers::get_queue_status))
        .route("/api/system/resync", post(handlers::resync_nonce))
        // Add state and CORS
        .with_state(state)
        .layer(cors)
}
