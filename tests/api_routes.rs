//! HTTP surface tests: routes, payload shapes, and the structured error body.

mod support;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use rentchain::api::{create_router, AppState};
use support::{test_rig, TestRig};

fn test_app(rig: &TestRig) -> Router {
    let ledger_dyn: std::sync::Arc<dyn rentchain::chain::LedgerClient> = rig.ledger.clone();
    let aggregator = std::sync::Arc::new(rentchain::chain::ReadAggregator::new(ledger_dyn));
    create_router(AppState::new(
        rig.store.clone(),
        rig.coordinator.clone(),
        aggregator,
        rig.queue.clone(),
    ))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn create_payload() -> Value {
    json!({
        "title": "Harbor loft",
        "description": "Two rooms, third floor",
        "owner": "0x1111111111111111111111111111111111111111",
        "renter": "0x2222222222222222222222222222222222222222",
        "content_hash": "QmListingHash",
        "rent_amount": "500000000000000000",
        "deposit_amount": "1000000000000000000",
        "duration_days": 30
    })
}

fn post(uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn listings_start_empty() {
    let rig = test_rig();
    let app = test_app(&rig);

    let response = app.oneshot(get("/api/listings")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn deploy_activate_and_read_through_the_api() {
    let rig = test_rig();
    let app = test_app(&rig);

    // deploy
    let response = app
        .clone()
        .oneshot(post("/api/listings", &create_payload()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_json(response).await;
    assert_eq!(listing["status"], "available");
    let id = listing["id"].as_str().unwrap().to_string();
    let contract = listing["contract_address"].as_str().unwrap().to_string();

    // read back by id and by owner
    let response = app
        .clone()
        .oneshot(get(&format!("/api/listings/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get(
            "/api/listings/by-owner/0x1111111111111111111111111111111111111111",
        ))
        .await
        .unwrap();
    let owned = body_json(response).await;
    assert_eq!(owned.as_array().unwrap().len(), 1);

    // live agreement view, amounts as exact decimal strings
    let response = app
        .clone()
        .oneshot(get(&format!("/api/agreements/{}", contract)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let view = body_json(response).await;
    assert_eq!(view["rent_amount"], "500000000000000000");
    assert_eq!(view["is_active"], false);

    // activate
    let response = app
        .clone()
        .oneshot(post(&format!("/api/listings/{}/activate", id), &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_json(response).await;
    assert_eq!(listing["status"], "occupied");

    let response = app
        .clone()
        .oneshot(get(&format!("/api/agreements/{}/status", contract)))
        .await
        .unwrap();
    let status = body_json(response).await;
    assert_eq!(status["is_active"], true);
    assert_eq!(status["is_terminated"], false);
}

#[tokio::test]
async fn illegal_transition_returns_structured_conflict() {
    let rig = test_rig();
    let app = test_app(&rig);

    let response = app
        .clone()
        .oneshot(post("/api/listings", &create_payload()))
        .await
        .unwrap();
    let listing = body_json(response).await;
    let id = listing["id"].as_str().unwrap().to_string();

    // terminate, then try to activate the terminated listing
    let response = app
        .clone()
        .oneshot(post(&format!("/api/listings/{}/terminate", id), &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post(&format!("/api/listings/{}/activate", id), &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error = body_json(response).await;
    assert_eq!(error["kind"], "invalid_state_transition");
    assert!(error["detail"].as_str().unwrap().contains("terminated"));
}

#[tokio::test]
async fn unknown_listing_is_404_and_bad_address_is_400() {
    let rig = test_rig();
    let app = test_app(&rig);

    let response = app
        .clone()
        .oneshot(get(
            "/api/listings/00000000-0000-0000-0000-000000000000",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(get("/api/listings/by-owner/not-an-address"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert_eq!(error["kind"], "validation");
}

#[tokio::test]
async fn system_endpoints_report_queue_state() {
    let rig = test_rig();
    let app = test_app(&rig);

    let response = app
        .clone()
        .oneshot(get("/api/system/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health = body_json(response).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["queue_halted"], false);

    let _ = app
        .clone()
        .oneshot(post("/api/listings", &create_payload()))
        .await
        .unwrap();

    let response = app.clone().oneshot(get("/api/system/queue")).await.unwrap();
    let queue = body_json(response).await;
    assert_eq!(queue["stats"]["submitted"], 1);
    assert_eq!(queue["stats"]["confirmed"], 1);
    assert_eq!(queue["pending"].as_array().unwrap().len(), 1);
}
