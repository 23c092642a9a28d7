//! Integration tests for `/api/v1/calculations`.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{body_json, get, post_json, post_json_as, put_json};
use rebate_core::contract::ContractTerms;
use rebate_core::service::Backends;
use rebate_core::source::{ItemMatchStats, ReconciliationSource, SourceError};
use rebate_core::types::Amount;
use rust_decimal::Decimal;
use serde_json::{json, Value};

fn amount(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

// ---------------------------------------------------------------------------
// Listing and lookup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_returns_page_envelope() {
    let app = common::build_test_app().await;
    let response = get(app, "/api/v1/calculations").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let page = &body["data"];
    assert_eq!(page["total"], 3);
    assert_eq!(page["page"], 1);
    assert_eq!(page["total_pages"], 1);
    let ids: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["calc-001", "calc-002", "calc-003"]);
}

#[tokio::test]
async fn list_filters_are_and_combined() {
    let app = common::build_test_app().await;
    let response = get(app, "/api/v1/calculations?status=calculated&contract_id=contract-B").await;
    let body = body_json(response).await;
    let page = &body["data"];
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], "calc-002");
}

#[tokio::test]
async fn list_paginates_with_limit() {
    let app = common::build_test_app().await;
    let response = get(app, "/api/v1/calculations?page=2&limit=2").await;
    let body = body_json(response).await;
    let page = &body["data"];
    assert_eq!(page["total"], 3);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert_eq!(page["items"][0]["id"], "calc-003");
}

#[tokio::test]
async fn list_rejects_unknown_status() {
    let app = common::build_test_app().await;
    let response = get(app, "/api/v1/calculations?status=refunded").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_calculation_includes_derived_variance() {
    let app = common::build_test_app().await;
    let response = get(app, "/api/v1/calculations/calc-001").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let calc = &body["data"];
    assert_eq!(amount(&calc["expected_amount"]), Decimal::from(135_000));
    assert_eq!(amount(&calc["actual_amount"]), Decimal::from(132_000));
    assert_eq!(amount(&calc["variance"]), Decimal::from(-3_000));
    assert_eq!(calc["status"], "calculated");
}

#[tokio::test]
async fn variance_is_null_without_actual() {
    let app = common::build_test_app().await;
    let response = get(app, "/api/v1/calculations/calc-003").await;
    let body = body_json(response).await;
    let calc = &body["data"];
    assert!(calc["actual_amount"].is_null());
    assert!(calc["variance"].is_null());
}

#[tokio::test]
async fn get_unknown_calculation_is_404() {
    let app = common::build_test_app().await;
    let response = get(app, "/api/v1/calculations/calc-404").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_computes_expected_amount_and_publishes_event() {
    let state = common::test_state().await;
    let mut events = state.event_bus.subscribe();

    let response = post_json_as(
        common::build_app(state),
        "/api/v1/calculations",
        json!({ "contract_id": "contract-A", "period": "Q1 2025" }),
        "analyst-2",
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    let calc = &body["data"];
    assert_eq!(calc["status"], "calculated");
    assert_eq!(amount(&calc["expected_amount"]), Decimal::from(135_000));
    assert!(calc["variance"].is_null());

    let event = events.recv().await.unwrap();
    assert_eq!(event.event_type, "calculation.created");
    assert_eq!(event.actor.as_deref(), Some("analyst-2"));
    assert_eq!(event.source_entity_id.as_deref(), calc["id"].as_str());
}

#[tokio::test]
async fn create_duplicate_contract_period_is_rejected() {
    let state = common::test_state().await;
    let body = json!({ "contract_id": "contract-A", "period": "Q1 2025" });

    let first = post_json(
        common::build_app(state.clone()),
        "/api/v1/calculations",
        body.clone(),
    )
    .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = post_json(common::build_app(state), "/api/v1/calculations", body).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(second).await["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn create_for_unknown_contract_is_rejected() {
    let app = common::build_test_app().await;
    let response = post_json(
        app,
        "/api/v1/calculations",
        json!({ "contract_id": "contract-Z", "period": "Q1 2025" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Every lookup fails as if the upstream connection were down.
struct UnreachableSource;

#[async_trait]
impl ReconciliationSource for UnreachableSource {
    async fn contract_terms(&self, _: &str) -> Result<ContractTerms, SourceError> {
        Err(SourceError::Unavailable("upstream 10.0.0.5 refused".into()))
    }

    async fn purchase_volume(&self, _: &str, _: &str) -> Result<Amount, SourceError> {
        Err(SourceError::Unavailable("upstream 10.0.0.5 refused".into()))
    }

    async fn ledger_accrual(&self, _: &str, _: &str) -> Result<Amount, SourceError> {
        Err(SourceError::Unavailable("upstream 10.0.0.5 refused".into()))
    }

    async fn item_match_stats(&self, _: &str, _: &str) -> Result<ItemMatchStats, SourceError> {
        Err(SourceError::Unavailable("upstream 10.0.0.5 refused".into()))
    }
}

#[tokio::test]
async fn create_with_unreachable_source_is_sanitized_500() {
    let backends = Backends {
        source: Arc::new(UnreachableSource),
        ..Backends::in_memory_demo()
    };
    let app = common::build_app(common::test_state_with(backends).await);
    let response = post_json(
        app,
        "/api/v1/calculations",
        json!({ "contract_id": "contract-A", "period": "Q1 2025" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["code"], "INTERNAL_ERROR");
    assert_eq!(body["error"], "An internal error occurred");
    assert_eq!(body["retryable"], false);
    assert!(!body.to_string().contains("10.0.0.5"));
}

#[tokio::test]
async fn create_requires_fields() {
    let app = common::build_test_app().await;
    let response = post_json(
        app,
        "/api/v1/calculations",
        json!({ "contract_id": "", "period": "Q1 2025" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

// ---------------------------------------------------------------------------
// Status and actual amount
// ---------------------------------------------------------------------------

#[tokio::test]
async fn paid_transition_stamps_paid_at() {
    let app = common::build_test_app().await;
    let response = put_json(
        app,
        "/api/v1/calculations/calc-002/status",
        json!({ "status": "paid" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let calc = &body["data"];
    assert_eq!(calc["status"], "paid");
    assert!(calc["paid_at"].is_string());
}

#[tokio::test]
async fn illegal_transition_is_409() {
    let app = common::build_test_app().await;
    let response = put_json(
        app,
        "/api/v1/calculations/calc-003/status",
        json!({ "status": "paid" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_TRANSITION");
    assert_eq!(json["retryable"], false);
}

#[tokio::test]
async fn terminal_status_cannot_change() {
    let state = common::test_state().await;
    let cancel = put_json(
        common::build_app(state.clone()),
        "/api/v1/calculations/calc-003/status",
        json!({ "status": "cancelled" }),
    )
    .await;
    assert_eq!(cancel.status(), StatusCode::OK);

    let reopen = put_json(
        common::build_app(state),
        "/api/v1/calculations/calc-003/status",
        json!({ "status": "calculated" }),
    )
    .await;
    assert_eq!(reopen.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn record_actual_updates_variance() {
    let app = common::build_test_app().await;
    let response = put_json(
        app,
        "/api/v1/calculations/calc-002/actual",
        json!({ "actual_amount": "27500.50" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let calc = &body["data"];
    assert_eq!(amount(&calc["actual_amount"]), "27500.50".parse::<Decimal>().unwrap());
    assert_eq!(amount(&calc["variance"]), "-499.50".parse::<Decimal>().unwrap());
}

#[tokio::test]
async fn record_actual_rejects_non_numeric() {
    let app = common::build_test_app().await;
    let response = put_json(
        app,
        "/api/v1/calculations/calc-002/actual",
        json!({ "actual_amount": "lots" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
