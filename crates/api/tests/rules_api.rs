//! Integration tests for `/api/v1/rules`.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_empty, put_json};
use serde_json::json;

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_rules_returns_seeded_defaults_in_category_order() {
    let app = common::build_test_app().await;
    let response = get(app, "/api/v1/rules").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let rules = json["data"].as_array().unwrap();
    assert_eq!(rules.len(), 8);
    assert!(rules.iter().all(|r| r["enabled"] == true));

    let categories: Vec<&str> = rules.iter().map(|r| r["category"].as_str().unwrap()).collect();
    let mut order = categories.clone();
    order.dedup();
    assert_eq!(
        order,
        vec!["general_ledger", "contract_terms", "item_matching"]
    );
}

#[tokio::test]
async fn list_rules_filters_by_category() {
    let app = common::build_test_app().await;
    let response = get(app, "/api/v1/rules?category=item_matching").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let rules = json["data"].as_array().unwrap();
    assert_eq!(rules.len(), 2);
    assert!(rules.iter().all(|r| r["category"] == "item_matching"));
}

#[tokio::test]
async fn unknown_category_is_bad_request() {
    let app = common::build_test_app().await;
    let response = get(app, "/api/v1/rules?category=tax").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn get_rule_by_id() {
    let app = common::build_test_app().await;
    let response = get(app, "/api/v1/rules/gl-001").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["id"], "gl-001");
    assert_eq!(json["data"]["category"], "general_ledger");
    assert_eq!(json["data"]["severity"], "error");
}

#[tokio::test]
async fn get_unknown_rule_is_404() {
    let app = common::build_test_app().await;
    let response = get(app, "/api/v1/rules/zz-999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "ValidationRule with id zz-999 not found");
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn set_enabled_then_read_back() {
    let state = common::test_state().await;

    let response = put_json(
        common::build_app(state.clone()),
        "/api/v1/rules/gl-002/enabled",
        json!({ "enabled": false }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["enabled"], false);

    let response = get(common::build_app(state), "/api/v1/rules/gl-002").await;
    assert_eq!(body_json(response).await["data"]["enabled"], false);
}

#[tokio::test]
async fn set_enabled_requires_boolean() {
    let app = common::build_test_app().await;
    let response = put_json(app, "/api/v1/rules/gl-002/enabled", json!({ "enabled": "no" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn toggle_flips_twice_back_to_enabled() {
    let state = common::test_state().await;

    let first = post_empty(common::build_app(state.clone()), "/api/v1/rules/im-002/toggle").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(body_json(first).await["data"]["enabled"], false);

    let second = post_empty(common::build_app(state), "/api/v1/rules/im-002/toggle").await;
    assert_eq!(body_json(second).await["data"]["enabled"], true);
}

#[tokio::test]
async fn toggle_unknown_rule_is_404() {
    let app = common::build_test_app().await;
    let response = post_empty(app, "/api/v1/rules/zz-999/toggle").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_rule_edits_metadata_only() {
    let app = common::build_test_app().await;
    let response = put_json(
        app,
        "/api/v1/rules/ct-003",
        json!({ "name": "Contract Term Window", "severity": "error" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let rule = &body["data"];
    assert_eq!(rule["name"], "Contract Term Window");
    assert_eq!(rule["severity"], "error");
    assert_eq!(rule["category"], "contract_terms");
    assert_eq!(rule["enabled"], true);
}

#[tokio::test]
async fn update_rule_rejects_empty_name() {
    let app = common::build_test_app().await;
    let response = put_json(app, "/api/v1/rules/ct-003", json!({ "name": "" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rule_change_publishes_event_with_actor() {
    let state = common::test_state().await;
    let mut events = state.event_bus.subscribe();

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/v1/rules/gl-001/toggle")
        .header("x-actor-id", "analyst-7")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = common::send(common::build_app(state), request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let event = events.recv().await.unwrap();
    assert_eq!(event.event_type, "rule.updated");
    assert_eq!(event.source_entity_id.as_deref(), Some("gl-001"));
    assert_eq!(event.actor.as_deref(), Some("analyst-7"));
    assert_eq!(event.payload["enabled"], false);
}
