//! Handlers for the validation rule registry.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use rebate_core::rules::{RuleCategory, RuleEdit, RuleSeverity, ValidationRule};
use rebate_events::{event_types, PlatformEvent};
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::actor::Actor;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ListRulesParams {
    pub category: Option<RuleCategory>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRuleRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    pub severity: Option<RuleSeverity>,
}

fn publish_rule_updated(state: &AppState, actor: &Actor, rule: &ValidationRule) {
    state.event_bus.publish(
        PlatformEvent::new(event_types::RULE_UPDATED)
            .with_source("validation_rule", rule.id.clone())
            .with_actor(actor.as_str())
            .with_payload(serde_json::json!({
                "name": rule.name,
                "category": rule.category,
                "severity": rule.severity,
                "enabled": rule.enabled,
            })),
    );
}

/// GET /api/v1/rules
///
/// All rules, enabled and disabled, in category-then-name order.
/// `?category=` narrows to one category.
pub async fn list_rules(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListRulesParams>,
) -> AppResult<impl IntoResponse> {
    let rules = match params.category {
        Some(category) => state.service.rules_by_category(category).await?,
        None => state.service.list_rules().await?,
    };
    Ok(Json(DataResponse { data: rules }))
}

/// GET /api/v1/rules/{id}
pub async fn get_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let rule = state.service.get_rule(&rule_id).await?;
    Ok(Json(DataResponse { data: rule }))
}

/// PUT /api/v1/rules/{id}
pub async fn update_rule(
    State(state): State<AppState>,
    actor: Actor,
    Path(rule_id): Path<String>,
    ApiJson(body): ApiJson<UpdateRuleRequest>,
) -> AppResult<impl IntoResponse> {
    let edit = RuleEdit {
        name: body.name,
        description: body.description,
        severity: body.severity,
    };
    let rule = state.service.update_rule(&rule_id, &edit).await?;
    publish_rule_updated(&state, &actor, &rule);
    Ok(Json(DataResponse { data: rule }))
}

/// PUT /api/v1/rules/{id}/enabled
pub async fn set_enabled(
    State(state): State<AppState>,
    actor: Actor,
    Path(rule_id): Path<String>,
    ApiJson(body): ApiJson<SetEnabledRequest>,
) -> AppResult<impl IntoResponse> {
    let rule = state.service.set_rule_enabled(&rule_id, body.enabled).await?;
    publish_rule_updated(&state, &actor, &rule);
    Ok(Json(DataResponse { data: rule }))
}

/// POST /api/v1/rules/{id}/toggle
pub async fn toggle_rule(
    State(state): State<AppState>,
    actor: Actor,
    Path(rule_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let rule = state.service.toggle_rule(&rule_id).await?;
    publish_rule_updated(&state, &actor, &rule);
    Ok(Json(DataResponse { data: rule }))
}
