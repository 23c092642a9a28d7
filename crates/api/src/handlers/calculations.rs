//! Handlers for rebate calculations.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rebate_core::calculation::{CalculationFilter, CalculationStatus, PageRequest};
use rebate_core::types::Amount;
use rebate_events::{event_types, PlatformEvent};
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::actor::Actor;
use crate::response::DataResponse;
use crate::state::AppState;

/// Source entity type used on calculation events.
const ENTITY: &str = "rebate_calculation";

#[derive(Debug, Deserialize, Validate)]
pub struct ListCalculationsParams {
    pub contract_id: Option<String>,
    pub status: Option<CalculationStatus>,
    pub period: Option<String>,
    #[validate(range(min = 1, message = "page is 1-based"))]
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCalculationRequest {
    #[validate(length(
        min = 1,
        max = 128,
        message = "contract_id must be between 1 and 128 characters"
    ))]
    pub contract_id: String,
    #[validate(length(min = 1, max = 64, message = "period must be between 1 and 64 characters"))]
    pub period: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: CalculationStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordActualRequest {
    pub actual_amount: Amount,
}

/// GET /api/v1/calculations
///
/// Filter fields are AND-combined. `limit` is clamped to `1..=100`.
pub async fn list_calculations(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListCalculationsParams>,
) -> AppResult<impl IntoResponse> {
    let filter = CalculationFilter {
        contract_id: params.contract_id,
        status: params.status,
        period: params.period,
    };
    let page = PageRequest::new(params.page, params.limit);
    let result = state.service.list_calculations(&filter, page).await?;
    Ok(Json(DataResponse { data: result }))
}

/// GET /api/v1/calculations/{id}
pub async fn get_calculation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let calc = state.service.get_calculation(&id).await?;
    Ok(Json(DataResponse { data: calc }))
}

/// POST /api/v1/calculations
///
/// Computes the expected rebate from contract terms. A contract-period can
/// only be created once.
pub async fn create_calculation(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(body): ApiJson<CreateCalculationRequest>,
) -> AppResult<impl IntoResponse> {
    let calc = state
        .service
        .create_calculation(&body.contract_id, &body.period)
        .await?;
    state.event_bus.publish(
        PlatformEvent::new(event_types::CALCULATION_CREATED)
            .with_source(ENTITY, calc.id.clone())
            .with_actor(actor.as_str())
            .with_payload(serde_json::json!({
                "contract_id": calc.contract_id,
                "period": calc.period,
                "expected_amount": calc.expected_amount,
            })),
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: calc })))
}

/// PUT /api/v1/calculations/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateStatusRequest>,
) -> AppResult<impl IntoResponse> {
    let calc = state
        .service
        .update_calculation_status(&id, body.status)
        .await?;
    state.event_bus.publish(
        PlatformEvent::new(event_types::CALCULATION_STATUS_CHANGED)
            .with_source(ENTITY, calc.id.clone())
            .with_actor(actor.as_str())
            .with_payload(serde_json::json!({
                "status": calc.status,
                "paid_at": calc.paid_at,
            })),
    );
    Ok(Json(DataResponse { data: calc }))
}

/// PUT /api/v1/calculations/{id}/actual
pub async fn record_actual(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<RecordActualRequest>,
) -> AppResult<impl IntoResponse> {
    let calc = state.service.record_actual(&id, body.actual_amount).await?;
    state.event_bus.publish(
        PlatformEvent::new(event_types::CALCULATION_ACTUAL_RECORDED)
            .with_source(ENTITY, calc.id.clone())
            .with_actor(actor.as_str())
            .with_payload(serde_json::json!({
                "actual_amount": calc.actual_amount,
                "variance": calc.variance(),
            })),
    );
    Ok(Json(DataResponse { data: calc }))
}
