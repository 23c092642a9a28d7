//! Handlers for validation runs and report history.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use rebate_core::rules::RuleCategory;
use rebate_events::{event_types, PlatformEvent};
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::middleware::actor::Actor;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RunValidationRequest {
    /// Restrict the run to one category.
    #[serde(default)]
    pub category: Option<RuleCategory>,
}

/// POST /api/v1/calculations/{id}/validations
///
/// Runs the validation engine and appends the report to the calculation's
/// history. Returns 409 with `retryable: true` while another run for the
/// same calculation is in flight.
pub async fn run_validation(
    State(state): State<AppState>,
    actor: Actor,
    Path(calculation_id): Path<String>,
    ApiJson(body): ApiJson<RunValidationRequest>,
) -> AppResult<impl IntoResponse> {
    // A dropped request future (client gone) abandons the run as well.
    let cancel = state.shutdown.child_token();
    let report = state
        .service
        .run_validation(&calculation_id, body.category, actor.as_str(), &cancel)
        .await?;

    state.event_bus.publish(
        PlatformEvent::new(event_types::VALIDATION_COMPLETED)
            .with_source("rebate_calculation", calculation_id)
            .with_actor(actor.as_str())
            .with_payload(serde_json::json!({
                "report_id": report.id(),
                "overall_status": report.overall_status(),
                "total_checks": report.total_checks(),
                "failed_checks": report.failed_checks(),
                "warning_checks": report.warning_checks(),
                "execution_time": report.execution_time_ms(),
            })),
    );
    Ok(Json(DataResponse { data: report }))
}

/// GET /api/v1/calculations/{id}/validations
///
/// Report history, oldest first.
pub async fn get_history(
    State(state): State<AppState>,
    Path(calculation_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let history = state.service.history(&calculation_id).await?;
    Ok(Json(DataResponse { data: history }))
}
