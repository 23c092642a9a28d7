use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use rebate_core::metrics::DateRange;
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::extract::ApiQuery;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct MetricsParams {
    /// First day included (UTC, `YYYY-MM-DD`).
    pub from: Option<NaiveDate>,
    /// Last day included.
    pub to: Option<NaiveDate>,
    #[validate(range(min = 1, max = 50, message = "top must be between 1 and 50"))]
    pub top: Option<usize>,
}

/// GET /api/v1/metrics/validation
pub async fn validation_metrics(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<MetricsParams>,
) -> AppResult<impl IntoResponse> {
    let range = DateRange::new(params.from, params.to)?;
    let summary = state.service.metrics(range, params.top).await?;
    Ok(Json(DataResponse { data: summary }))
}
