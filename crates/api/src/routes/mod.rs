pub mod calculations;
pub mod health;
pub mod metrics;
pub mod rules;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /rules                                  list (?category=)
/// /rules/{id}                             get, edit (PUT)
/// /rules/{id}/enabled                     set enabled flag (PUT)
/// /rules/{id}/toggle                      flip enabled flag (POST)
///
/// /calculations                           list (?contract_id, status, period,
///                                         page, limit), create (POST)
/// /calculations/{id}                      get
/// /calculations/{id}/status               status transition (PUT)
/// /calculations/{id}/actual               record actual amount (PUT)
/// /calculations/{id}/validations          run (POST), history (GET)
///
/// /metrics/validation                     summary (?from, to, top)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/rules", rules::router())
        .nest("/calculations", calculations::router())
        .nest("/metrics", metrics::router())
}
