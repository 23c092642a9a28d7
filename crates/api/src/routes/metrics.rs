use axum::routing::get;
use axum::Router;

use crate::handlers::metrics;
use crate::state::AppState;

/// Routes mounted at `/metrics`.
///
/// ```text
/// GET    /validation     -> validation_metrics  (?from, to, top)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/validation", get(metrics::validation_metrics))
}
