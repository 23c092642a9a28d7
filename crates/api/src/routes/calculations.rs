//! Route definitions for the `/calculations` resource and its validation
//! runs.

use axum::routing::{get, put};
use axum::Router;

use crate::handlers::{calculations, validation};
use crate::state::AppState;

/// Routes mounted at `/calculations`.
///
/// ```text
/// GET    /                      -> list_calculations
/// POST   /                      -> create_calculation
/// GET    /{id}                  -> get_calculation
/// PUT    /{id}/status           -> update_status
/// PUT    /{id}/actual           -> record_actual
/// POST   /{id}/validations      -> run_validation
/// GET    /{id}/validations      -> get_history
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(calculations::list_calculations).post(calculations::create_calculation),
        )
        .route("/{id}", get(calculations::get_calculation))
        .route("/{id}/status", put(calculations::update_status))
        .route("/{id}/actual", put(calculations::record_actual))
        .route(
            "/{id}/validations",
            get(validation::get_history).post(validation::run_validation),
        )
}
