//! Route definitions for the `/rules` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::rules;
use crate::state::AppState;

/// Routes mounted at `/rules`.
///
/// ```text
/// GET    /                 -> list_rules  (?category=)
/// GET    /{id}             -> get_rule
/// PUT    /{id}             -> update_rule
/// PUT    /{id}/enabled     -> set_enabled
/// POST   /{id}/toggle      -> toggle_rule
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(rules::list_rules))
        .route("/{id}", get(rules::get_rule).put(rules::update_rule))
        .route("/{id}/enabled", put(rules::set_enabled))
        .route("/{id}/toggle", post(rules::toggle_rule))
}
