//! Acting-user extractor.
//!
//! Authentication happens upstream of this service; callers identify the
//! acting user with the `x-actor-id` header. Requests without one act as
//! [`DEFAULT_ACTOR`].

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;

pub const ACTOR_HEADER: &str = "x-actor-id";
pub const DEFAULT_ACTOR: &str = "system";
const MAX_ACTOR_LEN: usize = 128;

/// Identifier of the user issuing the request, stamped on reports and
/// events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl Actor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(ACTOR_HEADER) else {
            return Ok(Actor(DEFAULT_ACTOR.to_string()));
        };
        let value = raw
            .to_str()
            .map_err(|_| AppError::BadRequest(format!("{ACTOR_HEADER} must be visible ASCII")))?
            .trim();
        if value.is_empty() {
            return Ok(Actor(DEFAULT_ACTOR.to_string()));
        }
        if value.len() > MAX_ACTOR_LEN {
            return Err(AppError::BadRequest(format!(
                "{ACTOR_HEADER} must be at most {MAX_ACTOR_LEN} characters"
            )));
        }
        Ok(Actor(value.to_string()))
    }
}
