//! Event entity model.

use rebate_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Event {
    pub id: i64,
    pub event_type: String,
    pub source_entity_type: Option<String>,
    pub source_entity_id: Option<String>,
    pub actor: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}
