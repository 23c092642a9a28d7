//! Validation report and outcome row models.

use rebate_core::error::CoreError;
use rebate_core::report::{OutcomeStatus, ValidationOutcome};
use rebate_core::rules::RuleCategory;
use rebate_core::types::Timestamp;
use sqlx::FromRow;

/// A row from the `validation_reports` table.
///
/// The stored counts are informational; reports are rebuilt from their
/// outcomes so the counts can never disagree with the outcome list.
#[derive(Debug, Clone, FromRow)]
pub struct ValidationReportRow {
    pub id: String,
    pub rebate_calculation_id: String,
    pub validated_at: Timestamp,
    pub validated_by: String,
    pub execution_time_ms: i64,
}

/// A row from the `validation_outcomes` table.
#[derive(Debug, Clone, FromRow)]
pub struct ValidationOutcomeRow {
    pub id: String,
    pub report_id: String,
    pub position: i32,
    pub validation_type: String,
    pub status: String,
    pub details: String,
    pub validated_at: Timestamp,
}

impl TryFrom<ValidationOutcomeRow> for ValidationOutcome {
    type Error = CoreError;

    fn try_from(row: ValidationOutcomeRow) -> Result<Self, Self::Error> {
        Ok(ValidationOutcome {
            validation_type: RuleCategory::parse(&row.validation_type)?,
            status: OutcomeStatus::parse(&row.status)?,
            id: row.id,
            details: row.details,
            validated_at: row.validated_at,
        })
    }
}
