//! Validation rule row model.

use rebate_core::error::CoreError;
use rebate_core::rules::{RuleCategory, RuleSeverity, ValidationRule};
use rebate_core::types::Timestamp;
use sqlx::FromRow;

/// A row from the `validation_rules` table.
#[derive(Debug, Clone, FromRow)]
pub struct ValidationRuleRow {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub severity: String,
    pub enabled: bool,
    pub updated_at: Timestamp,
}

impl TryFrom<ValidationRuleRow> for ValidationRule {
    type Error = CoreError;

    fn try_from(row: ValidationRuleRow) -> Result<Self, Self::Error> {
        Ok(ValidationRule {
            category: RuleCategory::parse(&row.category)?,
            severity: RuleSeverity::parse(&row.severity)?,
            id: row.id,
            name: row.name,
            description: row.description,
            enabled: row.enabled,
            updated_at: row.updated_at,
        })
    }
}
