//! Repository for the `validation_rules` table.

use async_trait::async_trait;
use rebate_core::error::CoreError;
use rebate_core::rules::{RuleRepository, ValidationRule};

use super::storage_error;
use crate::models::rule::ValidationRuleRow;
use crate::DbPool;

/// Column list for `validation_rules` queries.
const COLUMNS: &str = "id, name, category, description, severity, enabled, updated_at";

pub struct PgRuleRepository {
    pool: DbPool,
}

impl PgRuleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleRepository for PgRuleRepository {
    async fn list(&self) -> Result<Vec<ValidationRule>, CoreError> {
        let query = format!("SELECT {COLUMNS} FROM validation_rules ORDER BY category, name, id");
        sqlx::query_as::<_, ValidationRuleRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?
            .into_iter()
            .map(ValidationRule::try_from)
            .collect()
    }

    async fn find(&self, id: &str) -> Result<Option<ValidationRule>, CoreError> {
        let query = format!("SELECT {COLUMNS} FROM validation_rules WHERE id = $1");
        sqlx::query_as::<_, ValidationRuleRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .map(ValidationRule::try_from)
            .transpose()
    }

    async fn insert_missing(&self, rules: &[ValidationRule]) -> Result<usize, CoreError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        let mut inserted = 0;
        for rule in rules {
            let result = sqlx::query(
                "INSERT INTO validation_rules \
                    (id, name, category, description, severity, enabled, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(&rule.id)
            .bind(&rule.name)
            .bind(rule.category.as_str())
            .bind(&rule.description)
            .bind(rule.severity.as_str())
            .bind(rule.enabled)
            .bind(rule.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
            inserted += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(storage_error)?;
        Ok(inserted)
    }

    async fn save(&self, rule: &ValidationRule) -> Result<bool, CoreError> {
        let result = sqlx::query(
            "UPDATE validation_rules SET \
                name = $2, description = $3, severity = $4, enabled = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(&rule.id)
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(rule.severity.as_str())
        .bind(rule.enabled)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(result.rows_affected() > 0)
    }
}
