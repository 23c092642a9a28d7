//! Repository for the `rebate_calculations` table.

use async_trait::async_trait;
use rebate_core::calculation::{
    duplicate_error, CalculationFilter, CalculationRepository, Page, PageRequest,
    RebateCalculation,
};
use rebate_core::error::CoreError;

use super::{is_unique_violation, storage_error};
use crate::models::calculation::RebateCalculationRow;
use crate::DbPool;

/// Column list for `rebate_calculations` queries.
const COLUMNS: &str = "id, contract_id, period, expected_amount, actual_amount, status, \
                       calculated_at, paid_at, updated_at";

/// Filter clause shared by the page and count queries. Null parameters
/// match everything.
const FILTER: &str = "($1::text IS NULL OR contract_id = $1) \
                      AND ($2::text IS NULL OR status = $2) \
                      AND ($3::text IS NULL OR period = $3)";

const CONTRACT_PERIOD_CONSTRAINT: &str = "uq_rebate_calculations_contract_period";

pub struct PgCalculationRepository {
    pool: DbPool,
}

impl PgCalculationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CalculationRepository for PgCalculationRepository {
    async fn find(&self, id: &str) -> Result<Option<RebateCalculation>, CoreError> {
        let query = format!("SELECT {COLUMNS} FROM rebate_calculations WHERE id = $1");
        sqlx::query_as::<_, RebateCalculationRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .map(RebateCalculation::try_from)
            .transpose()
    }

    async fn find_by_contract_period(
        &self,
        contract_id: &str,
        period: &str,
    ) -> Result<Option<RebateCalculation>, CoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM rebate_calculations WHERE contract_id = $1 AND period = $2"
        );
        sqlx::query_as::<_, RebateCalculationRow>(&query)
            .bind(contract_id)
            .bind(period)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .map(RebateCalculation::try_from)
            .transpose()
    }

    async fn list(
        &self,
        filter: &CalculationFilter,
        page: PageRequest,
    ) -> Result<Page<RebateCalculation>, CoreError> {
        let status = filter.status.map(|s| s.as_str());

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM rebate_calculations WHERE {FILTER}"))
                .bind(filter.contract_id.as_deref())
                .bind(status)
                .bind(filter.period.as_deref())
                .fetch_one(&self.pool)
                .await
                .map_err(storage_error)?;

        let query = format!(
            "SELECT {COLUMNS} FROM rebate_calculations WHERE {FILTER} \
             ORDER BY calculated_at, id LIMIT $4 OFFSET $5"
        );
        let items = sqlx::query_as::<_, RebateCalculationRow>(&query)
            .bind(filter.contract_id.as_deref())
            .bind(status)
            .bind(filter.period.as_deref())
            .bind(i64::from(page.limit))
            .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?
            .into_iter()
            .map(RebateCalculation::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, total.max(0) as u64, page))
    }

    async fn insert(&self, calc: &RebateCalculation) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO rebate_calculations \
                (id, contract_id, period, expected_amount, actual_amount, status, \
                 calculated_at, paid_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&calc.id)
        .bind(&calc.contract_id)
        .bind(&calc.period)
        .bind(calc.expected_amount)
        .bind(calc.actual_amount)
        .bind(calc.status.as_str())
        .bind(calc.calculated_at)
        .bind(calc.paid_at)
        .bind(calc.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err, CONTRACT_PERIOD_CONSTRAINT) {
                duplicate_error(&calc.contract_id, &calc.period)
            } else {
                storage_error(err)
            }
        })?;
        Ok(())
    }

    async fn save(&self, calc: &RebateCalculation) -> Result<bool, CoreError> {
        let result = sqlx::query(
            "UPDATE rebate_calculations SET \
                expected_amount = $2, actual_amount = $3, status = $4, \
                paid_at = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(&calc.id)
        .bind(calc.expected_amount)
        .bind(calc.actual_amount)
        .bind(calc.status.as_str())
        .bind(calc.paid_at)
        .bind(calc.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(result.rows_affected() > 0)
    }
}
