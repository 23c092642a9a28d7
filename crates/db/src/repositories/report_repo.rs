//! Repository for the `validation_reports` and `validation_outcomes` tables.
//!
//! A report and its outcomes are written in one transaction, so history
//! readers never observe a report without its outcomes.

use std::collections::HashMap;

use async_trait::async_trait;
use rebate_core::error::CoreError;
use rebate_core::report::{ReportRepository, ValidationOutcome, ValidationReport};
use rebate_core::types::Timestamp;

use super::storage_error;
use crate::models::report::{ValidationOutcomeRow, ValidationReportRow};
use crate::DbPool;

/// Column list for `validation_reports` queries.
const REPORT_COLUMNS: &str =
    "id, rebate_calculation_id, validated_at, validated_by, execution_time_ms";

/// Column list for `validation_outcomes` queries.
const OUTCOME_COLUMNS: &str =
    "id, report_id, position, validation_type, status, details, validated_at";

pub struct PgReportRepository {
    pool: DbPool,
}

impl PgReportRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Attach outcomes to report rows, preserving the row order.
    async fn hydrate(
        &self,
        rows: Vec<ValidationReportRow>,
    ) -> Result<Vec<ValidationReport>, CoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let query = format!(
            "SELECT {OUTCOME_COLUMNS} FROM validation_outcomes \
             WHERE report_id = ANY($1) ORDER BY report_id, position"
        );
        let outcome_rows = sqlx::query_as::<_, ValidationOutcomeRow>(&query)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        let mut outcomes: HashMap<String, Vec<ValidationOutcome>> = HashMap::new();
        for row in outcome_rows {
            let report_id = row.report_id.clone();
            outcomes
                .entry(report_id)
                .or_default()
                .push(ValidationOutcome::try_from(row)?);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let validations = outcomes.remove(&row.id).unwrap_or_default();
                ValidationReport::restore(
                    row.id,
                    row.rebate_calculation_id,
                    validations,
                    row.validated_at,
                    row.validated_by,
                    u64::try_from(row.execution_time_ms).unwrap_or(0),
                )
            })
            .collect())
    }
}

#[async_trait]
impl ReportRepository for PgReportRepository {
    async fn append(&self, report: &ValidationReport) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        sqlx::query(
            "INSERT INTO validation_reports \
                (id, rebate_calculation_id, total_checks, passed_checks, failed_checks, \
                 warning_checks, overall_status, validated_at, validated_by, execution_time_ms) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(report.id())
        .bind(report.rebate_calculation_id())
        .bind(report.total_checks() as i32)
        .bind(report.passed_checks() as i32)
        .bind(report.failed_checks() as i32)
        .bind(report.warning_checks() as i32)
        .bind(report.overall_status().as_str())
        .bind(report.validated_at())
        .bind(report.validated_by())
        .bind(i64::try_from(report.execution_time_ms()).unwrap_or(i64::MAX))
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        for (position, outcome) in report.validations().iter().enumerate() {
            sqlx::query(
                "INSERT INTO validation_outcomes \
                    (id, report_id, position, validation_type, status, details, validated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(&outcome.id)
            .bind(report.id())
            .bind(position as i32)
            .bind(outcome.validation_type.as_str())
            .bind(outcome.status.as_str())
            .bind(&outcome.details)
            .bind(outcome.validated_at)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        }

        tx.commit().await.map_err(storage_error)?;
        Ok(())
    }

    async fn history(&self, calculation_id: &str) -> Result<Vec<ValidationReport>, CoreError> {
        let query = format!(
            "SELECT {REPORT_COLUMNS} FROM validation_reports \
             WHERE rebate_calculation_id = $1 ORDER BY seq"
        );
        let rows = sqlx::query_as::<_, ValidationReportRow>(&query)
            .bind(calculation_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        self.hydrate(rows).await
    }

    async fn list_between(
        &self,
        since: Option<Timestamp>,
        until: Option<Timestamp>,
    ) -> Result<Vec<ValidationReport>, CoreError> {
        let query = format!(
            "SELECT {REPORT_COLUMNS} FROM validation_reports \
             WHERE ($1::timestamptz IS NULL OR validated_at >= $1) \
               AND ($2::timestamptz IS NULL OR validated_at < $2) \
             ORDER BY validated_at, seq"
        );
        let rows = sqlx::query_as::<_, ValidationReportRow>(&query)
            .bind(since)
            .bind(until)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        self.hydrate(rows).await
    }
}
