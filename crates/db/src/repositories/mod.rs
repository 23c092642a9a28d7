//! Repository implementations backed by Postgres.

pub mod calculation_repo;
pub mod event_repo;
pub mod report_repo;
pub mod rule_repo;
pub mod source_repo;

pub use calculation_repo::PgCalculationRepository;
pub use event_repo::EventRepo;
pub use report_repo::PgReportRepository;
pub use rule_repo::PgRuleRepository;
pub use source_repo::PgReconciliationSource;

use rebate_core::error::CoreError;

/// Map a sqlx failure into the storage error surfaced by the core traits.
pub(crate) fn storage_error(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Database error");
    CoreError::Internal(format!("Database error: {err}"))
}

/// Whether `err` is a unique violation (SQLSTATE 23505) on `constraint`.
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}
