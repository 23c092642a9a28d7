//! Rebate calculation row model.

use rebate_core::calculation::{CalculationStatus, RebateCalculation};
use rebate_core::error::CoreError;
use rebate_core::types::{Amount, Timestamp};
use sqlx::FromRow;

/// A row from the `rebate_calculations` table. There is no variance column.
#[derive(Debug, Clone, FromRow)]
pub struct RebateCalculationRow {
    pub id: String,
    pub contract_id: String,
    pub period: String,
    pub expected_amount: Amount,
    pub actual_amount: Option<Amount>,
    pub status: String,
    pub calculated_at: Timestamp,
    pub paid_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl TryFrom<RebateCalculationRow> for RebateCalculation {
    type Error = CoreError;

    fn try_from(row: RebateCalculationRow) -> Result<Self, Self::Error> {
        Ok(RebateCalculation {
            status: CalculationStatus::parse(&row.status)?,
            id: row.id,
            contract_id: row.contract_id,
            period: row.period,
            expected_amount: row.expected_amount,
            actual_amount: row.actual_amount,
            calculated_at: row.calculated_at,
            paid_at: row.paid_at,
            updated_at: row.updated_at,
        })
    }
}
