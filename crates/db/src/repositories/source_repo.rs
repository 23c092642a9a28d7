//! Reconciliation data read from the contract, purchasing, ledger and
//! item-matching tables.

use async_trait::async_trait;
use rebate_core::contract::{ContractTerms, RebateTier};
use rebate_core::source::{ItemMatchStats, ReconciliationSource, SourceError};
use rebate_core::types::Amount;

use crate::DbPool;

fn unavailable(err: sqlx::Error) -> SourceError {
    tracing::warn!(error = %err, "Reconciliation lookup failed");
    SourceError::Unavailable(err.to_string())
}

pub struct PgReconciliationSource {
    pool: DbPool,
}

impl PgReconciliationSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReconciliationSource for PgReconciliationSource {
    async fn contract_terms(&self, contract_id: &str) -> Result<ContractTerms, SourceError> {
        let rows: Vec<(Amount, Amount)> = sqlx::query_as(
            "SELECT min_volume, rate_percent FROM contract_rebate_tiers \
             WHERE contract_id = $1 ORDER BY min_volume",
        )
        .bind(contract_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        if rows.is_empty() {
            return Err(SourceError::missing("Contract terms", contract_id));
        }
        Ok(ContractTerms {
            contract_id: contract_id.to_string(),
            tiers: rows
                .into_iter()
                .map(|(min_volume, rate_percent)| RebateTier {
                    min_volume,
                    rate_percent,
                })
                .collect(),
        })
    }

    async fn purchase_volume(
        &self,
        contract_id: &str,
        period: &str,
    ) -> Result<Amount, SourceError> {
        sqlx::query_scalar(
            "SELECT volume FROM contract_purchase_volumes WHERE contract_id = $1 AND period = $2",
        )
        .bind(contract_id)
        .bind(period)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        .ok_or_else(|| SourceError::missing("Purchase volume", format!("{contract_id} {period}")))
    }

    async fn ledger_accrual(&self, contract_id: &str, period: &str) -> Result<Amount, SourceError> {
        sqlx::query_scalar(
            "SELECT amount FROM ledger_rebate_accruals WHERE contract_id = $1 AND period = $2",
        )
        .bind(contract_id)
        .bind(period)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        .ok_or_else(|| SourceError::missing("Ledger accrual", format!("{contract_id} {period}")))
    }

    async fn item_match_stats(
        &self,
        contract_id: &str,
        period: &str,
    ) -> Result<ItemMatchStats, SourceError> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT matched_count, total_count FROM line_item_matches \
             WHERE contract_id = $1 AND period = $2",
        )
        .bind(contract_id)
        .bind(period)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        let (matched, total) = row.ok_or_else(|| {
            SourceError::missing("Line item matches", format!("{contract_id} {period}"))
        })?;
        let to_count = |n: i64| {
            u64::try_from(n)
                .map_err(|_| SourceError::Unavailable(format!("negative line item count {n}")))
        };
        Ok(ItemMatchStats {
            matched: to_count(matched)?,
            total: to_count(total)?,
        })
    }
}
