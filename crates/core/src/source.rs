//! External reconciliation data.
//!
//! Ledger accruals, contract tier tables, purchase volumes and line-item
//! match counts live in systems outside this service. [`ReconciliationSource`]
//! is the seam the engine and calculation store read them through; lookups
//! here are the only I/O a validation run performs.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::contract::ContractTerms;
use crate::types::Amount;

/// Matched vs total invoice line items for one contract-period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMatchStats {
    pub matched: u64,
    pub total: u64,
}

/// Errors from an external data lookup.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source has no data for the requested key.
    #[error("{what} not available for {key}")]
    Missing { what: &'static str, key: String },

    /// The source could not be reached or returned unusable data.
    #[error("Data source unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    pub fn missing(what: &'static str, key: impl fmt::Display) -> Self {
        SourceError::Missing {
            what,
            key: key.to_string(),
        }
    }
}

#[async_trait]
pub trait ReconciliationSource: Send + Sync {
    async fn contract_terms(&self, contract_id: &str) -> Result<ContractTerms, SourceError>;

    /// Total purchase volume booked against the contract in `period`.
    async fn purchase_volume(&self, contract_id: &str, period: &str) -> Result<Amount, SourceError>;

    /// Rebate accrual posted to the general ledger for the contract-period.
    async fn ledger_accrual(&self, contract_id: &str, period: &str) -> Result<Amount, SourceError>;

    async fn item_match_stats(
        &self,
        contract_id: &str,
        period: &str,
    ) -> Result<ItemMatchStats, SourceError>;
}
