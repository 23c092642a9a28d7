//! Rebate calculations: status state machine, derived variance, pagination,
//! and the calculation store.

use std::sync::Arc;

use async_trait::async_trait;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::CoreError;
use crate::source::{ReconciliationSource, SourceError};
use crate::types::{new_id, round_amount, Amount, EntityId, Timestamp};

// ---------------------------------------------------------------------------
// CalculationStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationStatus {
    Pending,
    Calculated,
    Paid,
    Disputed,
    Cancelled,
}

impl CalculationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationStatus::Pending => "pending",
            CalculationStatus::Calculated => "calculated",
            CalculationStatus::Paid => "paid",
            CalculationStatus::Disputed => "disputed",
            CalculationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "pending" => Ok(CalculationStatus::Pending),
            "calculated" => Ok(CalculationStatus::Calculated),
            "paid" => Ok(CalculationStatus::Paid),
            "disputed" => Ok(CalculationStatus::Disputed),
            "cancelled" => Ok(CalculationStatus::Cancelled),
            other => Err(CoreError::InvalidArgument(format!(
                "Unknown calculation status: '{other}'"
            ))),
        }
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// ```text
    /// pending ──> calculated ──> paid
    ///                │  ^
    ///                v  │
    ///             disputed
    /// pending | calculated | disputed ──> cancelled
    /// ```
    pub fn can_transition_to(self, next: CalculationStatus) -> bool {
        use CalculationStatus::*;
        matches!(
            (self, next),
            (Pending, Calculated)
                | (Calculated, Paid)
                | (Calculated, Disputed)
                | (Disputed, Calculated)
                | (Pending | Calculated | Disputed, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CalculationStatus::Paid | CalculationStatus::Cancelled)
    }
}

impl std::fmt::Display for CalculationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RebateCalculation
// ---------------------------------------------------------------------------

/// Expected and actual rebate figures for one contract-period.
///
/// Variance is never stored; [`RebateCalculation::variance`] derives it from
/// the two amounts and serialization emits the derived value.
#[derive(Debug, Clone, PartialEq)]
pub struct RebateCalculation {
    pub id: EntityId,
    pub contract_id: EntityId,
    pub period: String,
    pub expected_amount: Amount,
    pub actual_amount: Option<Amount>,
    pub status: CalculationStatus,
    pub calculated_at: Timestamp,
    pub paid_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl RebateCalculation {
    /// `actual - expected`, or `None` while the actual amount is unknown.
    pub fn variance(&self) -> Option<Amount> {
        self.actual_amount.map(|actual| actual - self.expected_amount)
    }

    /// Move to `next`, enforcing the status state machine.
    pub fn transition(&mut self, next: CalculationStatus, now: Timestamp) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                entity: "RebateCalculation",
                id: self.id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        if next == CalculationStatus::Paid {
            self.paid_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }
}

impl Serialize for RebateCalculation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("RebateCalculation", 10)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("contract_id", &self.contract_id)?;
        s.serialize_field("period", &self.period)?;
        s.serialize_field("expected_amount", &self.expected_amount)?;
        s.serialize_field("actual_amount", &self.actual_amount)?;
        s.serialize_field("variance", &self.variance())?;
        s.serialize_field("status", &self.status)?;
        s.serialize_field("calculated_at", &self.calculated_at)?;
        s.serialize_field("paid_at", &self.paid_at)?;
        s.serialize_field("updated_at", &self.updated_at)?;
        s.end()
    }
}

// ---------------------------------------------------------------------------
// Filtering and pagination
// ---------------------------------------------------------------------------

/// AND-combined list filter; `None` fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalculationFilter {
    pub contract_id: Option<String>,
    pub status: Option<CalculationStatus>,
    pub period: Option<String>,
}

impl CalculationFilter {
    pub fn matches(&self, calc: &RebateCalculation) -> bool {
        self.contract_id.as_ref().map_or(true, |c| *c == calc.contract_id)
            && self.status.map_or(true, |s| s == calc.status)
            && self.period.as_ref().map_or(true, |p| *p == calc.period)
    }
}

pub const DEFAULT_PAGE_LIMIT: u32 = 25;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Offset pagination request with a 1-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Clamp user-provided values: page >= 1, limit in `1..=MAX_PAGE_LIMIT`.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the totals needed to render a pager.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
            total_pages: total.div_ceil(u64::from(request.limit)),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage seam
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CalculationRepository: Send + Sync {
    async fn find(&self, id: &str) -> Result<Option<RebateCalculation>, CoreError>;

    async fn find_by_contract_period(
        &self,
        contract_id: &str,
        period: &str,
    ) -> Result<Option<RebateCalculation>, CoreError>;

    /// Filtered page ordered by `calculated_at`, then `id`.
    async fn list(
        &self,
        filter: &CalculationFilter,
        page: PageRequest,
    ) -> Result<Page<RebateCalculation>, CoreError>;

    /// Insert a new calculation. Fails with `InvalidArgument` if another
    /// calculation already exists for the same contract-period.
    async fn insert(&self, calc: &RebateCalculation) -> Result<(), CoreError>;

    /// Persist an updated calculation. Returns `false` if the id is unknown.
    async fn save(&self, calc: &RebateCalculation) -> Result<bool, CoreError>;
}

// ---------------------------------------------------------------------------
// CalculationStore
// ---------------------------------------------------------------------------

/// Authoritative record of expected/actual rebate figures per
/// contract-period.
pub struct CalculationStore {
    repo: Arc<dyn CalculationRepository>,
    source: Arc<dyn ReconciliationSource>,
}

impl CalculationStore {
    pub fn new(
        repo: Arc<dyn CalculationRepository>,
        source: Arc<dyn ReconciliationSource>,
    ) -> Self {
        Self { repo, source }
    }

    pub async fn get(&self, id: &str) -> Result<RebateCalculation, CoreError> {
        self.repo
            .find(id)
            .await?
            .ok_or_else(|| CoreError::not_found("RebateCalculation", id))
    }

    pub async fn list(
        &self,
        filter: &CalculationFilter,
        page: PageRequest,
    ) -> Result<Page<RebateCalculation>, CoreError> {
        self.repo.list(filter, page).await
    }

    /// Compute and record the expected rebate for a new contract-period.
    ///
    /// A contract-period can only be calculated once; recalculation goes
    /// through status changes on the existing record.
    pub async fn create(
        &self,
        contract_id: &str,
        period: &str,
    ) -> Result<RebateCalculation, CoreError> {
        let contract_id = contract_id.trim();
        let period = period.trim();
        if contract_id.is_empty() || period.is_empty() {
            return Err(CoreError::InvalidArgument(
                "contract_id and period must not be blank".to_string(),
            ));
        }
        if self
            .repo
            .find_by_contract_period(contract_id, period)
            .await?
            .is_some()
        {
            return Err(duplicate_error(contract_id, period));
        }

        let terms = self
            .source
            .contract_terms(contract_id)
            .await
            .map_err(calculation_input_error)?;
        terms.validate()?;
        let volume = self
            .source
            .purchase_volume(contract_id, period)
            .await
            .map_err(calculation_input_error)?;

        let now = chrono::Utc::now();
        let calc = RebateCalculation {
            id: new_id("calc"),
            contract_id: contract_id.to_string(),
            period: period.to_string(),
            expected_amount: terms.rebate_for(volume),
            actual_amount: None,
            status: CalculationStatus::Calculated,
            calculated_at: now,
            paid_at: None,
            updated_at: now,
        };
        self.repo.insert(&calc).await?;
        tracing::info!(
            calculation_id = %calc.id,
            contract_id = %calc.contract_id,
            period = %calc.period,
            expected_amount = %calc.expected_amount,
            "Rebate calculation created"
        );
        Ok(calc)
    }

    pub async fn update_status(
        &self,
        id: &str,
        status: CalculationStatus,
    ) -> Result<RebateCalculation, CoreError> {
        let mut calc = self.get(id).await?;
        let from = calc.status;
        calc.transition(status, chrono::Utc::now())?;
        self.persist(&calc).await?;
        tracing::info!(
            calculation_id = %calc.id,
            %from,
            to = %status,
            "Calculation status changed"
        );
        Ok(calc)
    }

    /// Record the rebate actually received from the vendor.
    pub async fn record_actual(
        &self,
        id: &str,
        actual: Amount,
    ) -> Result<RebateCalculation, CoreError> {
        if actual.is_sign_negative() {
            return Err(CoreError::InvalidArgument(format!(
                "actual_amount must not be negative, got {actual}"
            )));
        }
        let mut calc = self.get(id).await?;
        if calc.status == CalculationStatus::Cancelled {
            return Err(CoreError::InvalidTransition {
                entity: "RebateCalculation",
                id: calc.id,
                from: CalculationStatus::Cancelled.to_string(),
                to: "actual_recorded".to_string(),
            });
        }
        calc.actual_amount = Some(round_amount(actual));
        calc.updated_at = chrono::Utc::now();
        self.persist(&calc).await?;
        tracing::info!(
            calculation_id = %calc.id,
            actual_amount = %actual,
            "Actual rebate recorded"
        );
        Ok(calc)
    }

    async fn persist(&self, calc: &RebateCalculation) -> Result<(), CoreError> {
        if self.repo.save(calc).await? {
            Ok(())
        } else {
            Err(CoreError::not_found("RebateCalculation", &calc.id))
        }
    }
}

/// Missing inputs are the caller's problem; an unreachable source is ours.
fn calculation_input_error(err: SourceError) -> CoreError {
    match err {
        SourceError::Missing { .. } => {
            CoreError::InvalidArgument(format!("Cannot calculate rebate: {err}"))
        }
        SourceError::Unavailable(_) => {
            CoreError::Internal(format!("Cannot calculate rebate: {err}"))
        }
    }
}

pub fn duplicate_error(contract_id: &str, period: &str) -> CoreError {
    CoreError::InvalidArgument(format!(
        "A rebate calculation already exists for contract {contract_id} period {period}"
    ))
}
