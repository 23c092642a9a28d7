//! Validation engine.
//!
//! Evaluates one rebate calculation against the active rule set and commits
//! exactly one [`ValidationReport`] per successful run. Evaluation is
//! per-category: every category with at least one enabled rule produces one
//! outcome.
//!
//! Runs are exclusive per calculation id. A second run for an id that is
//! already in flight fails fast with [`CoreError::ConcurrentRunConflict`];
//! runs for different ids proceed in parallel. A run commits nothing unless
//! it finishes: cancellation (or dropping the future) before the append
//! leaves the history untouched.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::calculation::{CalculationStore, RebateCalculation};
use crate::error::CoreError;
use crate::evaluation::{
    evaluate_contract_terms, evaluate_general_ledger, evaluate_item_matching, CategoryVerdict,
    EvaluationConfig,
};
use crate::registry::RuleRegistry;
use crate::report::{OutcomeStatus, ReportRepository, ValidationOutcome, ValidationReport};
use crate::rules::RuleCategory;
use crate::source::{ReconciliationSource, SourceError};
use crate::types::EntityId;

/// Default upper bound on one category's external lookups.
pub const DEFAULT_CATEGORY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub evaluation: EvaluationConfig,
    /// Lookups slower than this record a failed outcome for their category.
    pub category_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            evaluation: EvaluationConfig::default(),
            category_timeout: DEFAULT_CATEGORY_TIMEOUT,
        }
    }
}

pub struct ValidationEngine {
    rules: Arc<RuleRegistry>,
    calculations: Arc<CalculationStore>,
    reports: Arc<dyn ReportRepository>,
    source: Arc<dyn ReconciliationSource>,
    config: EngineConfig,
    in_flight: Mutex<HashSet<EntityId>>,
}

/// Marks a calculation id as in flight until dropped.
struct RunGuard<'a> {
    in_flight: &'a Mutex<HashSet<EntityId>>,
    calculation_id: EntityId,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut set = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        set.remove(&self.calculation_id);
    }
}

impl ValidationEngine {
    pub fn new(
        rules: Arc<RuleRegistry>,
        calculations: Arc<CalculationStore>,
        reports: Arc<dyn ReportRepository>,
        source: Arc<dyn ReconciliationSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            rules,
            calculations,
            reports,
            source,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Whether a run for `calculation_id` is currently in flight.
    pub fn is_running(&self, calculation_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(calculation_id)
    }

    /// Validate a calculation and append the resulting report to its
    /// history.
    pub async fn run(
        &self,
        calculation_id: &str,
        category_filter: Option<RuleCategory>,
        actor: &str,
        cancel: &CancellationToken,
    ) -> Result<ValidationReport, CoreError> {
        let calc = self.calculations.get(calculation_id).await?;
        let _guard = self.acquire(calculation_id)?;

        let categories = self.rules.active_categories(category_filter).await?;
        tracing::debug!(
            calculation_id,
            categories = categories.len(),
            "Starting validation run"
        );

        let started = Instant::now();
        let outcomes = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(calculation_id, "Validation run cancelled during evaluation");
                return Err(CoreError::Cancelled(format!(
                    "validation of calculation {calculation_id}"
                )));
            }
            outcomes = self.evaluate_all(&calc, &categories) => outcomes,
        };
        let execution_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let report = ValidationReport::new(
            calculation_id,
            outcomes,
            chrono::Utc::now(),
            actor,
            execution_time_ms,
        );

        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled(format!(
                "validation of calculation {calculation_id}"
            )));
        }
        self.reports.append(&report).await?;

        tracing::info!(
            calculation_id,
            report_id = %report.id(),
            total_checks = report.total_checks(),
            failed_checks = report.failed_checks(),
            warning_checks = report.warning_checks(),
            overall_status = report.overall_status().as_str(),
            execution_time_ms,
            "Validation run completed"
        );
        Ok(report)
    }

    fn acquire(&self, calculation_id: &str) -> Result<RunGuard<'_>, CoreError> {
        let mut set = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !set.insert(calculation_id.to_string()) {
            tracing::warn!(calculation_id, "Rejected concurrent validation run");
            return Err(CoreError::ConcurrentRunConflict {
                calculation_id: calculation_id.to_string(),
            });
        }
        Ok(RunGuard {
            in_flight: &self.in_flight,
            calculation_id: calculation_id.to_string(),
        })
    }

    /// Evaluate every category concurrently. Output order follows the
    /// category order of `categories`.
    async fn evaluate_all(
        &self,
        calc: &RebateCalculation,
        categories: &BTreeSet<RuleCategory>,
    ) -> Vec<ValidationOutcome> {
        let futures = categories.iter().map(|&category| async move {
            let (status, details) = self.evaluate_category(category, calc).await;
            ValidationOutcome::new(category, status, details, chrono::Utc::now())
        });
        futures::future::join_all(futures).await
    }

    /// One category's verdict. Lookup errors and timeouts become a failed
    /// outcome rather than aborting the run.
    async fn evaluate_category(
        &self,
        category: RuleCategory,
        calc: &RebateCalculation,
    ) -> CategoryVerdict {
        let lookup = tokio::time::timeout(
            self.config.category_timeout,
            self.lookup_and_compare(category, calc),
        );
        match lookup.await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(err)) => {
                tracing::warn!(
                    calculation_id = %calc.id,
                    category = category.as_str(),
                    error = %err,
                    "Category evaluation failed"
                );
                (OutcomeStatus::Failed, format!("Evaluation error: {err}"))
            }
            Err(_) => {
                tracing::warn!(
                    calculation_id = %calc.id,
                    category = category.as_str(),
                    timeout_ms = self.config.category_timeout.as_millis() as u64,
                    "Category evaluation timed out"
                );
                (
                    OutcomeStatus::Failed,
                    format!(
                        "Evaluation error: external lookup timed out after {}ms",
                        self.config.category_timeout.as_millis()
                    ),
                )
            }
        }
    }

    async fn lookup_and_compare(
        &self,
        category: RuleCategory,
        calc: &RebateCalculation,
    ) -> Result<CategoryVerdict, SourceError> {
        let cfg = &self.config.evaluation;
        match category {
            RuleCategory::GeneralLedger => {
                let accrual = self
                    .source
                    .ledger_accrual(&calc.contract_id, &calc.period)
                    .await?;
                Ok(evaluate_general_ledger(calc.expected_amount, accrual, cfg))
            }
            RuleCategory::ContractTerms => {
                let terms = self.source.contract_terms(&calc.contract_id).await?;
                terms
                    .validate()
                    .map_err(|e| SourceError::Unavailable(e.to_string()))?;
                let volume = self
                    .source
                    .purchase_volume(&calc.contract_id, &calc.period)
                    .await?;
                Ok(evaluate_contract_terms(calc.expected_amount, &terms, volume, cfg))
            }
            RuleCategory::ItemMatching => {
                let stats = self
                    .source
                    .item_match_stats(&calc.contract_id, &calc.period)
                    .await?;
                Ok(evaluate_item_matching(stats, cfg))
            }
        }
    }
}
