//! Command facade over the registry, calculation store, engine and metrics.
//!
//! This is the full surface the transport layer talks to. Storage backends
//! are injected as trait objects so the same service runs over Postgres or
//! the in-memory implementations.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::calculation::{
    CalculationFilter, CalculationRepository, CalculationStatus, CalculationStore, Page,
    PageRequest, RebateCalculation,
};
use crate::engine::{EngineConfig, ValidationEngine};
use crate::error::CoreError;
use crate::memory::{
    demo_calculations, InMemoryCalculationRepository, InMemoryReportRepository,
    InMemoryRuleRepository, StaticReconciliationSource,
};
use crate::metrics::{summarize, DateRange, MetricsSummary, DEFAULT_TOP_FAILURES};
use crate::registry::RuleRegistry;
use crate::report::{ReportRepository, ValidationReport};
use crate::rules::{RuleCategory, RuleEdit, RuleRepository, ValidationRule};
use crate::source::ReconciliationSource;
use crate::types::Amount;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub engine: EngineConfig,
    /// Default `common_failures` length when a caller does not ask for one.
    pub top_failures: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            top_failures: DEFAULT_TOP_FAILURES,
        }
    }
}

/// Storage and data-source backends for a [`RebateService`].
pub struct Backends {
    pub rules: Arc<dyn RuleRepository>,
    pub calculations: Arc<dyn CalculationRepository>,
    pub reports: Arc<dyn ReportRepository>,
    pub source: Arc<dyn ReconciliationSource>,
}

impl Backends {
    /// In-memory storage pre-loaded with the demo contracts and
    /// calculations.
    pub fn in_memory_demo() -> Self {
        Self {
            rules: Arc::new(InMemoryRuleRepository::default()),
            calculations: Arc::new(InMemoryCalculationRepository::with_calculations(
                demo_calculations(chrono::Utc::now()),
            )),
            reports: Arc::new(InMemoryReportRepository::default()),
            source: Arc::new(StaticReconciliationSource::demo()),
        }
    }
}

pub struct RebateService {
    rules: Arc<RuleRegistry>,
    calculations: Arc<CalculationStore>,
    reports: Arc<dyn ReportRepository>,
    engine: ValidationEngine,
    top_failures: usize,
}

impl RebateService {
    pub fn new(backends: Backends, config: ServiceConfig) -> Self {
        let rules = Arc::new(RuleRegistry::new(backends.rules));
        let calculations = Arc::new(CalculationStore::new(
            backends.calculations,
            Arc::clone(&backends.source),
        ));
        let engine = ValidationEngine::new(
            Arc::clone(&rules),
            Arc::clone(&calculations),
            Arc::clone(&backends.reports),
            backends.source,
            config.engine,
        );
        Self {
            rules,
            calculations,
            reports: backends.reports,
            engine,
            top_failures: config.top_failures,
        }
    }

    /// Seed the default rule set. Safe to call on every startup.
    pub async fn initialize(&self) -> Result<(), CoreError> {
        self.rules.seed_defaults().await?;
        Ok(())
    }

    // -- rules ----------------------------------------------------------------

    pub async fn list_rules(&self) -> Result<Vec<ValidationRule>, CoreError> {
        self.rules.list_rules().await
    }

    pub async fn rules_by_category(
        &self,
        category: RuleCategory,
    ) -> Result<Vec<ValidationRule>, CoreError> {
        self.rules.get_by_category(category).await
    }

    pub async fn get_rule(&self, rule_id: &str) -> Result<ValidationRule, CoreError> {
        self.rules.get(rule_id).await
    }

    pub async fn set_rule_enabled(
        &self,
        rule_id: &str,
        enabled: bool,
    ) -> Result<ValidationRule, CoreError> {
        self.rules.set_enabled(rule_id, enabled).await
    }

    pub async fn toggle_rule(&self, rule_id: &str) -> Result<ValidationRule, CoreError> {
        self.rules.toggle(rule_id).await
    }

    pub async fn update_rule(
        &self,
        rule_id: &str,
        edit: &RuleEdit,
    ) -> Result<ValidationRule, CoreError> {
        self.rules.update(rule_id, edit).await
    }

    // -- calculations ---------------------------------------------------------

    pub async fn list_calculations(
        &self,
        filter: &CalculationFilter,
        page: PageRequest,
    ) -> Result<Page<RebateCalculation>, CoreError> {
        self.calculations.list(filter, page).await
    }

    pub async fn get_calculation(&self, id: &str) -> Result<RebateCalculation, CoreError> {
        self.calculations.get(id).await
    }

    pub async fn create_calculation(
        &self,
        contract_id: &str,
        period: &str,
    ) -> Result<RebateCalculation, CoreError> {
        self.calculations.create(contract_id, period).await
    }

    pub async fn update_calculation_status(
        &self,
        id: &str,
        status: CalculationStatus,
    ) -> Result<RebateCalculation, CoreError> {
        self.calculations.update_status(id, status).await
    }

    pub async fn record_actual(
        &self,
        id: &str,
        actual_amount: Amount,
    ) -> Result<RebateCalculation, CoreError> {
        self.calculations.record_actual(id, actual_amount).await
    }

    // -- validation -----------------------------------------------------------

    pub async fn run_validation(
        &self,
        calculation_id: &str,
        category: Option<RuleCategory>,
        actor: &str,
        cancel: &CancellationToken,
    ) -> Result<ValidationReport, CoreError> {
        self.engine.run(calculation_id, category, actor, cancel).await
    }

    pub fn is_validation_running(&self, calculation_id: &str) -> bool {
        self.engine.is_running(calculation_id)
    }

    /// Reports for a calculation, oldest first.
    pub async fn history(&self, calculation_id: &str) -> Result<Vec<ValidationReport>, CoreError> {
        // Surface NotFound for unknown ids instead of an empty history.
        self.calculations.get(calculation_id).await?;
        self.reports.history(calculation_id).await
    }

    pub async fn metrics(
        &self,
        range: DateRange,
        top_n: Option<usize>,
    ) -> Result<MetricsSummary, CoreError> {
        let (since, until) = range.bounds();
        let reports = self.reports.list_between(since, until).await?;
        Ok(summarize(&reports, top_n.unwrap_or(self.top_failures)))
    }
}
