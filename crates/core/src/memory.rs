//! In-memory storage and reconciliation data.
//!
//! Backs unit tests, the API integration tests and the `memory` storage
//! mode of the server. Each repository keeps its state behind a tokio
//! `RwLock`; every write happens under a single lock acquisition so the
//! same atomicity guarantees hold as in the Postgres implementations.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::calculation::{
    duplicate_error, CalculationFilter, CalculationRepository, CalculationStatus, Page,
    PageRequest, RebateCalculation,
};
use crate::contract::{ContractTerms, RebateTier};
use crate::error::CoreError;
use crate::report::{ReportRepository, ValidationReport};
use crate::rules::{RuleRepository, ValidationRule};
use crate::source::{ItemMatchStats, ReconciliationSource, SourceError};
use crate::types::{Amount, Timestamp};

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryRuleRepository {
    rules: RwLock<HashMap<String, ValidationRule>>,
}

#[async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn list(&self) -> Result<Vec<ValidationRule>, CoreError> {
        Ok(self.rules.read().await.values().cloned().collect())
    }

    async fn find(&self, id: &str) -> Result<Option<ValidationRule>, CoreError> {
        Ok(self.rules.read().await.get(id).cloned())
    }

    async fn insert_missing(&self, rules: &[ValidationRule]) -> Result<usize, CoreError> {
        let mut map = self.rules.write().await;
        let mut inserted = 0;
        for rule in rules {
            if !map.contains_key(&rule.id) {
                map.insert(rule.id.clone(), rule.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn save(&self, rule: &ValidationRule) -> Result<bool, CoreError> {
        let mut map = self.rules.write().await;
        match map.get_mut(&rule.id) {
            Some(existing) => {
                *existing = rule.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Calculations
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryCalculationRepository {
    calculations: RwLock<HashMap<String, RebateCalculation>>,
}

impl InMemoryCalculationRepository {
    /// Start with a pre-populated set. Later entries win on id collisions.
    pub fn with_calculations(calculations: impl IntoIterator<Item = RebateCalculation>) -> Self {
        let map = calculations
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();
        Self {
            calculations: RwLock::new(map),
        }
    }
}

#[async_trait]
impl CalculationRepository for InMemoryCalculationRepository {
    async fn find(&self, id: &str) -> Result<Option<RebateCalculation>, CoreError> {
        Ok(self.calculations.read().await.get(id).cloned())
    }

    async fn find_by_contract_period(
        &self,
        contract_id: &str,
        period: &str,
    ) -> Result<Option<RebateCalculation>, CoreError> {
        Ok(self
            .calculations
            .read()
            .await
            .values()
            .find(|c| c.contract_id == contract_id && c.period == period)
            .cloned())
    }

    async fn list(
        &self,
        filter: &CalculationFilter,
        page: PageRequest,
    ) -> Result<Page<RebateCalculation>, CoreError> {
        let map = self.calculations.read().await;
        let mut matching: Vec<&RebateCalculation> =
            map.values().filter(|c| filter.matches(c)).collect();
        matching.sort_by(|a, b| {
            a.calculated_at
                .cmp(&b.calculated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        let total = matching.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, total, page))
    }

    async fn insert(&self, calc: &RebateCalculation) -> Result<(), CoreError> {
        let mut map = self.calculations.write().await;
        if map
            .values()
            .any(|c| c.contract_id == calc.contract_id && c.period == calc.period)
        {
            return Err(duplicate_error(&calc.contract_id, &calc.period));
        }
        if map.contains_key(&calc.id) {
            return Err(CoreError::Internal(format!(
                "Duplicate calculation id {}",
                calc.id
            )));
        }
        map.insert(calc.id.clone(), calc.clone());
        Ok(())
    }

    async fn save(&self, calc: &RebateCalculation) -> Result<bool, CoreError> {
        let mut map = self.calculations.write().await;
        match map.get_mut(&calc.id) {
            Some(existing) => {
                *existing = calc.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Append-only report log in insertion order.
#[derive(Default)]
pub struct InMemoryReportRepository {
    reports: RwLock<Vec<ValidationReport>>,
}

#[async_trait]
impl ReportRepository for InMemoryReportRepository {
    async fn append(&self, report: &ValidationReport) -> Result<(), CoreError> {
        self.reports.write().await.push(report.clone());
        Ok(())
    }

    async fn history(&self, calculation_id: &str) -> Result<Vec<ValidationReport>, CoreError> {
        Ok(self
            .reports
            .read()
            .await
            .iter()
            .filter(|r| r.rebate_calculation_id() == calculation_id)
            .cloned()
            .collect())
    }

    async fn list_between(
        &self,
        since: Option<Timestamp>,
        until: Option<Timestamp>,
    ) -> Result<Vec<ValidationReport>, CoreError> {
        let mut selected: Vec<ValidationReport> = self
            .reports
            .read()
            .await
            .iter()
            .filter(|r| since.map_or(true, |s| r.validated_at() >= s))
            .filter(|r| until.map_or(true, |u| r.validated_at() < u))
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        selected.sort_by_key(|r| r.validated_at());
        Ok(selected)
    }
}

// ---------------------------------------------------------------------------
// Reconciliation source
// ---------------------------------------------------------------------------

type PeriodKey = (String, String);

fn period_key(contract_id: &str, period: &str) -> PeriodKey {
    (contract_id.to_string(), period.to_string())
}

/// Fixed reconciliation data keyed by contract and contract-period.
/// Lookups for keys that were never registered fail with
/// [`SourceError::Missing`].
#[derive(Debug, Clone, Default)]
pub struct StaticReconciliationSource {
    terms: HashMap<String, ContractTerms>,
    volumes: HashMap<PeriodKey, Amount>,
    accruals: HashMap<PeriodKey, Amount>,
    item_matches: HashMap<PeriodKey, ItemMatchStats>,
}

impl StaticReconciliationSource {
    pub fn with_terms(mut self, terms: ContractTerms) -> Self {
        self.terms.insert(terms.contract_id.clone(), terms);
        self
    }

    pub fn with_volume(mut self, contract_id: &str, period: &str, volume: Amount) -> Self {
        self.volumes.insert(period_key(contract_id, period), volume);
        self
    }

    pub fn with_ledger_accrual(mut self, contract_id: &str, period: &str, accrual: Amount) -> Self {
        self.accruals.insert(period_key(contract_id, period), accrual);
        self
    }

    pub fn with_item_matches(
        mut self,
        contract_id: &str,
        period: &str,
        matched: u64,
        total: u64,
    ) -> Self {
        self.item_matches
            .insert(period_key(contract_id, period), ItemMatchStats { matched, total });
        self
    }

    /// Three demo contracts with a mix of clean, borderline and incomplete
    /// reconciliation data.
    pub fn demo() -> Self {
        let tier = |min: i64, rate: Decimal| RebateTier {
            min_volume: Decimal::from(min),
            rate_percent: rate,
        };
        Self::default()
            .with_terms(ContractTerms {
                contract_id: "contract-A".into(),
                tiers: vec![
                    tier(1_000_000, Decimal::from(3)),
                    tier(3_000_000, Decimal::new(45, 1)),
                ],
            })
            .with_volume("contract-A", "Q3 2024", Decimal::from(3_000_000))
            .with_volume("contract-A", "Q4 2024", Decimal::from(2_000_000))
            .with_volume("contract-A", "Q1 2025", Decimal::from(3_000_000))
            .with_ledger_accrual("contract-A", "Q3 2024", Decimal::from(135_000))
            .with_ledger_accrual("contract-A", "Q4 2024", Decimal::from(58_000))
            .with_ledger_accrual("contract-A", "Q1 2025", Decimal::from(135_000))
            .with_item_matches("contract-A", "Q3 2024", 1200, 1200)
            .with_item_matches("contract-A", "Q4 2024", 880, 1000)
            .with_item_matches("contract-A", "Q1 2025", 1180, 1200)
            .with_terms(ContractTerms {
                contract_id: "contract-B".into(),
                tiers: vec![
                    tier(250_000, Decimal::from(2)),
                    tier(750_000, Decimal::new(35, 1)),
                ],
            })
            .with_volume("contract-B", "Q3 2024", Decimal::from(800_000))
            .with_ledger_accrual("contract-B", "Q3 2024", Decimal::from(27_800))
            .with_item_matches("contract-B", "Q3 2024", 455, 480)
            .with_terms(ContractTerms {
                contract_id: "contract-C".into(),
                tiers: vec![tier(500_000, Decimal::new(25, 1))],
            })
            .with_volume("contract-C", "Q3 2024", Decimal::from(300_000))
            .with_item_matches("contract-C", "Q3 2024", 0, 0)
    }
}

#[async_trait]
impl ReconciliationSource for StaticReconciliationSource {
    async fn contract_terms(&self, contract_id: &str) -> Result<ContractTerms, SourceError> {
        self.terms
            .get(contract_id)
            .cloned()
            .ok_or_else(|| SourceError::missing("Contract terms", contract_id))
    }

    async fn purchase_volume(
        &self,
        contract_id: &str,
        period: &str,
    ) -> Result<Amount, SourceError> {
        self.volumes
            .get(&period_key(contract_id, period))
            .copied()
            .ok_or_else(|| {
                SourceError::missing("Purchase volume", format!("{contract_id} {period}"))
            })
    }

    async fn ledger_accrual(&self, contract_id: &str, period: &str) -> Result<Amount, SourceError> {
        self.accruals
            .get(&period_key(contract_id, period))
            .copied()
            .ok_or_else(|| {
                SourceError::missing("Ledger accrual", format!("{contract_id} {period}"))
            })
    }

    async fn item_match_stats(
        &self,
        contract_id: &str,
        period: &str,
    ) -> Result<ItemMatchStats, SourceError> {
        self.item_matches
            .get(&period_key(contract_id, period))
            .copied()
            .ok_or_else(|| {
                SourceError::missing("Line item matches", format!("{contract_id} {period}"))
            })
    }
}

/// Calculations matching [`StaticReconciliationSource::demo`], one per demo
/// contract for Q3 2024.
pub fn demo_calculations(now: Timestamp) -> Vec<RebateCalculation> {
    let calc = |id: &str,
                contract_id: &str,
                expected: Amount,
                actual: Option<Amount>,
                status: CalculationStatus,
                days_ago: i64| {
        let calculated_at = now - chrono::Duration::days(days_ago);
        RebateCalculation {
            id: id.to_string(),
            contract_id: contract_id.to_string(),
            period: "Q3 2024".to_string(),
            expected_amount: expected,
            actual_amount: actual,
            status,
            calculated_at,
            paid_at: None,
            updated_at: calculated_at,
        }
    };
    vec![
        calc(
            "calc-001",
            "contract-A",
            Decimal::new(13_500_000, 2),
            Some(Decimal::new(13_200_000, 2)),
            CalculationStatus::Calculated,
            3,
        ),
        calc(
            "calc-002",
            "contract-B",
            Decimal::new(2_800_000, 2),
            None,
            CalculationStatus::Calculated,
            2,
        ),
        calc(
            "calc-003",
            "contract-C",
            Decimal::new(0, 2),
            None,
            CalculationStatus::Pending,
            1,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{OutcomeStatus, ValidationOutcome};
    use crate::rules::{default_rules, RuleCategory};
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn rule_insert_missing_skips_existing_ids() {
        let repo = InMemoryRuleRepository::default();
        let rules = default_rules(Utc::now());
        assert_eq!(repo.insert_missing(&rules).await.unwrap(), 8);
        assert_eq!(repo.insert_missing(&rules).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rule_save_unknown_returns_false() {
        let repo = InMemoryRuleRepository::default();
        let rule = default_rules(Utc::now()).remove(0);
        assert!(!repo.save(&rule).await.unwrap());
    }

    #[tokio::test]
    async fn calculation_insert_enforces_contract_period_uniqueness() {
        let now = Utc::now();
        let repo = InMemoryCalculationRepository::with_calculations(demo_calculations(now));
        let mut dup = demo_calculations(now).remove(0);
        dup.id = "calc-999".into();
        assert_matches!(repo.insert(&dup).await, Err(CoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn calculation_list_pages_in_calculated_order() {
        let repo = InMemoryCalculationRepository::with_calculations(demo_calculations(Utc::now()));
        let page = repo
            .list(&CalculationFilter::default(), PageRequest::new(Some(1), Some(2)))
            .await
            .unwrap();
        let ids: Vec<_> = page.items.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["calc-001", "calc-002"]);
        assert_eq!((page.total, page.total_pages), (3, 2));

        let past_end = repo
            .list(&CalculationFilter::default(), PageRequest::new(Some(5), Some(2)))
            .await
            .unwrap();
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total, 3);
    }

    #[tokio::test]
    async fn report_list_between_is_half_open() {
        let repo = InMemoryReportRepository::default();
        let base = Utc::now();
        for hours in [0, 1, 2] {
            let at = base + Duration::hours(hours);
            let outcome = ValidationOutcome::new(
                RuleCategory::GeneralLedger,
                OutcomeStatus::Passed,
                "ok",
                at,
            );
            repo.append(&ValidationReport::new("calc-001", vec![outcome], at, "t", 1))
                .await
                .unwrap();
        }
        let selected = repo
            .list_between(Some(base + Duration::hours(1)), Some(base + Duration::hours(2)))
            .await
            .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(repo.list_between(None, None).await.unwrap().len(), 3);
        assert!(repo.history("calc-404").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn demo_source_serves_registered_keys_only() {
        let source = StaticReconciliationSource::demo();
        assert_eq!(
            source.ledger_accrual("contract-A", "Q3 2024").await.unwrap(),
            dec!(135000)
        );
        assert_matches!(
            source.ledger_accrual("contract-C", "Q3 2024").await,
            Err(SourceError::Missing { what: "Ledger accrual", .. })
        );
    }

    #[test]
    fn demo_calculations_match_demo_terms() {
        let calcs = demo_calculations(Utc::now());
        assert_eq!(calcs[0].variance(), Some(dec!(-3000)));
        assert_eq!(calcs[1].expected_amount, dec!(28000));
    }
}
