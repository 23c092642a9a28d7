//! Metrics aggregation over validation report history.
//!
//! [`summarize`] is a pure function of its inputs: the same reports in the
//! same order always produce the same [`MetricsSummary`].

use std::collections::{BTreeMap, HashMap};

use chrono::{Days, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::error::CoreError;
use crate::report::{OutcomeStatus, ValidationReport};
use crate::rules::RuleCategory;
use crate::types::Timestamp;

/// Default length of the `common_failures` ranking.
pub const DEFAULT_TOP_FAILURES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total_validations_run: u64,
    /// Percentage of reports whose overall status is `passed`.
    pub success_rate: f64,
    /// Mean execution time in milliseconds.
    pub average_execution_time: f64,
    pub common_failures: Vec<FailureCount>,
    pub trend_data: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureCount {
    pub validation_type: RuleCategory,
    pub count: u64,
}

/// Outcome counts for one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub passed: u64,
    pub failed: u64,
    pub warning: u64,
}

pub fn summarize(reports: &[ValidationReport], top_n: usize) -> MetricsSummary {
    let total = reports.len() as u64;
    if total == 0 {
        return MetricsSummary {
            total_validations_run: 0,
            success_rate: 0.0,
            average_execution_time: 0.0,
            common_failures: Vec::new(),
            trend_data: Vec::new(),
        };
    }

    let passed_reports = reports
        .iter()
        .filter(|r| r.overall_status() == OutcomeStatus::Passed)
        .count() as f64;
    let total_execution: f64 = reports.iter().map(|r| r.execution_time_ms() as f64).sum();

    let mut failures: HashMap<RuleCategory, u64> = HashMap::new();
    let mut trend: BTreeMap<NaiveDate, TrendPoint> = BTreeMap::new();
    for report in reports {
        let date = report.validated_at().date_naive();
        let point = trend.entry(date).or_insert_with(|| TrendPoint {
            date,
            passed: 0,
            failed: 0,
            warning: 0,
        });
        for outcome in report.validations() {
            match outcome.status {
                OutcomeStatus::Passed => point.passed += 1,
                OutcomeStatus::Warning => point.warning += 1,
                OutcomeStatus::Failed => {
                    point.failed += 1;
                    *failures.entry(outcome.validation_type).or_default() += 1;
                }
            }
        }
    }

    let mut common_failures: Vec<FailureCount> = failures
        .into_iter()
        .map(|(validation_type, count)| FailureCount {
            validation_type,
            count,
        })
        .collect();
    common_failures.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.validation_type.as_str().cmp(b.validation_type.as_str()))
    });
    common_failures.truncate(top_n);

    MetricsSummary {
        total_validations_run: total,
        success_rate: passed_reports / total as f64 * 100.0,
        average_execution_time: total_execution / total as f64,
        common_failures,
        trend_data: trend.into_values().collect(),
    }
}

/// Inclusive calendar-day range used to select reports for a summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self, CoreError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(CoreError::InvalidArgument(format!(
                    "Date range start {from} is after end {to}"
                )));
            }
        }
        Ok(Self { from, to })
    }

    /// Half-open UTC bounds `[since, until)` covering the whole of both
    /// end days.
    pub fn bounds(&self) -> (Option<Timestamp>, Option<Timestamp>) {
        let start_of = |d: NaiveDate| Utc.from_utc_datetime(&d.and_time(chrono::NaiveTime::MIN));
        let since = self.from.map(start_of);
        let until = self
            .to
            .and_then(|d| d.checked_add_days(Days::new(1)))
            .map(start_of);
        (since, until)
    }
}
