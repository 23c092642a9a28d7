//! Validation outcomes and reports.
//!
//! A [`ValidationReport`] is built once from its outcomes and never changes
//! afterwards. Its counts are tallied from the outcome list at construction
//! and its overall status is derived from those counts on every read.

use async_trait::async_trait;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::CoreError;
use crate::rules::RuleCategory;
use crate::types::{new_id, EntityId, Timestamp};

// ---------------------------------------------------------------------------
// OutcomeStatus
// ---------------------------------------------------------------------------

/// Result of one check. Variant order is severity order, worst last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Passed,
    Warning,
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Passed => "passed",
            OutcomeStatus::Warning => "warning",
            OutcomeStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "passed" => Ok(OutcomeStatus::Passed),
            "warning" => Ok(OutcomeStatus::Warning),
            "failed" => Ok(OutcomeStatus::Failed),
            other => Err(CoreError::InvalidArgument(format!(
                "Unknown outcome status: '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationOutcome
// ---------------------------------------------------------------------------

/// One category's result within a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub id: EntityId,
    pub validation_type: RuleCategory,
    pub status: OutcomeStatus,
    pub details: String,
    pub validated_at: Timestamp,
}

impl ValidationOutcome {
    pub fn new(
        validation_type: RuleCategory,
        status: OutcomeStatus,
        details: impl Into<String>,
        validated_at: Timestamp,
    ) -> Self {
        Self {
            id: new_id("vo"),
            validation_type,
            status,
            details: details.into(),
            validated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckCounts {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub warning: u32,
}

impl CheckCounts {
    pub fn tally<'a>(statuses: impl IntoIterator<Item = &'a OutcomeStatus>) -> Self {
        let mut counts = CheckCounts::default();
        for status in statuses {
            counts.total += 1;
            match status {
                OutcomeStatus::Passed => counts.passed += 1,
                OutcomeStatus::Failed => counts.failed += 1,
                OutcomeStatus::Warning => counts.warning += 1,
            }
        }
        counts
    }

    /// Worst-case aggregate: failed if anything failed, else warning if
    /// anything warned, else passed.
    pub fn overall_status(&self) -> OutcomeStatus {
        if self.failed > 0 {
            OutcomeStatus::Failed
        } else if self.warning > 0 {
            OutcomeStatus::Warning
        } else {
            OutcomeStatus::Passed
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    id: EntityId,
    rebate_calculation_id: EntityId,
    counts: CheckCounts,
    validations: Vec<ValidationOutcome>,
    validated_at: Timestamp,
    validated_by: String,
    execution_time_ms: u64,
}

impl ValidationReport {
    /// Build a new report, tallying counts from `validations`.
    pub fn new(
        rebate_calculation_id: impl Into<EntityId>,
        validations: Vec<ValidationOutcome>,
        validated_at: Timestamp,
        validated_by: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self::restore(
            new_id("vr"),
            rebate_calculation_id,
            validations,
            validated_at,
            validated_by,
            execution_time_ms,
        )
    }

    /// Rebuild a stored report. Counts are re-tallied from the outcomes
    /// rather than trusted from storage.
    pub fn restore(
        id: impl Into<EntityId>,
        rebate_calculation_id: impl Into<EntityId>,
        validations: Vec<ValidationOutcome>,
        validated_at: Timestamp,
        validated_by: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        let counts = CheckCounts::tally(validations.iter().map(|v| &v.status));
        Self {
            id: id.into(),
            rebate_calculation_id: rebate_calculation_id.into(),
            counts,
            validations,
            validated_at,
            validated_by: validated_by.into(),
            execution_time_ms,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rebate_calculation_id(&self) -> &str {
        &self.rebate_calculation_id
    }

    pub fn counts(&self) -> CheckCounts {
        self.counts
    }

    pub fn total_checks(&self) -> u32 {
        self.counts.total
    }

    pub fn passed_checks(&self) -> u32 {
        self.counts.passed
    }

    pub fn failed_checks(&self) -> u32 {
        self.counts.failed
    }

    pub fn warning_checks(&self) -> u32 {
        self.counts.warning
    }

    pub fn overall_status(&self) -> OutcomeStatus {
        self.counts.overall_status()
    }

    pub fn validations(&self) -> &[ValidationOutcome] {
        &self.validations
    }

    pub fn validated_at(&self) -> Timestamp {
        self.validated_at
    }

    pub fn validated_by(&self) -> &str {
        &self.validated_by
    }

    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time_ms
    }
}

impl Serialize for ValidationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ValidationReport", 11)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("rebate_calculation_id", &self.rebate_calculation_id)?;
        s.serialize_field("total_checks", &self.counts.total)?;
        s.serialize_field("passed_checks", &self.counts.passed)?;
        s.serialize_field("failed_checks", &self.counts.failed)?;
        s.serialize_field("warning_checks", &self.counts.warning)?;
        s.serialize_field("overall_status", &self.overall_status())?;
        s.serialize_field("validations", &self.validations)?;
        s.serialize_field("validated_at", &self.validated_at)?;
        s.serialize_field("validated_by", &self.validated_by)?;
        s.serialize_field("execution_time", &self.execution_time_ms)?;
        s.end()
    }
}

// ---------------------------------------------------------------------------
// Storage seam
// ---------------------------------------------------------------------------

/// Append-only report history.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Append a report (and its outcomes) atomically.
    async fn append(&self, report: &ValidationReport) -> Result<(), CoreError>;

    /// Reports for one calculation in insertion order.
    async fn history(&self, calculation_id: &str) -> Result<Vec<ValidationReport>, CoreError>;

    /// Reports with `since <= validated_at < until` (either bound optional),
    /// ordered by `validated_at`.
    async fn list_between(
        &self,
        since: Option<Timestamp>,
        until: Option<Timestamp>,
    ) -> Result<Vec<ValidationReport>, CoreError>;
}
