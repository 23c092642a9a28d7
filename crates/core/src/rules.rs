//! Validation rule types, default rule set, and the rule storage seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// RuleCategory
// ---------------------------------------------------------------------------

/// The three domains of cross-checks applied to a rebate calculation.
///
/// Variant order is the evaluation and reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    GeneralLedger,
    ContractTerms,
    ItemMatching,
}

impl RuleCategory {
    pub const ALL: [RuleCategory; 3] = [
        RuleCategory::GeneralLedger,
        RuleCategory::ContractTerms,
        RuleCategory::ItemMatching,
    ];

    /// String representation for database storage and wire formats.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::GeneralLedger => "general_ledger",
            RuleCategory::ContractTerms => "contract_terms",
            RuleCategory::ItemMatching => "item_matching",
        }
    }

    /// Parse from the storage representation.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "general_ledger" => Ok(RuleCategory::GeneralLedger),
            "contract_terms" => Ok(RuleCategory::ContractTerms),
            "item_matching" => Ok(RuleCategory::ItemMatching),
            other => Err(CoreError::InvalidArgument(format!(
                "Unknown rule category: '{other}'. Valid categories: general_ledger, contract_terms, item_matching"
            ))),
        }
    }
}

impl std::fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RuleSeverity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    Error,
    Warning,
    Info,
}

impl RuleSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSeverity::Error => "error",
            RuleSeverity::Warning => "warning",
            RuleSeverity::Info => "info",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "error" => Ok(RuleSeverity::Error),
            "warning" => Ok(RuleSeverity::Warning),
            "info" => Ok(RuleSeverity::Info),
            other => Err(CoreError::InvalidArgument(format!(
                "Unknown rule severity: '{other}'. Valid severities: error, warning, info"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationRule
// ---------------------------------------------------------------------------

/// A single cross-check definition held by the rule registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub id: EntityId,
    pub name: String,
    pub category: RuleCategory,
    pub description: String,
    pub severity: RuleSeverity,
    pub enabled: bool,
    pub updated_at: Timestamp,
}

/// Editable rule attributes. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleEdit {
    pub name: Option<String>,
    pub description: Option<String>,
    pub severity: Option<RuleSeverity>,
}

impl RuleEdit {
    /// Reject edits that would leave a rule without a name.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(CoreError::InvalidArgument(
                    "Rule name must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Apply the edit to `rule`, stamping `updated_at`.
    pub fn apply(&self, rule: &mut ValidationRule, now: Timestamp) {
        if let Some(name) = &self.name {
            rule.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            rule.description = description.clone();
        }
        if let Some(severity) = self.severity {
            rule.severity = severity;
        }
        rule.updated_at = now;
    }
}

/// Sort rules into the registry's stable listing order: category, then name,
/// then id.
pub fn sort_rules(rules: &mut [ValidationRule]) {
    rules.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

// ---------------------------------------------------------------------------
// Default rule set
// ---------------------------------------------------------------------------

struct DefaultRule {
    id: &'static str,
    name: &'static str,
    category: RuleCategory,
    description: &'static str,
    severity: RuleSeverity,
}

const DEFAULT_RULES: &[DefaultRule] = &[
    DefaultRule {
        id: "gl-001",
        name: "GL Account Balance Check",
        category: RuleCategory::GeneralLedger,
        description: "Rebate accrual posted to the general ledger matches the expected rebate",
        severity: RuleSeverity::Error,
    },
    DefaultRule {
        id: "gl-002",
        name: "GL Period Alignment",
        category: RuleCategory::GeneralLedger,
        description: "Ledger accrual is booked against the same reporting period",
        severity: RuleSeverity::Warning,
    },
    DefaultRule {
        id: "gl-003",
        name: "GL Accrual Completeness",
        category: RuleCategory::GeneralLedger,
        description: "Every calculated rebate has a corresponding ledger accrual",
        severity: RuleSeverity::Error,
    },
    DefaultRule {
        id: "ct-001",
        name: "Tier Threshold Compliance",
        category: RuleCategory::ContractTerms,
        description: "Purchase volume qualifies for the tier used in the calculation",
        severity: RuleSeverity::Error,
    },
    DefaultRule {
        id: "ct-002",
        name: "Rebate Rate Verification",
        category: RuleCategory::ContractTerms,
        description: "Applied rebate rate matches the contracted tier rate",
        severity: RuleSeverity::Error,
    },
    DefaultRule {
        id: "ct-003",
        name: "Contract Effective Dates",
        category: RuleCategory::ContractTerms,
        description: "Calculation period falls within the contract term",
        severity: RuleSeverity::Warning,
    },
    DefaultRule {
        id: "im-001",
        name: "Line Item Match Rate",
        category: RuleCategory::ItemMatching,
        description: "Invoice line items are matched to contract catalogue items",
        severity: RuleSeverity::Warning,
    },
    DefaultRule {
        id: "im-002",
        name: "Unmatched Item Review",
        category: RuleCategory::ItemMatching,
        description: "Unmatched line items are flagged for manual review",
        severity: RuleSeverity::Info,
    },
];

/// The rule set seeded into an empty registry, all enabled.
pub fn default_rules(now: Timestamp) -> Vec<ValidationRule> {
    DEFAULT_RULES
        .iter()
        .map(|r| ValidationRule {
            id: r.id.to_string(),
            name: r.name.to_string(),
            category: r.category,
            description: r.description.to_string(),
            severity: r.severity,
            enabled: true,
            updated_at: now,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Storage seam
// ---------------------------------------------------------------------------

/// Durable storage for validation rules.
///
/// Rules are never deleted; `save` replaces an existing rule with the same id.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// All rules, in any order.
    async fn list(&self) -> Result<Vec<ValidationRule>, CoreError>;

    async fn find(&self, id: &str) -> Result<Option<ValidationRule>, CoreError>;

    /// Insert the rules whose ids are not yet present. Returns how many were
    /// inserted.
    async fn insert_missing(&self, rules: &[ValidationRule]) -> Result<usize, CoreError>;

    /// Persist an updated rule. Returns `false` if no rule with that id exists.
    async fn save(&self, rule: &ValidationRule) -> Result<bool, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn category_round_trips_through_storage_string() {
        for category in RuleCategory::ALL {
            assert_eq!(RuleCategory::parse(category.as_str()).unwrap(), category);
        }
    }

    #[test]
    fn unknown_category_rejected() {
        assert_matches!(
            RuleCategory::parse("freight"),
            Err(CoreError::InvalidArgument(_))
        );
    }

    #[test]
    fn category_serializes_snake_case() {
        let json = serde_json::to_string(&RuleCategory::GeneralLedger).unwrap();
        assert_eq!(json, "\"general_ledger\"");
    }

    #[test]
    fn default_rules_cover_every_category_with_unique_ids() {
        let rules = default_rules(chrono::Utc::now());
        assert_eq!(rules.len(), 8);
        let mut ids: Vec<_> = rules.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
        for category in RuleCategory::ALL {
            assert!(rules.iter().any(|r| r.category == category));
        }
        assert!(rules.iter().all(|r| r.enabled));
    }

    #[test]
    fn sort_orders_by_category_then_name() {
        let mut rules = default_rules(chrono::Utc::now());
        rules.reverse();
        sort_rules(&mut rules);
        let ids: Vec<_> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["gl-001", "gl-003", "gl-002", "ct-003", "ct-002", "ct-001", "im-001", "im-002"]
        );
    }

    #[test]
    fn blank_name_edit_rejected() {
        let edit = RuleEdit {
            name: Some("   ".into()),
            ..Default::default()
        };
        assert_matches!(edit.validate(), Err(CoreError::InvalidArgument(_)));
    }

    #[test]
    fn edit_only_touches_given_fields() {
        let now = chrono::Utc::now();
        let mut rule = default_rules(now).remove(0);
        let edit = RuleEdit {
            severity: Some(RuleSeverity::Warning),
            ..Default::default()
        };
        edit.apply(&mut rule, now);
        assert_eq!(rule.severity, RuleSeverity::Warning);
        assert_eq!(rule.name, "GL Account Balance Check");
    }
}
