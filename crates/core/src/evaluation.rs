//! Per-category evaluation: pure comparison functions plus the thresholds
//! that drive them.
//!
//! Every function here is deterministic given its inputs. External lookups
//! happen in the engine; these functions only compare numbers.

use rust_decimal::Decimal;

use crate::contract::ContractTerms;
use crate::report::OutcomeStatus;
use crate::source::ItemMatchStats;
use crate::types::Amount;

/// A `(status, details)` pair produced by one category check.
pub type CategoryVerdict = (OutcomeStatus, String);

/// Thresholds used by the category checks.
///
/// Tolerances are percentages of the expected amount; match ratios are
/// fractions in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationConfig {
    pub ledger_pass_tolerance_pct: Decimal,
    pub ledger_warn_tolerance_pct: Decimal,
    pub terms_pass_tolerance_pct: Decimal,
    pub terms_warn_tolerance_pct: Decimal,
    pub item_match_pass_ratio: f64,
    pub item_match_warn_ratio: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            ledger_pass_tolerance_pct: Decimal::new(5, 1),
            ledger_warn_tolerance_pct: Decimal::new(2, 0),
            terms_pass_tolerance_pct: Decimal::new(1, 1),
            terms_warn_tolerance_pct: Decimal::new(1, 0),
            item_match_pass_ratio: 0.98,
            item_match_warn_ratio: 0.90,
        }
    }
}

/// Classify the gap between `actual` and `reference` against a percentage
/// band of `reference`. A zero reference only passes on an exact match.
fn classify_gap(
    actual: Amount,
    reference: Amount,
    pass_pct: Decimal,
    warn_pct: Decimal,
) -> (OutcomeStatus, Amount) {
    let diff = actual - reference;
    let gap = diff.abs();
    let base = reference.abs();
    let pass_band = base * pass_pct / Decimal::ONE_HUNDRED;
    let warn_band = base * warn_pct / Decimal::ONE_HUNDRED;
    let status = if gap <= pass_band {
        OutcomeStatus::Passed
    } else if gap <= warn_band {
        OutcomeStatus::Warning
    } else {
        OutcomeStatus::Failed
    };
    (status, diff)
}

/// Compare the general-ledger accrual with the expected rebate.
pub fn evaluate_general_ledger(
    expected: Amount,
    ledger_accrual: Amount,
    config: &EvaluationConfig,
) -> CategoryVerdict {
    let (status, diff) = classify_gap(
        ledger_accrual,
        expected,
        config.ledger_pass_tolerance_pct,
        config.ledger_warn_tolerance_pct,
    );
    let details = match status {
        OutcomeStatus::Passed => format!(
            "Ledger accrual {ledger_accrual} matches expected rebate {expected} (difference {diff})"
        ),
        OutcomeStatus::Warning => format!(
            "Ledger accrual {ledger_accrual} differs from expected rebate {expected} by {diff}, within the {}% review band",
            config.ledger_warn_tolerance_pct
        ),
        OutcomeStatus::Failed => format!(
            "Ledger accrual {ledger_accrual} differs from expected rebate {expected} by {diff}, outside the {}% tolerance",
            config.ledger_warn_tolerance_pct
        ),
    };
    (status, details)
}

/// Recompute the tiered rebate from contract terms and compare it with the
/// expected rebate on the calculation.
pub fn evaluate_contract_terms(
    expected: Amount,
    terms: &ContractTerms,
    purchase_volume: Amount,
    config: &EvaluationConfig,
) -> CategoryVerdict {
    let Some(tier) = terms.applicable_tier(purchase_volume) else {
        return if expected.is_zero() {
            (
                OutcomeStatus::Passed,
                format!("Purchase volume {purchase_volume} is below the first tier; no rebate due"),
            )
        } else {
            (
                OutcomeStatus::Failed,
                format!(
                    "Purchase volume {purchase_volume} does not reach any tier but {expected} was calculated"
                ),
            )
        };
    };

    let contracted = terms.rebate_for(purchase_volume);
    let (status, diff) = classify_gap(
        expected,
        contracted,
        config.terms_pass_tolerance_pct,
        config.terms_warn_tolerance_pct,
    );
    let details = match status {
        OutcomeStatus::Passed => format!(
            "Volume {purchase_volume} qualifies for the {}% tier (min {}); contracted rebate {contracted} matches",
            tier.rate_percent, tier.min_volume
        ),
        _ => format!(
            "Volume {purchase_volume} qualifies for the {}% tier (min {}); contracted rebate {contracted} differs from calculated {expected} by {diff}",
            tier.rate_percent, tier.min_volume
        ),
    };
    (status, details)
}

/// Check the share of invoice line items matched to contract items.
pub fn evaluate_item_matching(stats: ItemMatchStats, config: &EvaluationConfig) -> CategoryVerdict {
    if stats.total == 0 {
        return (
            OutcomeStatus::Warning,
            "No invoice line items recorded for this period".to_string(),
        );
    }
    if stats.matched > stats.total {
        return (
            OutcomeStatus::Failed,
            format!(
                "Inconsistent match data: {} matched of {} line items",
                stats.matched, stats.total
            ),
        );
    }
    let ratio = stats.matched as f64 / stats.total as f64;
    let status = if ratio >= config.item_match_pass_ratio {
        OutcomeStatus::Passed
    } else if ratio >= config.item_match_warn_ratio {
        OutcomeStatus::Warning
    } else {
        OutcomeStatus::Failed
    };
    let details = format!(
        "{} of {} line items matched ({:.1}%), {} unmatched",
        stats.matched,
        stats.total,
        ratio * 100.0,
        stats.total - stats.matched
    );
    (status, details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::RebateTier;
    use rust_decimal_macros::dec;

    fn config() -> EvaluationConfig {
        EvaluationConfig::default()
    }

    fn terms() -> ContractTerms {
        ContractTerms {
            contract_id: "contract-A".into(),
            tiers: vec![
                RebateTier {
                    min_volume: dec!(1000000),
                    rate_percent: dec!(3),
                },
                RebateTier {
                    min_volume: dec!(3000000),
                    rate_percent: dec!(4.5),
                },
            ],
        }
    }

    // -- general ledger -------------------------------------------------------

    #[test]
    fn ledger_exact_match_passes() {
        let (status, _) = evaluate_general_ledger(dec!(135000), dec!(135000), &config());
        assert_eq!(status, OutcomeStatus::Passed);
    }

    #[test]
    fn ledger_at_pass_band_edge_passes() {
        // 0.5% of 135000 = 675
        let (status, _) = evaluate_general_ledger(dec!(135000), dec!(134325), &config());
        assert_eq!(status, OutcomeStatus::Passed);
    }

    #[test]
    fn ledger_within_review_band_warns() {
        let (status, details) = evaluate_general_ledger(dec!(135000), dec!(133000), &config());
        assert_eq!(status, OutcomeStatus::Warning);
        assert!(details.contains("-2000"));
    }

    #[test]
    fn ledger_outside_tolerance_fails() {
        let (status, _) = evaluate_general_ledger(dec!(135000), dec!(100000), &config());
        assert_eq!(status, OutcomeStatus::Failed);
    }

    #[test]
    fn zero_expected_requires_zero_accrual() {
        assert_eq!(
            evaluate_general_ledger(dec!(0), dec!(0), &config()).0,
            OutcomeStatus::Passed
        );
        assert_eq!(
            evaluate_general_ledger(dec!(0), dec!(0.01), &config()).0,
            OutcomeStatus::Failed
        );
    }

    // -- contract terms -------------------------------------------------------

    #[test]
    fn terms_match_passes() {
        let (status, details) =
            evaluate_contract_terms(dec!(135000), &terms(), dec!(3000000), &config());
        assert_eq!(status, OutcomeStatus::Passed);
        assert!(details.contains("4.5% tier"));
    }

    #[test]
    fn terms_wrong_tier_fails() {
        // Calculated at 3% but the volume qualifies for 4.5%.
        let (status, _) = evaluate_contract_terms(dec!(90000), &terms(), dec!(3000000), &config());
        assert_eq!(status, OutcomeStatus::Failed);
    }

    #[test]
    fn terms_small_rounding_gap_warns() {
        // 0.5% off: beyond the 0.1% pass band, inside the 1% warn band.
        let (status, _) = evaluate_contract_terms(dec!(134325), &terms(), dec!(3000000), &config());
        assert_eq!(status, OutcomeStatus::Warning);
    }

    #[test]
    fn below_first_tier_with_nonzero_expected_fails() {
        let (status, _) = evaluate_contract_terms(dec!(500), &terms(), dec!(10000), &config());
        assert_eq!(status, OutcomeStatus::Failed);
        let (status, _) = evaluate_contract_terms(dec!(0), &terms(), dec!(10000), &config());
        assert_eq!(status, OutcomeStatus::Passed);
    }

    // -- item matching --------------------------------------------------------

    #[test]
    fn item_match_ratios_classified() {
        let c = config();
        let eval = |matched, total| evaluate_item_matching(ItemMatchStats { matched, total }, &c).0;
        assert_eq!(eval(98, 100), OutcomeStatus::Passed);
        assert_eq!(eval(95, 100), OutcomeStatus::Warning);
        assert_eq!(eval(90, 100), OutcomeStatus::Warning);
        assert_eq!(eval(89, 100), OutcomeStatus::Failed);
    }

    #[test]
    fn no_line_items_warns() {
        let stats = ItemMatchStats { matched: 0, total: 0 };
        let (status, _) = evaluate_item_matching(stats, &config());
        assert_eq!(status, OutcomeStatus::Warning);
    }

    #[test]
    fn more_matched_than_total_fails() {
        let stats = ItemMatchStats { matched: 5, total: 4 };
        let (status, _) = evaluate_item_matching(stats, &config());
        assert_eq!(status, OutcomeStatus::Failed);
    }

    #[test]
    fn item_match_details_report_unmatched() {
        let (_, details) =
            evaluate_item_matching(ItemMatchStats { matched: 1180, total: 1200 }, &config());
        assert_eq!(details, "1180 of 1200 line items matched (98.3%), 20 unmatched");
    }
}
