/// Rules, calculations, reports and outcomes are keyed by opaque string ids
/// (`gl-001`, `calc-001`, ...).
pub type EntityId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Monetary amounts, stored with currency minor-unit precision.
pub type Amount = rust_decimal::Decimal;

/// Number of decimal places kept on every stored amount.
pub const AMOUNT_SCALE: u32 = 2;

/// Round an amount to currency minor-unit precision (banker's rounding).
pub fn round_amount(amount: Amount) -> Amount {
    amount.round_dp(AMOUNT_SCALE)
}

/// Generate a new prefixed id, e.g. `calc-0190f1d2-...`.
pub fn new_id(prefix: &str) -> EntityId {
    format!("{prefix}-{}", uuid::Uuid::now_v7())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn round_amount_keeps_two_places() {
        assert_eq!(round_amount(dec!(10.005)), dec!(10.00));
        assert_eq!(round_amount(dec!(10.015)), dec!(10.02));
        assert_eq!(round_amount(dec!(135000)), dec!(135000));
    }

    #[test]
    fn new_id_is_prefixed_and_unique() {
        let a = new_id("calc");
        let b = new_id("calc");
        assert!(a.starts_with("calc-"));
        assert_ne!(a, b);
    }
}
