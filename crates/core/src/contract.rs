//! Contract rebate terms and tiered rebate math.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{round_amount, Amount, EntityId};

/// One row of a contract's tier table: purchases of at least `min_volume`
/// earn `rate_percent` back on the whole period volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebateTier {
    pub min_volume: Amount,
    pub rate_percent: Decimal,
}

/// Rebate terms of a vendor contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractTerms {
    pub contract_id: EntityId,
    pub tiers: Vec<RebateTier>,
}

impl ContractTerms {
    /// Reject tier tables that cannot be applied unambiguously.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.tiers.is_empty() {
            return Err(CoreError::InvalidArgument(format!(
                "Contract {} has no rebate tiers",
                self.contract_id
            )));
        }
        for tier in &self.tiers {
            if tier.min_volume.is_sign_negative() {
                return Err(CoreError::InvalidArgument(format!(
                    "Contract {} has a tier with negative min_volume {}",
                    self.contract_id, tier.min_volume
                )));
            }
            if tier.rate_percent.is_sign_negative() || tier.rate_percent > Decimal::ONE_HUNDRED {
                return Err(CoreError::InvalidArgument(format!(
                    "Contract {} has a tier rate outside 0..=100: {}",
                    self.contract_id, tier.rate_percent
                )));
            }
        }
        let mut thresholds: Vec<_> = self.tiers.iter().map(|t| t.min_volume).collect();
        thresholds.sort();
        thresholds.dedup();
        if thresholds.len() != self.tiers.len() {
            return Err(CoreError::InvalidArgument(format!(
                "Contract {} has duplicate tier thresholds",
                self.contract_id
            )));
        }
        Ok(())
    }

    /// The tier with the greatest threshold not above `volume`.
    pub fn applicable_tier(&self, volume: Amount) -> Option<&RebateTier> {
        self.tiers
            .iter()
            .filter(|t| t.min_volume <= volume)
            .max_by(|a, b| a.min_volume.cmp(&b.min_volume))
    }

    /// Rebate earned on `volume`, rounded to minor units. Zero when the
    /// volume does not reach the first tier.
    pub fn rebate_for(&self, volume: Amount) -> Amount {
        match self.applicable_tier(volume) {
            Some(tier) => round_amount(volume * tier.rate_percent / Decimal::ONE_HUNDRED),
            None => Decimal::ZERO,
        }
    }
}
