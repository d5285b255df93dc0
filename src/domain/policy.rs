//! Interest accrual policy
//!
//! Capped growth: an account earns `rate` of its balance per accrual, but
//! only while the credited balance stays within `multiplier` times the
//! balance it was opened with.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Accrual constants, configurable so tests can run alternate policies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterestPolicy {
    /// Fraction of the balance credited per accrual (0.05 = 5%)
    pub rate: Decimal,
    /// Cap on the balance, relative to the initial balance
    pub limit_multiplier: Decimal,
    /// Decimal places the accrual is rounded to (banker's rounding)
    pub scale: u32,
}

impl Default for InterestPolicy {
    fn default() -> Self {
        Self {
            rate: Decimal::new(5, 2),
            limit_multiplier: Decimal::new(207, 2),
            scale: 2,
        }
    }
}

impl InterestPolicy {
    pub fn new(rate: Decimal, limit_multiplier: Decimal, scale: u32) -> Self {
        Self {
            rate,
            limit_multiplier,
            scale,
        }
    }

    /// Upper bound the balance may reach through accrual
    pub fn limit(&self, initial_balance: Decimal) -> Decimal {
        initial_balance * self.limit_multiplier
    }

    /// Interest on `balance`, rounded to the policy scale
    pub fn accrual(&self, balance: Decimal) -> Decimal {
        (balance * self.rate).round_dp_with_strategy(self.scale, RoundingStrategy::MidpointNearestEven)
    }

    /// Amount to credit, or `None` when the account does not qualify.
    ///
    /// Qualifies when the balance is positive, the rounded accrual is
    /// positive, and `balance + accrual` does not exceed the limit.
    pub fn accrual_for(&self, balance: Decimal, initial_balance: Decimal) -> Option<Decimal> {
        if balance <= Decimal::ZERO {
            return None;
        }
        let accrual = self.accrual(balance);
        if accrual <= Decimal::ZERO {
            return None;
        }
        if balance + accrual > self.limit(initial_balance) {
            return None;
        }
        Some(accrual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_policy() {
        let policy = InterestPolicy::default();
        assert_eq!(policy.rate, dec!(0.05));
        assert_eq!(policy.limit_multiplier, dec!(2.07));
        assert_eq!(policy.scale, 2);
    }

    #[test]
    fn test_first_accrual_on_opening_balance() {
        let policy = InterestPolicy::default();
        assert_eq!(policy.accrual_for(dec!(1000), dec!(1000)), Some(dec!(50.00)));
        assert_eq!(policy.limit(dec!(1000)), dec!(2070));
    }

    #[test]
    fn test_accrual_rounds_half_even() {
        let policy = InterestPolicy::default();
        // 1157.625 * 0.05 = 57.88125
        assert_eq!(policy.accrual(dec!(1157.625)), dec!(57.88));
        // 0.5 * 0.05 = 0.025 -> 0.02
        assert_eq!(policy.accrual(dec!(0.5)), dec!(0.02));
    }

    #[test]
    fn test_accrual_refused_past_limit() {
        let policy = InterestPolicy::default();
        // 2000 + 100 = 2100 > 2070
        assert_eq!(policy.accrual_for(dec!(2000), dec!(1000)), None);
        // 1970 + 98.50 = 2068.50 <= 2070
        assert_eq!(policy.accrual_for(dec!(1970), dec!(1000)), Some(dec!(98.50)));
    }

    #[test]
    fn test_accrual_refused_for_empty_or_dust_balance() {
        let policy = InterestPolicy::default();
        assert_eq!(policy.accrual_for(Decimal::ZERO, dec!(1000)), None);
        // 0.01 * 0.05 rounds to zero
        assert_eq!(policy.accrual_for(dec!(0.01), dec!(1000)), None);
    }

    #[test]
    fn test_custom_policy() {
        let policy = InterestPolicy::new(dec!(0.10), dec!(1.5), 2);
        assert_eq!(policy.accrual_for(dec!(100), dec!(100)), Some(dec!(10.00)));
        assert_eq!(policy.accrual_for(dec!(140), dec!(100)), None);
    }
}
