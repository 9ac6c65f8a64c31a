//! Marketplace fee split.

use serde::{Deserialize, Serialize};

use crate::money::{FeePercentage, Money};

/// Gross amount of an order split into the marketplace fee and the store's
/// earnings.
///
/// `admin_fee + store_earnings == amount` holds exactly for every split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub amount: Money,
    pub admin_fee: Money,
    pub store_earnings: Money,
}

impl FeeSplit {
    /// Computes the split of `gross` at the given fee percentage.
    ///
    /// The fee is rounded half-up to the cent; earnings take the remainder.
    pub fn compute(gross: Money, percentage: FeePercentage) -> Self {
        let admin_fee = Money::from_cents(fee_cents(gross.cents(), percentage.basis_points()));
        Self {
            amount: gross,
            admin_fee,
            store_earnings: gross - admin_fee,
        }
    }
}

fn fee_cents(gross_cents: i64, basis_points: u32) -> i64 {
    let scaled = i128::from(gross_cents) * i128::from(basis_points);
    let magnitude = (scaled.abs() + 5_000) / 10_000;
    // |fee| <= |gross| because basis_points <= 10_000, so the cast is lossless.
    let fee = magnitude as i64;
    if scaled < 0 { -fee } else { fee }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(bp: u32) -> FeePercentage {
        FeePercentage::from_basis_points(bp).unwrap()
    }

    #[test]
    fn test_ten_percent_of_twenty() {
        let split = FeeSplit::compute(Money::from_cents(2000), FeePercentage::DEFAULT);
        assert_eq!(split.admin_fee, Money::from_cents(200));
        assert_eq!(split.store_earnings, Money::from_cents(1800));
    }

    #[test]
    fn test_rounds_half_up() {
        // 12.5% of 0.20 = 0.025 -> 0.03
        let split = FeeSplit::compute(Money::from_cents(20), pct(1250));
        assert_eq!(split.admin_fee, Money::from_cents(3));
        assert_eq!(split.store_earnings, Money::from_cents(17));

        // 10% of 0.14 = 0.014 -> 0.01
        let split = FeeSplit::compute(Money::from_cents(14), pct(1000));
        assert_eq!(split.admin_fee, Money::from_cents(1));
    }

    #[test]
    fn test_zero_and_full_fee() {
        let gross = Money::from_cents(9999);
        let none = FeeSplit::compute(gross, pct(0));
        assert_eq!(none.admin_fee, Money::zero());
        assert_eq!(none.store_earnings, gross);

        let all = FeeSplit::compute(gross, pct(10_000));
        assert_eq!(all.admin_fee, gross);
        assert_eq!(all.store_earnings, Money::zero());
    }

    #[test]
    fn test_parts_always_sum_to_amount() {
        let amounts = [0, 1, 3, 7, 99, 1001, 12_345, 999_999_99];
        for bp in (0..=10_000).step_by(37) {
            for cents in amounts {
                let split = FeeSplit::compute(Money::from_cents(cents), pct(bp));
                assert_eq!(
                    split.admin_fee + split.store_earnings,
                    split.amount,
                    "bp={bp} cents={cents}"
                );
                assert!(!split.admin_fee.is_negative());
                assert!(!split.store_earnings.is_negative());
            }
        }
    }
}
