use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Commission rates are expressed in basis points. 10,000 bps = 100%.
pub const BASIS_POINTS_DENOMINATOR: i64 = 10_000;

//--------------------------------------     MoneyCents       --------------------------------------------------------
/// A monetary amount in integer cents.
///
/// The value is signed: standard payouts are non-negative, while clawback payouts carry negative
/// amounts. All rounding in rate and proration arithmetic is half-away-from-zero.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct MoneyCents(i64);

op!(binary MoneyCents, Add, add);
op!(binary MoneyCents, Sub, sub);
op!(inplace MoneyCents, SubAssign, sub_assign);
op!(unary MoneyCents, Neg, neg);

impl Mul<i64> for MoneyCents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for MoneyCents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for MoneyCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for MoneyCents {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for MoneyCents {}

impl TryFrom<u64> for MoneyCents {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {} is too large to convert to MoneyCents", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for MoneyCents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", cents / 100, cents % 100)
    }
}

/// Integer division rounded half-away-from-zero. `d` must be positive.
fn div_round(n: i128, d: i128) -> i64 {
    let half = d / 2;
    let rounded = if n >= 0 { (n + half) / d } else { (n - half) / d };
    rounded as i64
}

impl MoneyCents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// The share of this amount described by `rate_bps` basis points, rounded.
    pub fn basis_points(&self, rate_bps: i64) -> Self {
        let n = i128::from(self.0) * i128::from(rate_bps);
        Self(div_round(n, i128::from(BASIS_POINTS_DENOMINATOR)))
    }

    /// This amount less the `rate_bps` share, i.e. what remains after the platform takes its cut.
    pub fn less_basis_points(&self, rate_bps: i64) -> Self {
        *self - self.basis_points(rate_bps)
    }

    /// Scales this amount by the ratio `numerator / denominator`, rounded. A zero or negative
    /// denominator yields zero, since no meaningful ratio exists.
    pub fn prorated_by(&self, numerator: MoneyCents, denominator: MoneyCents) -> Self {
        if denominator.0 <= 0 {
            return Self(0);
        }
        let n = i128::from(self.0) * i128::from(numerator.0);
        Self(div_round(n, i128::from(denominator.0)))
    }

    /// Clamps the amount to a minimum of zero.
    pub fn max_zero(&self) -> Self {
        Self(self.0.max(0))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_formats_dollars_and_cents() {
        assert_eq!(MoneyCents::from(12_345).to_string(), "$123.45");
        assert_eq!(MoneyCents::from(-250).to_string(), "-$2.50");
        assert_eq!(MoneyCents::from(7).to_string(), "$0.07");
    }

    #[test]
    fn basis_points_rounds_half_away_from_zero() {
        // 2.5% of $1.00 = 2.5c, rounds to 3c
        assert_eq!(MoneyCents::from(100).basis_points(250), MoneyCents::from(3));
        assert_eq!(MoneyCents::from(10_000).basis_points(1_500), MoneyCents::from(1_500));
        assert_eq!(MoneyCents::from(-100).basis_points(250), MoneyCents::from(-3));
    }

    #[test]
    fn less_basis_points_is_the_remainder() {
        let price = MoneyCents::from(10_000);
        assert_eq!(price.less_basis_points(1_500), MoneyCents::from(8_500));
        assert_eq!(price.basis_points(1_500) + price.less_basis_points(1_500), price);
    }

    #[test]
    fn proration_matches_refund_ratio() {
        // payout 7000, refund 4000 of a 10000 payment: reduction of 2800
        let payout = MoneyCents::from(7_000);
        assert_eq!(payout.prorated_by(MoneyCents::from(4_000), MoneyCents::from(10_000)), MoneyCents::from(2_800));
        // a full refund claws back the whole payout
        assert_eq!(payout.prorated_by(MoneyCents::from(10_000), MoneyCents::from(10_000)), payout);
    }

    #[test]
    fn proration_with_zero_denominator_is_zero() {
        assert_eq!(MoneyCents::from(7_000).prorated_by(MoneyCents::from(1), MoneyCents::from(0)), MoneyCents::from(0));
    }
}
