//! Fixed-point money arithmetic.
//!
//! Amounts are signed integers of minor units (paise, cents). Floating point
//! never touches the ledger; percentage configuration is converted to basis
//! points once at config load and all splits use integer round-half-even
//! division.

use serde::{Deserialize, Serialize};

/// ISO-ish lowercase currency code, e.g. `"inr"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Normalise and wrap a currency code.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_lowercase())
    }

    /// The lowercase code.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signed amount of minor units in an implicit currency.
///
/// # Examples
/// ```
/// use backend::domain::Money;
///
/// let quoted = Money::from_minor(100_000);
/// let fee = quoted.split_basis_points(1_500);
/// assert_eq!(fee, Money::from_minor(15_000));
/// assert_eq!(quoted - fee, Money::from_minor(85_000));
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero in any currency.
    pub const ZERO: Self = Self(0);

    /// Wrap a minor-unit amount.
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Convert whole major units (e.g. rupees) to minor units.
    pub const fn from_major(major: i64) -> Self {
        Self(major * 100)
    }

    /// The raw minor-unit amount.
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// True when the amount is strictly negative.
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// The additive inverse.
    pub const fn negate(self) -> Self {
        Self(-self.0)
    }

    /// Take `bps` basis points of this amount, rounding half to even.
    pub fn split_basis_points(self, bps: u32) -> Self {
        Self(div_round_half_even(
            i128::from(self.0) * i128::from(bps),
            10_000,
        ))
    }
}

impl std::ops::Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, m| acc + m)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

/// Integer division rounding half to even (banker's rounding).
///
/// `den` must be positive. The remainder is normalised to `[0, den)` so the
/// rule behaves identically for negative numerators.
fn div_round_half_even(num: i128, den: i128) -> i64 {
    debug_assert!(den > 0);
    let q = num.div_euclid(den);
    let r = num.rem_euclid(den);
    let doubled = r * 2;
    let rounded = if doubled > den || (doubled == den && q % 2 != 0) {
        q + 1
    } else {
        q
    };
    i64::try_from(rounded).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(100_000, 1_500, 15_000)] // 1000.00 at 15% -> 150.00
    #[case(1, 1_500, 0)] // 0.15 of a paisa rounds down
    #[case(3, 5_000, 2)] // 1.5 rounds to even -> 2
    #[case(1, 5_000, 0)] // 0.5 rounds to even -> 0
    #[case(5, 5_000, 2)] // 2.5 rounds to even -> 2
    #[case(-100_000, 1_500, -15_000)]
    fn basis_point_split_uses_bankers_rounding(
        #[case] minor: i64,
        #[case] bps: u32,
        #[case] expected: i64,
    ) {
        assert_eq!(
            Money::from_minor(minor).split_basis_points(bps),
            Money::from_minor(expected)
        );
    }

    #[rstest]
    fn fee_and_earning_conserve_the_quote() {
        let quoted = Money::from_minor(99_999);
        let fee = quoted.split_basis_points(1_500);
        let earning = quoted - fee;
        assert_eq!(fee + earning, quoted);
    }

    #[rstest]
    fn sums_and_negation() {
        let entries = [
            Money::from_minor(-1_000),
            Money::from_minor(150),
            Money::from_minor(850),
        ];
        assert_eq!(entries.into_iter().sum::<Money>(), Money::ZERO);
        assert_eq!(Money::from_minor(5).negate(), Money::from_minor(-5));
    }

    #[rstest]
    fn currency_normalises() {
        assert_eq!(Currency::new(" INR ").as_str(), "inr");
    }
}
