//! # Fixed-Point Monetary Primitives
//!
//! `Amount` (cents), `Rate` (millionths) and `Quantity` (millionths) are
//! integer newtypes. Every operation that can produce fractional cents
//! goes through [`div_round_half_up`], so the rounding rule lives in exactly
//! one place.
//!
//! ## Wire Form
//!
//! All three serialize as decimal strings, never JSON numbers:
//!
//! | Type | Scale | Example |
//! |------|-------|---------|
//! | `Amount` | 2 | `"11600.00"` |
//! | `Rate` | 6 | `"0.160000"` |
//! | `Quantity` | up to 6 | `"1"`, `"2.5"` |
//!
//! Deserialization accepts the string form or a JSON integer (whole units).
//! JSON floats are rejected.
//!
//! ## Rounding
//!
//! Half-up on the magnitude: `0.005 → 0.01`, `-0.005 → -0.01`. This is
//! the rule the tax authority applies when it recomputes line amounts.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AmountError;

/// Fractional digits carried by `Amount`.
pub const AMOUNT_DECIMALS: u32 = 2;

/// Fractional digits carried by `Rate` and `Quantity`.
pub const MICRO_DECIMALS: u32 = 6;

const MICRO_SCALE: i128 = 1_000_000;

// ─── Amount ──────────────────────────────────────────────────────────

/// A monetary amount in integer cents.
///
/// Arithmetic operators saturate at the `i64` bounds instead of wrapping;
/// use [`Amount::checked_add`] where overflow must be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    /// Zero pesos.
    pub const ZERO: Amount = Amount(0);

    /// Construct from integer cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Construct from whole currency units. Returns `None` on overflow.
    pub fn from_units(units: i64) -> Option<Self> {
        units.checked_mul(100).map(Self)
    }

    /// Parse a decimal string with at most two fractional digits.
    pub fn parse(s: &str) -> Result<Self, AmountError> {
        parse_fixed(s, AMOUNT_DECIMALS).map(Self)
    }

    /// The amount in cents.
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Exactly zero cents.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Strictly greater than zero.
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Strictly less than zero.
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Addition that returns `None` on overflow instead of saturating.
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Subtraction that returns `None` on overflow instead of saturating.
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// `self × rate`, rounded half-up to the cent.
    pub fn apply_rate(self, rate: Rate) -> Amount {
        let product = i128::from(self.0) * i128::from(rate.0);
        Self(clamp_i64(div_round_half_up(product, MICRO_SCALE)))
    }

    /// Back-compute the pre-tax base of a tax-inclusive amount:
    /// `self / (1 + rate)`, rounded half-up to the cent.
    pub fn remove_rate(self, rate: Rate) -> Amount {
        let denominator = MICRO_SCALE + i128::from(rate.0);
        if denominator <= 0 {
            return self;
        }
        let numerator = i128::from(self.0) * MICRO_SCALE;
        Self(clamp_i64(div_round_half_up(numerator, denominator)))
    }

    /// Split into `parts` amounts that sum to `self` exactly.
    ///
    /// Each part receives `floor(cents / parts)`; the `cents mod parts`
    /// remainder is handed out one cent at a time to the leading parts.
    /// Returns an empty vector when `parts` is zero.
    pub fn allocate(self, parts: u32) -> Vec<Amount> {
        if parts == 0 {
            return Vec::new();
        }
        let n = i64::from(parts);
        let base = self.0.div_euclid(n);
        let remainder = self.0.rem_euclid(n);
        (0..n)
            .map(|i| Self(if i < remainder { base + 1 } else { base }))
            .collect()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_fixed(self.0, AMOUNT_DECIMALS, false))
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        *self = *self + rhs;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        *self = *self - rhs;
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Self(self.0.saturating_neg())
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Amount {
        iter.copied().sum()
    }
}

// ─── Rate ────────────────────────────────────────────────────────────

/// A tax rate in millionths (`0.160000` is 16% IVA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Rate(i64);

impl Rate {
    /// A zero rate; exempt and not-subject lines use it.
    pub const ZERO: Rate = Rate(0);

    /// Construct from millionths.
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Construct from a whole percentage (`16` → `0.160000`).
    pub const fn from_percent(percent: i64) -> Self {
        Self(percent * 10_000)
    }

    /// Parse a decimal fraction with at most six fractional digits.
    pub fn parse(s: &str) -> Result<Self, AmountError> {
        parse_fixed(s, MICRO_DECIMALS).map(Self)
    }

    /// The rate in millionths.
    pub const fn micros(self) -> i64 {
        self.0
    }

    /// Whether the rate is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_fixed(self.0, MICRO_DECIMALS, false))
    }
}

impl FromStr for Rate {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ─── Quantity ────────────────────────────────────────────────────────

/// A line quantity in millionths of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Quantity(i64);

impl Quantity {
    /// One whole unit.
    pub const ONE: Quantity = Quantity(1_000_000);

    /// Construct from millionths.
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Construct from whole units.
    pub const fn units(units: i64) -> Self {
        Self(units.saturating_mul(1_000_000))
    }

    /// Parse a decimal quantity with at most six fractional digits.
    pub fn parse(s: &str) -> Result<Self, AmountError> {
        parse_fixed(s, MICRO_DECIMALS).map(Self)
    }

    /// The quantity in millionths of a unit.
    pub const fn micros(self) -> i64 {
        self.0
    }

    /// Strictly greater than zero.
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// `self × unit_price`, rounded half-up to the cent.
    pub fn times(self, unit_price: Amount) -> Amount {
        let product = i128::from(self.0) * i128::from(unit_price.0);
        Amount(clamp_i64(div_round_half_up(product, MICRO_SCALE)))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_fixed(self.0, MICRO_DECIMALS, true))
    }
}

impl FromStr for Quantity {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ─── Serde ───────────────────────────────────────────────────────────

/// Accepted wire shapes. JSON floats match neither arm and are rejected.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFixed {
    Text(String),
    Whole(i64),
}

impl RawFixed {
    fn into_scaled(self, decimals: u32) -> Result<i64, AmountError> {
        match self {
            Self::Text(s) => parse_fixed(&s, decimals),
            Self::Whole(units) => units
                .checked_mul(10i64.pow(decimals))
                .ok_or_else(|| AmountError::Overflow(units.to_string())),
        }
    }
}

macro_rules! fixed_point_serde {
    ($ty:ident, $decimals:expr) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawFixed::deserialize(deserializer)?
                    .into_scaled($decimals)
                    .map($ty)
                    .map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_point_serde!(Amount, AMOUNT_DECIMALS);
fixed_point_serde!(Rate, MICRO_DECIMALS);
fixed_point_serde!(Quantity, MICRO_DECIMALS);

// ─── Fixed-point helpers ─────────────────────────────────────────────

/// Integer division rounding half-up on the magnitude. `den` must be positive.
pub fn div_round_half_up(num: i128, den: i128) -> i128 {
    let quotient = num / den;
    let remainder = num % den;
    if remainder.abs() * 2 >= den {
        quotient + num.signum()
    } else {
        quotient
    }
}

fn clamp_i64(value: i128) -> i64 {
    value.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

fn parse_fixed(input: &str, decimals: u32) -> Result<i64, AmountError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }

    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));

    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part)
    {
        return Err(AmountError::Invalid(input.to_string()));
    }
    if frac_part.len() > decimals as usize {
        return Err(AmountError::TooManyDecimals {
            value: input.to_string(),
            max: decimals,
        });
    }

    let overflow = || AmountError::Overflow(input.to_string());
    let int_value: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| overflow())?
    };
    let frac_value: i64 = if frac_part.is_empty() {
        0
    } else {
        // At most `decimals` digits, so this cannot overflow.
        frac_part.parse::<i64>().map_err(|_| overflow())?
            * 10i64.pow(decimals - frac_part.len() as u32)
    };

    let magnitude = int_value
        .checked_mul(10i64.pow(decimals))
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(overflow)?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn format_fixed(raw: i64, decimals: u32, trim: bool) -> String {
    let sign = if raw < 0 { "-" } else { "" };
    let scale = 10u64.pow(decimals);
    let abs = raw.unsigned_abs();
    let int_part = abs / scale;
    let frac = format!("{:0width$}", abs % scale, width = decimals as usize);
    if trim {
        let frac = frac.trim_end_matches('0');
        if frac.is_empty() {
            return format!("{sign}{int_part}");
        }
        return format!("{sign}{int_part}.{frac}");
    }
    format!("{sign}{int_part}.{frac}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_amount_whole_and_decimal() {
        assert_eq!(Amount::parse("10000").unwrap().cents(), 1_000_000);
        assert_eq!(Amount::parse("10000.5").unwrap().cents(), 1_000_050);
        assert_eq!(Amount::parse("1234.56").unwrap().cents(), 123_456);
        assert_eq!(Amount::parse("0.01").unwrap().cents(), 1);
        assert_eq!(Amount::parse(".5").unwrap().cents(), 50);
        assert_eq!(Amount::parse("-2.10").unwrap().cents(), -210);
    }

    #[test]
    fn parse_amount_rejects_garbage() {
        assert_eq!(Amount::parse(""), Err(AmountError::Empty));
        assert_eq!(Amount::parse("  "), Err(AmountError::Empty));
        assert!(matches!(Amount::parse("abc"), Err(AmountError::Invalid(_))));
        assert!(matches!(Amount::parse("."), Err(AmountError::Invalid(_))));
        assert!(matches!(Amount::parse("1.2.3"), Err(AmountError::Invalid(_))));
        assert!(matches!(
            Amount::parse("1.234"),
            Err(AmountError::TooManyDecimals { max: 2, .. })
        ));
        assert!(matches!(
            Amount::parse("99999999999999999999"),
            Err(AmountError::Overflow(_))
        ));
    }

    #[test]
    fn amount_display() {
        assert_eq!(Amount::from_cents(1_160_000).to_string(), "11600.00");
        assert_eq!(Amount::from_cents(450).to_string(), "4.50");
        assert_eq!(Amount::from_cents(0).to_string(), "0.00");
        assert_eq!(Amount::from_cents(-1).to_string(), "-0.01");
    }

    #[test]
    fn rate_parse_and_display() {
        assert_eq!(Rate::parse("0.16").unwrap(), Rate::from_percent(16));
        assert_eq!(Rate::from_percent(16).to_string(), "0.160000");
        assert_eq!(Rate::parse("0.106667").unwrap().micros(), 106_667);
        assert!(Rate::parse("0.1234567").is_err());
    }

    #[test]
    fn quantity_display_trims_zeros() {
        assert_eq!(Quantity::units(3).to_string(), "3");
        assert_eq!(Quantity::parse("2.5").unwrap().to_string(), "2.5");
        assert_eq!(Quantity::from_micros(1).to_string(), "0.000001");
    }

    #[test]
    fn apply_rate_rounds_half_up() {
        // 0.25 × 0.16 = 0.04
        assert_eq!(Amount::from_cents(25).apply_rate(Rate::from_percent(16)).cents(), 4);
        // 0.03 × 0.5 = 0.015 → 0.02
        assert_eq!(Amount::from_cents(3).apply_rate(Rate::from_percent(50)).cents(), 2);
        // -0.03 × 0.5 = -0.015 → -0.02
        assert_eq!(Amount::from_cents(-3).apply_rate(Rate::from_percent(50)).cents(), -2);
    }

    #[test]
    fn remove_rate_back_computes_base() {
        let gross = Amount::parse("11600.00").unwrap();
        assert_eq!(gross.remove_rate(Rate::from_percent(16)), Amount::parse("10000.00").unwrap());
        assert_eq!(gross.remove_rate(Rate::ZERO), gross);
    }

    #[test]
    fn quantity_times_price() {
        let price = Amount::parse("99.99").unwrap();
        assert_eq!(Quantity::parse("1.5").unwrap().times(price).cents(), 14_999); // 149.985 → 149.99
        assert_eq!(Quantity::ONE.times(price), price);
    }

    #[test]
    fn allocate_distributes_remainder_to_leading_parts() {
        let parts = Amount::from_cents(10).allocate(3);
        assert_eq!(parts, vec![Amount::from_cents(4), Amount::from_cents(3), Amount::from_cents(3)]);
        assert!(Amount::from_cents(10).allocate(0).is_empty());
    }

    #[test]
    fn serde_uses_decimal_strings() {
        let json = serde_json::to_string(&Amount::from_cents(1_160_000)).unwrap();
        assert_eq!(json, r#""11600.00""#);
        let back: Amount = serde_json::from_str(r#""11600.00""#).unwrap();
        assert_eq!(back.cents(), 1_160_000);
        let whole: Amount = serde_json::from_str("42").unwrap();
        assert_eq!(whole.cents(), 4200);
        let rate: Rate = serde_json::from_str(r#""0.16""#).unwrap();
        assert_eq!(rate, Rate::from_percent(16));
    }

    #[test]
    fn serde_rejects_floats() {
        assert!(serde_json::from_str::<Amount>("1.5").is_err());
        assert!(serde_json::from_str::<Rate>("0.16").is_err());
    }

    proptest! {
        #[test]
        fn allocate_sums_exactly(cents in -10_000_000_000i64..10_000_000_000i64, parts in 1u32..500) {
            let split = Amount::from_cents(cents).allocate(parts);
            prop_assert_eq!(split.len(), parts as usize);
            prop_assert_eq!(split.iter().sum::<Amount>().cents(), cents);
            let max = split.iter().max().unwrap().cents();
            let min = split.iter().min().unwrap().cents();
            prop_assert!(max - min <= 1);
        }

        #[test]
        fn display_parse_roundtrip(cents in -1_000_000_000_000_000i64..1_000_000_000_000_000i64) {
            let amount = Amount::from_cents(cents);
            prop_assert_eq!(Amount::parse(&amount.to_string()).unwrap(), amount);
        }
    }
}
