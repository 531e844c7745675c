//! # Tax Field Calculation
//!
//! Computes subtotal, transferred IVA, ISR and IVA withholdings and the
//! document total from quantity, unit price and rates.
//!
//! Each component is rounded half-up to the cent on its own, and the total
//! is then assembled from the rounded components:
//!
//! ```text
//! total = subtotal + tax - isr_withholding - iva_withholding
//! ```
//!
//! It is never re-derived from unrounded intermediates, so the identity
//! holds to the cent for every input.

use std::iter::Sum;

use cfdi_core::{Amount, Quantity, Rate};
use serde::{Deserialize, Serialize};

/// Rates applied to a line or transaction. A zero rate yields a zero amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxRates {
    /// Transferred IVA (usually 16%).
    #[serde(default)]
    pub iva: Rate,
    /// ISR withheld by the payer.
    #[serde(default)]
    pub isr_withholding: Rate,
    /// IVA withheld by the payer.
    #[serde(default)]
    pub iva_withholding: Rate,
}

impl TaxRates {
    /// Standard 16% IVA, no withholdings.
    pub const STANDARD_IVA: TaxRates = TaxRates {
        iva: Rate::from_percent(16),
        isr_withholding: Rate::ZERO,
        iva_withholding: Rate::ZERO,
    };

    /// IVA only, no withholdings.
    pub fn iva_only(iva: Rate) -> Self {
        Self {
            iva,
            ..Self::default()
        }
    }

    pub fn with_isr_withholding(mut self, rate: Rate) -> Self {
        self.isr_withholding = rate;
        self
    }

    pub fn with_iva_withholding(mut self, rate: Rate) -> Self {
        self.iva_withholding = rate;
        self
    }

    pub fn has_withholdings(&self) -> bool {
        !self.isr_withholding.is_zero() || !self.iva_withholding.is_zero()
    }
}

/// Inputs to [`TaxFieldCalculator::compute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxInput {
    pub quantity: Quantity,
    pub unit_price: Amount,
    pub rates: TaxRates,
    /// The unit price already includes IVA; the subtotal is back-computed.
    pub iva_included: bool,
}

impl TaxInput {
    pub fn new(quantity: Quantity, unit_price: Amount, rates: TaxRates) -> Self {
        Self {
            quantity,
            unit_price,
            rates,
            iva_included: false,
        }
    }

    pub fn iva_included(mut self, included: bool) -> Self {
        self.iva_included = included;
        self
    }
}

/// Rounded monetary breakdown of a line, transaction or document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub subtotal: Amount,
    pub tax: Amount,
    pub isr_withholding: Amount,
    pub iva_withholding: Amount,
    pub total: Amount,
}

impl TaxBreakdown {
    /// Assemble a breakdown from already-rounded components. The total is
    /// derived here and nowhere else.
    pub fn from_components(
        subtotal: Amount,
        tax: Amount,
        isr_withholding: Amount,
        iva_withholding: Amount,
    ) -> Self {
        Self {
            subtotal,
            tax,
            isr_withholding,
            iva_withholding,
            total: subtotal + tax - isr_withholding - iva_withholding,
        }
    }

    /// Combined ISR and IVA withholdings.
    pub fn withholdings(&self) -> Amount {
        self.isr_withholding + self.iva_withholding
    }

    /// Whether `total = subtotal + tax - withholdings` holds.
    pub fn is_consistent(&self) -> bool {
        self.total == self.subtotal + self.tax - self.withholdings()
    }
}

impl Sum for TaxBreakdown {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, b| Self {
            subtotal: acc.subtotal + b.subtotal,
            tax: acc.tax + b.tax,
            isr_withholding: acc.isr_withholding + b.isr_withholding,
            iva_withholding: acc.iva_withholding + b.iva_withholding,
            total: acc.total + b.total,
        })
    }
}

impl<'a> Sum<&'a TaxBreakdown> for TaxBreakdown {
    fn sum<I: Iterator<Item = &'a TaxBreakdown>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Pure tax arithmetic. Has no error conditions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaxFieldCalculator;

impl TaxFieldCalculator {
    pub fn compute(input: &TaxInput) -> TaxBreakdown {
        let gross = input.quantity.times(input.unit_price);
        let rates = &input.rates;

        // Every component is rounded on its own; with an inclusive price
        // the total may then differ from the price paid by a cent.
        let subtotal = if input.iva_included {
            gross.remove_rate(rates.iva)
        } else {
            gross
        };

        TaxBreakdown::from_components(
            subtotal,
            subtotal.apply_rate(rates.iva),
            subtotal.apply_rate(rates.isr_withholding),
            subtotal.apply_rate(rates.iva_withholding),
        )
    }

    /// Convenience for a single unit at a tax-exclusive price.
    pub fn for_unit_price(unit_price: Amount, rates: TaxRates) -> TaxBreakdown {
        Self::compute(&TaxInput::new(Quantity::ONE, unit_price, rates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn amount(s: &str) -> Amount {
        Amount::parse(s).unwrap()
    }

    #[test]
    fn one_unit_at_sixteen_percent() {
        let b = TaxFieldCalculator::for_unit_price(amount("10000"), TaxRates::STANDARD_IVA);
        assert_eq!(b.subtotal.to_string(), "10000.00");
        assert_eq!(b.tax.to_string(), "1600.00");
        assert_eq!(b.total.to_string(), "11600.00");
        assert!(b.withholdings().is_zero());
    }

    #[test]
    fn iva_included_back_computes_subtotal() {
        let input = TaxInput::new(Quantity::ONE, amount("11600.00"), TaxRates::STANDARD_IVA)
            .iva_included(true);
        let b = TaxFieldCalculator::compute(&input);
        assert_eq!(b.subtotal, amount("10000.00"));
        assert_eq!(b.tax, amount("1600.00"));
        assert_eq!(b.total, amount("11600.00"));
    }

    #[test]
    fn iva_included_odd_price_rounds_each_part() {
        let input = TaxInput::new(Quantity::ONE, amount("100.00"), TaxRates::STANDARD_IVA)
            .iva_included(true);
        let b = TaxFieldCalculator::compute(&input);
        // 100 / 1.16 = 86.2068...
        assert_eq!(b.subtotal, amount("86.21"));
        assert_eq!(b.tax, amount("13.79"));
        assert_eq!(b.total, amount("100.00"));
    }

    #[test]
    fn iva_included_tax_is_rounded_from_subtotal() {
        let input = TaxInput::new(Quantity::ONE, amount("1000.03"), TaxRates::STANDARD_IVA)
            .iva_included(true);
        let b = TaxFieldCalculator::compute(&input);
        // 1000.03 / 1.16 = 862.0948..., 862.09 * 0.16 = 137.9344
        assert_eq!(b.subtotal, amount("862.09"));
        assert_eq!(b.tax, amount("137.93"));
        assert_eq!(b.total, amount("1000.02"));
        assert!(b.is_consistent());
    }

    #[test]
    fn professional_services_withholdings() {
        // Persona física billing a persona moral: 10% ISR, two thirds of IVA.
        let rates = TaxRates::STANDARD_IVA
            .with_isr_withholding(Rate::from_percent(10))
            .with_iva_withholding(Rate::parse("0.106667").unwrap());
        let b = TaxFieldCalculator::for_unit_price(amount("1000.00"), rates);
        assert_eq!(b.tax, amount("160.00"));
        assert_eq!(b.isr_withholding, amount("100.00"));
        assert_eq!(b.iva_withholding, amount("106.67"));
        assert_eq!(b.total, amount("853.33"));
        assert!(b.is_consistent());
    }

    #[test]
    fn fractional_quantity_rounds_half_up() {
        let input = TaxInput::new(
            Quantity::parse("2.5").unwrap(),
            amount("0.99"),
            TaxRates::STANDARD_IVA,
        );
        let b = TaxFieldCalculator::compute(&input);
        // 2.475 -> 2.48, 2.48 * 0.16 = 0.3968 -> 0.40
        assert_eq!(b.subtotal, amount("2.48"));
        assert_eq!(b.tax, amount("0.40"));
        assert_eq!(b.total, amount("2.88"));
    }

    #[test]
    fn zero_rate_yields_zero_tax() {
        let b = TaxFieldCalculator::for_unit_price(amount("500.00"), TaxRates::default());
        assert!(b.tax.is_zero());
        assert_eq!(b.total, amount("500.00"));
    }

    #[test]
    fn breakdowns_sum_componentwise() {
        let a = TaxFieldCalculator::for_unit_price(amount("100.00"), TaxRates::STANDARD_IVA);
        let b = TaxFieldCalculator::for_unit_price(amount("50.00"), TaxRates::STANDARD_IVA);
        let sum: TaxBreakdown = [a, b].iter().sum();
        assert_eq!(sum.subtotal, amount("150.00"));
        assert_eq!(sum.tax, amount("24.00"));
        assert_eq!(sum.total, amount("174.00"));
        assert!(sum.is_consistent());
    }

    fn rate_strategy() -> impl Strategy<Value = Rate> {
        (0i64..=300_000).prop_map(Rate::from_micros)
    }

    proptest! {
        #[test]
        fn total_identity_holds(
            qty in 1i64..=1_000_000_000,
            price in 0i64..=1_000_000_000,
            iva in rate_strategy(),
            isr in rate_strategy(),
            iva_w in rate_strategy(),
            included in any::<bool>(),
        ) {
            let rates = TaxRates { iva, isr_withholding: isr, iva_withholding: iva_w };
            let input = TaxInput::new(Quantity::from_micros(qty), Amount::from_cents(price), rates)
                .iva_included(included);
            let b = TaxFieldCalculator::compute(&input);
            prop_assert!(b.is_consistent());
            prop_assert!(!b.subtotal.is_negative());
            prop_assert!(!b.tax.is_negative());
        }

        #[test]
        fn iva_included_tax_rounds_independently(
            price in 0i64..=100_000_000,
            iva in rate_strategy(),
        ) {
            let gross = Amount::from_cents(price);
            let input = TaxInput::new(Quantity::ONE, gross, TaxRates::iva_only(iva))
                .iva_included(true);
            let b = TaxFieldCalculator::compute(&input);
            prop_assert_eq!(b.subtotal, gross.remove_rate(iva));
            prop_assert_eq!(b.tax, b.subtotal.apply_rate(iva));
            prop_assert!((b.total - gross).cents().abs() <= 1);
        }
    }
}
