//! Product/service catalog lines (Conceptos).

use cfdi_core::{Amount, ConceptId, Quantity};
use serde::{Deserialize, Serialize};

use crate::catalog::TaxObject;
use crate::tax::{TaxBreakdown, TaxFieldCalculator, TaxInput, TaxRates};

/// One concept line of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptLine {
    pub concept_id: ConceptId,
    /// `c_ClaveProdServ`, eight digits.
    pub product_code: String,
    /// `c_ClaveUnidad`, e.g. `E48` (service unit).
    pub unit_code: String,
    #[serde(default)]
    pub unit_name: Option<String>,
    /// Internal SKU (`NoIdentificacion`).
    #[serde(default)]
    pub sku: Option<String>,
    pub description: String,
    #[serde(default)]
    pub tax_object: TaxObject,
    pub quantity: Quantity,
    pub unit_price: Amount,
    #[serde(default)]
    pub iva_included: bool,
    #[serde(default)]
    pub rates: TaxRates,
}

impl ConceptLine {
    /// Rates that actually apply. Concepts that do not itemize taxes are
    /// computed at zero.
    pub fn effective_rates(&self) -> TaxRates {
        if self.tax_object.itemizes_taxes() {
            self.rates
        } else {
            TaxRates::default()
        }
    }

    pub fn tax_input(&self) -> TaxInput {
        TaxInput::new(self.quantity, self.unit_price, self.effective_rates())
            .iva_included(self.iva_included && self.tax_object.itemizes_taxes())
    }

    pub fn breakdown(&self) -> TaxBreakdown {
        TaxFieldCalculator::compute(&self.tax_input())
    }
}
