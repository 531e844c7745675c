//! # Transaction Validation
//!
//! Decides whether a transaction carries everything a fiscal document
//! needs. Checks never fail fast: each returns the complete list of
//! violations, so the caller can show every missing field at once.
//!
//! [`TransactionValidator::validate`] is the only way to obtain a
//! [`ValidatedTransaction`], which is the only transaction type
//! [`crate::DocumentBuilder`] accepts.

use std::fmt;

use cfdi_core::Rfc;
use serde::{Deserialize, Serialize};

use crate::catalog::{PaymentForm, PaymentMethod, TransactionKind};
use crate::concept::ConceptLine;
use crate::profile::{is_code, CounterpartyProfile};
use crate::transaction::FiscalTransaction;

/// One field-level violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub field: String,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// `field: message` pairs joined with `; `, for surfacing to a user.
    pub fn join(failures: &[ValidationFailure]) -> String {
        failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A transaction that passed [`TransactionValidator::validate`], with its
/// payment method and form resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransaction {
    transaction: FiscalTransaction,
    payment_method: PaymentMethod,
    payment_form: PaymentForm,
}

impl ValidatedTransaction {
    pub fn transaction(&self) -> &FiscalTransaction {
        &self.transaction
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn payment_form(&self) -> PaymentForm {
        self.payment_form
    }

    pub fn into_inner(self) -> FiscalTransaction {
        self.transaction
    }
}

impl AsRef<FiscalTransaction> for ValidatedTransaction {
    fn as_ref(&self) -> &FiscalTransaction {
        &self.transaction
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionValidator;

impl TransactionValidator {
    /// Check `tx` as a document of the given kind.
    pub fn check(tx: &FiscalTransaction, kind: TransactionKind) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();

        if kind == TransactionKind::Income {
            if tx.counterparty_id.is_none() {
                failures.push(ValidationFailure::new(
                    "counterparty_id",
                    "a client is required for income documents",
                ));
            }
            match tx.counterparty_rfc.as_deref().map(str::trim) {
                None | Some("") => failures.push(ValidationFailure::new(
                    "counterparty_rfc",
                    "the client's RFC is required for income documents",
                )),
                Some(rfc) => {
                    if let Err(e) = Rfc::new(rfc) {
                        failures.push(ValidationFailure::new("counterparty_rfc", e.to_string()));
                    }
                }
            }
        }

        if tx.concept_ids.is_empty() {
            failures.push(ValidationFailure::new("concept_ids", "at least one concept is required"));
        }
        if !tx.amounts.total.is_positive() {
            failures.push(ValidationFailure::new("amounts.total", "the total must be greater than zero"));
        }
        if !tx.quantity.is_positive() {
            failures.push(ValidationFailure::new("quantity", "the quantity must be greater than zero"));
        }
        if tx.unit_price.is_negative() {
            failures.push(ValidationFailure::new("unit_price", "the unit price cannot be negative"));
        }

        match (tx.invoice_type, tx.payment_form) {
            (None, _) => failures.push(ValidationFailure::new(
                "invoice_type",
                "a payment method (PUE or PPD) is required",
            )),
            (Some(PaymentMethod::Ppd), Some(form)) if form != PaymentForm::ToBeDefined => {
                failures.push(ValidationFailure::new(
                    "payment_form",
                    format!("deferred (PPD) documents must use payment form 99, got {form}"),
                ));
            }
            _ => {}
        }
        if tx.payment_form.is_none() {
            failures.push(ValidationFailure::new("payment_form", "a payment form is required"));
        }

        if let Some(currency) = tx.currency.as_deref() {
            let currency = currency.trim();
            if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_uppercase()) {
                failures.push(ValidationFailure::new(
                    "currency",
                    format!("{currency:?} is not an ISO 4217 code"),
                ));
            } else if currency != crate::catalog::LOCAL_CURRENCY
                && !tx.exchange_rate.is_some_and(|r| r.micros() > 0)
            {
                failures.push(ValidationFailure::new(
                    "exchange_rate",
                    format!("an exchange rate is required for {currency}"),
                ));
            }
        }

        if tx.is_project {
            if tx.project_name.as_deref().map_or(true, |n| n.trim().is_empty()) {
                failures.push(ValidationFailure::new("project_name", "project documents need a name"));
            }
            if tx.number_of_payments.map_or(true, |n| n < 1) {
                failures.push(ValidationFailure::new(
                    "number_of_payments",
                    "project documents need at least one payment",
                ));
            }
        }

        failures
    }

    /// Check `tx` against its own kind and, if clean, wrap it.
    pub fn validate(tx: FiscalTransaction) -> Result<ValidatedTransaction, Vec<ValidationFailure>> {
        let mut failures = Self::check(&tx, tx.kind);
        match (failures.is_empty(), tx.invoice_type, tx.payment_form) {
            (true, Some(payment_method), Some(payment_form)) => Ok(ValidatedTransaction {
                transaction: tx,
                payment_method,
                payment_form,
            }),
            (true, _, _) => {
                failures.push(ValidationFailure::new("invoice_type", "payment method is unresolved"));
                Err(failures)
            }
            (false, _, _) => Err(failures),
        }
    }

    /// A counterparty must be complete to appear as Receptor.
    pub fn check_counterparty(profile: &CounterpartyProfile) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();
        if let Err(e) = Rfc::new(&profile.rfc) {
            failures.push(ValidationFailure::new("counterparty.rfc", e.to_string()));
        }
        if profile.legal_name.trim().is_empty() {
            failures.push(ValidationFailure::new("counterparty.legal_name", "legal name is required"));
        }
        if !is_code(profile.tax_regime.trim(), 3) {
            failures.push(ValidationFailure::new(
                "counterparty.tax_regime",
                "tax regime must be a three-digit catalog code",
            ));
        }
        if profile.cfdi_use.trim().is_empty() {
            failures.push(ValidationFailure::new("counterparty.cfdi_use", "CFDI use code is required"));
        }
        if !is_code(profile.postal_code.trim(), 5) {
            failures.push(ValidationFailure::new(
                "counterparty.postal_code",
                "postal code must be five digits",
            ));
        }
        failures
    }

    /// Concept lines resolved from the catalog.
    pub fn check_concepts(lines: &[ConceptLine]) -> Vec<ValidationFailure> {
        if lines.is_empty() {
            return vec![ValidationFailure::new("concepts", "at least one concept line is required")];
        }
        let mut failures = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let field = |name: &str| format!("concepts[{i}].{name}");
            if !is_code(line.product_code.trim(), 8) {
                failures.push(ValidationFailure::new(field("product_code"), "must be an eight-digit code"));
            }
            if line.unit_code.trim().is_empty() {
                failures.push(ValidationFailure::new(field("unit_code"), "unit code is required"));
            }
            if line.description.trim().is_empty() {
                failures.push(ValidationFailure::new(field("description"), "description is required"));
            }
            if !line.quantity.is_positive() {
                failures.push(ValidationFailure::new(field("quantity"), "must be greater than zero"));
            }
            if line.unit_price.is_negative() {
                failures.push(ValidationFailure::new(field("unit_price"), "cannot be negative"));
            }
        }
        failures
    }
}
