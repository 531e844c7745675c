//! # Fiscal Transactions
//!
//! The source record a fiscal document is generated from. Transactions are
//! owned by the ledger; this subsystem reads them and writes back only the
//! document status and the installment children produced at creation time.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use cfdi_core::{Amount, CompanyId, ConceptId, CounterpartyId, Quantity, Rate, TransactionId};
use serde::{Deserialize, Serialize};

use crate::catalog::{PaymentForm, PaymentMethod, TransactionKind};
use crate::tax::{TaxBreakdown, TaxFieldCalculator, TaxInput, TaxRates};

/// Document status of a transaction.
///
/// ```text
/// Draft ──▶ Previewed ──▶ Stamped ──▶ Cancelled
///   └────────────────────────▲
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Previewed,
    Stamped,
    Cancelled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Previewed => "previewed",
            Self::Stamped => "stamped",
            Self::Cancelled => "cancelled",
        }
    }

    /// States reachable in one step.
    pub fn valid_transitions(&self) -> &'static [DocumentStatus] {
        match self {
            Self::Draft => &[Self::Previewed, Self::Stamped],
            Self::Previewed => &[Self::Stamped],
            Self::Stamped => &[Self::Cancelled],
            Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// Draft and previewed transactions have no authority-issued document.
    pub fn is_stampable(&self) -> bool {
        matches!(self, Self::Draft | Self::Previewed)
    }

    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collection status of one installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Pending,
    Paid,
}

/// An attached file (receipt, contract, purchase order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    pub name: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// A ledger transaction that can become a CFDI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalTransaction {
    pub id: TransactionId,
    pub company_id: CompanyId,
    pub kind: TransactionKind,
    /// Client (income) or supplier (expense).
    #[serde(default)]
    pub counterparty_id: Option<CounterpartyId>,
    /// Counterparty tax id as captured on the transaction.
    #[serde(default)]
    pub counterparty_rfc: Option<String>,
    #[serde(default)]
    pub concept_ids: Vec<ConceptId>,

    pub quantity: Quantity,
    pub unit_price: Amount,
    #[serde(default)]
    pub iva_included: bool,
    #[serde(default)]
    pub rates: TaxRates,
    /// Computed once at creation by [`TaxFieldCalculator`].
    pub amounts: TaxBreakdown,

    pub issued_at: NaiveDateTime,
    #[serde(default)]
    pub due_on: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub invoice_type: Option<PaymentMethod>,
    #[serde(default)]
    pub payment_form: Option<PaymentForm>,
    #[serde(default)]
    pub payment_conditions: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Units of local currency per unit of `currency`.
    #[serde(default)]
    pub exchange_rate: Option<Rate>,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub folio: Option<String>,

    #[serde(default)]
    pub is_project: bool,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub number_of_payments: Option<u32>,
    #[serde(default)]
    pub payment_number: Option<u32>,
    #[serde(default)]
    pub parent_id: Option<TransactionId>,
    #[serde(default)]
    pub installment_status: Option<InstallmentStatus>,

    #[serde(default)]
    pub document_status: DocumentStatus,
    #[serde(default)]
    pub attachments: Vec<FileReference>,
}

impl FiscalTransaction {
    /// Create a draft transaction, computing its amounts from `input`.
    pub fn new(
        company_id: CompanyId,
        kind: TransactionKind,
        issued_at: NaiveDateTime,
        input: TaxInput,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            company_id,
            kind,
            counterparty_id: None,
            counterparty_rfc: None,
            concept_ids: Vec::new(),
            quantity: input.quantity,
            unit_price: input.unit_price,
            iva_included: input.iva_included,
            rates: input.rates,
            amounts: TaxFieldCalculator::compute(&input),
            issued_at,
            due_on: None,
            description: None,
            invoice_type: None,
            payment_form: None,
            payment_conditions: None,
            currency: None,
            exchange_rate: None,
            series: None,
            folio: None,
            is_project: false,
            project_name: None,
            number_of_payments: None,
            payment_number: None,
            parent_id: None,
            installment_status: None,
            document_status: DocumentStatus::Draft,
            attachments: Vec::new(),
        }
    }

    pub fn with_counterparty(mut self, id: CounterpartyId, rfc: impl Into<String>) -> Self {
        self.counterparty_id = Some(id);
        self.counterparty_rfc = Some(rfc.into());
        self
    }

    pub fn with_concept(mut self, id: ConceptId) -> Self {
        self.concept_ids.push(id);
        self
    }

    pub fn with_payment(mut self, method: PaymentMethod, form: PaymentForm) -> Self {
        self.invoice_type = Some(method);
        self.payment_form = Some(form);
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>, exchange_rate: Option<Rate>) -> Self {
        self.currency = Some(currency.into());
        self.exchange_rate = exchange_rate;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Flag as a project to be paid in `number_of_payments` installments.
    pub fn as_project(mut self, name: impl Into<String>, number_of_payments: u32) -> Self {
        self.is_project = true;
        self.project_name = Some(name.into());
        self.number_of_payments = Some(number_of_payments);
        self
    }

    /// The tax input the stored amounts were computed from.
    pub fn tax_input(&self) -> TaxInput {
        TaxInput::new(self.quantity, self.unit_price, self.rates).iva_included(self.iva_included)
    }

    /// Whether this record is an installment of a project.
    pub fn is_installment(&self) -> bool {
        self.parent_id.is_some()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::NaiveDate;

    pub fn issued_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .and_then(|d| d.and_hms_opt(10, 30, 0))
            .unwrap()
    }

    /// One unit at 10,000.00 + 16% IVA, ready to stamp.
    pub fn income() -> FiscalTransaction {
        let input = TaxInput::new(Quantity::ONE, Amount::from_cents(1_000_000), TaxRates::STANDARD_IVA);
        FiscalTransaction::new(CompanyId::new(), TransactionKind::Income, issued_at(), input)
            .with_counterparty(CounterpartyId::new(), "XIQB891116QE4")
            .with_concept(ConceptId::new())
            .with_payment(PaymentMethod::Pue, PaymentForm::Transfer)
            .with_description("Consultoría fiscal marzo")
    }
}
