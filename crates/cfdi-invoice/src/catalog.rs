//! # SAT Catalog Codes
//!
//! Closed code lists from the CFDI 4.0 catalogs that this subsystem
//! interprets. Each enum serializes as its catalog code, so unknown codes
//! are rejected when a record is deserialized rather than deep inside the
//! builder.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Local currency used when a transaction does not specify one.
pub const LOCAL_CURRENCY: &str = "MXN";

/// Whether a transaction is money coming in or going out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    /// The `TipoDeComprobante` a document for this kind carries.
    pub fn voucher_type(&self) -> VoucherType {
        match self {
            Self::Income => VoucherType::Ingreso,
            Self::Expense => VoucherType::Egreso,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Income => "income",
            Self::Expense => "expense",
        })
    }
}

/// `c_TipoDeComprobante`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoucherType {
    #[serde(rename = "I")]
    Ingreso,
    #[serde(rename = "E")]
    Egreso,
}

/// `c_MetodoPago`: pay in full vs. deferred/installment payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Pago en una sola exhibición.
    #[serde(rename = "PUE")]
    Pue,
    /// Pago en parcialidades o diferido. Expects a later payment complement.
    #[serde(rename = "PPD")]
    Ppd,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pue => "PUE",
            Self::Ppd => "PPD",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `c_FormaPago`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentForm {
    #[serde(rename = "01")]
    Cash,
    #[serde(rename = "02")]
    Check,
    #[serde(rename = "03")]
    Transfer,
    #[serde(rename = "04")]
    CreditCard,
    #[serde(rename = "05")]
    ElectronicWallet,
    #[serde(rename = "06")]
    ElectronicMoney,
    #[serde(rename = "08")]
    FoodVouchers,
    #[serde(rename = "12")]
    DationInPayment,
    #[serde(rename = "13")]
    Subrogation,
    #[serde(rename = "14")]
    Consignment,
    #[serde(rename = "15")]
    Forgiveness,
    #[serde(rename = "17")]
    Compensation,
    #[serde(rename = "23")]
    Novation,
    #[serde(rename = "24")]
    Confusion,
    #[serde(rename = "25")]
    DebtRemission,
    #[serde(rename = "26")]
    Prescription,
    #[serde(rename = "27")]
    CreditorSatisfaction,
    #[serde(rename = "28")]
    DebitCard,
    #[serde(rename = "29")]
    ServiceCard,
    #[serde(rename = "30")]
    AdvanceApplication,
    #[serde(rename = "31")]
    PaymentIntermediary,
    /// "Por definir". The only form allowed with `PaymentMethod::Ppd`.
    #[serde(rename = "99")]
    ToBeDefined,
}

impl PaymentForm {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cash => "01",
            Self::Check => "02",
            Self::Transfer => "03",
            Self::CreditCard => "04",
            Self::ElectronicWallet => "05",
            Self::ElectronicMoney => "06",
            Self::FoodVouchers => "08",
            Self::DationInPayment => "12",
            Self::Subrogation => "13",
            Self::Consignment => "14",
            Self::Forgiveness => "15",
            Self::Compensation => "17",
            Self::Novation => "23",
            Self::Confusion => "24",
            Self::DebtRemission => "25",
            Self::Prescription => "26",
            Self::CreditorSatisfaction => "27",
            Self::DebitCard => "28",
            Self::ServiceCard => "29",
            Self::AdvanceApplication => "30",
            Self::PaymentIntermediary => "31",
            Self::ToBeDefined => "99",
        }
    }
}

impl fmt::Display for PaymentForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// `c_ObjetoImp`: whether a concept is subject to tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaxObject {
    #[serde(rename = "01")]
    NotSubject,
    #[default]
    #[serde(rename = "02")]
    Subject,
    /// Subject to tax but not obliged to itemize it.
    #[serde(rename = "03")]
    SubjectNotItemized,
}

impl TaxObject {
    /// Whether taxes are computed and itemized for the concept.
    pub fn itemizes_taxes(&self) -> bool {
        matches!(self, Self::Subject)
    }
}

/// `c_Impuesto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaxCode {
    #[serde(rename = "001")]
    Isr,
    #[serde(rename = "002")]
    Iva,
}

/// `c_TipoFactor`. Only rate-based factors are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum FactorType {
    #[default]
    Tasa,
}

/// `c_MotivoCancelacion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancellationReason {
    /// Issued with errors, with a replacement document.
    #[serde(rename = "01")]
    ErrorsWithRelation,
    /// Issued with errors, no replacement.
    #[serde(rename = "02")]
    ErrorsWithoutRelation,
    /// The operation did not take place.
    #[serde(rename = "03")]
    OperationNotCarriedOut,
    /// Nominative operation included in a global invoice.
    #[serde(rename = "04")]
    NominativeInGlobal,
}

impl CancellationReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ErrorsWithRelation => "01",
            Self::ErrorsWithoutRelation => "02",
            Self::OperationNotCarriedOut => "03",
            Self::NominativeInGlobal => "04",
        }
    }

    /// Reason `01` must name the document that replaces the cancelled one.
    pub fn requires_replacement(&self) -> bool {
        matches!(self, Self::ErrorsWithRelation)
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code.trim() {
            "01" => Some(Self::ErrorsWithRelation),
            "02" => Some(Self::ErrorsWithoutRelation),
            "03" => Some(Self::OperationNotCarriedOut),
            "04" => Some(Self::NominativeInGlobal),
            _ => None,
        }
    }
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
