//! # cfdi-invoice: Fiscal Document Domain
//!
//! Everything between a ledger transaction and the bytes submitted for
//! stamping, with no I/O:
//!
//! ```text
//! FiscalTransaction ─▶ TransactionValidator ─▶ ValidatedTransaction
//!                                                   │
//!      IssuerProfile + CounterpartyProfile + ConceptLine[]
//!                                                   ▼
//!                         DocumentBuilder ─▶ Comprobante ─▶ Sealer ─▶ EnvelopeEncoder ─▶ Envelope
//! ```
//!
//! `InstallmentSplitter` runs earlier, when a project transaction is
//! created. `TaxFieldCalculator` is used both there and by the builder.

pub mod builder;
pub mod catalog;
pub mod comprobante;
pub mod concept;
pub mod document;
pub mod envelope;
pub mod installment;
pub mod profile;
pub mod seal;
pub mod tax;
pub mod transaction;
pub mod validation;

pub use builder::DocumentBuilder;
pub use catalog::{
    CancellationReason, PaymentForm, PaymentMethod, TaxCode, TaxObject, TransactionKind,
    VoucherType, LOCAL_CURRENCY,
};
pub use comprobante::Comprobante;
pub use concept::ConceptLine;
pub use document::{CancellationRecord, StampReceipt, StampedDocument};
pub use envelope::{Envelope, EnvelopeEncoder, EnvelopeError};
pub use installment::{InstallmentError, InstallmentPlan, InstallmentSplitter};
pub use profile::{CounterpartyProfile, IssuerProfile, IssuerSettings, ProfileError};
pub use seal::{DigitalSeal, IssuerKeyMaterial, PacDelegatedSealer, SealError, Sealer};
pub use tax::{TaxBreakdown, TaxFieldCalculator, TaxInput, TaxRates};
pub use transaction::{DocumentStatus, FileReference, FiscalTransaction, InstallmentStatus};
pub use validation::{TransactionValidator, ValidatedTransaction, ValidationFailure};
