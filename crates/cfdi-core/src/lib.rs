#![deny(missing_docs)]

//! # cfdi-core: Foundational Types for the CFDI Stamping Stack
//!
//! Leaf crate of the workspace. Defines the primitives every other crate
//! builds on and depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Fixed-point money.** `Amount` is integer cents, `Rate` and `Quantity`
//!    are integer millionths. No `f64` ever touches a monetary value, so the
//!    cent-level results the tax authority reproduces are bit-exact.
//!
//! 2. **Newtype identifiers.** `Rfc`, `TransactionId`, `CompanyId`,
//!    `CounterpartyId`, `ConceptId`, `FolioFiscal` with validated constructors,
//!    no bare strings crossing module boundaries.
//!
//! 3. **`CanonicalBytes` newtype.** Envelopes and payload digests flow
//!    through `CanonicalBytes::new()` (RFC 8785 JCS), so the same document
//!    always produces the same bytes.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `cfdi-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod amount;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;

pub use amount::{Amount, Quantity, Rate};
pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, ContentDigest};
pub use error::{AmountError, CanonicalizationError, CoreError, IdentifierError};
pub use identity::{CompanyId, ConceptId, CounterpartyId, FolioFiscal, Rfc, TransactionId};
