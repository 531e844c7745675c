//! # cfdi-pac: Stamping Authority Client
//!
//! Typed access to a CFDI certification provider (PAC) for the four
//! operations the stamping pipeline needs:
//!
//! - **stamp**: submit a base64 envelope, receive the folio fiscal, seals
//!   and signed XML
//! - **cancel**: request cancellation of a stamped folio
//! - **query_status**: the authority's current record of a folio
//! - **credit_balance**: remaining prepaid stamps
//!
//! ## Error classification
//!
//! Failures are classified before they leave this crate (see
//! [`error::classify`]). Only `TransientNetworkFailure` is retryable, and
//! this crate never retries on its own: retry policy lives with the caller
//! that owns the document state.

pub mod authority;
pub mod client;
pub mod config;
pub mod error;
pub mod mock;
pub mod types;

pub use authority::StampingAuthority;
pub use client::HttpStampingClient;
pub use config::{ConfigError, PacConfig};
pub use error::{AuthorityError, AuthorityErrorKind};
pub use mock::MockStampingAuthority;
pub use types::{
    AuthorityDocumentStatus, CancelAcknowledgment, CancelRequest, CreditBalance, IssuerCredentials,
    StampRequest, StatusQuery, StatusReport,
};
