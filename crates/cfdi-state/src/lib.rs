//! # cfdi-state: Document Lifecycle
//!
//! Drives fiscal transactions through `Draft → Previewed → Stamped →
//! Cancelled` against a [`DocumentRepository`] and a
//! [`cfdi_pac::StampingAuthority`].
//!
//! ## Guarantees
//!
//! - At most one stamp call is in flight per transaction.
//! - A transaction is `Stamped` only if its stamped document was recorded
//!   in the same repository write.
//! - Only transient authority failures are retried, with bounded attempts
//!   and exponential backoff.
//! - Every operation can be turned into an [`Outcome`] for callers that
//!   need a uniform `{success, data | errorKind, message}` result.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod outcome;
pub mod repository;
mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use config::LifecycleConfig;
pub use error::{ErrorKind, LifecycleError};
pub use lifecycle::{CancelCommand, DocumentLifecycle, ReconciliationReport};
pub use outcome::Outcome;
pub use repository::{
    DocumentRepository, InMemoryRepository, IssuerRecord, KeyMaterialRecord, LedgerSnapshot, RepositoryError,
};
