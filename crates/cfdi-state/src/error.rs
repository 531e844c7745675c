//! Lifecycle errors and the stable error kinds callers switch on.

use std::fmt;

use cfdi_core::TransactionId;
use cfdi_invoice::{EnvelopeError, SealError, ValidationFailure};
use cfdi_pac::{AuthorityError, AuthorityErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repository::RepositoryError;

/// Caller-facing failure category. Serialized into every failed
/// [`crate::Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationFailure,
    AuthorityRejection,
    TransientNetworkFailure,
    QuotaExhausted,
    AuthenticationFailure,
    StateConflict,
    NotFound,
    NotImplemented,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationFailure => "validation_failure",
            Self::AuthorityRejection => "authority_rejection",
            Self::TransientNetworkFailure => "transient_network_failure",
            Self::QuotaExhausted => "quota_exhausted",
            Self::AuthenticationFailure => "authentication_failure",
            Self::StateConflict => "state_conflict",
            Self::NotFound => "not_found",
            Self::NotImplemented => "not_implemented",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<AuthorityErrorKind> for ErrorKind {
    fn from(kind: AuthorityErrorKind) -> Self {
        match kind {
            AuthorityErrorKind::ValidationRejected => Self::AuthorityRejection,
            AuthorityErrorKind::AuthenticationFailure => Self::AuthenticationFailure,
            AuthorityErrorKind::TransientNetworkFailure => Self::TransientNetworkFailure,
            AuthorityErrorKind::QuotaExhausted => Self::QuotaExhausted,
            AuthorityErrorKind::Unknown => Self::Unknown,
        }
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("validation failed: {}", ValidationFailure::join(.0))]
    Validation(Vec<ValidationFailure>),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("transaction {0} is already stamped")]
    DocumentAlreadyStamped(TransactionId),

    #[error("transaction {0} is already cancelled")]
    DocumentAlreadyCancelled(TransactionId),

    #[error("a stamp call for transaction {0} is already in flight")]
    StampInProgress(TransactionId),

    #[error("transaction {0} has not been stamped")]
    NotStamped(TransactionId),

    #[error("no stamp credits remain ({remaining})")]
    InsufficientCredits { remaining: i64 },

    #[error(transparent)]
    Authority(#[from] AuthorityError),

    #[error(transparent)]
    Seal(#[from] SealError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("{feature} is not implemented")]
    NotImplemented { feature: &'static str },
}

impl LifecycleError {
    pub(crate) fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Seal(_) => ErrorKind::ValidationFailure,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::DocumentAlreadyStamped(_)
            | Self::DocumentAlreadyCancelled(_)
            | Self::StampInProgress(_)
            | Self::NotStamped(_) => ErrorKind::StateConflict,
            Self::InsufficientCredits { .. } => ErrorKind::QuotaExhausted,
            Self::Authority(e) => e.kind.into(),
            Self::Envelope(_) => ErrorKind::Unknown,
            Self::Repository(RepositoryError::TransactionNotFound(_)) => ErrorKind::NotFound,
            Self::Repository(_) => ErrorKind::StateConflict,
            Self::NotImplemented { .. } => ErrorKind::NotImplemented,
        }
    }

    /// Text shown to the end user. Authority rejections carry the
    /// authority's own message verbatim.
    pub fn user_message(&self) -> String {
        match self {
            Self::Authority(e) => match e.kind {
                AuthorityErrorKind::QuotaExhausted => {
                    format!("{}. Purchase more stamps from the provider before retrying.", e.message)
                }
                AuthorityErrorKind::Unknown => format!("the stamping authority returned an unexpected response: {}", e.message),
                _ => e.message.clone(),
            },
            Self::InsufficientCredits { .. } => {
                "No stamp credits remain. Purchase more stamps from the provider before retrying.".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_kinds_map_to_caller_kinds() {
        let err = |kind| LifecycleError::Authority(AuthorityError::new(kind, "POST /cfdi40/stamp", "x"));
        assert_eq!(err(AuthorityErrorKind::ValidationRejected).kind(), ErrorKind::AuthorityRejection);
        assert_eq!(
            err(AuthorityErrorKind::TransientNetworkFailure).kind(),
            ErrorKind::TransientNetworkFailure
        );
        assert_eq!(err(AuthorityErrorKind::QuotaExhausted).kind(), ErrorKind::QuotaExhausted);
        assert_eq!(err(AuthorityErrorKind::Unknown).kind(), ErrorKind::Unknown);
    }

    #[test]
    fn rejection_message_is_verbatim() {
        let err = LifecycleError::Authority(AuthorityError::new(
            AuthorityErrorKind::ValidationRejected,
            "POST /cfdi40/stamp",
            "CFDI40145 - El RFC del receptor no existe",
        ));
        assert_eq!(err.user_message(), "CFDI40145 - El RFC del receptor no existe");
    }

    #[test]
    fn validation_message_lists_fields() {
        let err = LifecycleError::Validation(vec![
            ValidationFailure::new("counterparty_id", "is required"),
            ValidationFailure::new("amounts.total", "must be positive"),
        ]);
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
        assert_eq!(
            err.to_string(),
            "validation failed: counterparty_id: is required; amounts.total: must be positive"
        );
    }

    #[test]
    fn state_conflicts() {
        let id = TransactionId::new();
        assert_eq!(LifecycleError::StampInProgress(id).kind(), ErrorKind::StateConflict);
        assert_eq!(LifecycleError::DocumentAlreadyCancelled(id).kind(), ErrorKind::StateConflict);
        assert_eq!(
            LifecycleError::Repository(RepositoryError::TransactionNotFound(id)).kind(),
            ErrorKind::NotFound
        );
    }
}
