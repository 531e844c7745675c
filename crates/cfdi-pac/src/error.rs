//! Classified authority errors.
//!
//! Every failure leaving this crate is an [`AuthorityError`] with a
//! [`AuthorityErrorKind`] decided here, from the HTTP status and the
//! provider's error code. The raw response text is kept in `message` for
//! audit logs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ProviderResponse;

/// Provider codes that mean the prepaid stamp balance is exhausted.
const QUOTA_CODES: &[&str] = &["QUOTA", "902"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityErrorKind {
    /// The authority permanently refused the document. Never retried.
    ValidationRejected,
    AuthenticationFailure,
    /// Timeout, connection failure, 5xx, 408 or 429.
    TransientNetworkFailure,
    QuotaExhausted,
    Unknown,
}

impl AuthorityErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationRejected => "validation_rejected",
            Self::AuthenticationFailure => "authentication_failure",
            Self::TransientNetworkFailure => "transient_network_failure",
            Self::QuotaExhausted => "quota_exhausted",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AuthorityErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{endpoint} failed ({kind}): {message}")]
pub struct AuthorityError {
    pub kind: AuthorityErrorKind,
    /// Provider-defined error code, when the body carried one.
    pub code: Option<String>,
    /// HTTP status, absent for transport failures.
    pub status: Option<u16>,
    /// Raw authority message or response body.
    pub message: String,
    pub endpoint: String,
}

impl AuthorityError {
    pub fn new(kind: AuthorityErrorKind, endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            status: None,
            message: message.into(),
            endpoint: endpoint.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Only transient failures may be resubmitted.
    pub fn is_retryable(&self) -> bool {
        self.kind == AuthorityErrorKind::TransientNetworkFailure
    }

    /// A request that never produced a response.
    pub fn transport(endpoint: &str, err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        let kind = if err.is_timeout() || err.is_connect() || err.is_request() {
            AuthorityErrorKind::TransientNetworkFailure
        } else {
            AuthorityErrorKind::Unknown
        };
        Self::new(kind, endpoint, message)
    }

    /// A caller-side deadline elapsed before the authority answered.
    pub fn timeout(endpoint: &str, after: std::time::Duration) -> Self {
        Self::new(
            AuthorityErrorKind::TransientNetworkFailure,
            endpoint,
            format!("no response within {after:?}"),
        )
    }

    /// Classify an error response. The body is kept verbatim.
    pub fn from_response(endpoint: &str, status: u16, body: &str) -> Self {
        let parsed: Option<ProviderResponse<serde_json::Value>> = serde_json::from_str(body).ok();
        let code = parsed.as_ref().and_then(|p| p.code.clone());
        let message = parsed
            .and_then(|p| p.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| body.to_string());
        Self {
            kind: classify(status, code.as_deref()),
            code,
            status: Some(status),
            message,
            endpoint: endpoint.to_string(),
        }
    }
}

/// Map an HTTP status and optional provider code to an error kind.
pub fn classify(status: u16, code: Option<&str>) -> AuthorityErrorKind {
    let quota_code = code.is_some_and(|c| QUOTA_CODES.iter().any(|q| c.eq_ignore_ascii_case(q)));
    match status {
        408 | 429 | 500..=599 => AuthorityErrorKind::TransientNetworkFailure,
        401 | 403 => AuthorityErrorKind::AuthenticationFailure,
        402 => AuthorityErrorKind::QuotaExhausted,
        _ if quota_code => AuthorityErrorKind::QuotaExhausted,
        422 => AuthorityErrorKind::ValidationRejected,
        400..=499 if code.is_some() => AuthorityErrorKind::ValidationRejected,
        _ => AuthorityErrorKind::Unknown,
    }
}
