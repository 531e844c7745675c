//! Caller-facing result contract.
//!
//! Every lifecycle operation resolves to an [`Outcome`], serialized as
//!
//! ```text
//! {"success": true,  "data": ...}
//! {"success": false, "errorKind": "quota_exhausted", "message": "..."}
//! ```
//!
//! so CLIs, schedulers and request handlers can treat the subsystem
//! uniformly.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::{ErrorKind, LifecycleError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Success(T),
    Failure { error_kind: ErrorKind, message: String },
}

impl<T> Outcome<T> {
    pub fn failure(error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            error_kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error_kind, .. } => Some(*error_kind),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(data) => Outcome::Success(f(data)),
            Self::Failure { error_kind, message } => Outcome::Failure { error_kind, message },
        }
    }
}

impl<T> From<Result<T, LifecycleError>> for Outcome<T> {
    fn from(result: Result<T, LifecycleError>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(err) => Self::Failure {
                error_kind: err.kind(),
                message: err.user_message(),
            },
        }
    }
}

impl<T: Serialize> Serialize for Outcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success(data) => {
                let mut s = serializer.serialize_struct("Outcome", 2)?;
                s.serialize_field("success", &true)?;
                s.serialize_field("data", data)?;
                s.end()
            }
            Self::Failure { error_kind, message } => {
                let mut s = serializer.serialize_struct("Outcome", 3)?;
                s.serialize_field("success", &false)?;
                s.serialize_field("errorKind", error_kind)?;
                s.serialize_field("message", message)?;
                s.end()
            }
        }
    }
}
