//! # Error Types
//!
//! Errors raised while constructing core primitives. All use `thiserror`
//! for `Display`/`Error`; each carries the offending input so a caller can
//! report it without re-parsing.

use thiserror::Error;

/// Top-level error type for `cfdi-core`.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A monetary or fixed-point value could not be parsed.
    #[error("amount error: {0}")]
    Amount(#[from] AmountError),

    /// An identifier failed validation.
    #[error("identifier error: {0}")]
    Identifier(#[from] IdentifierError),

    /// Canonical serialization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

/// Error parsing a fixed-point value (`Amount`, `Rate`, `Quantity`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// Input was empty or whitespace.
    #[error("empty value")]
    Empty,

    /// Input is not a decimal number.
    #[error("not a decimal number: {0:?}")]
    Invalid(String),

    /// Input has more fractional digits than the type can represent.
    #[error("{value:?} has more than {max} decimal places")]
    TooManyDecimals {
        /// The rejected input.
        value: String,
        /// Maximum fractional digits accepted.
        max: u32,
    },

    /// Input does not fit the fixed-point range.
    #[error("value out of range: {0:?}")]
    Overflow(String),
}

/// Error validating an identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// RFC (Registro Federal de Contribuyentes) is malformed.
    #[error("invalid RFC {value:?}: {reason}")]
    InvalidRfc {
        /// The rejected input.
        value: String,
        /// Which rule failed.
        reason: String,
    },

    /// A UUID-based identifier could not be parsed.
    #[error("invalid {kind} {value:?}")]
    InvalidUuid {
        /// Identifier kind, e.g. "folio fiscal".
        kind: &'static str,
        /// The rejected input.
        value: String,
    },
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Amounts must be strings or integers.
    #[error("float values are not permitted in canonical representations; use string or integer for amount: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
