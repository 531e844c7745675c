//! # Issuer and Counterparty Profiles
//!
//! `IssuerProfile` is the typed form of a company's fiscal settings.
//! Settings arrive as a loosely filled record ([`IssuerSettings`]) and are
//! converted once, at the boundary; a missing or malformed field is a
//! [`ProfileError`] there rather than a surprise inside the builder.

use cfdi_core::{CounterpartyId, IdentifierError, Rfc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::LOCAL_CURRENCY;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("issuer settings are missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("issuer settings field `{field}` is invalid: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error(transparent)]
    Rfc(#[from] IdentifierError),
}

/// The issuing company (Emisor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IssuerSettings", into = "IssuerSettings")]
pub struct IssuerProfile {
    pub rfc: Rfc,
    pub legal_name: String,
    /// `c_RegimenFiscal` code, e.g. `601`.
    pub tax_regime: String,
    /// Expedition postal code (`LugarExpedicion`).
    pub postal_code: String,
    pub currency: String,
}

/// Company fiscal settings as stored, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerSettings {
    #[serde(default)]
    pub rfc: Option<String>,
    #[serde(default)]
    pub legal_name: Option<String>,
    #[serde(default)]
    pub tax_regime: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ProfileError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ProfileError::MissingField { field }),
    }
}

fn digits(value: String, len: usize, field: &'static str) -> Result<String, ProfileError> {
    if is_code(&value, len) {
        Ok(value)
    } else {
        Err(ProfileError::InvalidField { field, value })
    }
}

/// Whether `value` is exactly `len` ASCII digits.
pub(crate) fn is_code(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

impl TryFrom<IssuerSettings> for IssuerProfile {
    type Error = ProfileError;

    fn try_from(settings: IssuerSettings) -> Result<Self, Self::Error> {
        let rfc = Rfc::new(&required(settings.rfc, "rfc")?)?;
        let legal_name = required(settings.legal_name, "legal_name")?;
        let tax_regime = digits(required(settings.tax_regime, "tax_regime")?, 3, "tax_regime")?;
        let postal_code = digits(required(settings.postal_code, "postal_code")?, 5, "postal_code")?;
        let currency = settings
            .currency
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| LOCAL_CURRENCY.to_string());

        Ok(Self {
            rfc,
            legal_name,
            tax_regime,
            postal_code,
            currency,
        })
    }
}

impl From<IssuerProfile> for IssuerSettings {
    fn from(profile: IssuerProfile) -> Self {
        Self {
            rfc: Some(profile.rfc.into()),
            legal_name: Some(profile.legal_name),
            tax_regime: Some(profile.tax_regime),
            postal_code: Some(profile.postal_code),
            currency: Some(profile.currency),
        }
    }
}

/// A client or supplier (Receptor).
///
/// Stored as captured; [`crate::TransactionValidator::check_counterparty`]
/// decides whether it is complete enough to stamp against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyProfile {
    pub id: CounterpartyId,
    pub rfc: String,
    pub legal_name: String,
    pub tax_regime: String,
    /// `c_UsoCFDI` code, e.g. `G03`.
    pub cfdi_use: String,
    /// Fiscal domicile postal code.
    pub postal_code: String,
}
