//! # Issuer Sealing
//!
//! The issuer's digital seal (`Sello`) is produced by a [`Sealer`] over the
//! canonical bytes of the unsealed Comprobante. Key material is supplied
//! out of band per company and zeroized when dropped.
//!
//! [`PacDelegatedSealer`] is the default: the stamping authority holds the
//! issuer's CSD and seals on its behalf, so only the certificate number is
//! attached locally.

use std::fmt;

use cfdi_core::CanonicalBytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SealError {
    #[error("issuer key material is unusable: {reason}")]
    InvalidKeyMaterial { reason: String },

    #[error("sealing failed: {reason}")]
    Failed { reason: String },
}

/// CSD certificate and key for one issuer. Base64-encoded DER.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct IssuerKeyMaterial {
    /// Twenty-digit certificate serial (`NoCertificado`).
    pub certificate_number: String,
    #[serde(default)]
    pub certificate: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub password: String,
}

impl IssuerKeyMaterial {
    pub fn new(certificate_number: impl Into<String>) -> Self {
        Self {
            certificate_number: certificate_number.into(),
            certificate: String::new(),
            private_key: String::new(),
            password: String::new(),
        }
    }
}

impl fmt::Debug for IssuerKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerKeyMaterial")
            .field("certificate_number", &self.certificate_number)
            .field("private_key", &"[REDACTED]")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A seal value and the certificate that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalSeal {
    /// Base64 seal, or empty when the authority seals.
    pub value: String,
    pub certificate_number: String,
}

pub trait Sealer: Send + Sync {
    fn seal(&self, payload: &CanonicalBytes, key: &IssuerKeyMaterial) -> Result<DigitalSeal, SealError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PacDelegatedSealer;

impl Sealer for PacDelegatedSealer {
    fn seal(&self, _payload: &CanonicalBytes, key: &IssuerKeyMaterial) -> Result<DigitalSeal, SealError> {
        let number = key.certificate_number.trim();
        if number.len() != 20 || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SealError::InvalidKeyMaterial {
                reason: format!("certificate number {number:?} is not a twenty-digit serial"),
            });
        }
        Ok(DigitalSeal {
            value: String::new(),
            certificate_number: number.to_string(),
        })
    }
}
