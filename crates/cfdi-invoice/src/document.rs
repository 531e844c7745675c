//! # Stamped Documents and Cancellations
//!
//! A [`StampedDocument`] pairs the Comprobante that was submitted with the
//! authority's stamp (Timbre Fiscal Digital). It has no setters: once
//! built, neither the document nor the stamp can change.
//!
//! A [`CancellationRecord`] is appended when the authority acknowledges a
//! cancellation. The stamped document it refers to is kept.

use chrono::{DateTime, Utc};
use cfdi_core::{FolioFiscal, TransactionId};
use serde::{Deserialize, Serialize};

use crate::catalog::CancellationReason;
use crate::comprobante::Comprobante;

/// What the authority returns for an accepted stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampReceipt {
    pub uuid: FolioFiscal,
    /// `SelloCFD`: the issuer seal as recorded by the authority.
    pub cfd_seal: String,
    /// `SelloSAT`.
    pub sat_seal: String,
    pub sat_certificate_number: String,
    pub signed_xml: String,
    #[serde(default)]
    pub pdf_url: Option<String>,
    pub stamped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampedDocument {
    transaction_id: TransactionId,
    comprobante: Comprobante,
    receipt: StampReceipt,
    /// Hex SHA-256 of the submitted envelope.
    envelope_digest: String,
}

impl StampedDocument {
    pub fn new(
        transaction_id: TransactionId,
        comprobante: Comprobante,
        receipt: StampReceipt,
        envelope_digest: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id,
            comprobante,
            receipt,
            envelope_digest: envelope_digest.into(),
        }
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    pub fn comprobante(&self) -> &Comprobante {
        &self.comprobante
    }

    pub fn uuid(&self) -> FolioFiscal {
        self.receipt.uuid
    }

    pub fn receipt(&self) -> &StampReceipt {
        &self.receipt
    }

    pub fn signed_xml(&self) -> &str {
        &self.receipt.signed_xml
    }

    pub fn pdf_url(&self) -> Option<&str> {
        self.receipt.pdf_url.as_deref()
    }

    pub fn stamped_at(&self) -> DateTime<Utc> {
        self.receipt.stamped_at
    }

    pub fn envelope_digest(&self) -> &str {
        &self.envelope_digest
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationRecord {
    pub transaction_id: TransactionId,
    pub uuid: FolioFiscal,
    pub reason: CancellationReason,
    #[serde(default)]
    pub replacement_uuid: Option<FolioFiscal>,
    /// Authority acknowledgment (status text or acuse reference).
    pub acknowledgment: String,
    /// The authority reported the document as already cancelled.
    #[serde(default)]
    pub already_cancelled: bool,
    pub cancelled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_accessors() {
        let uuid = FolioFiscal::parse("6c1b8f3a-0f3e-4b8a-9d7e-2a1c5b7e9f01").unwrap();
        let receipt = StampReceipt {
            uuid,
            cfd_seal: "abc".into(),
            sat_seal: "def".into(),
            sat_certificate_number: "00001000000505142236".into(),
            signed_xml: "<cfdi:Comprobante/>".into(),
            pdf_url: None,
            stamped_at: Utc::now(),
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["uuid"], "6C1B8F3A-0F3E-4B8A-9D7E-2A1C5B7E9F01");
        let back: StampReceipt = serde_json::from_value(json).unwrap();
        assert_eq!(back, receipt);
    }
}
