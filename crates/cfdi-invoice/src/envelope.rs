//! # Envelope Encoding
//!
//! The wire payload sent to the stamping authority: the JCS-canonical JSON
//! of `{"Comprobante": ...}`, base64-encoded (standard alphabet, padded).
//!
//! Encoding is deterministic. The SHA-256 digest of the canonical bytes is
//! carried with the envelope and used as the submission's idempotency key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cfdi_core::{sha256_digest, CanonicalBytes, CanonicalizationError, ContentDigest};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::comprobante::Comprobante;

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    #[error("envelope is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("envelope payload is not a Comprobante: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Wire<T> {
    comprobante: T,
}

/// A base64 stamping payload and the digest of its decoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    payload: String,
    digest: ContentDigest,
}

impl Envelope {
    pub fn as_str(&self) -> &str {
        &self.payload
    }

    pub fn digest(&self) -> &ContentDigest {
        &self.digest
    }

    /// Hex digest, used as the `Idempotency-Key` header.
    pub fn idempotency_key(&self) -> String {
        self.digest.to_hex()
    }

    pub fn into_string(self) -> String {
        self.payload
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeEncoder;

impl EnvelopeEncoder {
    /// Canonical bytes of the wrapped document.
    pub fn canonical(doc: &Comprobante) -> Result<CanonicalBytes, EnvelopeError> {
        Ok(CanonicalBytes::new(&Wire { comprobante: doc })?)
    }

    pub fn encode(doc: &Comprobante) -> Result<Envelope, EnvelopeError> {
        let bytes = Self::canonical(doc)?;
        Ok(Envelope {
            digest: sha256_digest(&bytes),
            payload: STANDARD.encode(bytes.as_bytes()),
        })
    }

    pub fn decode(payload: &str) -> Result<Comprobante, EnvelopeError> {
        let bytes = STANDARD.decode(payload.trim())?;
        let wire: Wire<Comprobante> = serde_json::from_slice(&bytes)?;
        Ok(wire.comprobante)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DocumentBuilder;
    use crate::concept::fixtures::consulting;
    use crate::profile::fixtures::{counterparty, issuer};
    use crate::seal::DigitalSeal;
    use crate::transaction::fixtures;
    use crate::validation::TransactionValidator;
    use cfdi_core::ConceptId;

    fn document() -> Comprobante {
        let tx = fixtures::income();
        let cp = counterparty(tx.counterparty_id.unwrap());
        let validated = TransactionValidator::validate(tx).unwrap();
        DocumentBuilder::build(&validated, &issuer(), &cp, &[consulting(ConceptId::new(), 1_000_000)])
    }

    #[test]
    fn encoding_is_deterministic() {
        let doc = document();
        let a = EnvelopeEncoder::encode(&doc).unwrap();
        let b = EnvelopeEncoder::encode(&doc.clone()).unwrap();
        assert_eq!(a.as_str(), b.as_str());
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn decode_recovers_document() {
        let doc = document();
        let envelope = EnvelopeEncoder::encode(&doc).unwrap();
        assert_eq!(EnvelopeEncoder::decode(envelope.as_str()).unwrap(), doc);
    }

    #[test]
    fn wire_shape_is_canonical_json() {
        let doc = document();
        let bytes = EnvelopeEncoder::canonical(&doc).unwrap();
        let text = std::str::from_utf8(bytes.as_bytes()).unwrap();
        assert!(text.starts_with(r#"{"Comprobante":{"Conceptos":[{"Cantidad":"1","ClaveProdServ":"80101500""#));
        assert!(text.contains(r#""Fecha":"2026-03-14T10:30:00""#));
        assert!(text.contains(r#""Total":"11600.00""#));
        assert!(!text.contains("Sello"));
        assert!(!text.contains("null"));
    }

    #[test]
    fn digest_changes_with_seal() {
        let doc = document();
        let sealed = doc.clone().with_seal(DigitalSeal {
            value: String::new(),
            certificate_number: "30001000000500003416".into(),
        });
        let a = EnvelopeEncoder::encode(&doc).unwrap();
        let b = EnvelopeEncoder::encode(&sealed).unwrap();
        assert_ne!(a.idempotency_key(), b.idempotency_key());
        assert_eq!(a.idempotency_key().len(), 64);
    }

    #[test]
    fn garbage_rejected() {
        assert!(matches!(EnvelopeEncoder::decode("!!!"), Err(EnvelopeError::Base64(_))));
        let not_doc = STANDARD.encode(br#"{"Comprobante":{}}"#);
        assert!(matches!(EnvelopeEncoder::decode(&not_doc), Err(EnvelopeError::Payload(_))));
    }
}
