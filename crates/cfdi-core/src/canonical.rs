//! # Canonical Serialization: JCS Byte Production
//!
//! `CanonicalBytes` is the sole construction path for bytes that leave the
//! process as a stamping envelope or feed a payload digest.
//!
//! ## Invariant
//!
//! The inner buffer is private. `CanonicalBytes::new()` rejects floats and
//! serializes with `serde_jcs` (RFC 8785): sorted keys, compact separators,
//! no trailing whitespace. Two calls on equal values produce equal bytes,
//! which is what lets the authority deduplicate submissions by hash.
//!
//! Monetary fields never reach this module as floats: `Amount`, `Rate` and
//! `Quantity` serialize as decimal strings. The float check catches a stray
//! `f64` in an ad-hoc payload before it is sent.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::FloatRejected` if the value contains
    /// float numbers, `CanonicalizationError::SerializationFailed` if JSON
    /// serialization fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        reject_floats(&value)?;
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the canonical encoding in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` for JSON output; present alongside `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the owned buffer.
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn reject_floats(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => {
            if n.is_f64() {
                if let Some(f) = n.as_f64() {
                    return Err(CanonicalizationError::FloatRejected(f));
                }
            }
            Ok(())
        }
        Value::Array(items) => items.iter().try_for_each(reject_floats),
        Value::Object(map) => map.values().try_for_each(reject_floats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;

    #[test]
    fn sorted_keys_compact_separators() {
        let data = serde_json::json!({"b": 2, "a": 1, "c": "hola"});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"a":1,"b":2,"c":"hola"}"#);
    }

    #[test]
    fn nested_objects_sorted() {
        let data = serde_json::json!({
            "Receptor": {"Rfc": "XAXX010101000", "Nombre": "PUBLICO"},
            "Conceptos": [3, 2, 1]
        });
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(
            std::str::from_utf8(cb.as_bytes()).unwrap(),
            r#"{"Conceptos":[3,2,1],"Receptor":{"Nombre":"PUBLICO","Rfc":"XAXX010101000"}}"#
        );
    }

    #[test]
    fn float_rejected_anywhere() {
        let data = serde_json::json!({"Total": 1.5});
        match CanonicalBytes::new(&data) {
            Err(CanonicalizationError::FloatRejected(f)) => assert_eq!(f, 1.5),
            other => panic!("expected FloatRejected, got {other:?}"),
        }
        let nested = serde_json::json!({"Conceptos": [{"Importe": 0.5}]});
        assert!(CanonicalBytes::new(&nested).is_err());
    }

    #[test]
    fn amounts_serialize_as_strings() {
        let data = serde_json::json!({"Total": Amount::from_cents(1_160_000)});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"Total":"11600.00"}"#);
    }

    #[test]
    fn non_ascii_preserved_as_utf8() {
        let data = serde_json::json!({"Nombre": "COMPAÑÍA"});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(std::str::from_utf8(cb.as_bytes()).unwrap(), r#"{"Nombre":"COMPAÑÍA"}"#);
    }

    #[test]
    fn deterministic_across_calls() {
        let data = serde_json::json!({"z": [1, {"y": "a", "x": "b"}], "a": null});
        assert_eq!(CanonicalBytes::new(&data).unwrap(), CanonicalBytes::new(&data).unwrap());
    }
}
