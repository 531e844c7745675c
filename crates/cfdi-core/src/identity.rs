//! # Identity Types
//!
//! Newtype identifiers. UUID-backed ids are generated locally; `Rfc` and
//! `FolioFiscal` come from outside the system and are validated on
//! construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdentifierError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = IdentifierError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| IdentifierError::InvalidUuid {
                        kind: stringify!($name),
                        value: s.to_string(),
                    })
            }
        }
    };
}

uuid_id!(
    /// A fiscal transaction in the ledger.
    TransactionId
);
uuid_id!(
    /// A tenant company (the issuer side).
    CompanyId
);
uuid_id!(
    /// A client or supplier record.
    CounterpartyId
);
uuid_id!(
    /// A product/service catalog entry.
    ConceptId
);

// ─── Folio Fiscal ────────────────────────────────────────────────────

/// The authority-issued UUID of a stamped document (folio fiscal).
///
/// Rendered uppercase, the way the authority prints it on the signed XML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FolioFiscal(Uuid);

impl FolioFiscal {
    /// Wrap a UUID issued by the authority.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Parse a folio, accepting either case.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| IdentifierError::InvalidUuid {
                kind: "folio fiscal",
                value: s.to_string(),
            })
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for FolioFiscal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated().encode_upper(&mut Uuid::encode_buffer()))
    }
}

impl TryFrom<String> for FolioFiscal {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FolioFiscal> for String {
    fn from(value: FolioFiscal) -> Self {
        value.to_string()
    }
}

// ─── RFC ─────────────────────────────────────────────────────────────

/// Mexican taxpayer registry key (Registro Federal de Contribuyentes).
///
/// Format: a 3-letter (legal entity, 12 chars total) or 4-letter
/// (individual, 13 chars total) prefix of `A-Z`, `Ñ` or `&`, a `YYMMDD`
/// date, and a 3-character alphanumeric homoclave. Stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rfc(String);

impl Rfc {
    /// Generic RFC for domestic counterparties without a registry key.
    pub const GENERIC_DOMESTIC: &'static str = "XAXX010101000";

    /// Generic RFC for foreign counterparties.
    pub const GENERIC_FOREIGN: &'static str = "XEXX010101000";

    /// Validate and normalize an RFC.
    pub fn new(value: &str) -> Result<Self, IdentifierError> {
        let normalized = value.trim().to_uppercase();
        let chars: Vec<char> = normalized.chars().collect();
        let invalid = |reason: &str| IdentifierError::InvalidRfc {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let prefix_len = match chars.len() {
            12 => 3,
            13 => 4,
            n => return Err(invalid(&format!("expected 12 or 13 characters, got {n}"))),
        };

        let (prefix, rest) = chars.split_at(prefix_len);
        let (date, homoclave) = rest.split_at(6);

        if !prefix
            .iter()
            .all(|c| c.is_ascii_uppercase() || *c == 'Ñ' || *c == '&')
        {
            return Err(invalid("prefix must be letters, Ñ or &"));
        }
        if !date.iter().all(|c| c.is_ascii_digit()) {
            return Err(invalid("date segment must be six digits"));
        }
        let month = (date[2] as u32 - '0' as u32) * 10 + (date[3] as u32 - '0' as u32);
        let day = (date[4] as u32 - '0' as u32) * 10 + (date[5] as u32 - '0' as u32);
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(invalid("date segment is not a calendar date"));
        }
        if !homoclave
            .iter()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(invalid("homoclave must be alphanumeric"));
        }

        Ok(Self(normalized))
    }

    /// The normalized, uppercase RFC.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is one of the generic (public/foreign) RFCs.
    pub fn is_generic(&self) -> bool {
        self.0 == Self::GENERIC_DOMESTIC || self.0 == Self::GENERIC_FOREIGN
    }

    /// Whether this RFC belongs to an individual (13 characters).
    pub fn is_individual(&self) -> bool {
        self.0.chars().count() == 13
    }
}

impl fmt::Display for Rfc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Rfc {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Rfc {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Rfc> for String {
    fn from(value: Rfc) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc_accepts_legal_entity_and_individual() {
        let moral = Rfc::new("EKU9003173C9").unwrap();
        assert!(!moral.is_individual());
        let fisica = Rfc::new("xiqb891116qe4").unwrap();
        assert_eq!(fisica.as_str(), "XIQB891116QE4");
        assert!(fisica.is_individual());
        assert!(Rfc::new("ÑAÑ910101AB1").is_ok());
        assert!(Rfc::new("A&C010101AB1").is_ok());
    }

    #[test]
    fn rfc_generic_keys() {
        assert!(Rfc::new(Rfc::GENERIC_DOMESTIC).unwrap().is_generic());
        assert!(Rfc::new(Rfc::GENERIC_FOREIGN).unwrap().is_generic());
        assert!(!Rfc::new("EKU9003173C9").unwrap().is_generic());
    }

    #[test]
    fn rfc_rejects_malformed() {
        assert!(Rfc::new("").is_err());
        assert!(Rfc::new("EKU9003173C").is_err());
        assert!(Rfc::new("E1U9003173C9").is_err());
        assert!(Rfc::new("EKU90A3173C9").is_err());
        assert!(Rfc::new("EKU9013173C9").is_err());
        assert!(Rfc::new("EKU900317-C9").is_err());
    }

    #[test]
    fn rfc_serde_validates() {
        let rfc: Rfc = serde_json::from_str(r#""eku9003173c9""#).unwrap();
        assert_eq!(rfc.as_str(), "EKU9003173C9");
        assert!(serde_json::from_str::<Rfc>(r#""nope""#).is_err());
    }

    #[test]
    fn folio_displays_uppercase() {
        let folio = FolioFiscal::parse("6c1b8f3a-0f3e-4b8a-9d7e-2a1c5b7e9f01").unwrap();
        assert_eq!(folio.to_string(), "6C1B8F3A-0F3E-4B8A-9D7E-2A1C5B7E9F01");
        let json = serde_json::to_string(&folio).unwrap();
        let back: FolioFiscal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, folio);
    }

    #[test]
    fn transaction_id_parse() {
        let id = TransactionId::new();
        let parsed: TransactionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<TransactionId>().is_err());
    }
}
