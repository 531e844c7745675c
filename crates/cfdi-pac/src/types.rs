//! Wire types for the provider's JSON API.
//!
//! ## Endpoints
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/cfdi40/stamp` | Stamp an envelope (`Idempotency-Key` header) |
//! | POST   | `/cfdi40/cancel` | Request cancellation |
//! | GET    | `/cfdi40/status` | Query authority status |
//! | GET    | `/account/credits` | Remaining prepaid stamps |
//!
//! Every response is wrapped as `{code?, message?, data?}`. Codes are
//! sometimes numbers and sometimes strings; both are read as strings.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use cfdi_core::{Amount, FolioFiscal};
use cfdi_invoice::{CancellationReason, Envelope, StampReceipt};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AuthorityError, AuthorityErrorKind};

/// Provider code: the envelope was stamped before; `data` holds the
/// original stamp.
pub const PREVIOUSLY_STAMPED: &str = "307";

/// Provider code: the document was already cancelled.
pub const PREVIOUSLY_CANCELLED: &str = "202";

/// Seconds west of UTC for `fechaTimbrado` values without an offset
/// (central Mexico).
const CENTRAL_MEXICO_WEST_SECS: i32 = 6 * 3600;

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderResponse<T> {
    #[serde(default, deserialize_with = "code_as_string")]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

fn code_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// -- Stamp --------------------------------------------------------------------

/// Issuer identity sent with every stamp request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerCredentials {
    pub rfc: String,
    pub certificate_number: String,
}

/// A stamp submission: the envelope and the issuer it is sent for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampRequest {
    pub envelope: Envelope,
    pub issuer: IssuerCredentials,
}

impl StampRequest {
    pub fn idempotency_key(&self) -> String {
        self.envelope.idempotency_key()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StampBody<'a> {
    pub envelope: &'a str,
    pub issuer: &'a IssuerCredentials,
}

/// `data` of a successful stamp response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampData {
    pub uuid: String,
    #[serde(rename = "selloCFD", default)]
    pub sello_cfd: String,
    #[serde(rename = "selloSAT")]
    pub sello_sat: String,
    #[serde(rename = "noCertificadoSAT")]
    pub no_certificado_sat: String,
    pub fecha_timbrado: String,
    pub cfdi: String,
    #[serde(default)]
    pub pdf_url: Option<String>,
}

impl StampData {
    pub fn into_receipt(self, endpoint: &str) -> Result<StampReceipt, AuthorityError> {
        let malformed = |what: String| AuthorityError::new(AuthorityErrorKind::Unknown, endpoint, what);
        let uuid = FolioFiscal::parse(&self.uuid)
            .map_err(|e| malformed(format!("stamp response carried {e}")))?;
        let stamped_at = parse_stamp_time(&self.fecha_timbrado)
            .ok_or_else(|| malformed(format!("unreadable fechaTimbrado {:?}", self.fecha_timbrado)))?;
        Ok(StampReceipt {
            uuid,
            cfd_seal: self.sello_cfd,
            sat_seal: self.sello_sat,
            sat_certificate_number: self.no_certificado_sat,
            signed_xml: self.cfdi,
            pdf_url: self.pdf_url,
            stamped_at,
        })
    }
}

/// RFC 3339, or a naive timestamp in central Mexico time.
pub fn parse_stamp_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    let offset = FixedOffset::west_opt(CENTRAL_MEXICO_WEST_SECS)?;
    naive
        .and_local_timezone(offset)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

// -- Cancel -------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub uuid: FolioFiscal,
    pub issuer_rfc: String,
    pub receiver_rfc: String,
    pub total: Amount,
    pub reason: CancellationReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_uuid: Option<FolioFiscal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CancelData {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub acuse: Option<String>,
}

/// The authority confirmed receipt of a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAcknowledgment {
    pub status: String,
    /// Acuse de cancelación, or the provider message when none was sent.
    pub acknowledgment: String,
    pub already_cancelled: bool,
}

// -- Status -------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub uuid: FolioFiscal,
    pub issuer_rfc: String,
    pub receiver_rfc: String,
    pub total: Amount,
}

impl StatusQuery {
    pub(crate) fn query_pairs(&self) -> [(&'static str, String); 4] {
        [
            ("uuid", self.uuid.to_string()),
            ("issuerRfc", self.issuer_rfc.clone()),
            ("receiverRfc", self.receiver_rfc.clone()),
            ("total", self.total.to_string()),
        ]
    }
}

/// The authority's record of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityDocumentStatus {
    Valid,
    Cancelled,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: AuthorityDocumentStatus,
    /// Whether and how the document may be cancelled, as reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_status: Option<String>,
}

// -- Credits ------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBalance {
    pub remaining: i64,
}
