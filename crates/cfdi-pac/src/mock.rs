//! In-process stamping authority for sandbox runs and tests.
//!
//! Behaves like a well-mannered provider: stamping the same envelope twice
//! returns the original stamp, cancelling twice is acknowledged as already
//! cancelled, and every stamp consumes one credit. Failures can be scripted
//! per operation and are returned in order before normal behavior resumes.
//! Call counters let tests assert how many requests reached the authority.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::Utc;
use cfdi_core::FolioFiscal;
use cfdi_invoice::StampReceipt;
use parking_lot::Mutex;

use crate::authority::StampingAuthority;
use crate::error::{AuthorityError, AuthorityErrorKind};
use crate::types::{
    AuthorityDocumentStatus, CancelAcknowledgment, CancelRequest, CreditBalance, StampRequest,
    StatusQuery, StatusReport,
};

const SAT_CERTIFICATE: &str = "00001000000505142236";

#[derive(Debug, Default)]
struct MockState {
    stamp_failures: VecDeque<AuthorityError>,
    cancel_failures: VecDeque<AuthorityError>,
    by_idempotency_key: HashMap<String, StampReceipt>,
    documents: HashMap<FolioFiscal, AuthorityDocumentStatus>,
    credits: i64,
}

#[derive(Debug)]
pub struct MockStampingAuthority {
    state: Mutex<MockState>,
    latency: Duration,
    stamp_calls: AtomicU32,
    cancel_calls: AtomicU32,
    status_calls: AtomicU32,
    credit_calls: AtomicU32,
}

impl Default for MockStampingAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStampingAuthority {
    /// A mock with 1,000 prepaid credits and no latency.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                credits: 1_000,
                ..MockState::default()
            }),
            latency: Duration::ZERO,
            stamp_calls: AtomicU32::new(0),
            cancel_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
            credit_calls: AtomicU32::new(0),
        }
    }

    pub fn with_credits(self, credits: i64) -> Self {
        self.state.lock().credits = credits;
        self
    }

    /// Delay every call, to widen race windows in concurrency tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the next stamp call with `kind`.
    pub fn fail_next_stamp(&self, kind: AuthorityErrorKind, message: &str) {
        self.state
            .lock()
            .stamp_failures
            .push_back(AuthorityError::new(kind, "POST /cfdi40/stamp", message));
    }

    pub fn fail_next_cancel(&self, kind: AuthorityErrorKind, message: &str) {
        self.state
            .lock()
            .cancel_failures
            .push_back(AuthorityError::new(kind, "POST /cfdi40/cancel", message));
    }

    /// Register a folio the authority already knows about, as when a
    /// sandbox session resumes from a saved ledger.
    pub fn record_document(&self, uuid: FolioFiscal, status: AuthorityDocumentStatus) {
        self.state.lock().documents.insert(uuid, status);
    }

    pub fn stamp_calls(&self) -> u32 {
        self.stamp_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> u32 {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn credit_calls(&self) -> u32 {
        self.credit_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> u32 {
        self.stamp_calls() + self.cancel_calls() + self.status_calls() + self.credit_calls()
    }

    pub fn remaining_credits(&self) -> i64 {
        self.state.lock().credits
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

/// Folio derived from the envelope digest, so one envelope always maps to
/// one UUID.
fn folio_for(request: &StampRequest) -> FolioFiscal {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&request.envelope.digest().bytes[..16]);
    FolioFiscal::from_uuid(uuid::Builder::from_random_bytes(bytes).into_uuid())
}

fn receipt_for(request: &StampRequest) -> StampReceipt {
    let uuid = folio_for(request);
    let stamped_at = Utc::now();
    let sat_seal = request.envelope.idempotency_key();
    let signed_xml = format!(
        concat!(
            r#"<cfdi:Comprobante Version="4.0" NoCertificado="{cert}">"#,
            r#"<cfdi:Complemento><tfd:TimbreFiscalDigital Version="1.1" UUID="{uuid}" "#,
            r#"FechaTimbrado="{fecha}" NoCertificadoSAT="{sat_cert}" SelloSAT="{sello}"/>"#,
            r#"</cfdi:Complemento></cfdi:Comprobante>"#
        ),
        cert = request.issuer.certificate_number,
        uuid = uuid,
        fecha = stamped_at.format("%Y-%m-%dT%H:%M:%S"),
        sat_cert = SAT_CERTIFICATE,
        sello = sat_seal,
    );
    StampReceipt {
        uuid,
        cfd_seal: String::new(),
        sat_seal,
        sat_certificate_number: SAT_CERTIFICATE.to_string(),
        signed_xml,
        pdf_url: None,
        stamped_at,
    }
}

impl StampingAuthority for MockStampingAuthority {
    async fn stamp(&self, request: &StampRequest) -> Result<StampReceipt, AuthorityError> {
        self.stamp_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let mut state = self.state.lock();
        if let Some(err) = state.stamp_failures.pop_front() {
            return Err(err);
        }
        let key = request.idempotency_key();
        if let Some(previous) = state.by_idempotency_key.get(&key) {
            return Ok(previous.clone());
        }
        if state.credits <= 0 {
            return Err(AuthorityError::new(
                AuthorityErrorKind::QuotaExhausted,
                "POST /cfdi40/stamp",
                "no stamping credits remaining",
            )
            .with_code("902"));
        }
        state.credits -= 1;
        let receipt = receipt_for(request);
        state.documents.insert(receipt.uuid, AuthorityDocumentStatus::Valid);
        state.by_idempotency_key.insert(key, receipt.clone());
        Ok(receipt)
    }

    async fn cancel(&self, request: &CancelRequest) -> Result<CancelAcknowledgment, AuthorityError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let mut state = self.state.lock();
        if let Some(err) = state.cancel_failures.pop_front() {
            return Err(err);
        }
        match state.documents.get_mut(&request.uuid) {
            None => Err(AuthorityError::new(
                AuthorityErrorKind::ValidationRejected,
                "POST /cfdi40/cancel",
                format!("UUID {} not found for issuer {}", request.uuid, request.issuer_rfc),
            )
            .with_code("205")),
            Some(status) => {
                let already_cancelled = *status == AuthorityDocumentStatus::Cancelled;
                *status = AuthorityDocumentStatus::Cancelled;
                Ok(CancelAcknowledgment {
                    status: "cancelled".to_string(),
                    acknowledgment: format!("acuse-{}", request.uuid),
                    already_cancelled,
                })
            }
        }
    }

    async fn query_status(&self, query: &StatusQuery) -> Result<StatusReport, AuthorityError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let status = self
            .state
            .lock()
            .documents
            .get(&query.uuid)
            .copied()
            .unwrap_or(AuthorityDocumentStatus::NotFound);
        Ok(StatusReport {
            status,
            cancellable: (status == AuthorityDocumentStatus::Valid).then(|| "Cancelable sin aceptación".to_string()),
            cancellation_status: (status == AuthorityDocumentStatus::Cancelled)
                .then(|| "Cancelado sin aceptación".to_string()),
        })
    }

    async fn credit_balance(&self) -> Result<CreditBalance, AuthorityError> {
        self.credit_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(CreditBalance {
            remaining: self.state.lock().credits,
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
