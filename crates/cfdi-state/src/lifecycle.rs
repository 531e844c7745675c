//! # Document Lifecycle
//!
//! Orchestrates a fiscal transaction from draft to a stamped (and possibly
//! cancelled) CFDI.
//!
//! ## States
//!
//! ```text
//! Draft ──▶ Previewed ──▶ Stamped ──▶ Cancelled (terminal)
//!   │                       ▲
//!   └───────────────────────┘
//! ```
//!
//! - `preview` builds the Comprobante without contacting the authority.
//! - `stamp` is single-flight per transaction. A second caller while a
//!   stamp is in flight gets [`LifecycleError::StampInProgress`] and never
//!   reaches the authority.
//! - The stamped document and the `Stamped` status are written in one
//!   repository call. A failed or ambiguous authority call leaves the
//!   status untouched; [`DocumentLifecycle::reconcile`] compares the local
//!   record with the authority afterwards.
//! - Retries happen here and nowhere else, only for transient failures.

use std::collections::HashSet;

use chrono::Utc;
use cfdi_core::{FolioFiscal, TransactionId};
use cfdi_invoice::{
    CancellationReason, CancellationRecord, Comprobante, ConceptLine, CounterpartyProfile, DocumentBuilder,
    DocumentStatus, Envelope, EnvelopeEncoder, FiscalTransaction, IssuerProfile, PacDelegatedSealer, Sealer,
    StampedDocument, TransactionValidator, ValidationFailure,
};
use cfdi_pac::{
    AuthorityDocumentStatus, CancelRequest, CreditBalance, IssuerCredentials, StampRequest, StampingAuthority,
    StatusQuery, StatusReport,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::LifecycleConfig;
use crate::error::LifecycleError;
use crate::repository::{DocumentRepository, RepositoryError};
use crate::retry::with_retry;

const STAMP: &str = "POST /cfdi40/stamp";
const CANCEL: &str = "POST /cfdi40/cancel";
const STATUS: &str = "GET /cfdi40/status";
const CREDITS: &str = "GET /account/credits";

/// What the caller supplies to cancel a stamped document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelCommand {
    pub reason: CancellationReason,
    #[serde(default)]
    pub replacement_uuid: Option<FolioFiscal>,
}

impl CancelCommand {
    pub fn new(reason: CancellationReason) -> Self {
        Self {
            reason,
            replacement_uuid: None,
        }
    }

    pub fn replaced_by(mut self, uuid: FolioFiscal) -> Self {
        self.replacement_uuid = Some(uuid);
        self
    }
}

/// Local status next to the authority's record of the same folio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub transaction_id: TransactionId,
    pub uuid: FolioFiscal,
    pub local_status: DocumentStatus,
    pub authority: StatusReport,
    pub consistent: bool,
}

/// Everything the builder produced for one transaction.
struct Prepared {
    issuer: IssuerProfile,
    comprobante: Comprobante,
}

/// A sealed document and the request that submits it.
struct Submission {
    request: StampRequest,
    sealed: Comprobante,
}

/// Removes the transaction from the in-flight set when dropped, including
/// on early return and on cancellation of the stamp future.
struct StampClaim<'a> {
    in_flight: &'a Mutex<HashSet<TransactionId>>,
    id: TransactionId,
}

impl Drop for StampClaim<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.id);
    }
}

pub struct DocumentLifecycle<R, A, S = PacDelegatedSealer> {
    repository: R,
    authority: A,
    sealer: S,
    config: LifecycleConfig,
    in_flight: Mutex<HashSet<TransactionId>>,
}

impl<R, A> DocumentLifecycle<R, A, PacDelegatedSealer> {
    pub fn new(repository: R, authority: A) -> Self {
        Self {
            repository,
            authority,
            sealer: PacDelegatedSealer,
            config: LifecycleConfig::default(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }
}

impl<R, A, S> DocumentLifecycle<R, A, S> {
    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sealer<T>(self, sealer: T) -> DocumentLifecycle<R, A, T> {
        DocumentLifecycle {
            repository: self.repository,
            authority: self.authority,
            sealer,
            config: self.config,
            in_flight: self.in_flight,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }
}

impl<R, A, S> DocumentLifecycle<R, A, S>
where
    R: DocumentRepository,
    A: StampingAuthority,
    S: Sealer,
{
    /// Validate and build the unsealed Comprobante. No status change.
    pub fn build(&self, id: TransactionId) -> Result<Comprobante, LifecycleError> {
        let tx = self.find_transaction(id)?;
        ensure_stampable(&tx)?;
        Ok(self.prepare(tx)?.comprobante)
    }

    /// Build the Comprobante without contacting the authority and move a
    /// draft to `Previewed`. Previewing again is allowed.
    pub fn preview(&self, id: TransactionId) -> Result<Comprobante, LifecycleError> {
        let tx = self.find_transaction(id)?;
        ensure_stampable(&tx)?;
        let from = tx.document_status;
        let prepared = self.prepare(tx)?;

        if from == DocumentStatus::Draft {
            match self
                .repository
                .transition_status(id, DocumentStatus::Draft, DocumentStatus::Previewed)
            {
                Ok(()) => {
                    tracing::info!(transaction_id = %id, from = %from, to = %DocumentStatus::Previewed, "status transition");
                }
                // A concurrent preview got there first.
                Err(RepositoryError::StatusConflict {
                    actual: DocumentStatus::Previewed,
                    ..
                }) => {}
                Err(e) => return Err(status_conflict(id, e)),
            }
        }
        Ok(prepared.comprobante)
    }

    /// The sealed envelope [`Self::stamp`] would submit for `id`, built the
    /// same way. No status change and no authority call.
    pub fn envelope(&self, id: TransactionId) -> Result<Envelope, LifecycleError> {
        let tx = self.find_transaction(id)?;
        ensure_stampable(&tx)?;
        Ok(self.submission(tx)?.request.envelope)
    }

    /// Validate, build, seal, encode and submit. Returns the stamped
    /// document once it is durably recorded.
    pub async fn stamp(&self, id: TransactionId) -> Result<StampedDocument, LifecycleError> {
        let _claim = self.claim(id)?;

        let tx = self.find_transaction(id)?;
        ensure_stampable(&tx)?;
        let from = tx.document_status;
        let Submission { request, sealed } = self.submission(tx)?;

        if self.config.check_credits_before_stamp {
            self.check_credits(id).await?;
        }

        let idempotency_key = request.idempotency_key();
        tracing::info!(
            transaction_id = %id,
            authority = self.authority.name(),
            digest = %idempotency_key,
            "submitting document for stamping"
        );

        let receipt = with_retry(&self.config, STAMP, |attempt| {
            tracing::debug!(transaction_id = %id, attempt, "stamp attempt");
            self.authority.stamp(&request)
        })
        .await
        .map_err(|e| {
            tracing::warn!(
                transaction_id = %id,
                error_kind = %e.kind,
                code = ?e.code,
                "stamping failed; status left at {from}"
            );
            LifecycleError::Authority(e)
        })?;

        let uuid = receipt.uuid;
        let document = StampedDocument::new(id, sealed, receipt, idempotency_key);
        if let Err(e) = self.repository.save_stamped_document(document.clone()) {
            // The authority holds a stamp the ledger does not; reconcile by uuid.
            tracing::error!(transaction_id = %id, uuid = %uuid, "stamped document could not be recorded: {e}");
            return Err(status_conflict(id, e));
        }

        tracing::info!(
            transaction_id = %id,
            uuid = %uuid,
            from = %from,
            to = %DocumentStatus::Stamped,
            "document stamped"
        );
        Ok(document)
    }

    /// Cancel a stamped document. Cancelling again returns the existing
    /// record without contacting the authority.
    pub async fn cancel(&self, id: TransactionId, command: CancelCommand) -> Result<CancellationRecord, LifecycleError> {
        let tx = self.find_transaction(id)?;
        if let Some(existing) = self.repository.find_cancellation_record(id) {
            tracing::info!(transaction_id = %id, uuid = %existing.uuid, "already cancelled; returning existing record");
            return Ok(existing);
        }
        match tx.document_status {
            DocumentStatus::Stamped => {}
            DocumentStatus::Cancelled => return Err(LifecycleError::DocumentAlreadyCancelled(id)),
            DocumentStatus::Draft | DocumentStatus::Previewed => return Err(LifecycleError::NotStamped(id)),
        }
        if command.reason.requires_replacement() && command.replacement_uuid.is_none() {
            return Err(LifecycleError::Validation(vec![ValidationFailure::new(
                "replacement_uuid",
                format!("is required for cancellation reason {}", command.reason.code()),
            )]));
        }

        let document = self.find_stamped(id)?;
        let comprobante = document.comprobante();
        let request = CancelRequest {
            uuid: document.uuid(),
            issuer_rfc: comprobante.emisor.rfc.clone(),
            receiver_rfc: comprobante.receptor.rfc.clone(),
            total: comprobante.total,
            reason: command.reason,
            replacement_uuid: command.replacement_uuid,
        };
        tracing::info!(transaction_id = %id, uuid = %request.uuid, reason = %command.reason, "requesting cancellation");

        let ack = with_retry(&self.config, CANCEL, |attempt| {
            tracing::debug!(transaction_id = %id, attempt, "cancel attempt");
            self.authority.cancel(&request)
        })
        .await
        .map_err(|e| {
            tracing::warn!(transaction_id = %id, error_kind = %e.kind, code = ?e.code, "cancellation failed");
            LifecycleError::Authority(e)
        })?;

        let record = CancellationRecord {
            transaction_id: id,
            uuid: request.uuid,
            reason: command.reason,
            replacement_uuid: command.replacement_uuid,
            acknowledgment: ack.acknowledgment,
            already_cancelled: ack.already_cancelled,
            cancelled_at: Utc::now(),
        };
        match self.repository.save_cancellation_record(record.clone()) {
            Ok(()) => {
                tracing::info!(
                    transaction_id = %id,
                    uuid = %record.uuid,
                    from = %DocumentStatus::Stamped,
                    to = %DocumentStatus::Cancelled,
                    "document cancelled"
                );
                Ok(record)
            }
            // A concurrent cancel recorded first; its record stands.
            Err(RepositoryError::DuplicateCancellation(_)) => self
                .repository
                .find_cancellation_record(id)
                .ok_or_else(|| LifecycleError::not_found("cancellation record for transaction", id)),
            Err(e) => Err(status_conflict(id, e)),
        }
    }

    /// The authority's current record of the stamped document.
    pub async fn query_status(&self, id: TransactionId) -> Result<StatusReport, LifecycleError> {
        let document = self.find_stamped(id)?;
        let query = status_query(&document);
        let report = with_retry(&self.config, STATUS, |_| self.authority.query_status(&query)).await?;
        tracing::info!(transaction_id = %id, uuid = %query.uuid, status = ?report.status, "status queried");
        Ok(report)
    }

    /// Compare the local status with the authority's. Read-only.
    pub async fn reconcile(&self, id: TransactionId) -> Result<ReconciliationReport, LifecycleError> {
        let tx = self.find_transaction(id)?;
        let document = self.find_stamped(id)?;
        let authority = self.query_status(id).await?;

        let consistent = matches!(
            (tx.document_status, authority.status),
            (DocumentStatus::Stamped, AuthorityDocumentStatus::Valid)
                | (DocumentStatus::Cancelled, AuthorityDocumentStatus::Cancelled)
        );
        if !consistent {
            tracing::warn!(
                transaction_id = %id,
                uuid = %document.uuid(),
                local = %tx.document_status,
                authority = ?authority.status,
                "local status disagrees with the authority"
            );
        }
        Ok(ReconciliationReport {
            transaction_id: id,
            uuid: document.uuid(),
            local_status: tx.document_status,
            authority,
            consistent,
        })
    }

    pub async fn credit_balance(&self) -> Result<CreditBalance, LifecycleError> {
        let balance = with_retry(&self.config, CREDITS, |_| self.authority.credit_balance()).await?;
        if balance.remaining < self.config.low_credit_threshold {
            tracing::warn!(remaining = balance.remaining, "stamp credits are running low");
        }
        Ok(balance)
    }

    /// Payment complements (CFDI de pago) are not supported yet.
    pub async fn payment_complement(&self, id: TransactionId) -> Result<StampedDocument, LifecycleError> {
        tracing::info!(transaction_id = %id, "payment complement requested");
        Err(LifecycleError::NotImplemented {
            feature: "payment complement",
        })
    }

    fn claim(&self, id: TransactionId) -> Result<StampClaim<'_>, LifecycleError> {
        if !self.in_flight.lock().insert(id) {
            tracing::warn!(transaction_id = %id, "stamp already in flight");
            return Err(LifecycleError::StampInProgress(id));
        }
        Ok(StampClaim {
            in_flight: &self.in_flight,
            id,
        })
    }

    fn find_transaction(&self, id: TransactionId) -> Result<FiscalTransaction, LifecycleError> {
        self.repository
            .find_transaction_by_id(id)
            .ok_or_else(|| LifecycleError::not_found("transaction", id))
    }

    fn find_stamped(&self, id: TransactionId) -> Result<StampedDocument, LifecycleError> {
        self.repository
            .find_stamped_document(id)
            .ok_or(LifecycleError::NotStamped(id))
    }

    /// Validate the transaction and everything it references, then build.
    fn prepare(&self, tx: FiscalTransaction) -> Result<Prepared, LifecycleError> {
        let id = tx.id;
        let validated = TransactionValidator::validate(tx).map_err(|failures| {
            tracing::info!(transaction_id = %id, failures = failures.len(), "transaction failed validation");
            LifecycleError::Validation(failures)
        })?;
        let tx = validated.transaction();

        let issuer = self
            .repository
            .find_issuer_profile(tx.company_id)
            .ok_or_else(|| LifecycleError::not_found("issuer profile for company", tx.company_id))?;

        let counterparty_id = tx.counterparty_id.ok_or_else(|| {
            LifecycleError::Validation(vec![ValidationFailure::new("counterparty_id", "is required")])
        })?;
        let counterparty = self
            .repository
            .find_counterparty_profile(counterparty_id)
            .ok_or_else(|| LifecycleError::not_found("counterparty", counterparty_id))?;

        let concepts = self.repository.list_concept_lines(&tx.concept_ids);
        if let Some(missing) = tx
            .concept_ids
            .iter()
            .find(|want| !concepts.iter().any(|line| line.concept_id == **want))
        {
            return Err(LifecycleError::not_found("concept", missing));
        }

        check_references(&counterparty, &concepts)?;
        let comprobante = DocumentBuilder::build(&validated, &issuer, &counterparty, &concepts);
        tracing::debug!(transaction_id = %id, total = %comprobante.total, "comprobante built");

        Ok(Prepared {
            issuer,
            comprobante,
        })
    }

    /// Seal the built document with the issuer's key and encode it.
    fn submission(&self, tx: FiscalTransaction) -> Result<Submission, LifecycleError> {
        let company_id = tx.company_id;
        let prepared = self.prepare(tx)?;

        let key = self
            .repository
            .find_issuer_key_material(company_id)
            .ok_or_else(|| LifecycleError::not_found("issuer key material for company", company_id))?;
        let unsealed = EnvelopeEncoder::canonical(&prepared.comprobante)?;
        let seal = self.sealer.seal(&unsealed, &key)?;
        let certificate_number = seal.certificate_number.clone();
        let sealed = prepared.comprobante.with_seal(seal);

        Ok(Submission {
            request: StampRequest {
                envelope: EnvelopeEncoder::encode(&sealed)?,
                issuer: IssuerCredentials {
                    rfc: prepared.issuer.rfc.as_str().to_string(),
                    certificate_number,
                },
            },
            sealed,
        })
    }

    async fn check_credits(&self, id: TransactionId) -> Result<(), LifecycleError> {
        match self.credit_balance().await {
            Ok(balance) if balance.remaining <= 0 => {
                tracing::warn!(transaction_id = %id, remaining = balance.remaining, "no stamp credits left");
                Err(LifecycleError::InsufficientCredits {
                    remaining: balance.remaining,
                })
            }
            Ok(_) => Ok(()),
            // The stamp call reports quota itself; an unreadable balance
            // does not block stamping.
            Err(e) => {
                tracing::warn!(transaction_id = %id, "credit pre-check skipped: {e}");
                Ok(())
            }
        }
    }
}

fn ensure_stampable(tx: &FiscalTransaction) -> Result<(), LifecycleError> {
    match tx.document_status {
        DocumentStatus::Draft | DocumentStatus::Previewed => Ok(()),
        DocumentStatus::Stamped => Err(LifecycleError::DocumentAlreadyStamped(tx.id)),
        DocumentStatus::Cancelled => Err(LifecycleError::DocumentAlreadyCancelled(tx.id)),
    }
}

/// Translate a failed status write into the caller-facing conflict.
fn status_conflict(id: TransactionId, err: RepositoryError) -> LifecycleError {
    match err {
        RepositoryError::StatusConflict {
            actual: DocumentStatus::Stamped,
            ..
        }
        | RepositoryError::DuplicateStampedDocument(_) => LifecycleError::DocumentAlreadyStamped(id),
        RepositoryError::StatusConflict {
            actual: DocumentStatus::Cancelled,
            ..
        } => LifecycleError::DocumentAlreadyCancelled(id),
        other => LifecycleError::Repository(other),
    }
}

fn check_references(counterparty: &CounterpartyProfile, concepts: &[ConceptLine]) -> Result<(), LifecycleError> {
    let mut failures = TransactionValidator::check_counterparty(counterparty);
    failures.extend(TransactionValidator::check_concepts(concepts));
    if failures.is_empty() {
        Ok(())
    } else {
        Err(LifecycleError::Validation(failures))
    }
}

fn status_query(document: &StampedDocument) -> StatusQuery {
    let comprobante = document.comprobante();
    StatusQuery {
        uuid: document.uuid(),
        issuer_rfc: comprobante.emisor.rfc.clone(),
        receiver_rfc: comprobante.receptor.rfc.clone(),
        total: comprobante.total,
    }
}
