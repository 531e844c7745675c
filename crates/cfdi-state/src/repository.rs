//! # Repository Interface
//!
//! The lifecycle never issues storage queries itself; it reads and writes
//! through [`DocumentRepository`]. Writes that change document status are
//! compare-and-set under one lock, and the two terminal writes
//! (`save_stamped_document`, `save_cancellation_record`) persist the record
//! and the status change as a unit.
//!
//! [`InMemoryRepository`] is the bundled implementation. It is cloneable
//! (clones share state) and round-trips through [`LedgerSnapshot`] for the
//! CLI's JSON ledger file.

use std::collections::HashMap;
use std::sync::Arc;

use cfdi_core::{CompanyId, ConceptId, CounterpartyId, TransactionId};
use cfdi_invoice::{
    CancellationRecord, ConceptLine, CounterpartyProfile, DocumentStatus, FiscalTransaction, IssuerKeyMaterial,
    IssuerProfile, StampedDocument,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),

    /// The stored status was not the one the caller expected, or the
    /// requested transition is not in the state machine.
    #[error("transaction {id} is {actual}; cannot move from {expected} to {requested}")]
    StatusConflict {
        id: TransactionId,
        expected: DocumentStatus,
        actual: DocumentStatus,
        requested: DocumentStatus,
    },

    #[error("transaction {0} already has a stamped document")]
    DuplicateStampedDocument(TransactionId),

    #[error("transaction {0} already has a cancellation record")]
    DuplicateCancellation(TransactionId),

    #[error("transaction {0} has no stamped document")]
    MissingStampedDocument(TransactionId),
}

/// Storage consumed by the document lifecycle.
pub trait DocumentRepository: Send + Sync {
    fn find_transaction_by_id(&self, id: TransactionId) -> Option<FiscalTransaction>;

    fn find_issuer_profile(&self, company_id: CompanyId) -> Option<IssuerProfile>;

    fn find_counterparty_profile(&self, id: CounterpartyId) -> Option<CounterpartyProfile>;

    /// Concept lines for `ids`, in the order given. Unknown ids are skipped.
    fn list_concept_lines(&self, ids: &[ConceptId]) -> Vec<ConceptLine>;

    fn find_issuer_key_material(&self, company_id: CompanyId) -> Option<IssuerKeyMaterial>;

    fn find_stamped_document(&self, id: TransactionId) -> Option<StampedDocument>;

    fn find_cancellation_record(&self, id: TransactionId) -> Option<CancellationRecord>;

    /// Move `id` from `from` to `to` if it is still in `from` and the
    /// transition is valid.
    fn transition_status(
        &self,
        id: TransactionId,
        from: DocumentStatus,
        to: DocumentStatus,
    ) -> Result<(), RepositoryError>;

    /// Store the stamped document and mark the transaction `Stamped` in one
    /// step. Fails without writing anything if the transaction is not
    /// stampable or already has a document.
    fn save_stamped_document(&self, document: StampedDocument) -> Result<(), RepositoryError>;

    /// Store the cancellation record and mark the transaction `Cancelled`
    /// in one step.
    fn save_cancellation_record(&self, record: CancellationRecord) -> Result<(), RepositoryError>;
}

impl<R: DocumentRepository> DocumentRepository for Arc<R> {
    fn find_transaction_by_id(&self, id: TransactionId) -> Option<FiscalTransaction> {
        (**self).find_transaction_by_id(id)
    }

    fn find_issuer_profile(&self, company_id: CompanyId) -> Option<IssuerProfile> {
        (**self).find_issuer_profile(company_id)
    }

    fn find_counterparty_profile(&self, id: CounterpartyId) -> Option<CounterpartyProfile> {
        (**self).find_counterparty_profile(id)
    }

    fn list_concept_lines(&self, ids: &[ConceptId]) -> Vec<ConceptLine> {
        (**self).list_concept_lines(ids)
    }

    fn find_issuer_key_material(&self, company_id: CompanyId) -> Option<IssuerKeyMaterial> {
        (**self).find_issuer_key_material(company_id)
    }

    fn find_stamped_document(&self, id: TransactionId) -> Option<StampedDocument> {
        (**self).find_stamped_document(id)
    }

    fn find_cancellation_record(&self, id: TransactionId) -> Option<CancellationRecord> {
        (**self).find_cancellation_record(id)
    }

    fn transition_status(
        &self,
        id: TransactionId,
        from: DocumentStatus,
        to: DocumentStatus,
    ) -> Result<(), RepositoryError> {
        (**self).transition_status(id, from, to)
    }

    fn save_stamped_document(&self, document: StampedDocument) -> Result<(), RepositoryError> {
        (**self).save_stamped_document(document)
    }

    fn save_cancellation_record(&self, record: CancellationRecord) -> Result<(), RepositoryError> {
        (**self).save_cancellation_record(record)
    }
}

// -- In-memory implementation -------------------------------------------------

#[derive(Debug, Default)]
struct Ledger {
    transactions: HashMap<TransactionId, FiscalTransaction>,
    issuers: HashMap<CompanyId, IssuerProfile>,
    counterparties: HashMap<CounterpartyId, CounterpartyProfile>,
    concepts: HashMap<ConceptId, ConceptLine>,
    key_material: HashMap<CompanyId, IssuerKeyMaterial>,
    stamped: HashMap<TransactionId, StampedDocument>,
    cancellations: HashMap<TransactionId, CancellationRecord>,
}

impl Ledger {
    /// Check-and-set on a transaction's status. Caller holds the write lock.
    fn set_status(
        &mut self,
        id: TransactionId,
        expected: impl Fn(DocumentStatus) -> bool,
        expected_label: DocumentStatus,
        to: DocumentStatus,
    ) -> Result<(), RepositoryError> {
        let tx = self
            .transactions
            .get_mut(&id)
            .ok_or(RepositoryError::TransactionNotFound(id))?;
        let actual = tx.document_status;
        if !expected(actual) || !actual.can_transition_to(to) {
            return Err(RepositoryError::StatusConflict {
                id,
                expected: expected_label,
                actual,
                requested: to,
            });
        }
        tx.document_status = to;
        Ok(())
    }
}

/// Thread-safe in-memory repository. Clones share the same ledger.
///
/// The lock is `parking_lot` and never held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    ledger: Arc<RwLock<Ledger>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a transaction.
    pub fn insert_transaction(&self, tx: FiscalTransaction) {
        self.ledger.write().transactions.insert(tx.id, tx);
    }

    pub fn insert_issuer(&self, company_id: CompanyId, profile: IssuerProfile) {
        self.ledger.write().issuers.insert(company_id, profile);
    }

    pub fn insert_counterparty(&self, profile: CounterpartyProfile) {
        self.ledger.write().counterparties.insert(profile.id, profile);
    }

    pub fn insert_concept(&self, line: ConceptLine) {
        self.ledger.write().concepts.insert(line.concept_id, line);
    }

    pub fn insert_key_material(&self, company_id: CompanyId, material: IssuerKeyMaterial) {
        self.ledger.write().key_material.insert(company_id, material);
    }

    /// Transactions in issue order, then by id.
    pub fn list_transactions(&self) -> Vec<FiscalTransaction> {
        let mut all: Vec<_> = self.ledger.read().transactions.values().cloned().collect();
        all.sort_by(|a, b| a.issued_at.cmp(&b.issued_at).then(a.id.cmp(&b.id)));
        all
    }

    pub fn stamped_count(&self) -> usize {
        self.ledger.read().stamped.len()
    }

    pub fn cancellation_count(&self) -> usize {
        self.ledger.read().cancellations.len()
    }

    /// A serializable copy of the whole ledger, in a stable order.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let ledger = self.ledger.read();

        let mut issuers: Vec<_> = ledger
            .issuers
            .iter()
            .map(|(company_id, profile)| IssuerRecord {
                company_id: *company_id,
                profile: profile.clone(),
            })
            .collect();
        issuers.sort_by_key(|r| r.company_id);

        let mut counterparties: Vec<_> = ledger.counterparties.values().cloned().collect();
        counterparties.sort_by_key(|c| c.id);

        let mut concepts: Vec<_> = ledger.concepts.values().cloned().collect();
        concepts.sort_by_key(|c| c.concept_id);

        let mut key_material: Vec<_> = ledger
            .key_material
            .iter()
            .map(|(company_id, material)| KeyMaterialRecord {
                company_id: *company_id,
                material: material.clone(),
            })
            .collect();
        key_material.sort_by_key(|r| r.company_id);

        let mut stamped: Vec<_> = ledger.stamped.values().cloned().collect();
        stamped.sort_by_key(|d| d.transaction_id());

        let mut cancellations: Vec<_> = ledger.cancellations.values().cloned().collect();
        cancellations.sort_by_key(|c| c.transaction_id);

        drop(ledger);
        LedgerSnapshot {
            transactions: self.list_transactions(),
            issuers,
            counterparties,
            concepts,
            key_material,
            stamped,
            cancellations,
        }
    }

    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let mut ledger = Ledger::default();
        for tx in snapshot.transactions {
            ledger.transactions.insert(tx.id, tx);
        }
        for record in snapshot.issuers {
            ledger.issuers.insert(record.company_id, record.profile);
        }
        for profile in snapshot.counterparties {
            ledger.counterparties.insert(profile.id, profile);
        }
        for line in snapshot.concepts {
            ledger.concepts.insert(line.concept_id, line);
        }
        for record in snapshot.key_material {
            ledger.key_material.insert(record.company_id, record.material);
        }
        for document in snapshot.stamped {
            ledger.stamped.insert(document.transaction_id(), document);
        }
        for record in snapshot.cancellations {
            ledger.cancellations.insert(record.transaction_id, record);
        }
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
        }
    }
}

impl DocumentRepository for InMemoryRepository {
    fn find_transaction_by_id(&self, id: TransactionId) -> Option<FiscalTransaction> {
        self.ledger.read().transactions.get(&id).cloned()
    }

    fn find_issuer_profile(&self, company_id: CompanyId) -> Option<IssuerProfile> {
        self.ledger.read().issuers.get(&company_id).cloned()
    }

    fn find_counterparty_profile(&self, id: CounterpartyId) -> Option<CounterpartyProfile> {
        self.ledger.read().counterparties.get(&id).cloned()
    }

    fn list_concept_lines(&self, ids: &[ConceptId]) -> Vec<ConceptLine> {
        let ledger = self.ledger.read();
        ids.iter().filter_map(|id| ledger.concepts.get(id).cloned()).collect()
    }

    fn find_issuer_key_material(&self, company_id: CompanyId) -> Option<IssuerKeyMaterial> {
        self.ledger.read().key_material.get(&company_id).cloned()
    }

    fn find_stamped_document(&self, id: TransactionId) -> Option<StampedDocument> {
        self.ledger.read().stamped.get(&id).cloned()
    }

    fn find_cancellation_record(&self, id: TransactionId) -> Option<CancellationRecord> {
        self.ledger.read().cancellations.get(&id).cloned()
    }

    fn transition_status(
        &self,
        id: TransactionId,
        from: DocumentStatus,
        to: DocumentStatus,
    ) -> Result<(), RepositoryError> {
        self.ledger.write().set_status(id, |s| s == from, from, to)
    }

    fn save_stamped_document(&self, document: StampedDocument) -> Result<(), RepositoryError> {
        let id = document.transaction_id();
        let mut ledger = self.ledger.write();
        if ledger.stamped.contains_key(&id) {
            return Err(RepositoryError::DuplicateStampedDocument(id));
        }
        let from = ledger
            .transactions
            .get(&id)
            .map(|tx| tx.document_status)
            .ok_or(RepositoryError::TransactionNotFound(id))?;
        ledger.set_status(id, |s| s.is_stampable(), from, DocumentStatus::Stamped)?;
        ledger.stamped.insert(id, document);
        Ok(())
    }

    fn save_cancellation_record(&self, record: CancellationRecord) -> Result<(), RepositoryError> {
        let id = record.transaction_id;
        let mut ledger = self.ledger.write();
        if ledger.cancellations.contains_key(&id) {
            return Err(RepositoryError::DuplicateCancellation(id));
        }
        if !ledger.stamped.contains_key(&id) {
            return Err(RepositoryError::MissingStampedDocument(id));
        }
        ledger.set_status(
            id,
            |s| s == DocumentStatus::Stamped,
            DocumentStatus::Stamped,
            DocumentStatus::Cancelled,
        )?;
        ledger.cancellations.insert(id, record);
        Ok(())
    }
}

// -- Snapshot -----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerRecord {
    pub company_id: CompanyId,
    pub profile: IssuerProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMaterialRecord {
    pub company_id: CompanyId,
    pub material: IssuerKeyMaterial,
}

/// Serializable form of an [`InMemoryRepository`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub transactions: Vec<FiscalTransaction>,
    #[serde(default)]
    pub issuers: Vec<IssuerRecord>,
    #[serde(default)]
    pub counterparties: Vec<CounterpartyProfile>,
    #[serde(default)]
    pub concepts: Vec<ConceptLine>,
    #[serde(default)]
    pub key_material: Vec<KeyMaterialRecord>,
    #[serde(default)]
    pub stamped: Vec<StampedDocument>,
    #[serde(default)]
    pub cancellations: Vec<CancellationRecord>,
}
