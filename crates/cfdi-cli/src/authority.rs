//! Runtime choice between the live provider and the in-process sandbox.

use cfdi_invoice::StampReceipt;
use cfdi_pac::{
    AuthorityDocumentStatus, AuthorityError, CancelAcknowledgment, CancelRequest, CreditBalance, HttpStampingClient,
    MockStampingAuthority, PacConfig, StampRequest, StampingAuthority, StatusQuery, StatusReport,
};
use cfdi_state::InMemoryRepository;

use anyhow::{Context, Result};

pub enum Authority {
    Http(HttpStampingClient),
    Sandbox(MockStampingAuthority),
}

impl Authority {
    /// The live client configured from `PAC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let config = PacConfig::from_env().context("PAC configuration is incomplete")?;
        tracing::debug!(?config, "using live stamping authority");
        Ok(Self::Http(HttpStampingClient::new(config)?))
    }

    /// A sandbox authority that already knows every folio in the ledger.
    pub fn sandbox(repo: &InMemoryRepository) -> Self {
        let mock = MockStampingAuthority::new();
        let snapshot = repo.snapshot();
        for document in &snapshot.stamped {
            mock.record_document(document.uuid(), AuthorityDocumentStatus::Valid);
        }
        for record in &snapshot.cancellations {
            mock.record_document(record.uuid, AuthorityDocumentStatus::Cancelled);
        }
        tracing::debug!(known_documents = snapshot.stamped.len(), "using sandbox stamping authority");
        Self::Sandbox(mock)
    }
}

impl StampingAuthority for Authority {
    async fn stamp(&self, request: &StampRequest) -> Result<StampReceipt, AuthorityError> {
        match self {
            Self::Http(client) => client.stamp(request).await,
            Self::Sandbox(mock) => mock.stamp(request).await,
        }
    }

    async fn cancel(&self, request: &CancelRequest) -> Result<CancelAcknowledgment, AuthorityError> {
        match self {
            Self::Http(client) => client.cancel(request).await,
            Self::Sandbox(mock) => mock.cancel(request).await,
        }
    }

    async fn query_status(&self, query: &StatusQuery) -> Result<StatusReport, AuthorityError> {
        match self {
            Self::Http(client) => client.query_status(query).await,
            Self::Sandbox(mock) => mock.query_status(query).await,
        }
    }

    async fn credit_balance(&self) -> Result<CreditBalance, AuthorityError> {
        match self {
            Self::Http(client) => client.credit_balance().await,
            Self::Sandbox(mock) => mock.credit_balance().await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Http(client) => client.name(),
            Self::Sandbox(mock) => mock.name(),
        }
    }
}
