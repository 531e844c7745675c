//! # Subcommand handlers
//!
//! Each handler loads the ledger, runs one operation through the document
//! lifecycle, writes the ledger back when the operation changed it, and
//! returns the operation's [`Outcome`] as JSON.

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use cfdi_core::{Amount, FolioFiscal, TransactionId};
use cfdi_invoice::{CancellationReason, InstallmentSplitter};
use cfdi_state::{
    CancelCommand, DocumentLifecycle, DocumentRepository, ErrorKind, InMemoryRepository, LifecycleError, Outcome,
};
use serde::Serialize;

use crate::authority::Authority;
use crate::ledger;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Split a project transaction into installment transactions.
    Split {
        transaction: TransactionId,
        /// Number of installments.
        #[arg(long, short = 'n')]
        payments: u32,
    },

    /// Validate a transaction and everything it references.
    Validate { transaction: TransactionId },

    /// Build the Comprobante without stamping and mark the draft previewed.
    Preview { transaction: TransactionId },

    /// Submit a transaction to the stamping authority.
    Stamp { transaction: TransactionId },

    /// Cancel a stamped document.
    Cancel {
        transaction: TransactionId,
        /// c_MotivoCancelacion code (01-04).
        #[arg(long, default_value = "02", value_parser = parse_reason)]
        reason: CancellationReason,
        /// Folio of the replacing document; required for reason 01.
        #[arg(long, value_parser = parse_folio)]
        replacement: Option<FolioFiscal>,
    },

    /// Query the authority's status for a stamped document.
    Status {
        transaction: TransactionId,
        /// Compare with the local status instead of printing the raw report.
        #[arg(long)]
        reconcile: bool,
    },

    /// Show remaining stamp credits.
    Credits,

    /// Print the sealed base64 envelope and the digest sent as the stamp
    /// request's idempotency key.
    Encode { transaction: TransactionId },

    /// Issue a payment complement for an installment.
    Complement { transaction: TransactionId },
}

fn parse_reason(s: &str) -> Result<CancellationReason, String> {
    CancellationReason::parse(s).ok_or_else(|| format!("unknown cancellation reason {s:?}; expected 01, 02, 03 or 04"))
}

fn parse_folio(s: &str) -> Result<FolioFiscal, String> {
    FolioFiscal::parse(s).map_err(|e| e.to_string())
}

/// Where the ledger lives and which authority to talk to.
#[derive(Debug, Clone)]
pub struct Settings {
    pub ledger: PathBuf,
    pub sandbox: bool,
}

/// The JSON printed for one command.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub success: bool,
    pub body: serde_json::Value,
}

impl Report {
    fn from_outcome<T: Serialize>(outcome: Outcome<T>) -> Result<Self> {
        Ok(Self {
            success: outcome.is_success(),
            body: serde_json::to_value(&outcome)?,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InstallmentSummary {
    id: TransactionId,
    payment_number: u32,
    total: Amount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SplitSummary {
    parent_id: TransactionId,
    installments: Vec<InstallmentSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationSummary {
    transaction_id: TransactionId,
    valid: bool,
    total: Amount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StampSummary {
    transaction_id: TransactionId,
    uuid: FolioFiscal,
    stamped_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pdf_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeSummary {
    digest: String,
    envelope: String,
}

type CliLifecycle = DocumentLifecycle<InMemoryRepository, Authority>;

/// Run `command` and return its report. Ledger and configuration problems
/// are errors; operation failures are reports with `success: false`.
pub async fn execute(command: &Command, settings: &Settings) -> Result<Report> {
    let repo = ledger::load(&settings.ledger)?;
    tracing::debug!(?command, ledger = %settings.ledger.display(), "executing");

    match command {
        Command::Split {
            transaction,
            payments,
        } => {
            let report = Report::from_outcome(split(&repo, *transaction, *payments))?;
            if report.success {
                ledger::save(&settings.ledger, &repo)?;
            }
            Ok(report)
        }

        Command::Validate { transaction } => {
            let lifecycle = offline(repo);
            let outcome: Outcome<_> = lifecycle.build(*transaction).into();
            Report::from_outcome(outcome.map(|doc| ValidationSummary {
                transaction_id: *transaction,
                valid: true,
                total: doc.total,
            }))
        }

        Command::Preview { transaction } => {
            let lifecycle = offline(repo);
            let report = Report::from_outcome(Outcome::from(lifecycle.preview(*transaction)))?;
            persist(settings, &lifecycle, &report)?;
            Ok(report)
        }

        Command::Stamp { transaction } => {
            let lifecycle = online(repo, settings)?;
            let outcome: Outcome<_> = lifecycle.stamp(*transaction).await.into();
            let report = Report::from_outcome(outcome.map(|doc| StampSummary {
                transaction_id: doc.transaction_id(),
                uuid: doc.uuid(),
                stamped_at: doc.stamped_at().to_rfc3339(),
                pdf_url: doc.pdf_url().map(str::to_string),
            }))?;
            persist(settings, &lifecycle, &report)?;
            Ok(report)
        }

        Command::Cancel {
            transaction,
            reason,
            replacement,
        } => {
            let lifecycle = online(repo, settings)?;
            let mut cancel = CancelCommand::new(*reason);
            if let Some(uuid) = replacement {
                cancel = cancel.replaced_by(*uuid);
            }
            let report = Report::from_outcome(Outcome::from(lifecycle.cancel(*transaction, cancel).await))?;
            persist(settings, &lifecycle, &report)?;
            Ok(report)
        }

        Command::Status {
            transaction,
            reconcile,
        } => {
            let lifecycle = online(repo, settings)?;
            if *reconcile {
                Report::from_outcome(Outcome::from(lifecycle.reconcile(*transaction).await))
            } else {
                Report::from_outcome(Outcome::from(lifecycle.query_status(*transaction).await))
            }
        }

        Command::Credits => {
            let lifecycle = online(repo, settings)?;
            Report::from_outcome(Outcome::from(lifecycle.credit_balance().await))
        }

        Command::Encode { transaction } => {
            let lifecycle = offline(repo);
            let encoded = lifecycle.envelope(*transaction).map(|envelope| EnvelopeSummary {
                digest: envelope.idempotency_key(),
                envelope: envelope.into_string(),
            });
            Report::from_outcome(Outcome::from(encoded))
        }

        Command::Complement { transaction } => {
            let lifecycle = offline(repo);
            Report::from_outcome(Outcome::from(lifecycle.payment_complement(*transaction).await))
        }
    }
}

/// Print the report as JSON and map it to an exit code.
pub async fn run(command: &Command, settings: &Settings) -> Result<u8> {
    let report = execute(command, settings).await?;
    println!("{}", serde_json::to_string_pretty(&report.body)?);
    Ok(if report.success { 0 } else { 1 })
}

fn split(repo: &InMemoryRepository, id: TransactionId, payments: u32) -> Outcome<SplitSummary> {
    let Some(parent) = repo.find_transaction_by_id(id) else {
        return Outcome::from(Err(LifecycleError::NotFound {
            entity: "transaction",
            id: id.to_string(),
        }));
    };
    if repo.list_transactions().iter().any(|tx| tx.parent_id == Some(id)) {
        return Outcome::failure(
            ErrorKind::StateConflict,
            format!("transaction {id} has already been split into installments"),
        );
    }
    let plan = match InstallmentSplitter::split(&parent, payments) {
        Ok(plan) => plan,
        Err(e) => return Outcome::failure(ErrorKind::ValidationFailure, e.to_string()),
    };

    let (parent, installments) = plan.into_parts();
    let summary = SplitSummary {
        parent_id: parent.id,
        installments: installments
            .iter()
            .map(|child| InstallmentSummary {
                id: child.id,
                payment_number: child.payment_number.unwrap_or_default(),
                total: child.amounts.total,
            })
            .collect(),
    };
    repo.insert_transaction(parent);
    for child in installments {
        repo.insert_transaction(child);
    }
    tracing::info!(transaction_id = %id, payments, "project split into installments");
    Outcome::Success(summary)
}

/// A lifecycle for commands that never reach the authority.
fn offline(repo: InMemoryRepository) -> CliLifecycle {
    let authority = Authority::sandbox(&repo);
    DocumentLifecycle::new(repo, authority)
}

fn online(repo: InMemoryRepository, settings: &Settings) -> Result<CliLifecycle> {
    let authority = if settings.sandbox {
        Authority::sandbox(&repo)
    } else {
        Authority::from_env()?
    };
    Ok(DocumentLifecycle::new(repo, authority))
}

fn persist(settings: &Settings, lifecycle: &CliLifecycle, report: &Report) -> Result<()> {
    if report.success {
        ledger::save(&settings.ledger, lifecycle.repository())?;
    }
    Ok(())
}
