//! # Installment Splitting
//!
//! Divides a project transaction into N ordered payment records in integer
//! cents. Totals, transferred tax and each withholding are allocated with
//! [`Amount::allocate`]: every installment gets `floor(cents / N)` and the
//! `cents mod N` remainder goes one cent at a time to the first
//! installments. Each child's subtotal is then derived so that its own
//! breakdown satisfies `total = subtotal + tax - withholdings`.
//!
//! Since every component column sums exactly to the parent's, so does each
//! derived subtotal column.

use cfdi_core::{Amount, Quantity, TransactionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tax::TaxBreakdown;
use crate::transaction::{DocumentStatus, FiscalTransaction, InstallmentStatus};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallmentError {
    #[error("invalid installment count {count}: a plan needs at least one payment")]
    InvalidInstallmentCount { count: u32 },

    #[error("transaction {id} is not flagged as a project")]
    NotAProject { id: TransactionId },
}

/// A project transaction with its ordered installments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPlan {
    parent: FiscalTransaction,
    installments: Vec<FiscalTransaction>,
}

impl InstallmentPlan {
    pub fn parent(&self) -> &FiscalTransaction {
        &self.parent
    }

    /// Installments ordered by payment number, starting at 1.
    pub fn installments(&self) -> &[FiscalTransaction] {
        &self.installments
    }

    pub fn len(&self) -> usize {
        self.installments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installments.is_empty()
    }

    /// Sum of the installment totals. Always equals the parent total.
    pub fn installments_total(&self) -> Amount {
        self.installments.iter().map(|i| i.amounts.total).sum()
    }

    pub fn into_parts(self) -> (FiscalTransaction, Vec<FiscalTransaction>) {
        (self.parent, self.installments)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallmentSplitter;

impl InstallmentSplitter {
    /// Split `parent` into `number_of_payments` installments.
    ///
    /// The parent keeps its full project amounts. The plan's copy of the
    /// parent records `number_of_payments`; nothing else about it changes.
    pub fn split(
        parent: &FiscalTransaction,
        number_of_payments: u32,
    ) -> Result<InstallmentPlan, InstallmentError> {
        if number_of_payments < 1 {
            return Err(InstallmentError::InvalidInstallmentCount {
                count: number_of_payments,
            });
        }
        if !parent.is_project {
            return Err(InstallmentError::NotAProject { id: parent.id });
        }

        let amounts = &parent.amounts;
        let totals = amounts.total.allocate(number_of_payments);
        let taxes = amounts.tax.allocate(number_of_payments);
        let isr = amounts.isr_withholding.allocate(number_of_payments);
        let iva_w = amounts.iva_withholding.allocate(number_of_payments);

        let installments = (0..number_of_payments as usize)
            .map(|i| {
                let subtotal = totals[i] - taxes[i] + isr[i] + iva_w[i];
                let breakdown = TaxBreakdown {
                    subtotal,
                    tax: taxes[i],
                    isr_withholding: isr[i],
                    iva_withholding: iva_w[i],
                    total: totals[i],
                };
                installment(parent, breakdown, i as u32 + 1, number_of_payments)
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            parent = %parent.id,
            payments = number_of_payments,
            total = %amounts.total,
            "split project into installments"
        );

        let mut parent = parent.clone();
        parent.number_of_payments = Some(number_of_payments);
        Ok(InstallmentPlan {
            parent,
            installments,
        })
    }
}

fn installment(
    parent: &FiscalTransaction,
    amounts: TaxBreakdown,
    payment_number: u32,
    of: u32,
) -> FiscalTransaction {
    let label = parent
        .project_name
        .as_deref()
        .or(parent.description.as_deref())
        .unwrap_or("Proyecto");

    FiscalTransaction {
        id: TransactionId::new(),
        quantity: Quantity::ONE,
        unit_price: amounts.subtotal,
        iva_included: false,
        amounts,
        description: Some(format!("{label} (pago {payment_number} de {of})")),
        is_project: false,
        number_of_payments: None,
        payment_number: Some(payment_number),
        parent_id: Some(parent.id),
        installment_status: Some(InstallmentStatus::Pending),
        document_status: DocumentStatus::Draft,
        attachments: Vec::new(),
        ..parent.clone()
    }
}
