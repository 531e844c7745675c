//! The stamping authority boundary.
//!
//! [`StampingAuthority`] is implemented by [`crate::HttpStampingClient`]
//! against a live provider and by [`crate::MockStampingAuthority`] for
//! sandbox runs and tests. Implementations classify every failure before
//! returning it and never retry; retry policy belongs to the caller.

use std::future::Future;
use std::sync::Arc;

use cfdi_invoice::StampReceipt;

use crate::error::AuthorityError;
use crate::types::{CancelAcknowledgment, CancelRequest, CreditBalance, StampRequest, StatusQuery, StatusReport};

pub trait StampingAuthority: Send + Sync {
    /// Submit an envelope for stamping.
    fn stamp(&self, request: &StampRequest) -> impl Future<Output = Result<StampReceipt, AuthorityError>> + Send;

    /// Request cancellation. A document the authority already reports as
    /// cancelled is acknowledged, not an error.
    fn cancel(
        &self,
        request: &CancelRequest,
    ) -> impl Future<Output = Result<CancelAcknowledgment, AuthorityError>> + Send;

    fn query_status(&self, query: &StatusQuery) -> impl Future<Output = Result<StatusReport, AuthorityError>> + Send;

    fn credit_balance(&self) -> impl Future<Output = Result<CreditBalance, AuthorityError>> + Send;

    /// Human-readable implementation name, for logs.
    fn name(&self) -> &str;
}

impl<A: StampingAuthority> StampingAuthority for Arc<A> {
    fn stamp(&self, request: &StampRequest) -> impl Future<Output = Result<StampReceipt, AuthorityError>> + Send {
        (**self).stamp(request)
    }

    fn cancel(
        &self,
        request: &CancelRequest,
    ) -> impl Future<Output = Result<CancelAcknowledgment, AuthorityError>> + Send {
        (**self).cancel(request)
    }

    fn query_status(&self, query: &StatusQuery) -> impl Future<Output = Result<StatusReport, AuthorityError>> + Send {
        (**self).query_status(query)
    }

    fn credit_balance(&self) -> impl Future<Output = Result<CreditBalance, AuthorityError>> + Send {
        (**self).credit_balance()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
