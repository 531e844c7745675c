//! End-to-end lifecycle behaviour against the scripted authority.

mod common;

use std::sync::Arc;
use std::time::Duration;

use cfdi_core::{CounterpartyId, TransactionId};
use cfdi_invoice::{CancellationReason, DocumentStatus};
use cfdi_pac::{AuthorityErrorKind, MockStampingAuthority};
use cfdi_state::{CancelCommand, DocumentLifecycle, DocumentRepository, ErrorKind, LifecycleError, Outcome};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stamps_produce_one_document() {
    let (repo, tx) = common::seeded();
    let authority = MockStampingAuthority::new().with_latency(Duration::from_millis(100));
    let lifecycle = Arc::new(DocumentLifecycle::new(repo, authority).with_config(common::fast_config()));

    let id = tx.id;
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.stamp(id).await })
        })
        .collect();

    let mut stamped = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => stamped += 1,
            Err(LifecycleError::StampInProgress(_) | LifecycleError::DocumentAlreadyStamped(_)) => {}
            Err(other) => panic!("unexpected failure: {other}"),
        }
    }

    assert_eq!(stamped, 1);
    assert_eq!(lifecycle.authority().stamp_calls(), 1);
    assert_eq!(lifecycle.repository().stamped_count(), 1);
    assert_eq!(
        lifecycle.repository().find_transaction_by_id(tx.id).unwrap().document_status,
        DocumentStatus::Stamped
    );
}

#[tokio::test]
async fn two_transient_failures_then_success() {
    let (repo, tx) = common::seeded();
    let authority = MockStampingAuthority::new();
    authority.fail_next_stamp(AuthorityErrorKind::TransientNetworkFailure, "connection reset by peer");
    authority.fail_next_stamp(AuthorityErrorKind::TransientNetworkFailure, "request timed out");
    let lifecycle = DocumentLifecycle::new(repo, authority).with_config(common::fast_config());

    let document = lifecycle.stamp(tx.id).await.unwrap();

    assert_eq!(lifecycle.authority().stamp_calls(), 3);
    assert_eq!(lifecycle.repository().stamped_count(), 1);
    assert_eq!(
        lifecycle.repository().find_stamped_document(tx.id).unwrap().uuid(),
        document.uuid()
    );
    assert_eq!(
        lifecycle.repository().find_transaction_by_id(tx.id).unwrap().document_status,
        DocumentStatus::Stamped
    );
}

#[tokio::test]
async fn cancelling_twice_keeps_one_record() {
    let (repo, tx) = common::seeded();
    let lifecycle = DocumentLifecycle::new(repo, MockStampingAuthority::new()).with_config(common::fast_config());
    lifecycle.stamp(tx.id).await.unwrap();

    let command = CancelCommand::new(CancellationReason::ErrorsWithoutRelation);
    let first = lifecycle.cancel(tx.id, command).await.unwrap();
    let second = lifecycle.cancel(tx.id, command).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(lifecycle.repository().cancellation_count(), 1);
    assert_eq!(lifecycle.authority().cancel_calls(), 1);
}

#[tokio::test]
async fn missing_counterparty_never_reaches_builder_or_authority() {
    let (repo, mut tx) = common::seeded();
    tx.counterparty_id = None;
    tx.counterparty_rfc = None;
    repo.insert_transaction(tx.clone());
    let lifecycle = DocumentLifecycle::new(repo, MockStampingAuthority::new());

    let outcome: Outcome<_> = lifecycle.stamp(tx.id).await.into();
    assert_eq!(outcome.error_kind(), Some(ErrorKind::ValidationFailure));

    let err = lifecycle.stamp(tx.id).await.unwrap_err();
    let LifecycleError::Validation(failures) = err else {
        panic!("expected validation failure");
    };
    assert!(failures.iter().any(|f| f.field == "counterparty_id"));
    assert_eq!(lifecycle.authority().total_calls(), 0);
    assert_eq!(lifecycle.repository().stamped_count(), 0);
}

#[tokio::test]
async fn unknown_counterparty_is_not_found() {
    let (repo, mut tx) = common::seeded();
    tx.counterparty_id = Some(CounterpartyId::new());
    repo.insert_transaction(tx.clone());
    let lifecycle = DocumentLifecycle::new(repo, MockStampingAuthority::new());

    let err = lifecycle.stamp(tx.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(lifecycle.authority().total_calls(), 0);
}

#[tokio::test]
async fn unknown_transaction_outcome() {
    let (repo, _) = common::seeded();
    let lifecycle = DocumentLifecycle::new(repo, MockStampingAuthority::new());

    let outcome: Outcome<_> = lifecycle.stamp(TransactionId::new()).await.into();
    let json = serde_json::to_value(outcome.map(|doc| doc.uuid())).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["errorKind"], "not_found");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stamps_for_different_transactions_run_independently() {
    let (repo, mut first) = common::seeded();
    first.series = Some("A".into());
    first.folio = Some("101".into());
    let mut second = first.clone();
    second.id = TransactionId::new();
    second.folio = Some("102".into());
    repo.insert_transaction(first.clone());
    repo.insert_transaction(second.clone());

    let authority = MockStampingAuthority::new().with_latency(Duration::from_millis(50));
    let lifecycle = Arc::new(DocumentLifecycle::new(repo, authority).with_config(common::fast_config()));

    let (a, b) = tokio::join!(lifecycle.stamp(first.id), lifecycle.stamp(second.id));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.uuid(), b.uuid());
    assert_eq!(lifecycle.authority().stamp_calls(), 2);
    assert_eq!(lifecycle.repository().stamped_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_cancels_keep_one_record() {
    let (repo, tx) = common::seeded();
    let authority = MockStampingAuthority::new().with_latency(Duration::from_millis(200));
    let lifecycle = Arc::new(DocumentLifecycle::new(repo, authority).with_config(common::fast_config()));
    lifecycle.stamp(tx.id).await.unwrap();

    // Both calls pass the existing-record check before either one saves.
    let id = tx.id;
    let command = CancelCommand::new(CancellationReason::OperationNotCarriedOut);
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.cancel(id, command).await })
        })
        .collect();

    let mut records = Vec::new();
    for handle in handles {
        records.push(handle.await.unwrap().unwrap());
    }

    let stored = lifecycle.repository().find_cancellation_record(tx.id).unwrap();
    assert!(records.iter().all(|r| *r == stored));
    assert_eq!(lifecycle.repository().cancellation_count(), 1);
    assert_eq!(lifecycle.authority().cancel_calls(), 2);
    assert_eq!(
        lifecycle.repository().find_transaction_by_id(tx.id).unwrap().document_status,
        DocumentStatus::Cancelled
    );
}
