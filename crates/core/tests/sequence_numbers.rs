//! Integration tests for the per-company document number sequence
//!
//! Covers concurrent issuance, peek/reset/raise administration and the
//! counter bump applied when numbers are assigned by hand.

mod support;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use dealflow_domain::{DealflowError, DocumentKind, ValidationReason};
use support::memory::FailPoint;
use support::Harness;

fn year() -> i32 {
    Utc::now().year()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_never_share_a_number() {
    let harness = Arc::new(Harness::new());

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let harness = Arc::clone(&harness);
            let kind = if i % 2 == 0 { DocumentKind::Offer } else { DocumentKind::Project };
            tokio::spawn(async move { harness.sequences().next("tak", kind).await })
        })
        .collect();

    let mut numbers = HashSet::new();
    for handle in handles {
        let number = handle.await.expect("task joined").expect("number issued");
        assert!(numbers.insert(number.clone()), "duplicate number {number}");
    }

    assert_eq!(numbers.len(), 32);
    assert!(numbers.contains(&format!("TK-{}-001", year())));
    assert!(numbers.contains(&format!("TK-{}-032", year())));
}

#[tokio::test]
async fn offers_and_projects_share_one_counter_per_company() {
    let harness = Harness::new();

    let first = harness.sequences().next("stalbygg", DocumentKind::Offer).await.expect("offer");
    let second =
        harness.sequences().next("stalbygg", DocumentKind::Project).await.expect("project");
    let other = harness.sequences().next("tak", DocumentKind::Offer).await.expect("other");

    assert_eq!(first, format!("ST-{}-001", year()));
    assert_eq!(second, format!("ST-{}-002", year()));
    assert_eq!(other, format!("TK-{}-001", year()));
}

#[tokio::test]
async fn peek_does_not_consume() {
    let harness = Harness::new();

    let peeked = harness.sequences().peek("stalbygg").await.expect("peek");
    let issued = harness.sequences().next("stalbygg", DocumentKind::Offer).await.expect("next");

    assert_eq!(peeked, issued);
    assert_eq!(
        harness.sequences().peek("stalbygg").await.expect("peek"),
        format!("ST-{}-002", year())
    );
}

#[tokio::test]
async fn reset_may_lower_and_raise_never_does() {
    let harness = Harness::new();
    let sequences = harness.sequences();

    sequences.reset("stalbygg", year(), 40).await.expect("reset");
    sequences.raise_to("stalbygg", year(), 10).await.expect("raise is a no-op");
    assert_eq!(sequences.peek("stalbygg").await.expect("peek"), format!("ST-{}-041", year()));

    sequences.reset("stalbygg", year(), 2).await.expect("reset lowers");
    assert_eq!(sequences.peek("stalbygg").await.expect("peek"), format!("ST-{}-003", year()));
}

#[tokio::test]
async fn unknown_company_is_a_validation_error() {
    let harness = Harness::new();

    let err = harness.sequences().next("nowhere", DocumentKind::Offer).await.unwrap_err();

    assert!(matches!(
        err,
        DealflowError::ValidationFailed { reason: ValidationReason::UnknownCompany, .. }
    ));
}

#[tokio::test]
async fn storage_failure_surfaces_as_dependency_unavailable() {
    let harness = Harness::new();
    harness.store.fail_on(FailPoint::NextSequence);

    let err = harness.sequences().next("stalbygg", DocumentKind::Offer).await.unwrap_err();

    assert_eq!(err.code(), "dependency_unavailable");
}

#[tokio::test]
async fn manual_offer_number_raises_the_counter() {
    let harness = Harness::new();
    let customer = harness.customer("Fjord Eiendom");
    let offer = harness.offer_for(&customer, None, 100.0).await;

    let manual = format!("ST-{}-050", year());
    harness
        .offers()
        .update_number(offer.id, manual.clone(), &harness.actor)
        .await
        .expect("manual number accepted");

    let next = harness.sequences().next("stalbygg", DocumentKind::Offer).await.expect("next");
    assert_eq!(next, format!("ST-{}-051", year()));
}

#[tokio::test]
async fn exhausted_counter_reports_unavailable_instead_of_wrapping() {
    let harness = Harness::new();
    harness.sequences().reset("tak", year(), u32::MAX).await.expect("reset");

    let peek = harness.sequences().peek("tak").await.unwrap_err();
    assert_eq!(peek.code(), "dependency_unavailable");
    let next = harness.sequences().next("tak", DocumentKind::Offer).await.unwrap_err();
    assert_eq!(next.code(), "dependency_unavailable");
}
