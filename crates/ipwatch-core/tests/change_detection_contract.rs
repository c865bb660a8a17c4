//! Contract Test: Change Detection
//!
//! Constraints verified:
//! - A differing address is persisted and reported as `Changed`
//! - An equal address is a no-op: no write, no DNS call, no event
//! - A missing record counts as a change from "nothing"
//! - DNS is updated only after the new address is persisted
//!
//! If this test fails, the reconciler acts on the wrong condition.

mod common;

use common::*;
use ipwatch_core::{ChangeReconciler, Event, RunContext, RunOutcome};
use std::sync::Arc;

#[tokio::test]
async fn differing_address_is_persisted_and_reported() {
    let store = MockStore::with_address(ip("203.0.113.1"));
    let sink = RecordingSink::new("recorder");

    let reconciler = ChangeReconciler::new(
        Box::new(store.clone()),
        Box::new(MockRetriever::returning(ip("203.0.113.2"))),
    )
    .with_sink(Arc::new(sink.clone()));

    let outcome = reconciler.reconcile(&RunContext::new()).await.unwrap();

    match outcome {
        RunOutcome::Changed(change) => {
            assert_eq!(change.from, Some(ip("203.0.113.1")));
            assert_eq!(change.to, ip("203.0.113.2"));
            assert_eq!(change.dns_record, None);
        }
        other => panic!("expected Changed, got {other:?}"),
    }
    assert_eq!(store.stored(), Some(ip("203.0.113.2")));

    match sink.only_event() {
        Event::Changed {
            from,
            to,
            dns_updated,
            ..
        } => {
            assert_eq!(from, Some(ip("203.0.113.1")));
            assert_eq!(to, ip("203.0.113.2"));
            assert!(!dns_updated);
        }
        other => panic!("expected Changed event, got {other:?}"),
    }
}

#[tokio::test]
async fn equal_address_is_a_noop() {
    let store = MockStore::with_address(ip("198.51.100.10"));
    let dns = MockDnsUpdater::new("home.example.com");
    let sink = RecordingSink::new("recorder");

    let reconciler = ChangeReconciler::new(
        Box::new(store.clone()),
        Box::new(MockRetriever::returning(ip("198.51.100.10"))),
    )
    .with_dns_updater(Box::new(dns.clone()))
    .with_sink(Arc::new(sink.clone()));

    let outcome = reconciler.reconcile(&RunContext::new()).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Unchanged {
            address: ip("198.51.100.10")
        }
    );
    assert_eq!(store.write_count(), 0, "unchanged address must not be rewritten");
    assert_eq!(dns.update_count(), 0, "unchanged address must not touch DNS");
    assert_eq!(sink.event_count(), 0, "unchanged address must not notify");
}

#[tokio::test]
async fn first_run_is_a_change_from_nothing() {
    let store = MockStore::empty();
    let sink = RecordingSink::new("recorder");

    let reconciler = ChangeReconciler::new(
        Box::new(store.clone()),
        Box::new(MockRetriever::returning(ip("192.0.2.77"))),
    )
    .with_sink(Arc::new(sink.clone()));

    reconciler.reconcile(&RunContext::new()).await.unwrap();

    assert_eq!(store.stored(), Some(ip("192.0.2.77")));
    let event = sink.only_event();
    assert_eq!(
        event.as_message(),
        "IP address set to 192.0.2.77 (no previously recorded address)"
    );
}

#[tokio::test]
async fn dns_is_updated_after_persist() {
    let log = call_log();
    let store = MockStore::with_address(ip("203.0.113.1")).logging_to(&log);
    let dns = MockDnsUpdater::new("home.example.com").logging_to(&log);
    let sink = RecordingSink::new("recorder").logging_to(&log);

    let reconciler = ChangeReconciler::new(
        Box::new(store.clone()),
        Box::new(MockRetriever::returning(ip("203.0.113.5")).logging_to(&log)),
    )
    .with_dns_updater(Box::new(dns.clone()))
    .with_sink(Arc::new(sink.clone()));

    let outcome = reconciler.reconcile(&RunContext::new()).await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "store.read",
            "retriever.fetch",
            "store.write",
            "dns.update",
            "sink.send"
        ]
    );
    assert_eq!(dns.updates(), vec![ip("203.0.113.5")]);

    match outcome {
        RunOutcome::Changed(change) => {
            assert_eq!(change.dns_record.as_deref(), Some("home.example.com"));
        }
        other => panic!("expected Changed, got {other:?}"),
    }
    assert_eq!(
        sink.only_event().as_message(),
        "IP address changed from 203.0.113.1 to 203.0.113.5. \
         DNS record home.example.com updated with new address."
    );
}
