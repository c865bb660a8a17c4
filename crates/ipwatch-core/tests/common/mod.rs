//! Test doubles and common utilities for reconciler contract tests
//!
//! Every double is `Clone` and shares its counters between clones, so a test
//! can hand one copy to the reconciler and keep another to assert on.

#![allow(dead_code)]

use ipwatch_core::error::{Error, Result};
use ipwatch_core::event::Event;
use ipwatch_core::traits::{AddressRetriever, AddressStore, DnsRecordUpdater, NotificationSink};
use ipwatch_core::traits::PersistedAddressRecord;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared, ordered log of collaborator calls
pub type CallLog = Arc<Mutex<Vec<&'static str>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(log: &Option<CallLog>, call: &'static str) {
    if let Some(log) = log {
        log.lock().unwrap().push(call);
    }
}

pub fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

/// An AddressStore that tracks calls and can be told to fail
#[derive(Clone, Default)]
pub struct MockStore {
    address: Arc<Mutex<Option<Ipv4Addr>>>,
    read_count: Arc<AtomicUsize>,
    write_count: Arc<AtomicUsize>,
    fail_reads: bool,
    fail_writes: bool,
    log: Option<CallLog>,
}

impl MockStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_address(address: Ipv4Addr) -> Self {
        let store = Self::default();
        *store.address.lock().unwrap() = Some(address);
        store
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn logging_to(mut self, log: &CallLog) -> Self {
        self.log = Some(Arc::clone(log));
        self
    }

    pub fn stored(&self) -> Option<Ipv4Addr> {
        *self.address.lock().unwrap()
    }

    pub fn read_count(&self) -> usize {
        self.read_count.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AddressStore for MockStore {
    async fn load_record(&self) -> Result<Option<PersistedAddressRecord>> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        record(&self.log, "store.read");
        if self.fail_reads {
            return Err(Error::store("permission denied"));
        }
        Ok(self.stored().map(PersistedAddressRecord::new))
    }

    async fn save_address(&self, address: Ipv4Addr) -> Result<()> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        record(&self.log, "store.write");
        if self.fail_writes {
            return Err(Error::store("disk full"));
        }
        *self.address.lock().unwrap() = Some(address);
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "mock"
    }
}

#[derive(Clone, Copy)]
enum RetrieverBehavior {
    Return(Ipv4Addr),
    Fail,
    Hang,
}

/// An AddressRetriever with scripted behavior
#[derive(Clone)]
pub struct MockRetriever {
    behavior: RetrieverBehavior,
    call_count: Arc<AtomicUsize>,
    log: Option<CallLog>,
}

impl MockRetriever {
    fn with_behavior(behavior: RetrieverBehavior) -> Self {
        Self {
            behavior,
            call_count: Arc::new(AtomicUsize::new(0)),
            log: None,
        }
    }

    pub fn returning(address: Ipv4Addr) -> Self {
        Self::with_behavior(RetrieverBehavior::Return(address))
    }

    pub fn failing() -> Self {
        Self::with_behavior(RetrieverBehavior::Fail)
    }

    /// Never resolves; only a cancelled or expired context ends the call
    pub fn hanging() -> Self {
        Self::with_behavior(RetrieverBehavior::Hang)
    }

    pub fn logging_to(mut self, log: &CallLog) -> Self {
        self.log = Some(Arc::clone(log));
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AddressRetriever for MockRetriever {
    async fn current_public_address(&self) -> Result<Ipv4Addr> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        record(&self.log, "retriever.fetch");
        match self.behavior {
            RetrieverBehavior::Return(address) => Ok(address),
            RetrieverBehavior::Fail => Err(Error::retrieval("connection refused")),
            RetrieverBehavior::Hang => {
                std::future::pending::<()>().await;
                Err(Error::retrieval("unreachable"))
            }
        }
    }

    fn source_name(&self) -> &'static str {
        "mock"
    }
}

/// A DnsRecordUpdater that records the addresses it was asked to set
#[derive(Clone)]
pub struct MockDnsUpdater {
    record_name: String,
    updates: Arc<Mutex<Vec<Ipv4Addr>>>,
    fail_with: Option<fn(&str) -> Error>,
    log: Option<CallLog>,
}

impl MockDnsUpdater {
    pub fn new(record_name: &str) -> Self {
        Self {
            record_name: record_name.to_string(),
            updates: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
            log: None,
        }
    }

    /// Fail every update with the error built by `make_error`
    pub fn failing_with(mut self, make_error: fn(&str) -> Error) -> Self {
        self.fail_with = Some(make_error);
        self
    }

    pub fn logging_to(mut self, log: &CallLog) -> Self {
        self.log = Some(Arc::clone(log));
        self
    }

    pub fn updates(&self) -> Vec<Ipv4Addr> {
        self.updates.lock().unwrap().clone()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl DnsRecordUpdater for MockDnsUpdater {
    fn record_name(&self) -> &str {
        &self.record_name
    }

    async fn record_address(&self) -> Result<Ipv4Addr> {
        self.updates
            .lock()
            .unwrap()
            .last()
            .copied()
            .ok_or_else(|| Error::record_not_found(&self.record_name))
    }

    async fn create_record(&self, address: Ipv4Addr) -> Result<()> {
        self.updates.lock().unwrap().push(address);
        Ok(())
    }

    async fn update_record_address(&self, address: Ipv4Addr) -> Result<()> {
        record(&self.log, "dns.update");
        if let Some(make_error) = self.fail_with {
            return Err(make_error(&self.record_name));
        }
        self.updates.lock().unwrap().push(address);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// A NotificationSink that keeps every event it receives
#[derive(Clone)]
pub struct RecordingSink {
    name: String,
    events: Arc<Mutex<Vec<Event>>>,
    log: Option<CallLog>,
}

impl RecordingSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            events: Arc::new(Mutex::new(Vec::new())),
            log: None,
        }
    }

    pub fn logging_to(mut self, log: &CallLog) -> Self {
        self.log = Some(Arc::clone(log));
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// The single event received, panicking if there is not exactly one
    pub fn only_event(&self) -> Event {
        let events = self.events();
        assert_eq!(events.len(), 1, "expected exactly one event, got {events:?}");
        events[0].clone()
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingSink {
    async fn send_event(&self, event: &Event) -> Result<()> {
        record(&self.log, "sink.send");
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn sink_name(&self) -> &str {
        &self.name
    }
}

/// A NotificationSink that rejects every event
#[derive(Clone)]
pub struct FailingSink {
    attempts: Arc<AtomicUsize>,
}

impl FailingSink {
    pub fn new() -> Self {
        Self {
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl NotificationSink for FailingSink {
    async fn send_event(&self, _event: &Event) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::notification("failing", "HTTP 500"))
    }

    fn sink_name(&self) -> &str {
        "failing"
    }
}
