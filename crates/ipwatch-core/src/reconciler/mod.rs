//! Change reconciler
//!
//! The [`ChangeReconciler`] performs one reconciliation run:
//!
//! ```text
//!  AddressStore ──(last known)──┐
//!                               ▼
//!  AddressRetriever ──(current)──► compare ──(equal)──► Unchanged, no event
//!                                   │
//!                                (differs or first run)
//!                                   ▼
//!                       AddressStore::save_address
//!                                   │
//!                                   ▼
//!                   DnsRecordUpdater::update_record_address (if configured)
//!                                   │
//!                                   ▼
//!                  NotificationDispatcher ◄── one event, every exit path
//! ```
//!
//! ## Guarantees
//!
//! - The first failing stage aborts the run; later stages are not attempted
//! - DNS is only updated after the new address is persisted
//! - Exactly one dispatch pass runs per run, after the staged work, on every
//!   path that produced an event (success, failure, cancellation)
//! - Sink failures never change the returned result
//! - Nothing is retried; the next scheduled run is the retry

pub mod dispatch;

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::context::RunContext;
use crate::error::{Error, ReconcileError};
use crate::event::{AddressChange, Event, RunOutcome, Stage};
use crate::traits::{AddressRetriever, AddressStore, DnsRecordUpdater, NotificationSink};

pub use dispatch::{DispatchReport, NotificationDispatcher};

/// Coordinates store, retriever, optional DNS updater and sinks for a run
///
/// # Example
///
/// ```rust,no_run
/// use ipwatch_core::{ChangeReconciler, MemoryAddressStore, RunContext};
/// # use ipwatch_core::traits::AddressRetriever;
/// # async fn example(retriever: Box<dyn AddressRetriever>) {
/// let reconciler = ChangeReconciler::new(Box::new(MemoryAddressStore::new()), retriever);
///
/// let ctx = RunContext::new().with_timeout(std::time::Duration::from_secs(60));
/// match reconciler.reconcile(&ctx).await {
///     Ok(outcome) => println!("{:?}", outcome),
///     Err(e) => eprintln!("run failed at {}: {}", e.stage(), e),
/// }
/// # }
/// ```
pub struct ChangeReconciler {
    store: Box<dyn AddressStore>,
    retriever: Box<dyn AddressRetriever>,
    dns_updater: Option<Box<dyn DnsRecordUpdater>>,
    dispatcher: NotificationDispatcher,
}

impl ChangeReconciler {
    /// Create a reconciler without DNS updater and without sinks
    pub fn new(store: Box<dyn AddressStore>, retriever: Box<dyn AddressRetriever>) -> Self {
        Self {
            store,
            retriever,
            dns_updater: None,
            dispatcher: NotificationDispatcher::default(),
        }
    }

    /// Keep a DNS record pointed at the current address
    pub fn with_dns_updater(mut self, updater: Box<dyn DnsRecordUpdater>) -> Self {
        self.dns_updater = Some(updater);
        self
    }

    /// Add a notification sink
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.dispatcher.push(sink);
        self
    }

    /// Add several notification sinks, preserving order
    pub fn with_sinks<I>(mut self, sinks: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn NotificationSink>>,
    {
        for sink in sinks {
            self.dispatcher.push(sink);
        }
        self
    }

    /// Replace the dispatcher (and with it, all sinks)
    pub fn with_dispatcher(mut self, dispatcher: NotificationDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// True if a DNS updater is configured
    pub fn has_dns_updater(&self) -> bool {
        self.dns_updater.is_some()
    }

    /// The dispatcher holding the sinks
    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Run one reconciliation
    ///
    /// Notification delivery has been attempted by the time this returns,
    /// whatever the result.
    pub async fn reconcile(&self, ctx: &RunContext) -> Result<RunOutcome, ReconcileError> {
        let result = self.detect_and_apply(ctx).await;

        match &result {
            Ok(RunOutcome::Unchanged { address }) => {
                info!(address = %address, "Public address unchanged");
            }
            Ok(RunOutcome::Changed(change)) => {
                info!(
                    from = ?change.from,
                    to = %change.to,
                    dns_record = ?change.dns_record,
                    "Public address changed"
                );
            }
            Err(e) => {
                error!(stage = %e.stage(), error = %e.cause(), "Reconciliation failed");
            }
        }

        if let Some(event) = Event::from_result(&result) {
            let report = self.dispatcher.dispatch(ctx, event).await;
            if !report.is_complete() {
                debug!(
                    failed = report.failures.len(),
                    "Some notifications were not delivered"
                );
            }
        }

        result
    }

    async fn detect_and_apply(&self, ctx: &RunContext) -> Result<RunOutcome, ReconcileError> {
        let last_known = ctx
            .guard(self.store.last_known_address())
            .await
            .map_err(at(Stage::ReadStore))?;
        debug!(store = self.store.store_name(), last_known = ?last_known, "Read last known address");

        let current = ctx
            .guard(self.retriever.current_public_address())
            .await
            .map_err(at(Stage::RetrieveAddress))?;
        debug!(source = self.retriever.source_name(), current = %current, "Retrieved public address");

        if last_known == Some(current) {
            return Ok(RunOutcome::Unchanged { address: current });
        }

        ctx.guard(self.store.save_address(current))
            .await
            .map_err(at(Stage::WriteStore))?;

        let dns_record = match &self.dns_updater {
            Some(updater) => {
                ctx.guard(updater.update_record_address(current))
                    .await
                    .map_err(at(Stage::UpdateDns))?;
                debug!(
                    provider = updater.provider_name(),
                    record = updater.record_name(),
                    "DNS record updated"
                );
                Some(updater.record_name().to_string())
            }
            None => None,
        };

        Ok(RunOutcome::Changed(AddressChange {
            from: last_known,
            to: current,
            dns_record,
        }))
    }
}

fn at(stage: Stage) -> impl FnOnce(Error) -> ReconcileError {
    move |cause| ReconcileError::at(stage, cause)
}
