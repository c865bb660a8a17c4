//! Best-effort notification fan-out
//!
//! Every sink gets its own task on a [`JoinSet`]; the event is shared through
//! an `Arc`. A failing or panicking sink never affects the others, and never
//! affects the outcome of the run that produced the event.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::error::Error;
use crate::event::Event;
use crate::traits::NotificationSink;

/// Delivery window used when the run context is already interrupted
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Outcome of one dispatch pass
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Sinks that accepted the event
    pub delivered: usize,
    /// Sinks that failed, with their error
    pub failures: Vec<(String, Error)>,
}

impl DispatchReport {
    /// Number of sinks the event was handed to
    pub fn attempted(&self) -> usize {
        self.delivered + self.failures.len()
    }

    /// True if every sink accepted the event
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Owns the notification sinks of a reconciler
#[derive(Clone)]
pub struct NotificationDispatcher {
    sinks: Vec<Arc<dyn NotificationSink>>,
    grace_period: Duration,
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl NotificationDispatcher {
    /// Create a dispatcher for `sinks`
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self {
            sinks,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Override the grace window used for interrupted runs
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Add a sink
    pub fn push(&mut self, sink: Arc<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    /// Number of sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// True if there are no sinks
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver `event` to every sink and wait for all deliveries
    ///
    /// Deliveries are bounded by `ctx`. If `ctx` is already cancelled or past
    /// its deadline, a fresh context with the grace window is used so that the
    /// report of an interrupted run still goes out. Deliveries in flight when
    /// `ctx` is cancelled get the same grace window to finish.
    pub async fn dispatch(&self, ctx: &RunContext, event: Event) -> DispatchReport {
        let mut report = DispatchReport::default();
        if self.sinks.is_empty() {
            debug!("No notification sinks configured");
            return report;
        }

        let ctx = if ctx.is_interrupted() {
            debug!(
                grace_secs = self.grace_period.as_secs_f64(),
                "Run interrupted, delivering within grace window"
            );
            RunContext::new().with_timeout(self.grace_period)
        } else {
            ctx.clone()
        };

        let event = Arc::new(event);
        let mut tasks = JoinSet::new();
        for (index, sink) in self.sinks.iter().enumerate() {
            let sink = Arc::clone(sink);
            let event = Arc::clone(&event);
            let ctx = ctx.clone();
            let grace_period = self.grace_period;
            tasks.spawn(async move {
                let send = sink.send_event(&event);
                tokio::pin!(send);
                let guarded = ctx.guard(&mut send).await;
                let result = match guarded {
                    // Cancelled mid-delivery: finish within the grace window
                    Err(Error::Cancelled) => tokio::time::timeout(grace_period, send)
                        .await
                        .unwrap_or(Err(Error::TimedOut)),
                    other => other,
                };
                (index, result)
            });
        }

        let mut reported = vec![false; self.sinks.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    reported[index] = true;
                    let name = self.sinks[index].sink_name();
                    match result {
                        Ok(()) => {
                            debug!(sink = name, "Notification delivered");
                            report.delivered += 1;
                        }
                        Err(e) => {
                            warn!(sink = name, error = %e, "Notification delivery failed");
                            report.failures.push((name.to_string(), e));
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Notification task did not complete");
                }
            }
        }

        // Tasks that panicked never reported back
        for (index, done) in reported.into_iter().enumerate() {
            if !done {
                let name = self.sinks[index].sink_name().to_string();
                let err = Error::notification(name.clone(), "delivery task panicked");
                report.failures.push((name, err));
            }
        }

        info!(
            delivered = report.delivered,
            failed = report.failures.len(),
            "Notification dispatch finished"
        );
        report
    }
}
