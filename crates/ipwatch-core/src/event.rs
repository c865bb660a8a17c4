//! Outcome events of a reconciliation run
//!
//! A run produces at most one [`Event`]. The unchanged path produces none.
//! Events are built once from the run's result and handed to notification
//! delivery; nothing mutates them afterwards.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::error::{Error, ReconcileError};

/// Stage of a reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Reading the last known address from the store
    ReadStore,
    /// Retrieving the current public address
    RetrieveAddress,
    /// Persisting the new address
    WriteStore,
    /// Updating the DNS record
    UpdateDns,
}

impl Stage {
    /// Human-readable summary used as the `Failed` event message
    pub fn failure_message(self) -> &'static str {
        match self {
            Stage::ReadStore => "Failed to determine the last known IP address",
            Stage::RetrieveAddress => "Failed to determine current IP address",
            Stage::WriteStore => "Failed to store new IP address",
            Stage::UpdateDns => "Failed to update DNS record with new IP address",
        }
    }

    /// Short tag for structured logs
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::ReadStore => "read_store",
            Stage::RetrieveAddress => "retrieve_address",
            Stage::WriteStore => "write_store",
            Stage::UpdateDns => "update_dns",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected and persisted address change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressChange {
    /// Previously recorded address, `None` on the first run
    pub from: Option<Ipv4Addr>,
    /// Newly observed address
    pub to: Ipv4Addr,
    /// Name of the DNS record that was updated, if an updater is configured
    pub dns_record: Option<String>,
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The public address matches the stored one; nothing was done
    Unchanged {
        /// The unchanged address
        address: Ipv4Addr,
    },
    /// The address changed and every configured stage succeeded
    Changed(AddressChange),
}

/// Notification event describing the outcome of one run
#[derive(Debug, Clone)]
pub enum Event {
    /// The address changed and was stored (and DNS updated, if configured)
    Changed {
        /// Previous address, `None` if none was recorded
        from: Option<Ipv4Addr>,
        /// New address
        to: Ipv4Addr,
        /// Whether a DNS record was updated
        dns_updated: bool,
        /// Name of the updated record
        record_name: Option<String>,
    },
    /// A stage failed and the run was aborted
    Failed {
        /// Stage that failed
        stage: Stage,
        /// Summary of what failed
        message: String,
        /// Underlying error
        cause: Arc<Error>,
    },
}

impl Event {
    /// Build the event for a run result, `None` for the unchanged path
    pub fn from_result(result: &Result<RunOutcome, ReconcileError>) -> Option<Self> {
        match result {
            Ok(RunOutcome::Unchanged { .. }) => None,
            Ok(RunOutcome::Changed(change)) => Some(Self::changed(change)),
            Err(err) => Some(Self::failed(err)),
        }
    }

    /// Build a `Changed` event from a persisted change
    pub fn changed(change: &AddressChange) -> Self {
        Self::Changed {
            from: change.from,
            to: change.to,
            dns_updated: change.dns_record.is_some(),
            record_name: change.dns_record.clone(),
        }
    }

    /// Build a `Failed` event from a stage error
    pub fn failed(err: &ReconcileError) -> Self {
        let stage = err.stage();
        Self::Failed {
            stage,
            message: stage.failure_message().to_string(),
            cause: Arc::clone(err.cause()),
        }
    }

    /// Render the event as a single human-readable line
    pub fn as_message(&self) -> String {
        self.to_string()
    }

    /// True for `Failed` events
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Changed {
                from,
                to,
                dns_updated,
                record_name,
            } => {
                match from {
                    Some(from) => write!(f, "IP address changed from {from} to {to}")?,
                    None => write!(f, "IP address set to {to} (no previously recorded address)")?,
                }
                if *dns_updated {
                    let record = record_name.as_deref().unwrap_or("<unnamed>");
                    write!(f, ". DNS record {record} updated with new address.")?;
                }
                Ok(())
            }
            Event::Failed { message, cause, .. } => write!(f, "{message}: {cause}"),
        }
    }
}
