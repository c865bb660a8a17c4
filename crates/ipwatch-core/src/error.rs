//! Error types for the ipwatch system
//!
//! [`Error`] is what collaborators (stores, retrievers, DNS updaters, sinks)
//! return. [`ReconcileError`] is what a reconciliation run returns: the
//! collaborator error tagged with the stage it happened in.

use std::sync::Arc;

use thiserror::Error;

use crate::event::Stage;

/// Result type alias for collaborator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for collaborators
#[derive(Error, Debug)]
pub enum Error {
    /// Address store errors
    #[error("Address store error: {0}")]
    Store(String),

    /// Address retrieval errors
    #[error("Address retrieval error: {0}")]
    Retrieval(String),

    /// DNS updater errors
    #[error("DNS error: {0}")]
    Dns(String),

    /// No record matched the configured name
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// More than one record matched the configured name
    #[error("Multiple records found for {record}: {count} matches")]
    MultipleRecordsFound {
        /// Record name that was looked up
        record: String,
        /// Number of matches returned
        count: usize,
    },

    /// Notification delivery errors
    #[error("Notification via {sink} failed: {message}")]
    Notification {
        /// Sink name
        sink: String,
        /// Error message
        message: String,
    },

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The run was cancelled while the call was in flight
    #[error("Operation cancelled")]
    Cancelled,

    /// The run deadline passed while the call was in flight
    #[error("Operation timed out")]
    TimedOut,

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an address store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create an address retrieval error
    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Retrieval(msg.into())
    }

    /// Create a DNS error
    pub fn dns(msg: impl Into<String>) -> Self {
        Self::Dns(msg.into())
    }

    /// Create a "record not found" error
    pub fn record_not_found(record: impl Into<String>) -> Self {
        Self::RecordNotFound(record.into())
    }

    /// Create a "multiple records found" error
    pub fn multiple_records(record: impl Into<String>, count: usize) -> Self {
        Self::MultipleRecordsFound {
            record: record.into(),
            count,
        }
    }

    /// Create a notification delivery error
    pub fn notification(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Notification {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True when a DNS lookup matched zero or several records.
    ///
    /// Updaters refuse to pick a record in either case.
    pub fn is_ambiguous_lookup(&self) -> bool {
        matches!(
            self,
            Self::RecordNotFound(_) | Self::MultipleRecordsFound { .. }
        )
    }

    /// True when the failure came from the run context rather than the collaborator
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut)
    }
}

/// Failure of a reconciliation run, tagged with the stage that failed.
///
/// The collaborator error is kept behind an `Arc` so the same cause can be
/// carried by both the returned error and the `Failed` event sent to sinks.
#[derive(Error, Debug, Clone)]
pub enum ReconcileError {
    /// Reading the last known address failed
    #[error("failed to read last known address")]
    StoreRead(#[source] Arc<Error>),

    /// Retrieving the current public address failed
    #[error("failed to retrieve current public address")]
    Retrieval(#[source] Arc<Error>),

    /// Persisting the new address failed
    #[error("failed to store new address")]
    StoreWrite(#[source] Arc<Error>),

    /// Updating the DNS record failed
    #[error("failed to update DNS record")]
    DnsUpdate(#[source] Arc<Error>),
}

impl ReconcileError {
    /// Tag a collaborator error with the stage it occurred in
    pub fn at(stage: Stage, cause: Error) -> Self {
        let cause = Arc::new(cause);
        match stage {
            Stage::ReadStore => Self::StoreRead(cause),
            Stage::RetrieveAddress => Self::Retrieval(cause),
            Stage::WriteStore => Self::StoreWrite(cause),
            Stage::UpdateDns => Self::DnsUpdate(cause),
        }
    }

    /// The stage that failed
    pub fn stage(&self) -> Stage {
        match self {
            Self::StoreRead(_) => Stage::ReadStore,
            Self::Retrieval(_) => Stage::RetrieveAddress,
            Self::StoreWrite(_) => Stage::WriteStore,
            Self::DnsUpdate(_) => Stage::UpdateDns,
        }
    }

    /// The underlying collaborator error
    pub fn cause(&self) -> &Arc<Error> {
        match self {
            Self::StoreRead(cause)
            | Self::Retrieval(cause)
            | Self::StoreWrite(cause)
            | Self::DnsUpdate(cause) => cause,
        }
    }

    /// True when the DNS stage failed because the record lookup was ambiguous
    pub fn is_ambiguous_lookup(&self) -> bool {
        self.stage() == Stage::UpdateDns && self.cause().is_ambiguous_lookup()
    }

    /// True when the run was cancelled or ran past its deadline
    pub fn is_interruption(&self) -> bool {
        self.cause().is_interruption()
    }
}
