// # ipwatch-core
//
// Core library for detecting public IPv4 address changes and reacting to them.
//
// ## Architecture Overview
//
// - **AddressStore**: Persists the last known address (idempotency)
// - **AddressRetriever**: Looks up the current public address
// - **DnsRecordUpdater**: Optionally points an A-record at the new address
// - **NotificationSink**: Delivers the outcome of a run
// - **ChangeReconciler**: Orchestrates one run and always notifies on exit
// - **CollaboratorRegistry**: Plugin-based factory lookup from configuration
//
// Adapters live in their own crates and register with the registry; this
// crate never talks to the network.

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod reconciler;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{AddressSourceConfig, Config, DnsRecordConfig, NotifierConfig};
pub use context::RunContext;
pub use error::{Error, ReconcileError, Result};
pub use event::{AddressChange, Event, RunOutcome, Stage};
pub use reconciler::{ChangeReconciler, DispatchReport, NotificationDispatcher};
pub use registry::CollaboratorRegistry;
pub use state::{FileAddressStore, MemoryAddressStore};
pub use traits::{AddressRetriever, AddressStore, DnsRecordUpdater, NotificationSink};
