//! Collaborator traits
//!
//! - [`AddressStore`]: Persist the last known address
//! - [`AddressRetriever`]: Look up the current public address
//! - [`DnsRecordUpdater`]: Point an A-record at a new address
//! - [`NotificationSink`]: Deliver run outcomes

pub mod address_retriever;
pub mod address_store;
pub mod dns_updater;
pub mod notification_sink;

pub use address_retriever::{AddressRetriever, AddressRetrieverFactory};
pub use address_store::{AddressStore, PersistedAddressRecord};
pub use dns_updater::{DnsRecordUpdater, DnsRecordUpdaterFactory};
pub use notification_sink::{NotificationSink, NotificationSinkFactory};
