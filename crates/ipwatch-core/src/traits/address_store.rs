// # Address Store Trait
//
// Defines the interface for persisting the last known public address.
//
// ## Purpose
//
// The store is what makes runs idempotent: a run only acts when the freshly
// retrieved address differs from the stored one. There is exactly one record
// per deployment, overwritten in place on every change.
//
// ## Implementations
//
// - File-based: `FileAddressStore` (JSON, atomic replace)
// - In-memory: `MemoryAddressStore` (tests, embedding)
//
// ## Usage
//
// ```rust,ignore
// use ipwatch_core::AddressStore;
//
// let last = store.last_known_address().await?;
// store.save_address("203.0.113.9".parse()?).await?;
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// The single persisted record
///
/// Serialized as `{ "ip_address": "...", "checked_at": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedAddressRecord {
    /// Last known public address
    #[serde(rename = "ip_address")]
    pub address: Ipv4Addr,
    /// When the address was observed and stored
    #[serde(rename = "checked_at")]
    pub observed_at: DateTime<Utc>,
}

impl PersistedAddressRecord {
    /// Create a record stamped with the current time
    pub fn new(address: Ipv4Addr) -> Self {
        Self {
            address,
            observed_at: Utc::now(),
        }
    }
}

/// Trait for address store implementations
///
/// # Contract
///
/// - An empty store is not an error: [`last_known_address`] returns `Ok(None)`.
/// - [`save_address`] must be durable before it returns `Ok`.
/// - Stores never decide whether to act; that is the reconciler's job.
///
/// [`last_known_address`]: AddressStore::last_known_address
/// [`save_address`]: AddressStore::save_address
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Load the persisted record
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))`: A record exists
    /// - `Ok(None)`: Nothing has been stored yet
    /// - `Err(Error)`: Storage error (unreadable, corrupt)
    async fn load_record(&self) -> Result<Option<PersistedAddressRecord>, crate::Error>;

    /// Overwrite the record with `address` and the current time
    async fn save_address(&self, address: Ipv4Addr) -> Result<(), crate::Error>;

    /// Get the last known address, `None` if never recorded
    async fn last_known_address(&self) -> Result<Option<Ipv4Addr>, crate::Error> {
        Ok(self.load_record().await?.map(|record| record.address))
    }

    /// Store name (for logging)
    fn store_name(&self) -> &'static str;
}
