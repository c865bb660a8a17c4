// # Memory Address Store
//
// In-memory implementation of AddressStore.
//
// ## Crash Behavior
//
// - State is lost on restart
// - The first run of a new process always reports a change
//
// ## When to Use
//
// - Tests
// - Embedding the reconciler in a long-running process that owns persistence elsewhere

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::address_store::{AddressStore, PersistedAddressRecord};

/// In-memory address store
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct MemoryAddressStore {
    inner: Arc<RwLock<Option<PersistedAddressRecord>>>,
}

impl MemoryAddressStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `address`
    pub fn with_address(address: Ipv4Addr) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(PersistedAddressRecord::new(address)))),
        }
    }

    /// Remove the record
    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }
}

#[async_trait]
impl AddressStore for MemoryAddressStore {
    async fn load_record(&self) -> Result<Option<PersistedAddressRecord>, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn save_address(&self, address: Ipv4Addr) -> Result<(), Error> {
        *self.inner.write().await = Some(PersistedAddressRecord::new(address));
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}
