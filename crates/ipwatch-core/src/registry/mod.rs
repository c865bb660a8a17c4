//! Plugin-based collaborator registry
//!
//! Maps configuration `type` tags to factories so the daemon never matches on
//! concrete implementations. Adapter crates register themselves:
//!
//! ```rust,ignore
//! // In ipwatch-dns-cloudflare
//! pub fn register(registry: &mut CollaboratorRegistry) {
//!     registry.register_dns_updater("cloudflare", Box::new(CloudflareFactory));
//! }
//! ```
//!
//! The daemon then resolves the whole configuration once at startup:
//!
//! ```rust,ignore
//! let mut registry = CollaboratorRegistry::new();
//! ipwatch_ip_http::register(&mut registry);
//! ipwatch_dns_cloudflare::register(&mut registry);
//! ipwatch_notify_discord::register(&mut registry);
//!
//! let retriever = registry.create_retriever(&config.address_source)?;
//! let sinks = registry.create_notifiers(&config.notifiers)?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{AddressSourceConfig, DnsRecordConfig, NotifierConfig};
use crate::error::{Error, Result};
use crate::traits::{AddressRetriever, DnsRecordUpdater, NotificationSink};
use crate::traits::{AddressRetrieverFactory, DnsRecordUpdaterFactory, NotificationSinkFactory};

/// Registry of collaborator factories, keyed by configuration type tag
#[derive(Default)]
pub struct CollaboratorRegistry {
    retrievers: HashMap<String, Box<dyn AddressRetrieverFactory>>,
    dns_updaters: HashMap<String, Box<dyn DnsRecordUpdaterFactory>>,
    notifiers: HashMap<String, Box<dyn NotificationSinkFactory>>,
}

impl CollaboratorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an address retriever factory
    ///
    /// Registering the same name twice replaces the earlier factory.
    pub fn register_retriever(
        &mut self,
        name: impl Into<String>,
        factory: Box<dyn AddressRetrieverFactory>,
    ) {
        self.retrievers.insert(name.into(), factory);
    }

    /// Register a DNS record updater factory
    pub fn register_dns_updater(
        &mut self,
        name: impl Into<String>,
        factory: Box<dyn DnsRecordUpdaterFactory>,
    ) {
        self.dns_updaters.insert(name.into(), factory);
    }

    /// Register a notification sink factory
    pub fn register_notifier(
        &mut self,
        name: impl Into<String>,
        factory: Box<dyn NotificationSinkFactory>,
    ) {
        self.notifiers.insert(name.into(), factory);
    }

    /// Create an address retriever from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn AddressRetriever>)`: Created retriever
    /// - `Err(Error::Config)`: Type not registered, or the factory rejected the config
    pub fn create_retriever(&self, config: &AddressSourceConfig) -> Result<Box<dyn AddressRetriever>> {
        let type_name = config.type_name();
        let factory = self
            .retrievers
            .get(type_name)
            .ok_or_else(|| Error::config(format!("Unknown address source type: {}", type_name)))?;

        factory.create(config)
    }

    /// Create a DNS record updater from configuration
    pub fn create_dns_updater(&self, config: &DnsRecordConfig) -> Result<Box<dyn DnsRecordUpdater>> {
        let type_name = config.type_name();
        let factory = self
            .dns_updaters
            .get(type_name)
            .ok_or_else(|| Error::config(format!("Unknown DNS provider type: {}", type_name)))?;

        factory.create(config)
    }

    /// Create one sink per notifier entry, preserving order
    pub fn create_notifiers(
        &self,
        configs: &[NotifierConfig],
    ) -> Result<Vec<Arc<dyn NotificationSink>>> {
        configs
            .iter()
            .map(|config| {
                let type_name = config.type_name();
                let factory = self.notifiers.get(type_name).ok_or_else(|| {
                    Error::config(format!("Unknown notifier type: {}", type_name))
                })?;
                factory.create(config)
            })
            .collect()
    }

    /// Check if a retriever type is registered
    pub fn has_retriever(&self, name: &str) -> bool {
        self.retrievers.contains_key(name)
    }

    /// Check if a DNS updater type is registered
    pub fn has_dns_updater(&self, name: &str) -> bool {
        self.dns_updaters.contains_key(name)
    }

    /// Check if a notifier type is registered
    pub fn has_notifier(&self, name: &str) -> bool {
        self.notifiers.contains_key(name)
    }

    /// List registered retriever types, sorted
    pub fn list_retrievers(&self) -> Vec<String> {
        sorted_keys(&self.retrievers)
    }

    /// List registered DNS updater types, sorted
    pub fn list_dns_updaters(&self) -> Vec<String> {
        sorted_keys(&self.dns_updaters)
    }

    /// List registered notifier types, sorted
    pub fn list_notifiers(&self) -> Vec<String> {
        sorted_keys(&self.notifiers)
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}
