// # DNS Record Updater Trait
//
// Defines the interface for reading and writing the address of one A-record.
//
// ## Implementations
//
// - Cloudflare: `ipwatch-dns-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ipwatch_core::DnsRecordUpdater;
//
// updater.update_record_address("203.0.113.9".parse()?).await?;
// println!("updated {}", updater.record_name());
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for DNS record updater implementations
///
/// An updater is bound to exactly one record name at construction time.
///
/// # Ambiguity
///
/// Lookups must match exactly one A-record. Zero matches fail with
/// [`Error::RecordNotFound`](crate::Error::RecordNotFound), several with
/// [`Error::MultipleRecordsFound`](crate::Error::MultipleRecordsFound).
/// Implementations never pick one of several candidates.
///
/// # Forbidden
///
/// - Retrying or backing off (one attempt per call)
/// - Touching the address store
/// - Deciding whether an update is needed (the reconciler decides)
#[async_trait]
pub trait DnsRecordUpdater: Send + Sync {
    /// Fully qualified name of the managed record
    fn record_name(&self) -> &str;

    /// Current address of the record
    async fn record_address(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Create the record with `address`
    async fn create_record(&self, address: Ipv4Addr) -> Result<(), crate::Error>;

    /// Look up the record and point it at `address`
    async fn update_record_address(&self, address: Ipv4Addr) -> Result<(), crate::Error>;

    /// Provider name (for logging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS updaters from configuration
pub trait DnsRecordUpdaterFactory: Send + Sync {
    /// Create a DnsRecordUpdater instance from configuration
    fn create(
        &self,
        config: &crate::config::DnsRecordConfig,
    ) -> Result<Box<dyn DnsRecordUpdater>, crate::Error>;
}
