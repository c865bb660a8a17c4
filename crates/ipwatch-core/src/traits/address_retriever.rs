// # Address Retriever Trait
//
// Defines the interface for looking up the host's current public IPv4 address.
//
// ## Implementations
//
// - ip-api.com JSON endpoint: `ipwatch-ip-http` crate (`IpApiRetriever`)
// - Plain-text echo services (ipify, icanhazip): `ipwatch-ip-http` crate (`PlainTextRetriever`)

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for address retriever implementations
///
/// # Contract
///
/// - One external query per call. No retry, no caching across calls.
/// - Network, status and parse failures are returned as errors.
/// - A non-IPv4 answer is an error, never silently converted.
#[async_trait]
pub trait AddressRetriever: Send + Sync {
    /// Fetch the current public IPv4 address
    async fn current_public_address(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Source name (for logging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing retrievers from configuration
pub trait AddressRetrieverFactory: Send + Sync {
    /// Create an AddressRetriever instance from configuration
    fn create(
        &self,
        config: &crate::config::AddressSourceConfig,
    ) -> Result<Box<dyn AddressRetriever>, crate::Error>;
}
