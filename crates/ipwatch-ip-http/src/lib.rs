// # HTTP Address Retrievers
//
// This crate provides AddressRetriever implementations that ask an external
// service which address our requests come from.
//
// ## Retrievers
//
// - `IpApiRetriever` (`type: "ip-api"`): ip-api.com JSON endpoint; the default
// - `PlainTextRetriever` (`type: "plain-text"`): any service that answers
//   with the bare address (api.ipify.org, icanhazip.com, ifconfig.me/ip)
//
// ## Behavior
//
// One request per call, no caching and no retry. A run that fails here is
// retried by the next scheduled run. Only IPv4 answers are accepted.

use ipwatch_core::config::{AddressSourceConfig, parse_http_url};
use ipwatch_core::registry::CollaboratorRegistry;
use ipwatch_core::traits::{AddressRetriever, AddressRetrieverFactory};
use ipwatch_core::{Error, Result};

use reqwest::Url;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default ip-api.com endpoint
pub const IP_API_ENDPOINT: &str = "http://ip-api.com/json/";

/// Fields requested from ip-api.com
const IP_API_FIELDS: &str = "status,message,query";

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))
}

fn parse_ipv4(source: &str, text: &str) -> Result<Ipv4Addr> {
    let text = text.trim();
    text.parse().map_err(|_| {
        Error::retrieval(format!(
            "{} returned {:?}, which is not an IPv4 address",
            source, text
        ))
    })
}

fn status_error(source: &str, status: reqwest::StatusCode) -> Error {
    match status.as_u16() {
        429 => Error::rate_limited(format!("{} rate limit exceeded", source)),
        _ => Error::retrieval(format!("{} returned HTTP {}", source, status)),
    }
}

/// ip-api.com response body (only the requested fields)
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    query: Option<String>,
}

/// Retriever backed by the ip-api.com JSON API
pub struct IpApiRetriever {
    endpoint: Url,
    client: reqwest::Client,
}

impl IpApiRetriever {
    /// Create a retriever for the public ip-api.com endpoint
    pub fn new() -> Result<Self> {
        Self::with_endpoint(IP_API_ENDPOINT)
    }

    /// Create a retriever for a custom endpoint (self-hosted mirror, tests)
    pub fn with_endpoint(endpoint: &str) -> Result<Self> {
        Ok(Self {
            endpoint: parse_http_url("ip-api endpoint", endpoint)?,
            client: http_client()?,
        })
    }

    /// Endpoint queried by this retriever
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

#[async_trait::async_trait]
impl AddressRetriever for IpApiRetriever {
    async fn current_public_address(&self) -> Result<Ipv4Addr> {
        tracing::debug!(endpoint = %self.endpoint, "Querying ip-api");

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("fields", IP_API_FIELDS)])
            .send()
            .await
            .map_err(|e| Error::http(format!("ip-api request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error("ip-api", response.status()));
        }

        let body: IpApiResponse = response
            .json()
            .await
            .map_err(|e| Error::retrieval(format!("Invalid ip-api response: {}", e)))?;

        if body.status != "success" {
            return Err(Error::retrieval(format!(
                "ip-api query failed: {}",
                body.message.as_deref().unwrap_or("no reason given")
            )));
        }

        let query = body
            .query
            .ok_or_else(|| Error::retrieval("ip-api response has no query field"))?;

        parse_ipv4("ip-api", &query)
    }

    fn source_name(&self) -> &'static str {
        "ip-api"
    }
}

/// Retriever for services that answer with the bare address as text
pub struct PlainTextRetriever {
    url: Url,
    client: reqwest::Client,
}

impl PlainTextRetriever {
    /// Create a retriever for `url` (e.g. "https://api.ipify.org")
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            url: parse_http_url("plain-text url", url)?,
            client: http_client()?,
        })
    }
}

#[async_trait::async_trait]
impl AddressRetriever for PlainTextRetriever {
    async fn current_public_address(&self) -> Result<Ipv4Addr> {
        tracing::debug!(url = %self.url, "Fetching public address");

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| Error::http(format!("Request to {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(status_error(self.url.as_str(), response.status()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::retrieval(format!("Failed to read response: {}", e)))?;

        parse_ipv4(self.url.as_str(), &text)
    }

    fn source_name(&self) -> &'static str {
        "plain-text"
    }
}

/// Factory for ip-api retrievers
pub struct IpApiFactory;

impl AddressRetrieverFactory for IpApiFactory {
    fn create(&self, config: &AddressSourceConfig) -> Result<Box<dyn AddressRetriever>> {
        match config {
            AddressSourceConfig::IpApi { endpoint } => {
                let retriever = match endpoint {
                    Some(endpoint) => IpApiRetriever::with_endpoint(endpoint)?,
                    None => IpApiRetriever::new()?,
                };
                Ok(Box::new(retriever))
            }
            _ => Err(Error::config("Invalid config for ip-api address source")),
        }
    }
}

/// Factory for plain-text retrievers
pub struct PlainTextFactory;

impl AddressRetrieverFactory for PlainTextFactory {
    fn create(&self, config: &AddressSourceConfig) -> Result<Box<dyn AddressRetriever>> {
        match config {
            AddressSourceConfig::PlainText { url } => Ok(Box::new(PlainTextRetriever::new(url)?)),
            _ => Err(Error::config("Invalid config for plain-text address source")),
        }
    }
}

/// Register the HTTP retrievers with a registry
pub fn register(registry: &mut CollaboratorRegistry) {
    registry.register_retriever("ip-api", Box::new(IpApiFactory));
    registry.register_retriever("plain-text", Box::new(PlainTextFactory));
}
