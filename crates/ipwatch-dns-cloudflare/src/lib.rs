// # Cloudflare DNS Record Updater
//
// This crate keeps one Cloudflare A-record pointed at the current public address.
//
// ## Behavior
//
// - One configured record per updater; the record must already exist
// - Exactly one matching A-record is required: zero or several is an error
//   (`RecordNotFound` / `MultipleRecordsFound`) and nothing is written
// - The zone ID is taken from configuration or looked up by zone name once
//   and reused for the lifetime of the updater
// - No retry, no backoff: errors go straight back to the reconciler
// - Dry-run mode performs the lookups and logs the intended write
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - An empty token is a configuration error
//
// ## API Reference
//
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=A&name=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Patch DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ipwatch_core::config::DnsRecordConfig;
use ipwatch_core::registry::CollaboratorRegistry;
use ipwatch_core::traits::{DnsRecordUpdater, DnsRecordUpdaterFactory};
use ipwatch_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Comment attached to records created by this updater
pub const RECORD_COMMENT: &str = "ipwatch";

const PROVIDER: &str = "cloudflare";
const RECORD_TYPE: &str = "A";

/// Cloudflare v4 response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

/// A DNS record as returned by Cloudflare
#[derive(Debug, Clone, Deserialize)]
pub struct DnsRecord {
    /// Record ID
    pub id: String,
    /// Fully qualified name
    pub name: String,
    /// Record content (the address, for A-records)
    pub content: String,
}

#[derive(Debug, Serialize)]
struct CreateRecordRequest<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: String,
    comment: &'a str,
}

#[derive(Debug, Serialize)]
struct PatchRecordRequest {
    content: String,
}

/// Cloudflare DNS record updater
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the updater will:
/// - Perform all GET requests (zone lookup, record lookup)
/// - Log the intended POST/PATCH
/// - **NOT** modify DNS records
pub struct CloudflareUpdater {
    /// ⚠️ NEVER log this value
    api_token: String,
    zone_name: String,
    record_name: String,
    zone_id: OnceCell<String>,
    api_base: String,
    client: reqwest::Client,
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareUpdater")
            .field("api_token", &"<REDACTED>")
            .field("zone_name", &self.zone_name)
            .field("record_name", &self.record_name)
            .field("zone_id", &self.zone_id.get())
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareUpdater {
    /// Create an updater for `record_name` in `zone_name`
    ///
    /// # Errors
    ///
    /// `Error::Config` if the token, zone name or record name is empty.
    pub fn new(
        api_token: impl Into<String>,
        zone_name: impl Into<String>,
        record_name: impl Into<String>,
    ) -> Result<Self> {
        let api_token = api_token.into();
        let zone_name = zone_name.into();
        let record_name = record_name.into();

        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }
        if zone_name.is_empty() || record_name.is_empty() {
            return Err(Error::config("Cloudflare zone and record names cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            zone_name,
            record_name,
            zone_id: OnceCell::new(),
            api_base: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run: false,
        })
    }

    /// Use a known zone ID instead of looking it up by name
    pub fn with_zone_id(mut self, zone_id: Option<String>) -> Self {
        self.zone_id = OnceCell::new_with(zone_id.filter(|id| !id.is_empty()));
        self
    }

    /// Enable or disable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Point the updater at a different API base (API gateways, tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// True if writes are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Send an authenticated request and unwrap the v4 envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
    ) -> Result<T> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::http(format!("Cloudflare {} request failed: {}", operation, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, operation, &error_text));
        }

        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            Error::provider(PROVIDER, format!("Failed to parse {} response: {}", operation, e))
        })?;

        if !envelope.success {
            let reasons: Vec<String> = envelope
                .errors
                .iter()
                .map(|e| format!("{} ({})", e.message, e.code))
                .collect();
            return Err(Error::provider(
                PROVIDER,
                format!("{} rejected: {}", operation, reasons.join(", ")),
            ));
        }

        envelope
            .result
            .ok_or_else(|| Error::provider(PROVIDER, format!("{} response has no result", operation)))
    }

    /// Zone ID, looked up by name on first use
    async fn zone_id(&self) -> Result<&str> {
        let zone_id = self
            .zone_id
            .get_or_try_init(|| async {
                tracing::debug!(zone = %self.zone_name, "Looking up Cloudflare zone ID");

                let request = self
                    .client
                    .get(format!("{}/zones", self.api_base))
                    .query(&[("name", self.zone_name.as_str())]);
                let zones: Vec<Zone> = self.send(request, "zone lookup").await?;

                zones.into_iter().next().map(|zone| zone.id).ok_or_else(|| {
                    Error::dns(format!("Zone not found: {}", self.zone_name))
                })
            })
            .await?;

        Ok(zone_id.as_str())
    }

    /// Find the single A-record for the configured name
    pub async fn describe_record(&self) -> Result<DnsRecord> {
        let zone_id = self.zone_id().await?;

        let request = self
            .client
            .get(format!("{}/zones/{}/dns_records", self.api_base, zone_id))
            .query(&[("type", RECORD_TYPE), ("name", self.record_name.as_str())]);
        let mut records: Vec<DnsRecord> = self.send(request, "record lookup").await?;

        match records.len() {
            0 => Err(Error::record_not_found(&self.record_name)),
            1 => Ok(records.remove(0)),
            count => Err(Error::multiple_records(&self.record_name, count)),
        }
    }
}

fn status_error(status: reqwest::StatusCode, operation: &str, error_text: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Cloudflare {}: invalid API token or insufficient permissions (status {})",
            operation, status
        )),
        404 => Error::dns(format!("Cloudflare {}: not found (status {})", operation, status)),
        429 => Error::rate_limited(format!("Cloudflare {}: status {}", operation, status)),
        500..=599 => Error::provider(
            PROVIDER,
            format!("server error (transient) during {}: {} - {}", operation, status, error_text),
        ),
        _ => Error::provider(
            PROVIDER,
            format!("{} failed: {} - {}", operation, status, error_text),
        ),
    }
}

#[async_trait]
impl DnsRecordUpdater for CloudflareUpdater {
    fn record_name(&self) -> &str {
        &self.record_name
    }

    async fn record_address(&self) -> Result<Ipv4Addr> {
        let record = self.describe_record().await?;
        record.content.parse().map_err(|_| {
            Error::provider(
                PROVIDER,
                format!("Record {} has non-IPv4 content {:?}", record.name, record.content),
            )
        })
    }

    async fn create_record(&self, address: Ipv4Addr) -> Result<()> {
        let zone_id = self.zone_id().await?;

        if self.dry_run {
            tracing::info!(
                record = %self.record_name,
                address = %address,
                "[DRY-RUN] Would create Cloudflare A-record"
            );
            return Ok(());
        }

        let body = CreateRecordRequest {
            record_type: RECORD_TYPE,
            name: &self.record_name,
            content: address.to_string(),
            comment: RECORD_COMMENT,
        };
        let request = self
            .client
            .post(format!("{}/zones/{}/dns_records", self.api_base, zone_id))
            .json(&body);
        let _: serde_json::Value = self.send(request, "record create").await?;

        tracing::info!(record = %self.record_name, address = %address, "Created Cloudflare A-record");
        Ok(())
    }

    async fn update_record_address(&self, address: Ipv4Addr) -> Result<()> {
        let record = self.describe_record().await?;

        if record.content == address.to_string() {
            tracing::debug!(record = %record.name, address = %address, "Record already up to date");
            return Ok(());
        }

        if self.dry_run {
            tracing::info!(
                record = %record.name,
                from = %record.content,
                to = %address,
                "[DRY-RUN] Would update Cloudflare A-record"
            );
            return Ok(());
        }

        let zone_id = self.zone_id().await?;
        let request = self
            .client
            .patch(format!(
                "{}/zones/{}/dns_records/{}",
                self.api_base, zone_id, record.id
            ))
            .json(&PatchRecordRequest {
                content: address.to_string(),
            });
        let _: serde_json::Value = self.send(request, "record update").await?;

        tracing::info!(
            record = %record.name,
            from = %record.content,
            to = %address,
            "Updated Cloudflare A-record"
        );
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating Cloudflare updaters
pub struct CloudflareFactory;

impl DnsRecordUpdaterFactory for CloudflareFactory {
    fn create(&self, config: &DnsRecordConfig) -> Result<Box<dyn DnsRecordUpdater>> {
        match config {
            DnsRecordConfig::Cloudflare {
                api_key,
                zone_name,
                record_name,
                zone_id,
                dry_run,
            } => {
                let updater = CloudflareUpdater::new(
                    api_key.as_str(),
                    zone_name.as_str(),
                    record_name.as_str(),
                )?
                .with_zone_id(zone_id.clone())
                .with_dry_run(*dry_run);
                Ok(Box::new(updater))
            }
        }
    }
}

/// Register the Cloudflare updater with a registry
pub fn register(registry: &mut CollaboratorRegistry) {
    registry.register_dns_updater("cloudflare", Box::new(CloudflareFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RECORD: &str = "home.example.com";

    fn envelope(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "messages": [],
            "result": result
        }))
    }

    fn updater(server: &MockServer) -> CloudflareUpdater {
        CloudflareUpdater::new("test-token", "example.com", RECORD)
            .unwrap()
            .with_api_base(server.uri())
    }

    async fn mount_zone(server: &MockServer, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/zones"))
            .and(query_param("name", "example.com"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(envelope(json!([{ "id": "zone-1", "name": "example.com" }])))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    async fn mount_records(server: &MockServer, records: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/zones/zone-1/dns_records"))
            .and(query_param("type", "A"))
            .and(query_param("name", RECORD))
            .respond_with(envelope(records))
            .mount(server)
            .await;
    }

    fn record(id: &str, content: &str) -> serde_json::Value {
        json!({ "id": id, "name": RECORD, "type": "A", "content": content, "ttl": 1 })
    }

    #[tokio::test]
    async fn update_patches_single_record() {
        let server = MockServer::start().await;
        mount_zone(&server, 1).await;
        mount_records(&server, json!([record("rec-1", "192.0.2.1")])).await;
        Mock::given(method("PATCH"))
            .and(path("/zones/zone-1/dns_records/rec-1"))
            .and(body_json(json!({ "content": "203.0.113.9" })))
            .respond_with(envelope(record("rec-1", "203.0.113.9")))
            .expect(1)
            .mount(&server)
            .await;

        let updater = updater(&server);
        assert_ok!(updater.update_record_address(Ipv4Addr::new(203, 0, 113, 9)).await);
    }

    #[tokio::test]
    async fn zero_records_is_not_found() {
        let server = MockServer::start().await;
        mount_zone(&server, 1).await;
        mount_records(&server, json!([])).await;
        Mock::given(method("PATCH"))
            .respond_with(envelope(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let updater = updater(&server);
        let err = assert_err!(updater.update_record_address(Ipv4Addr::new(192, 0, 2, 2)).await);
        assert!(matches!(err, Error::RecordNotFound(_)));
        assert!(err.is_ambiguous_lookup());
    }

    #[tokio::test]
    async fn many_records_is_ambiguous() {
        let server = MockServer::start().await;
        mount_zone(&server, 1).await;
        mount_records(
            &server,
            json!([record("rec-1", "192.0.2.1"), record("rec-2", "192.0.2.1")]),
        )
        .await;

        let updater = updater(&server);
        let err = assert_err!(updater.update_record_address(Ipv4Addr::new(192, 0, 2, 2)).await);
        assert!(matches!(err, Error::MultipleRecordsFound { count: 2, .. }));
    }

    #[tokio::test]
    async fn forbidden_maps_to_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = assert_err!(updater(&server).record_address().await);
        assert!(matches!(err, Error::Authentication(_)));
        assert!(!err.to_string().contains("test-token"));
    }

    #[tokio::test]
    async fn dry_run_skips_patch() {
        let server = MockServer::start().await;
        mount_zone(&server, 1).await;
        mount_records(&server, json!([record("rec-1", "192.0.2.1")])).await;
        Mock::given(method("PATCH"))
            .respond_with(envelope(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let updater = updater(&server).with_dry_run(true);
        assert_ok!(updater.update_record_address(Ipv4Addr::new(203, 0, 113, 9)).await);
    }

    #[tokio::test]
    async fn zone_id_is_looked_up_once() {
        let server = MockServer::start().await;
        mount_zone(&server, 1).await;
        mount_records(&server, json!([record("rec-1", "198.51.100.4")])).await;

        let updater = updater(&server);
        for _ in 0..3 {
            let ip = assert_ok!(updater.record_address().await);
            assert_eq!(ip, Ipv4Addr::new(198, 51, 100, 4));
        }
    }

    #[tokio::test]
    async fn configured_zone_id_skips_lookup() {
        let server = MockServer::start().await;
        mount_zone(&server, 0).await;
        mount_records(&server, json!([record("rec-1", "198.51.100.4")])).await;

        let updater = updater(&server).with_zone_id(Some("zone-1".to_string()));
        assert_ok!(updater.record_address().await);
    }

    #[tokio::test]
    async fn create_posts_commented_record() {
        let server = MockServer::start().await;
        mount_zone(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/zones/zone-1/dns_records"))
            .and(body_json(json!({
                "type": "A",
                "name": RECORD,
                "content": "203.0.113.9",
                "comment": RECORD_COMMENT
            })))
            .respond_with(envelope(record("rec-9", "203.0.113.9")))
            .expect(1)
            .mount(&server)
            .await;

        assert_ok!(updater(&server).create_record(Ipv4Addr::new(203, 0, 113, 9)).await);
    }

    #[tokio::test]
    async fn unsuccessful_envelope_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errors": [{ "code": 9109, "message": "Invalid access token" }],
                "result": null
            })))
            .mount(&server)
            .await;

        let err = assert_err!(updater(&server).record_address().await);
        assert!(err.to_string().contains("Invalid access token (9109)"), "{err}");
    }

    #[test]
    fn empty_token_is_config_error() {
        let err = CloudflareUpdater::new("", "example.com", RECORD).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn debug_redacts_token() {
        let updater = CloudflareUpdater::new("super-secret", "example.com", RECORD).unwrap();
        let debug = format!("{:?}", updater);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<REDACTED>"));
    }

    #[test]
    fn factory_builds_from_config() {
        let mut registry = CollaboratorRegistry::new();
        register(&mut registry);

        let config = DnsRecordConfig::Cloudflare {
            api_key: "token".to_string(),
            zone_name: "example.com".to_string(),
            record_name: RECORD.to_string(),
            zone_id: None,
            dry_run: true,
        };
        let updater = registry.create_dns_updater(&config).ok().unwrap();
        assert_eq!(updater.record_name(), RECORD);
        assert_eq!(updater.provider_name(), "cloudflare");
    }
}
