//! Configuration types for ipwatch
//!
//! The configuration is a single JSON document with camelCase keys. Polymorphic
//! sections carry a `type` tag that selects the implementation through the
//! [`CollaboratorRegistry`](crate::registry::CollaboratorRegistry).
//!
//! Loading happens in three steps, applied in this order by the daemon:
//!
//! 1. [`Config::load`] parses the file
//! 2. [`Config::apply_env_overrides`] applies environment overrides
//! 3. [`Config::resolve_secret_files`] replaces values that name a file with its contents
//!
//! followed by [`Config::validate`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::Error;

/// Config file used when neither `--config-path` nor `CONFIG_PATH` is given
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/dynamic-ip-watcher/config.json";

/// Default directory for the persisted address record
pub const DEFAULT_STORAGE_DIR: &str = "/var/lib/dynamic-ip-watcher";

/// Environment variable names recognized by [`Config::apply_env_overrides`]
pub mod env {
    pub const ZONE_ID: &str = "ZONE_ID";
    pub const RECORD_NAME: &str = "RECORD_NAME";
    pub const LOCAL_STORAGE_DIR: &str = "LOCAL_STORAGE_DIR";
    pub const DISCORD_WEBHOOK: &str = "DISCORD_WEBHOOK";
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// DNS record to keep in sync; absent means no DNS updates
    #[serde(default)]
    pub dns_record: Option<DnsRecordConfig>,

    /// Where the current public address comes from
    #[serde(default)]
    pub address_source: AddressSourceConfig,

    /// Persistence location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Notification sinks, in delivery order
    #[serde(default)]
    pub notifiers: Vec<NotifierConfig>,

    /// Run settings
    #[serde(default)]
    pub run: RunConfig,
}

impl Config {
    /// Parse a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Self::from_json(&content)
            .map_err(|e| Error::config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::config(e.to_string()))
    }

    /// Apply environment overrides
    ///
    /// `lookup` is usually `|key| std::env::var(key).ok()`. Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(zone) = get(env::ZONE_ID) {
            match self.dns_record.as_mut() {
                Some(DnsRecordConfig::Cloudflare { zone_name, .. }) => *zone_name = zone,
                None => tracing::warn!("{} is set but no DNS record is configured", env::ZONE_ID),
            }
        }

        if let Some(record) = get(env::RECORD_NAME) {
            match self.dns_record.as_mut() {
                Some(DnsRecordConfig::Cloudflare { record_name, .. }) => *record_name = record,
                None => {
                    tracing::warn!("{} is set but no DNS record is configured", env::RECORD_NAME)
                }
            }
        }

        if let Some(directory) = get(env::LOCAL_STORAGE_DIR) {
            self.storage.directory = PathBuf::from(directory);
        }

        if let Some(url) = get(env::DISCORD_WEBHOOK) {
            let existing = self
                .notifiers
                .iter_mut()
                .find(|n| matches!(n, NotifierConfig::DiscordWebhook { .. }));

            match existing {
                Some(NotifierConfig::DiscordWebhook { webhook_url, .. }) => *webhook_url = url,
                None => self.notifiers.push(NotifierConfig::DiscordWebhook {
                    webhook_url: url,
                    username: None,
                    avatar_url: None,
                }),
            }
        }
    }

    /// Replace every string setting that names an existing file with the file contents
    ///
    /// Trailing whitespace (usually the final newline) is trimmed. This is how
    /// secrets mounted as files are passed in.
    pub fn resolve_secret_files(&mut self) -> Result<(), Error> {
        if let Some(DnsRecordConfig::Cloudflare {
            api_key,
            zone_name,
            record_name,
            zone_id,
            ..
        }) = self.dns_record.as_mut()
        {
            resolve_file_reference(api_key)?;
            resolve_file_reference(zone_name)?;
            resolve_file_reference(record_name)?;
            if let Some(zone_id) = zone_id {
                resolve_file_reference(zone_id)?;
            }
        }

        match &mut self.address_source {
            AddressSourceConfig::IpApi {
                endpoint: Some(endpoint),
            } => resolve_file_reference(endpoint)?,
            AddressSourceConfig::IpApi { endpoint: None } => {}
            AddressSourceConfig::PlainText { url } => resolve_file_reference(url)?,
        }

        for notifier in &mut self.notifiers {
            let NotifierConfig::DiscordWebhook {
                webhook_url,
                username,
                avatar_url,
            } = notifier;

            resolve_file_reference(webhook_url)?;
            if let Some(username) = username {
                resolve_file_reference(username)?;
            }
            if let Some(avatar_url) = avatar_url {
                resolve_file_reference(avatar_url)?;
            }
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(dns_record) = &self.dns_record {
            dns_record.validate()?;
        }
        self.address_source.validate()?;
        for notifier in &self.notifiers {
            notifier.validate()?;
        }
        if self.run.timeout_secs == 0 {
            return Err(Error::config("run.timeoutSecs must be > 0"));
        }
        Ok(())
    }
}

fn resolve_file_reference(value: &mut String) -> Result<(), Error> {
    let path = Path::new(value.as_str());
    if value.is_empty() || !path.is_file() {
        return Ok(());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!("Failed to read secret file {}: {}", path.display(), e))
    })?;

    tracing::debug!("Resolved config value from file {}", path.display());
    *value = content.trim_end().to_string();
    Ok(())
}

/// Parse an absolute `http`/`https` URL with a host
///
/// The value is left out of the error message since webhook URLs carry tokens.
pub fn parse_http_url(field: &str, value: &str) -> Result<Url, Error> {
    let url = Url::parse(value)
        .map_err(|e| Error::config(format!("{} is not a valid URL: {}", field, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::config(format!(
            "{} must use http or https, got {}",
            field,
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::config(format!("{} has no host", field)));
    }

    Ok(url)
}

/// DNS record configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum DnsRecordConfig {
    /// Cloudflare API v4
    Cloudflare {
        /// API token with DNS edit permission
        api_key: String,
        /// Zone (domain) that holds the record
        zone_name: String,
        /// Fully qualified record name
        record_name: String,
        /// Zone ID; looked up by name when absent
        #[serde(default)]
        zone_id: Option<String>,
        /// Perform lookups but skip writes
        #[serde(default)]
        dry_run: bool,
    },
}

impl DnsRecordConfig {
    /// Validate the DNS record configuration
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            DnsRecordConfig::Cloudflare {
                api_key,
                zone_name,
                record_name,
                ..
            } => {
                if api_key.is_empty() {
                    return Err(Error::config("Cloudflare API key cannot be empty"));
                }
                if zone_name.is_empty() {
                    return Err(Error::config("Cloudflare zone name cannot be empty"));
                }
                if record_name.is_empty() {
                    return Err(Error::config("DNS record name cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &'static str {
        match self {
            DnsRecordConfig::Cloudflare { .. } => "cloudflare",
        }
    }

    /// Name of the record being managed
    pub fn record_name(&self) -> &str {
        match self {
            DnsRecordConfig::Cloudflare { record_name, .. } => record_name,
        }
    }
}

impl fmt::Debug for DnsRecordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DnsRecordConfig::Cloudflare {
                zone_name,
                record_name,
                zone_id,
                dry_run,
                ..
            } => f
                .debug_struct("Cloudflare")
                .field("api_key", &"<REDACTED>")
                .field("zone_name", zone_name)
                .field("record_name", record_name)
                .field("zone_id", zone_id)
                .field("dry_run", dry_run)
                .finish(),
        }
    }
}

/// Address source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum AddressSourceConfig {
    /// ip-api.com JSON endpoint
    IpApi {
        /// Override the default endpoint
        #[serde(default)]
        endpoint: Option<String>,
    },

    /// Any service that answers with the bare address as text
    PlainText {
        /// URL to fetch
        url: String,
    },
}

impl AddressSourceConfig {
    /// Validate the address source configuration
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            AddressSourceConfig::IpApi { endpoint: None } => Ok(()),
            AddressSourceConfig::IpApi {
                endpoint: Some(endpoint),
            } => parse_http_url("addressSource.endpoint", endpoint).map(|_| ()),
            AddressSourceConfig::PlainText { url } => {
                parse_http_url("addressSource.url", url).map(|_| ())
            }
        }
    }

    /// Get the source type name
    pub fn type_name(&self) -> &'static str {
        match self {
            AddressSourceConfig::IpApi { .. } => "ip-api",
            AddressSourceConfig::PlainText { .. } => "plain-text",
        }
    }
}

impl Default for AddressSourceConfig {
    fn default() -> Self {
        AddressSourceConfig::IpApi { endpoint: None }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Directory holding `last_known_ip_address.json`
    #[serde(default = "default_storage_dir")]
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_storage_dir(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STORAGE_DIR)
}

/// Notification sink configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum NotifierConfig {
    /// Discord webhook
    #[serde(alias = "discord")]
    DiscordWebhook {
        /// Webhook URL (contains the webhook token)
        webhook_url: String,
        /// Display name override
        #[serde(default)]
        username: Option<String>,
        /// Avatar override
        #[serde(default)]
        avatar_url: Option<String>,
    },
}

impl NotifierConfig {
    /// Validate the notifier configuration
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            NotifierConfig::DiscordWebhook {
                webhook_url,
                avatar_url,
                ..
            } => {
                if webhook_url.is_empty() {
                    return Err(Error::config("Discord webhook URL cannot be empty"));
                }
                parse_http_url("notifiers[].webhookUrl", webhook_url)?;
                if let Some(avatar_url) = avatar_url {
                    parse_http_url("notifiers[].avatarUrl", avatar_url)?;
                }
                Ok(())
            }
        }
    }

    /// Get the notifier type name
    pub fn type_name(&self) -> &'static str {
        match self {
            NotifierConfig::DiscordWebhook { .. } => "discord-webhook",
        }
    }
}

impl fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifierConfig::DiscordWebhook {
                username,
                avatar_url,
                ..
            } => f
                .debug_struct("DiscordWebhook")
                .field("webhook_url", &"<REDACTED>")
                .field("username", username)
                .field("avatar_url", avatar_url)
                .finish(),
        }
    }
}

/// Run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Deadline for one run, notifications included
    ///
    /// A run that is already cancelled or past this deadline when dispatch
    /// starts gets an extra grace window to deliver its failure report.
    /// Deliveries in flight when the run is cancelled get the same window.
    /// An interrupted process can therefore outlive the deadline by up to
    /// that window.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RunConfig {
    /// Run timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}
