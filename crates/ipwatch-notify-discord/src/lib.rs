// # Discord Webhook Sink
//
// Posts the rendered event as a single message to a Discord webhook.
//
// ## Wire Format
//
// ```http
// POST <webhook url>
// Content-Type: application/json
//
// { "content": "IP address changed from ...", "username": "ipwatch", "avatar_url": "..." }
// ```
//
// Discord answers an accepted message with `204 No Content`. Any other status,
// including other 2xx codes, is treated as a failed delivery.
//
// ## Security
//
// The webhook URL embeds the webhook token, so it is redacted in `Debug`
// output and never logged.

use async_trait::async_trait;
use ipwatch_core::config::{NotifierConfig, parse_http_url};
use ipwatch_core::event::Event;
use ipwatch_core::registry::CollaboratorRegistry;
use ipwatch_core::traits::{NotificationSink, NotificationSinkFactory};
use ipwatch_core::{Error, Result};
use reqwest::Url;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Display name used when none is configured
pub const DEFAULT_USERNAME: &str = "ipwatch";

/// Discord rejects messages longer than this
const MAX_CONTENT_CHARS: usize = 2000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const SINK_NAME: &str = "discord-webhook";

/// Execute-webhook payload
#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    content: String,
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
}

/// Notification sink posting to a Discord webhook
pub struct DiscordWebhookSink {
    /// ⚠️ Contains the webhook token
    webhook_url: Url,
    username: String,
    avatar_url: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for DiscordWebhookSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordWebhookSink")
            .field("webhook_url", &"<REDACTED>")
            .field("username", &self.username)
            .field("avatar_url", &self.avatar_url)
            .finish()
    }
}

impl DiscordWebhookSink {
    /// Create a sink for `webhook_url` with the default username
    ///
    /// Fails unless `webhook_url` is an absolute http(s) URL.
    pub fn new(webhook_url: &str) -> Result<Self> {
        if webhook_url.is_empty() {
            return Err(Error::config("Discord webhook URL cannot be empty"));
        }
        let webhook_url = parse_http_url("Discord webhook URL", webhook_url)?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            webhook_url,
            username: DEFAULT_USERNAME.to_string(),
            avatar_url: None,
            client,
        })
    }

    /// Override the display name; empty keeps the default
    pub fn with_username(mut self, username: Option<String>) -> Self {
        if let Some(username) = username.filter(|u| !u.is_empty()) {
            self.username = username;
        }
        self
    }

    /// Override the avatar
    pub fn with_avatar_url(mut self, avatar_url: Option<String>) -> Self {
        self.avatar_url = avatar_url.filter(|u| !u.is_empty());
        self
    }

    fn message<'a>(&'a self, event: &Event) -> WebhookMessage<'a> {
        let mut content = event.as_message();
        if content.chars().count() > MAX_CONTENT_CHARS {
            content = content.chars().take(MAX_CONTENT_CHARS - 1).collect();
            content.push('…');
        }

        WebhookMessage {
            content,
            username: &self.username,
            avatar_url: self.avatar_url.as_deref(),
        }
    }
}

#[async_trait]
impl NotificationSink for DiscordWebhookSink {
    async fn send_event(&self, event: &Event) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&self.message(event))
            .send()
            .await
            .map_err(|e| {
                // reqwest errors include the URL; strip it to keep the token out of logs
                Error::notification(SINK_NAME, format!("request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::NO_CONTENT {
            return Err(Error::notification(
                SINK_NAME,
                format!("failed to send message, status code: {}", status.as_u16()),
            ));
        }

        tracing::debug!(failure = event.is_failure(), "Discord message sent");
        Ok(())
    }

    fn sink_name(&self) -> &str {
        SINK_NAME
    }
}

/// Factory for creating Discord webhook sinks
pub struct DiscordWebhookFactory;

impl NotificationSinkFactory for DiscordWebhookFactory {
    fn create(&self, config: &NotifierConfig) -> Result<Arc<dyn NotificationSink>> {
        match config {
            NotifierConfig::DiscordWebhook {
                webhook_url,
                username,
                avatar_url,
            } => {
                let sink = DiscordWebhookSink::new(webhook_url)?
                    .with_username(username.clone())
                    .with_avatar_url(avatar_url.clone());
                Ok(Arc::new(sink))
            }
        }
    }
}

/// Register the Discord sink with a registry
pub fn register(registry: &mut CollaboratorRegistry) {
    registry.register_notifier(SINK_NAME, Box::new(DiscordWebhookFactory));
}
