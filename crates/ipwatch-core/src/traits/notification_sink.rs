// # Notification Sink Trait
//
// Defines the interface for delivering run outcomes to an external channel.
//
// ## Implementations
//
// - Discord webhook: `ipwatch-notify-discord` crate

use async_trait::async_trait;
use std::sync::Arc;

use crate::event::Event;

/// Trait for notification sink implementations
///
/// Sinks render the event with [`Event::as_message`] (or their own format)
/// and send exactly one message per call. A transport status other than the
/// one the channel uses for "accepted" is an error.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one event
    async fn send_event(&self, event: &Event) -> Result<(), crate::Error>;

    /// Sink name (for logging and dispatch reports)
    fn sink_name(&self) -> &str;
}

/// Helper trait for constructing sinks from configuration
pub trait NotificationSinkFactory: Send + Sync {
    /// Create a NotificationSink instance from configuration
    fn create(
        &self,
        config: &crate::config::NotifierConfig,
    ) -> Result<Arc<dyn NotificationSink>, crate::Error>;
}
