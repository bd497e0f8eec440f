//! services/api/src/adapters/events.rs
//!
//! Event publishers implementing the `EventPublisher` port. Publishing is best-effort:
//! failures are logged and reported as `false`, never raised.

use async_trait::async_trait;
use bookflow_core::domain::DomainEvent;
use bookflow_core::ports::EventPublisher;
use std::time::Duration;
use tracing::{info, warn};

/// POSTs each event as JSON to a webhook.
#[derive(Clone)]
pub struct WebhookEventPublisher {
    client: reqwest::Client,
    url: String,
}

impl WebhookEventPublisher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl EventPublisher for WebhookEventPublisher {
    async fn publish(&self, event: &DomainEvent) -> bool {
        let result = self
            .client
            .post(&self.url)
            .header("x-event-type", event.event_type())
            .json(&event.to_message())
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(
                    "Webhook rejected event {} with status {}",
                    event.event_type(),
                    response.status()
                );
                false
            }
            Err(e) => {
                warn!("Failed to publish event {}: {}", event.event_type(), e);
                false
            }
        }
    }
}

/// Writes each event to the log. Used when no webhook is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogEventPublisher;

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish(&self, event: &DomainEvent) -> bool {
        info!(
            target: "bookflow::events",
            event_type = event.event_type(),
            "{}",
            event.to_message()
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn log_publisher_always_succeeds() {
        let event = DomainEvent::BookFinished {
            user_id: Uuid::new_v4(),
            book_id: Uuid::new_v4(),
        };
        assert!(LogEventPublisher.publish(&event).await);
    }

    #[tokio::test]
    async fn unreachable_webhook_reports_failure() {
        // Port 9 (discard) on localhost is closed in test environments.
        let publisher =
            WebhookEventPublisher::new("http://127.0.0.1:9/events", Duration::from_millis(500)).unwrap();
        let event = DomainEvent::ReadingProgressUpdated {
            user_id: Uuid::new_v4(),
            book_id: Uuid::new_v4(),
            pages_read: 3,
        };
        assert!(!publisher.publish(&event).await);
    }
}
