//! Outbound client for the internal notification service.
//!
//! A notification is delivered as
//! `POST {base}/internal?template=<name>` with an [`InternalNotification`]
//! JSON body. Delivery is best-effort: callers run it on the task queue and
//! only log the outcome.

use async_trait::async_trait;
use movies_api::InternalNotification;
use reqwest::Client;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notificator returned status {0}")]
    Status(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, template: &str, notification: &InternalNotification) -> Result<(), NotifyError>;
}

/// [`Notifier`] that posts to a remote notificator over HTTP.
#[derive(Clone)]
pub struct HttpNotifier {
    client: Client,
    base_url: String,
}

impl HttpNotifier {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, template: &str, notification: &InternalNotification) -> Result<(), NotifyError> {
        let url = format!("{}/internal", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("template", template)])
            .json(notification)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        debug!(template, resource_id = notification.resource_id, "notification delivered");
        Ok(())
    }
}

/// Used when no notificator is configured; drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, template: &str, notification: &InternalNotification) -> Result<(), NotifyError> {
        debug!(template, resource_id = notification.resource_id, "notifications disabled; dropped");
        Ok(())
    }
}
