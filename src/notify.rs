//! Best-effort notification dispatch for status transitions.

use crate::config::NotificationConfig;
use crate::domain::StatusTransition;
use crate::error::{Context, Result};
use crate::metrics::metrics;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Delivery collaborator. Deduplication, retries and ordering are its concern.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, transitions: &[StatusTransition]) -> Result<()>;
}

/// Submits transitions for asynchronous delivery and never reports the outcome back.
#[derive(Clone)]
pub struct NotificationTrigger {
    sink: Arc<dyn NotificationSink>,
}

impl NotificationTrigger {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// Spawns delivery for a non-empty batch. Errors are logged and dropped.
    pub fn fire(&self, transitions: Vec<StatusTransition>) -> Option<JoinHandle<()>> {
        if transitions.is_empty() {
            return None;
        }

        let sink = Arc::clone(&self.sink);
        Some(tokio::spawn(async move {
            match sink.deliver(&transitions).await {
                Ok(()) => {
                    metrics().inc_notifications_delivered();
                    tracing::debug!(count = transitions.len(), "status transitions delivered");
                }
                Err(err) => {
                    metrics().inc_notification_failures();
                    for transition in &transitions {
                        crate::beacon_event!(
                            warn,
                            "notification_failed",
                            domain = transition.domain,
                            service = transition.service_id,
                            error = err
                        );
                    }
                }
            }
        }))
    }
}

/// Posts every batch as JSON to each configured webhook.
pub struct WebhookSink {
    client: Client,
    urls: Vec<url::Url>,
}

impl WebhookSink {
    pub fn new(config: &NotificationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build webhook http client")?;

        let urls = config
            .webhook_urls
            .iter()
            .map(|raw| {
                url::Url::parse(raw).with_context(|| format!("invalid webhook url `{raw}`"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { client, urls })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, transitions: &[StatusTransition]) -> Result<()> {
        let payload = json!({
            "event": "status.transition",
            "transitions": transitions,
            "sentAt": Utc::now().to_rfc3339(),
        });

        let mut first_error = None;
        for url in &self.urls {
            let outcome = self
                .client
                .post(url.clone())
                .json(&payload)
                .send()
                .await
                .and_then(|response| response.error_for_status());

            if let Err(err) = outcome {
                tracing::warn!(webhook = %url, error = %err, "webhook delivery failed");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(crate::error::Error::with_context(
                "webhook delivery failed",
                err.into(),
            )),
            None => Ok(()),
        }
    }
}

/// Fallback when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, transitions: &[StatusTransition]) -> Result<()> {
        for transition in transitions {
            crate::beacon_event!(
                info,
                "status_transition",
                domain = transition.domain,
                service = transition.service_id,
                name = transition.service_name,
                previous = transition.previous_status,
                current = transition.new_status
            );
        }
        Ok(())
    }
}

/// Picks the webhook sink when URLs are configured, the log sink otherwise.
pub fn sink_from_config(config: &NotificationConfig) -> Result<Arc<dyn NotificationSink>> {
    if config.webhook_urls.is_empty() {
        Ok(Arc::new(LogSink))
    } else {
        Ok(Arc::new(WebhookSink::new(config)?))
    }
}
