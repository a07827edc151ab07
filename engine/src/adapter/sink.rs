//! Reply sinks
//!
//! Where a turn's outgoing activities go. HTTP turns post them back to the
//! channel's connector (or buffer them for `expectReplies`), WebSocket turns
//! write them onto the connection they arrived on.

use async_trait::async_trait;
use reqwest::{Client, Url};
use sdk::activity::Activity;
use sdk::errors::HostError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::auth::CredentialProvider;

/// Destination for outgoing activities
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, activity: Activity) -> Result<(), HostError>;
}

/// Collects activities in memory
#[derive(Default)]
pub struct BufferedSink {
    activities: Mutex<Vec<Activity>>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything sent so far
    pub fn take(&self) -> Vec<Activity> {
        self.activities
            .lock()
            .map(|mut v| std::mem::take(&mut *v))
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReplySink for BufferedSink {
    async fn send(&self, activity: Activity) -> Result<(), HostError> {
        self.activities
            .lock()
            .map_err(|_| HostError::Delivery("reply buffer poisoned".to_string()))?
            .push(activity);
        Ok(())
    }
}

/// Posts activities to the channel connector at the activity's service url
pub struct ConnectorSink {
    client: Client,
    credentials: Arc<CredentialProvider>,
}

impl ConnectorSink {
    pub fn new(credentials: Arc<CredentialProvider>, timeout: Duration) -> Result<Self, HostError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HostError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            credentials,
        })
    }

    /// `{serviceUrl}/v3/conversations/{conversationId}/activities[/{replyToId}]`
    fn activity_url(activity: &Activity) -> Result<Url, HostError> {
        let service_url = activity
            .service_url
            .as_deref()
            .ok_or_else(|| HostError::Delivery("activity has no serviceUrl".to_string()))?;
        let conversation_id = activity
            .conversation_id()
            .ok_or_else(|| HostError::Delivery("activity has no conversation".to_string()))?;

        let mut url = Url::parse(service_url)
            .map_err(|e| HostError::Delivery(format!("invalid serviceUrl '{}': {}", service_url, e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| HostError::Delivery(format!("serviceUrl '{}' cannot be a base", service_url)))?;
            segments
                .pop_if_empty()
                .extend(["v3", "conversations", conversation_id, "activities"]);
            if let Some(reply_to_id) = activity.reply_to_id.as_deref() {
                segments.push(reply_to_id);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ReplySink for ConnectorSink {
    async fn send(&self, activity: Activity) -> Result<(), HostError> {
        let url = Self::activity_url(&activity)?;
        let audience = activity
            .recipient
            .as_ref()
            .map(|r| r.id.as_str())
            .unwrap_or_default();

        let mut request = self.client.post(url.clone()).json(&activity);
        if let Some(token) = self.credentials.token_for(audience)? {
            request = request.bearer_auth(token);
        }

        debug!("Delivering {} activity to {}", activity.activity_type, url);

        let response = request
            .send()
            .await
            .map_err(|e| HostError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(HostError::Delivery(format!(
                "connector returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Writes activities onto a WebSocket connection's outbound queue
#[derive(Clone)]
pub struct WebSocketSink {
    tx: mpsc::Sender<Activity>,
}

impl WebSocketSink {
    pub fn new(tx: mpsc::Sender<Activity>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ReplySink for WebSocketSink {
    async fn send(&self, activity: Activity) -> Result<(), HostError> {
        self.tx
            .send(activity)
            .await
            .map_err(|_| HostError::Delivery("WebSocket connection closed".to_string()))
    }
}
