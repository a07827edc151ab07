//! Skill HTTP client
//!
//! Posts activities to a skill's messaging endpoint. Before sending, the
//! activity is re-addressed for the skill: its conversation id becomes the
//! skill conversation id and its service url becomes this host's skill
//! channel service, so the skill's replies come back to us.

use async_trait::async_trait;
use reqwest::Client;
use sdk::activity::Activity;
use sdk::errors::HostError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::conversation_id::SkillConversationIdFactory;
use super::registry::SkillDescriptor;
use crate::auth::CredentialProvider;

/// Status and body returned by a skill for a posted activity
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeResponse {
    pub status: u16,
    pub body: Option<serde_json::Value>,
}

impl InvokeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound delivery of activities to skills
#[async_trait]
pub trait SkillClient: Send + Sync {
    /// Post `activity` to `skill`
    ///
    /// # Errors
    ///
    /// - `HostError::ForwardTimeout` if the skill does not answer in time
    /// - `HostError::Forwarding` on connection failure or non-success status
    async fn post_activity(
        &self,
        skill: &SkillDescriptor,
        activity: &Activity,
    ) -> Result<InvokeResponse, HostError>;
}

/// Skill client over `reqwest`
pub struct SkillHttpClient {
    client: Client,
    credentials: Arc<CredentialProvider>,
    conversation_ids: Arc<SkillConversationIdFactory>,
    skill_host_endpoint: String,
    timeout: Duration,
}

impl SkillHttpClient {
    /// Create a new skill client
    ///
    /// # Arguments
    /// * `credentials` - Token source for outbound calls
    /// * `conversation_ids` - Shared skill conversation id mapping
    /// * `skill_host_endpoint` - URL skills use to call back into this host
    /// * `timeout` - Upper bound on a single post
    pub fn new(
        credentials: Arc<CredentialProvider>,
        conversation_ids: Arc<SkillConversationIdFactory>,
        skill_host_endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, HostError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HostError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            credentials,
            conversation_ids,
            skill_host_endpoint: skill_host_endpoint.into(),
            timeout,
        })
    }

    /// Re-address `activity` for delivery to `skill`
    fn prepare(&self, skill: &SkillDescriptor, activity: &Activity) -> Activity {
        let reference = activity.conversation_reference();
        let skill_conversation_id = self
            .conversation_ids
            .create_skill_conversation_id(&reference, &skill.id);

        let mut outbound = activity.clone();
        let mut conversation = outbound.conversation.take().unwrap_or_default();
        conversation.id = skill_conversation_id;
        outbound.conversation = Some(conversation);
        outbound.service_url = Some(self.skill_host_endpoint.clone());

        let mut recipient = outbound.recipient.take().unwrap_or_default();
        recipient.id = skill.app_id.clone();
        recipient.role = Some("skill".to_string());
        outbound.recipient = Some(recipient);

        outbound
    }
}

#[async_trait]
impl SkillClient for SkillHttpClient {
    async fn post_activity(
        &self,
        skill: &SkillDescriptor,
        activity: &Activity,
    ) -> Result<InvokeResponse, HostError> {
        let outbound = self.prepare(skill, activity);
        let token = self.credentials.token_for(&skill.app_id)?;

        debug!(
            "Posting {} activity to skill {} at {}",
            outbound.activity_type, skill.id, skill.endpoint
        );

        let mut request = self.client.post(&skill.endpoint).json(&outbound);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let start = std::time::Instant::now();
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                HostError::ForwardTimeout(skill.id.clone())
            } else if e.is_connect() {
                HostError::forwarding(
                    &skill.id,
                    format!("cannot connect to {}", skill.endpoint),
                )
            } else {
                HostError::forwarding(&skill.id, e.to_string())
            }
        })?;

        let status = response.status();
        info!(
            "Skill {} answered {} in {:.2}s (limit {}s)",
            skill.id,
            status.as_u16(),
            start.elapsed().as_secs_f64(),
            self.timeout.as_secs()
        );

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(HostError::forwarding(
                &skill.id,
                format!("skill returned {}: {}", status, error_text),
            ));
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                HostError::ForwardTimeout(skill.id.clone())
            } else {
                HostError::forwarding(&skill.id, e.to_string())
            }
        })?;
        let body = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice(&bytes).ok()
        };

        Ok(InvokeResponse {
            status: status.as_u16(),
            body,
        })
    }
}
