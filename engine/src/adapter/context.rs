//! Turn context
//!
//! One per inbound activity. Holds the activity, the conversation's record
//! as loaded at the start of the turn, and the sink replies go to.

use sdk::activity::{Activity, ConversationReference};
use sdk::errors::HostError;
use std::sync::Arc;

use super::sink::ReplySink;
use crate::state::ConversationRecord;

pub struct TurnContext {
    activity: Activity,
    conversation_id: String,
    reference: ConversationReference,
    sink: Arc<dyn ReplySink>,
    sent: usize,
    skill_status: Option<u16>,

    /// Conversation state; persisted only through the state store
    pub record: ConversationRecord,
}

impl TurnContext {
    /// Build a context for `activity`
    ///
    /// # Errors
    ///
    /// `HostError::InvalidActivity` if the activity has no conversation id.
    pub fn new(
        activity: Activity,
        record: ConversationRecord,
        sink: Arc<dyn ReplySink>,
    ) -> Result<Self, HostError> {
        let conversation_id = activity
            .conversation_id()
            .ok_or_else(|| HostError::InvalidActivity("missing conversation id".to_string()))?
            .to_string();
        let reference = activity.conversation_reference();

        Ok(Self {
            activity,
            conversation_id,
            reference,
            sink,
            sent: 0,
            skill_status: None,
            record,
        })
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn conversation_reference(&self) -> &ConversationReference {
        &self.reference
    }

    /// Number of activities sent during this turn
    pub fn sent_count(&self) -> usize {
        self.sent
    }

    /// Status of the last skill forward made during this turn
    pub fn last_skill_status(&self) -> Option<u16> {
        self.skill_status
    }

    pub(crate) fn set_last_skill_status(&mut self, status: u16) {
        self.skill_status = Some(status);
    }

    /// Send an activity to the user as a reply to the inbound activity
    pub async fn send_activity(&mut self, mut activity: Activity) -> Result<(), HostError> {
        activity.apply_conversation_reference(&self.reference, false);
        if activity.id.is_none() {
            activity.id = Some(uuid::Uuid::new_v4().to_string());
        }
        if activity.timestamp.is_none() {
            activity.timestamp = Some(chrono::Utc::now());
        }

        self.sink.send(activity).await?;
        self.sent += 1;
        Ok(())
    }

    /// Send a plain text message
    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<(), HostError> {
        self.send_activity(Activity::message(text)).await
    }
}
