//! Skill Session Router
//!
//! Decides, per turn, whether the activity goes to the active skill or to the
//! root dialog, and owns the skill session lifecycle:
//!
//! - **begin**: set `active_skill_id`, persist, forward the first activity
//! - **continue**: persist, forward straight to the active skill
//! - **end**: on `endOfConversation`, clear `active_skill_id`, forget the
//!   skill conversation ids issued for it, and persist
//!
//! The caller (the adapter) holds the conversation lock for the whole turn,
//! so "forward, then persist" cannot interleave with another turn of the same
//! conversation. A crash after forwarding but before the turn completes may
//! cause the channel to retry and the skill to see the activity twice.

use async_trait::async_trait;
use sdk::activity::ActivityType;
use sdk::errors::HostError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::adapter::TurnContext;
use crate::skills::{InvokeResponse, SkillClient, SkillConversationIdFactory, SkillRegistry};
use crate::state::ConversationStateStore;

/// Root dialog logic, consulted when no skill is active
#[async_trait]
pub trait RootDialog: Send + Sync {
    /// Handle a turn addressed to the root bot
    ///
    /// `sessions` lets the dialog begin or end a skill session.
    async fn on_turn(
        &self,
        turn: &mut TurnContext,
        sessions: &SkillSessionRouter,
    ) -> Result<(), HostError>;
}

/// Where a turn ended up
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Handled by the root dialog without involving a skill
    Root,
    /// Forwarded to the skill that was already active
    Forwarded { skill_id: String, status: u16 },
    /// Root dialog started a new skill session and forwarded to it
    SkillStarted { skill_id: String, status: u16 },
    /// Skill session ended and control returned to the root dialog
    SkillEnded { skill_id: Option<String> },
}

pub struct SkillSessionRouter {
    registry: Arc<SkillRegistry>,
    client: Arc<dyn SkillClient>,
    store: Arc<dyn ConversationStateStore>,
    conversation_ids: Arc<SkillConversationIdFactory>,
    root: Arc<dyn RootDialog>,
    forward_timeout: Duration,
}

impl SkillSessionRouter {
    pub fn new(
        registry: Arc<SkillRegistry>,
        client: Arc<dyn SkillClient>,
        store: Arc<dyn ConversationStateStore>,
        conversation_ids: Arc<SkillConversationIdFactory>,
        root: Arc<dyn RootDialog>,
        forward_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            client,
            store,
            conversation_ids,
            root,
            forward_timeout,
        }
    }

    /// Route one turn
    ///
    /// # Errors
    ///
    /// Any error is unhandled from the router's point of view and goes to the
    /// turn error handler.
    pub async fn route(&self, turn: &mut TurnContext) -> Result<RouteOutcome, HostError> {
        let is_end_of_conversation = turn
            .activity()
            .is_type(&ActivityType::EndOfConversation);

        if !is_end_of_conversation {
            if let Some(skill_id) = turn.record.active_skill_id.clone() {
                let response = self.forward_to_skill(turn, &skill_id).await?;
                return Ok(RouteOutcome::Forwarded {
                    skill_id,
                    status: response.status,
                });
            }
        }

        let active_before = turn.record.active_skill_id.clone();
        self.root.on_turn(turn, self).await?;
        self.save(turn).await?;

        let active_after = turn.record.active_skill_id.clone();
        let outcome = match (active_before, active_after) {
            (previous, None) if is_end_of_conversation => RouteOutcome::SkillEnded {
                skill_id: previous,
            },
            (None, Some(skill_id)) => RouteOutcome::SkillStarted {
                skill_id,
                status: turn.last_skill_status().unwrap_or_default(),
            },
            _ => RouteOutcome::Root,
        };

        Ok(outcome)
    }

    /// Start a skill session and forward the current activity to it
    ///
    /// The record is persisted before the forward so that activities the
    /// skill sends back during the call see the session as active.
    pub async fn begin_skill_session(
        &self,
        turn: &mut TurnContext,
        skill_id: &str,
    ) -> Result<InvokeResponse, HostError> {
        // Fail before touching state if the skill is unknown
        self.registry.get(skill_id)?;

        if let Some(previous) = &turn.record.active_skill_id {
            warn!(
                "Replacing active skill {} with {} in conversation {}",
                previous,
                skill_id,
                turn.conversation_id()
            );
        }

        turn.record.active_skill_id = Some(skill_id.to_string());
        info!(
            "Conversation {} connected to skill {}",
            turn.conversation_id(),
            skill_id
        );

        let response = self.forward_to_skill(turn, skill_id).await?;
        turn.set_last_skill_status(response.status);
        Ok(response)
    }

    /// End the active skill session, if any, and persist
    ///
    /// Skill conversation ids issued for this conversation are dropped, so a
    /// late callback from the ended skill is rejected as unknown.
    pub async fn end_skill_session(&self, turn: &mut TurnContext) -> Result<Option<String>, HostError> {
        let ended = turn.record.active_skill_id.take();
        self.conversation_ids
            .delete_for_conversation(turn.conversation_id());
        self.save(turn).await?;

        if let Some(skill_id) = &ended {
            info!(
                "Conversation {} returned from skill {}",
                turn.conversation_id(),
                skill_id
            );
        }
        Ok(ended)
    }

    /// Persist the record, then forward the turn's activity to `skill_id`
    async fn forward_to_skill(
        &self,
        turn: &mut TurnContext,
        skill_id: &str,
    ) -> Result<InvokeResponse, HostError> {
        let skill = self.registry.get(skill_id)?;

        self.save(turn).await?;

        debug!(
            "Forwarding {} activity in conversation {} to skill {}",
            turn.activity().activity_type,
            turn.conversation_id(),
            skill_id
        );

        let response = tokio::time::timeout(
            self.forward_timeout,
            self.client.post_activity(skill, turn.activity()),
        )
        .await
        .map_err(|_| HostError::ForwardTimeout(skill_id.to_string()))??;

        if !response.is_success() {
            return Err(HostError::forwarding(
                skill_id,
                format!("skill returned {}", response.status),
            ));
        }

        Ok(response)
    }

    async fn save(&self, turn: &TurnContext) -> Result<(), HostError> {
        self.store
            .save_changes(turn.conversation_id(), &turn.record)
            .await
    }
}
