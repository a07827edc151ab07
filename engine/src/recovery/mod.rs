//! Turn Error Recovery
//!
//! Every unhandled turn error ends up here. Recovery is uniform regardless of
//! the error kind and never retries the failed turn:
//!
//! 1. log the error
//! 2. on the emulator channel, emit a diagnostic trace
//! 3. tell the user something went wrong
//! 4. if a skill is active, persist and tell the skill the session is over,
//!    bounded by the forward timeout
//! 5. delete the conversation record
//!
//! Steps 2 to 4 are best-effort; step 5 always runs.

use sdk::activity::{
    end_of_conversation_codes, input_hints, Activity, EMULATOR_CHANNEL_ID, ERROR_TRACE_VALUE_TYPE,
};
use sdk::errors::HostError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::adapter::TurnContext;
use crate::skills::{SkillClient, SkillConversationIdFactory, SkillRegistry};
use crate::state::{ConversationRecord, ConversationStateStore};

pub const ERROR_MESSAGE: &str = "The bot encountered an error or bug.";
pub const FIX_SOURCE_MESSAGE: &str = "To continue to run this bot, please fix the bot source code.";

/// What recovery managed to do
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveryOutcome {
    /// Skill whose session was ended, if one was active
    pub ended_skill: Option<String>,
    /// Whether the skill acknowledged the end-of-conversation
    pub end_of_conversation_delivered: bool,
    /// Whether the conversation record was deleted
    pub state_cleared: bool,
}

pub struct TurnErrorHandler {
    registry: Arc<SkillRegistry>,
    client: Arc<dyn SkillClient>,
    store: Arc<dyn ConversationStateStore>,
    conversation_ids: Arc<SkillConversationIdFactory>,
    end_timeout: Duration,
}

impl TurnErrorHandler {
    pub fn new(
        registry: Arc<SkillRegistry>,
        client: Arc<dyn SkillClient>,
        store: Arc<dyn ConversationStateStore>,
        conversation_ids: Arc<SkillConversationIdFactory>,
        end_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            client,
            store,
            conversation_ids,
            end_timeout,
        }
    }

    /// Recover from `err` raised while processing `turn`
    pub async fn on_turn_error(&self, turn: &mut TurnContext, err: &HostError) -> RecoveryOutcome {
        error!(
            "Unhandled error in conversation {}: {}",
            turn.conversation_id(),
            err
        );

        let mut outcome = RecoveryOutcome::default();

        self.notify_user(turn, err).await;

        if let Some(skill_id) = turn.record.active_skill_id.clone() {
            outcome.end_of_conversation_delivered = match self.end_skill_conversation(turn, &skill_id).await {
                Ok(()) => true,
                Err(cleanup_err) => {
                    warn!("{}", cleanup_err);
                    false
                }
            };
            outcome.ended_skill = Some(skill_id);
        }

        outcome.state_cleared = self.clear_conversation_state(turn).await;
        outcome
    }

    async fn notify_user(&self, turn: &mut TurnContext, err: &HostError) {
        if turn.activity().channel_id.as_deref() == Some(EMULATOR_CHANNEL_ID) {
            let trace = Activity::trace(
                "OnTurnError Trace",
                serde_json::Value::String(err.to_string()),
                ERROR_TRACE_VALUE_TYPE,
                "TurnError",
            );
            if let Err(e) = turn.send_activity(trace).await {
                warn!("Failed to send error trace: {}", e);
            }
        }

        for text in [ERROR_MESSAGE, FIX_SOURCE_MESSAGE] {
            let message = Activity::message(text).with_input_hint(input_hints::EXPECTING_INPUT);
            if let Err(e) = turn.send_activity(message).await {
                warn!("Failed to send error message to user: {}", e);
            }
        }
    }

    /// Persist, then tell the active skill its session is over
    async fn end_skill_conversation(&self, turn: &TurnContext, skill_id: &str) -> Result<(), HostError> {
        let cleanup = |reason: String| {
            HostError::Cleanup(format!(
                "Failed to end skill {} for conversation {}: {}",
                skill_id,
                turn.conversation_id(),
                reason
            ))
        };

        self.store
            .save_changes(turn.conversation_id(), &turn.record)
            .await
            .map_err(|e| cleanup(e.to_string()))?;

        let skill = self.registry.get(skill_id).map_err(|e| cleanup(e.to_string()))?;

        let mut end_of_conversation = Activity::end_of_conversation(end_of_conversation_codes::ROOT_SKILL_ERROR);
        end_of_conversation.apply_conversation_reference(turn.conversation_reference(), true);

        // The conversation lock is held here, so a stalled skill must not
        // hold up later turns.
        let response = tokio::time::timeout(
            self.end_timeout,
            self.client.post_activity(skill, &end_of_conversation),
        )
        .await
        .map_err(|_| cleanup(format!("timed out after {:?}", self.end_timeout)))?
        .map_err(|e| cleanup(e.to_string()))?;

        if !response.is_success() {
            return Err(cleanup(format!("skill returned {}", response.status)));
        }

        info!(
            "Sent {} to skill {} for conversation {}",
            end_of_conversation_codes::ROOT_SKILL_ERROR,
            skill_id,
            turn.conversation_id()
        );
        Ok(())
    }

    async fn clear_conversation_state(&self, turn: &mut TurnContext) -> bool {
        self.conversation_ids
            .delete_for_conversation(turn.conversation_id());
        turn.record = ConversationRecord::default();

        match self.store.delete(turn.conversation_id()).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Failed to delete state for conversation {}: {}",
                    turn.conversation_id(),
                    e
                );
                false
            }
        }
    }
}
