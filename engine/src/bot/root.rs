//! Root bot dialog
//!
//! Hands the conversation to the target skill when the user says "skill",
//! greets new members, and reports back when a skill ends its session.

use async_trait::async_trait;
use sdk::activity::ActivityType;
use sdk::errors::HostError;
use tracing::debug;

use crate::adapter::TurnContext;
use crate::router::{RootDialog, SkillSessionRouter};

pub const CONNECTING_MESSAGE: &str = "Got it, connecting you to the skill...";
pub const DEFAULT_REPLY: &str = "Me no nothin'. Say \"skill\" and I'll patch you through";
pub const WELCOME_MESSAGE: &str = "Hello and welcome!";
pub const BACK_IN_ROOT_MESSAGE: &str = "Back in the root bot. Say \"skill\" and I'll patch you through";

/// Word that triggers the hand-off to the target skill
const SKILL_TRIGGER: &str = "skill";

pub struct RootBot {
    target_skill_id: String,
}

impl RootBot {
    pub fn new(target_skill_id: impl Into<String>) -> Self {
        Self {
            target_skill_id: target_skill_id.into(),
        }
    }

    async fn on_message(
        &self,
        turn: &mut TurnContext,
        sessions: &SkillSessionRouter,
    ) -> Result<(), HostError> {
        let wants_skill = turn
            .activity()
            .text
            .as_deref()
            .is_some_and(|text| text.contains(SKILL_TRIGGER));

        if wants_skill {
            turn.send_text(CONNECTING_MESSAGE).await?;
            sessions
                .begin_skill_session(turn, &self.target_skill_id)
                .await?;
        } else {
            turn.send_text(DEFAULT_REPLY).await?;
        }
        Ok(())
    }

    async fn on_end_of_conversation(
        &self,
        turn: &mut TurnContext,
        sessions: &SkillSessionRouter,
    ) -> Result<(), HostError> {
        sessions.end_skill_session(turn).await?;

        let report = end_of_conversation_report(turn);
        turn.send_text(report).await?;
        turn.send_text(BACK_IN_ROOT_MESSAGE).await?;
        Ok(())
    }

    async fn on_members_added(&self, turn: &mut TurnContext) -> Result<(), HostError> {
        let bot_id = turn
            .activity()
            .recipient
            .as_ref()
            .map(|r| r.id.clone())
            .unwrap_or_default();
        let newcomers = turn
            .activity()
            .members_added
            .iter()
            .filter(|member| member.id != bot_id)
            .count();

        for _ in 0..newcomers {
            turn.send_text(WELCOME_MESSAGE).await?;
        }
        Ok(())
    }
}

/// "Received endOfConversation" summary with whatever the skill sent back
fn end_of_conversation_report(turn: &TurnContext) -> String {
    let activity = turn.activity();
    let mut report = format!(
        "Received {}.\n\nCode: {}",
        ActivityType::EndOfConversation.as_str(),
        activity.code.as_deref().unwrap_or_default()
    );

    if let Some(text) = activity.text.as_deref().filter(|t| !t.is_empty()) {
        report.push_str(&format!("\n\nText: {}", text));
    }
    if let Some(value) = activity.value.as_ref().filter(|v| !v.is_null()) {
        report.push_str(&format!("\n\nValue: {}", value));
    }
    report
}

#[async_trait]
impl RootDialog for RootBot {
    async fn on_turn(
        &self,
        turn: &mut TurnContext,
        sessions: &SkillSessionRouter,
    ) -> Result<(), HostError> {
        let activity_type = turn.activity().activity_type.clone();
        match activity_type {
            ActivityType::Message => self.on_message(turn, sessions).await,
            ActivityType::EndOfConversation => self.on_end_of_conversation(turn, sessions).await,
            ActivityType::ConversationUpdate => self.on_members_added(turn).await,
            other => {
                debug!("Root bot ignoring {} activity", other);
                Ok(())
            }
        }
    }
}
