//! Activity schema
//!
//! The subset of the Bot Framework activity schema that the host reads and
//! writes. Fields the host does not understand are kept in `extra` so that
//! activities forwarded to skills arrive intact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Well-known end-of-conversation codes
pub mod end_of_conversation_codes {
    pub const ROOT_SKILL_ERROR: &str = "RootSkillError";
    pub const COMPLETED_SUCCESSFULLY: &str = "completedSuccessfully";
    pub const USER_CANCELLED: &str = "userCancelled";
    pub const SKILL_ERROR: &str = "skillError";
}

/// Input hints attached to outgoing messages
pub mod input_hints {
    pub const ACCEPTING_INPUT: &str = "acceptingInput";
    pub const EXPECTING_INPUT: &str = "expectingInput";
    pub const IGNORING_INPUT: &str = "ignoringInput";
}

/// Delivery mode asking for replies in the HTTP response body
pub const DELIVERY_MODE_EXPECT_REPLIES: &str = "expectReplies";

/// Channel id used by the local emulator
pub const EMULATOR_CHANNEL_ID: &str = "emulator";

/// Value type carried by diagnostic error traces
pub const ERROR_TRACE_VALUE_TYPE: &str = "https://www.botframework.com/schemas/error";

/// Activity type
///
/// Unrecognised types round-trip through `Other` unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityType {
    Message,
    ConversationUpdate,
    EndOfConversation,
    Event,
    Invoke,
    Trace,
    Typing,
    Other(String),
}

impl ActivityType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Message => "message",
            Self::ConversationUpdate => "conversationUpdate",
            Self::EndOfConversation => "endOfConversation",
            Self::Event => "event",
            Self::Invoke => "invoke",
            Self::Trace => "trace",
            Self::Typing => "typing",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ActivityType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "message" => Self::Message,
            "conversationUpdate" => Self::ConversationUpdate,
            "endOfConversation" => Self::EndOfConversation,
            "event" => Self::Event,
            "invoke" => Self::Invoke,
            "trace" => Self::Trace,
            "typing" => Self::Typing,
            _ => Self::Other(s),
        }
    }
}

impl From<ActivityType> for String {
    fn from(t: ActivityType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user or bot taking part in a conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// The conversation an activity belongs to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_group: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_type: Option<String>,
}

impl ConversationAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Everything needed to address a message into an existing conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ChannelAccount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<ChannelAccount>,

    pub conversation: ConversationAccount,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
}

/// A single structured message between user, root bot and skills
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_hint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<ChannelAccount>,

    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Activity {
    /// Create an empty activity of the given type
    pub fn new(activity_type: ActivityType) -> Self {
        Self {
            activity_type,
            id: None,
            timestamp: None,
            channel_id: None,
            service_url: None,
            from: None,
            recipient: None,
            conversation: None,
            reply_to_id: None,
            text: None,
            code: None,
            name: None,
            label: None,
            value: None,
            value_type: None,
            input_hint: None,
            delivery_mode: None,
            members_added: Vec::new(),
            extra: HashMap::new(),
        }
    }

    /// Create a text message
    pub fn message(text: impl Into<String>) -> Self {
        let mut activity = Self::new(ActivityType::Message);
        activity.text = Some(text.into());
        activity
    }

    /// Create an end-of-conversation signal carrying `code`
    pub fn end_of_conversation(code: impl Into<String>) -> Self {
        let mut activity = Self::new(ActivityType::EndOfConversation);
        activity.code = Some(code.into());
        activity
    }

    /// Create a diagnostic trace activity
    pub fn trace(
        name: impl Into<String>,
        value: serde_json::Value,
        value_type: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        let mut activity = Self::new(ActivityType::Trace);
        activity.name = Some(name.into());
        activity.value = Some(value);
        activity.value_type = Some(value_type.into());
        activity.label = Some(label.into());
        activity.timestamp = Some(Utc::now());
        activity
    }

    /// Attach an input hint
    pub fn with_input_hint(mut self, hint: impl Into<String>) -> Self {
        self.input_hint = Some(hint.into());
        self
    }

    pub fn is_type(&self, activity_type: &ActivityType) -> bool {
        &self.activity_type == activity_type
    }

    /// Conversation id, if the activity is addressed to one
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation
            .as_ref()
            .map(|c| c.id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Whether the sender asked for replies in the HTTP response body
    pub fn expects_replies(&self) -> bool {
        self.delivery_mode.as_deref() == Some(DELIVERY_MODE_EXPECT_REPLIES)
    }

    /// Reference to the conversation this (incoming) activity belongs to
    pub fn conversation_reference(&self) -> ConversationReference {
        ConversationReference {
            activity_id: self.id.clone(),
            user: self.from.clone(),
            bot: self.recipient.clone(),
            conversation: self.conversation.clone().unwrap_or_default(),
            channel_id: self.channel_id.clone(),
            service_url: self.service_url.clone(),
        }
    }

    /// Address this activity using `reference`
    ///
    /// Incoming activities are stamped as sent by the user to the bot;
    /// outgoing ones as sent by the bot in reply to the referenced activity.
    pub fn apply_conversation_reference(
        &mut self,
        reference: &ConversationReference,
        is_incoming: bool,
    ) {
        self.channel_id = reference.channel_id.clone();
        self.service_url = reference.service_url.clone();
        self.conversation = Some(reference.conversation.clone());

        if is_incoming {
            self.from = reference.user.clone();
            self.recipient = reference.bot.clone();
            if reference.activity_id.is_some() {
                self.id = reference.activity_id.clone();
            }
        } else {
            self.from = reference.bot.clone();
            self.recipient = reference.user.clone();
            if reference.activity_id.is_some() {
                self.reply_to_id = reference.activity_id.clone();
            }
        }
    }
}
