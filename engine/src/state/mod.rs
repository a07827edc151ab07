//! Conversation State Store
//!
//! Key-value persistence of per-conversation fields (active skill id and the
//! opaque dialog state), keyed by conversation id. Writes are explicit: a
//! record is only persisted when `save_changes` is called.
//!
//! Two backends are provided:
//! - [`MemoryStateStore`]: process-local, lost on restart
//! - [`SqliteStateStore`]: single-node durable store
//!
//! Callers must hold the conversation's entry in [`ConversationLocks`] while
//! reading, mutating and saving a record; the stores themselves only make
//! individual operations atomic.

use async_trait::async_trait;
use sdk::errors::HostError;
use serde::{Deserialize, Serialize};

pub mod locks;
pub mod memory;
pub mod sqlite;

pub use locks::ConversationLocks;
pub use memory::MemoryStateStore;
pub use sqlite::SqliteStateStore;

/// Per-conversation state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Skill currently handling the conversation, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_skill_id: Option<String>,

    /// Root dialog state, opaque to the store
    #[serde(default)]
    pub dialog_state: serde_json::Value,
}

impl ConversationRecord {
    pub fn is_empty(&self) -> bool {
        self.active_skill_id.is_none() && self.dialog_state.is_null()
    }
}

/// Conversation state persistence
#[async_trait]
pub trait ConversationStateStore: Send + Sync {
    /// Load the record for `conversation_id`, or an empty one if absent
    async fn get(&self, conversation_id: &str) -> Result<ConversationRecord, HostError>;

    /// Persist `record` for `conversation_id`
    async fn save_changes(
        &self,
        conversation_id: &str,
        record: &ConversationRecord,
    ) -> Result<(), HostError>;

    /// Remove the record for `conversation_id`. Deleting an absent record is
    /// not an error.
    async fn delete(&self, conversation_id: &str) -> Result<(), HostError>;
}
