//! In-memory conversation state

use async_trait::async_trait;
use dashmap::DashMap;
use sdk::errors::HostError;

use super::{ConversationRecord, ConversationStateStore};

/// Process-local store. Records are lost on restart.
#[derive(Default)]
pub struct MemoryStateStore {
    records: DashMap<String, ConversationRecord>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a record is currently persisted for `conversation_id`
    pub fn contains(&self, conversation_id: &str) -> bool {
        self.records.contains_key(conversation_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ConversationStateStore for MemoryStateStore {
    async fn get(&self, conversation_id: &str) -> Result<ConversationRecord, HostError> {
        Ok(self
            .records
            .get(conversation_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    async fn save_changes(
        &self,
        conversation_id: &str,
        record: &ConversationRecord,
    ) -> Result<(), HostError> {
        self.records
            .insert(conversation_id.to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), HostError> {
        self.records.remove(conversation_id);
        Ok(())
    }
}
