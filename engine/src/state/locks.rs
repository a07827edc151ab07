//! Per-conversation serialization
//!
//! Turns for the same conversation id run one at a time in arrival order;
//! turns for different ids never share a lock. `tokio::sync::Mutex` queues
//! waiters FIFO, which gives the arrival ordering.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Guard held for the duration of one turn
pub struct ConversationGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Map of conversation id to its turn lock
#[derive(Default)]
pub struct ConversationLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `conversation_id`
    pub async fn acquire(&self, conversation_id: &str) -> ConversationGuard {
        // Clone the Arc out so the DashMap shard lock is not held across await
        let lock = Arc::clone(
            self.locks
                .entry(conversation_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );

        ConversationGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Drop the lock entry for a conversation nobody is waiting on
    ///
    /// Called after every turn so the map only holds conversations with a
    /// turn in flight or queued.
    pub fn release_idle(&self, conversation_id: &str) {
        self.locks
            .remove_if(conversation_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of tracked conversations
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
