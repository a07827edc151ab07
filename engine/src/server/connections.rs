//! Live WebSocket connections
//!
//! Maps root conversation ids to the socket the conversation is running on,
//! so activities a skill sends back asynchronously reach the same socket.
//! A socket carries one conversation; the first activity binds it.

use dashmap::DashMap;
use sdk::errors::HostError;
use uuid::Uuid;

use crate::adapter::WebSocketSink;

/// Per-connection state
pub struct ConnectionContext {
    pub id: Uuid,
    pub sink: WebSocketSink,
    conversation: Option<String>,
}

impl ConnectionContext {
    pub fn new(sink: WebSocketSink) -> Self {
        Self {
            id: Uuid::new_v4(),
            sink,
            conversation: None,
        }
    }

    /// Conversation this connection is bound to
    pub fn conversation(&self) -> Option<&str> {
        self.conversation.as_deref()
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    by_conversation: DashMap<String, (Uuid, WebSocketSink)>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `conversation_id` to `connection`
    ///
    /// # Errors
    ///
    /// `HostError::InvalidActivity` if the connection is already bound to a
    /// different conversation.
    pub fn register(
        &self,
        connection: &mut ConnectionContext,
        conversation_id: &str,
    ) -> Result<(), HostError> {
        match connection.conversation.as_deref() {
            Some(bound) if bound == conversation_id => return Ok(()),
            Some(bound) => {
                return Err(HostError::InvalidActivity(format!(
                    "connection is bound to conversation {}",
                    bound
                )))
            }
            None => connection.conversation = Some(conversation_id.to_string()),
        }
        self.by_conversation.insert(
            conversation_id.to_string(),
            (connection.id, connection.sink.clone()),
        );
        Ok(())
    }

    /// Sink of the socket currently carrying `conversation_id`
    pub fn sink_for(&self, conversation_id: &str) -> Option<WebSocketSink> {
        self.by_conversation
            .get(conversation_id)
            .map(|entry| entry.value().1.clone())
    }

    /// Forget the conversation bound to `connection`
    ///
    /// A conversation that has since moved to another socket is left alone.
    pub fn unregister(&self, connection: &ConnectionContext) {
        if let Some(conversation_id) = &connection.conversation {
            self.by_conversation
                .remove_if(conversation_id, |_, (owner, _)| *owner == connection.id);
        }
    }

    pub fn len(&self) -> usize {
        self.by_conversation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_conversation.is_empty()
    }
}
