//! Bot Adapter
//!
//! Turn pipeline shared by every ingress: lock the conversation, load its
//! record, route, and funnel any error into recovery.

pub mod context;
pub mod sink;

pub use context::TurnContext;
pub use sink::{BufferedSink, ConnectorSink, ReplySink, WebSocketSink};

use sdk::activity::Activity;
use sdk::errors::HostError;
use std::sync::Arc;
use tracing::{debug, warn, Instrument};

use crate::recovery::{RecoveryOutcome, TurnErrorHandler};
use crate::router::{RouteOutcome, SkillSessionRouter};
use crate::state::{ConversationLocks, ConversationRecord, ConversationStateStore};

/// Result of processing one activity
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed(RouteOutcome),
    Recovered(RecoveryOutcome),
}

impl TurnOutcome {
    pub fn is_recovered(&self) -> bool {
        matches!(self, TurnOutcome::Recovered(_))
    }
}

pub struct BotAdapter {
    router: SkillSessionRouter,
    recovery: TurnErrorHandler,
    store: Arc<dyn ConversationStateStore>,
    locks: ConversationLocks,
}

impl BotAdapter {
    pub fn new(
        router: SkillSessionRouter,
        recovery: TurnErrorHandler,
        store: Arc<dyn ConversationStateStore>,
    ) -> Self {
        Self {
            router,
            recovery,
            store,
            locks: ConversationLocks::new(),
        }
    }

    /// Run one turn for `activity`, sending replies to `sink`
    ///
    /// # Errors
    ///
    /// Only `HostError::InvalidActivity` escapes; every other failure is
    /// handled by recovery and reported as [`TurnOutcome::Recovered`].
    pub async fn process_activity(
        &self,
        activity: Activity,
        sink: Arc<dyn ReplySink>,
    ) -> Result<TurnOutcome, HostError> {
        let conversation_id = activity
            .conversation_id()
            .ok_or_else(|| HostError::InvalidActivity("missing conversation id".to_string()))?
            .to_string();

        let span = tracing::info_span!(
            "turn",
            conversation = %conversation_id,
            activity_type = %activity.activity_type
        );

        async move {
            let guard = self.locks.acquire(&conversation_id).await;

            let (record, load_error) = match self.store.get(&conversation_id).await {
                Ok(record) => (record, None),
                Err(e) => (ConversationRecord::default(), Some(e)),
            };

            let mut turn = TurnContext::new(activity, record, sink)?;

            let result = match load_error {
                Some(e) => Err(e),
                None => self.router.route(&mut turn).await,
            };

            let outcome = match result {
                Ok(route) => {
                    debug!("Turn completed: {:?}", route);
                    TurnOutcome::Completed(route)
                }
                Err(e) => {
                    let recovered = self.recovery.on_turn_error(&mut turn, &e).await;
                    if !recovered.state_cleared {
                        warn!("Conversation state was not cleared after recovery");
                    }
                    TurnOutcome::Recovered(recovered)
                }
            };

            drop(guard);
            self.locks.release_idle(&conversation_id);

            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    /// Number of conversations with a tracked turn lock
    pub fn tracked_conversations(&self) -> usize {
        self.locks.len()
    }
}
