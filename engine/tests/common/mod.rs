//! Shared helpers for engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use rootbot_engine::adapter::{BotAdapter, BufferedSink, ReplySink};
use rootbot_engine::bot::RootBot;
use rootbot_engine::config::SkillConfig;
use rootbot_engine::recovery::TurnErrorHandler;
use rootbot_engine::router::SkillSessionRouter;
use rootbot_engine::skills::{InvokeResponse, SkillClient, SkillConversationIdFactory, SkillDescriptor, SkillRegistry};
use rootbot_engine::state::{ConversationRecord, ConversationStateStore, MemoryStateStore};
use sdk::activity::{Activity, ActivityType, ChannelAccount, ConversationAccount};
use sdk::errors::HostError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SKILL_ID: &str = "EchoSkillBot";

/// How the mock skill answers
#[derive(Debug, Clone)]
pub enum SkillBehavior {
    Status(u16),
    Delay(Duration),
    Unreachable,
}

/// Records every post and answers according to its behavior
pub struct MockSkillClient {
    behavior: Mutex<SkillBehavior>,
    eoc_behavior: Mutex<Option<SkillBehavior>>,
    calls: Mutex<Vec<(String, Activity)>>,
}

impl MockSkillClient {
    pub fn new(behavior: SkillBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            eoc_behavior: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn ok() -> Self {
        Self::new(SkillBehavior::Status(200))
    }

    pub fn set_behavior(&self, behavior: SkillBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Separate behavior for endOfConversation posts
    pub fn set_eoc_behavior(&self, behavior: SkillBehavior) {
        *self.eoc_behavior.lock().unwrap() = Some(behavior);
    }

    pub fn calls(&self) -> Vec<(String, Activity)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn end_of_conversation_calls(&self) -> Vec<Activity> {
        self.calls()
            .into_iter()
            .filter(|(_, a)| a.is_type(&ActivityType::EndOfConversation))
            .map(|(_, a)| a)
            .collect()
    }

    pub fn forwarded_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|(_, a)| a.text)
            .collect()
    }
}

#[async_trait]
impl SkillClient for MockSkillClient {
    async fn post_activity(
        &self,
        skill: &SkillDescriptor,
        activity: &Activity,
    ) -> Result<InvokeResponse, HostError> {
        self.calls
            .lock()
            .unwrap()
            .push((skill.id.clone(), activity.clone()));

        let behavior = if activity.is_type(&ActivityType::EndOfConversation) {
            self.eoc_behavior
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| self.behavior.lock().unwrap().clone())
        } else {
            self.behavior.lock().unwrap().clone()
        };

        match behavior {
            SkillBehavior::Status(status) => Ok(InvokeResponse { status, body: None }),
            SkillBehavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(InvokeResponse {
                    status: 200,
                    body: None,
                })
            }
            SkillBehavior::Unreachable => Err(HostError::forwarding(&skill.id, "connection refused")),
        }
    }
}

/// Memory store that can be told to fail saves and counts deletes
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStateStore,
    fail_saves: Mutex<bool>,
    fail_gets: Mutex<bool>,
    pub deletes: AtomicUsize,
}

impl FlakyStore {
    pub fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }

    pub fn fail_gets(&self, fail: bool) {
        *self.fail_gets.lock().unwrap() = fail;
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationStateStore for FlakyStore {
    async fn get(&self, conversation_id: &str) -> Result<ConversationRecord, HostError> {
        if *self.fail_gets.lock().unwrap() {
            return Err(HostError::Storage("read failed".to_string()));
        }
        self.inner.get(conversation_id).await
    }

    async fn save_changes(
        &self,
        conversation_id: &str,
        record: &ConversationRecord,
    ) -> Result<(), HostError> {
        if *self.fail_saves.lock().unwrap() {
            return Err(HostError::Storage("write failed".to_string()));
        }
        self.inner.save_changes(conversation_id, record).await
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), HostError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(conversation_id).await
    }
}

pub fn registry() -> Arc<SkillRegistry> {
    Arc::new(
        SkillRegistry::from_config(&[SkillConfig {
            id: SKILL_ID.to_string(),
            app_id: "echo-skill-app".to_string(),
            skill_endpoint: "http://localhost:39783/api/messages".to_string(),
        }])
        .unwrap(),
    )
}

/// Adapter wired with the real root bot over mock collaborators
pub struct Harness {
    pub adapter: Arc<BotAdapter>,
    pub client: Arc<MockSkillClient>,
    pub store: Arc<dyn ConversationStateStore>,
    pub conversation_ids: Arc<SkillConversationIdFactory>,
}

impl Harness {
    pub fn new(client: MockSkillClient) -> Self {
        Self::with_store(client, Arc::new(MemoryStateStore::new()), Duration::from_secs(5))
    }

    pub fn with_store(
        client: MockSkillClient,
        store: Arc<dyn ConversationStateStore>,
        forward_timeout: Duration,
    ) -> Self {
        Self::build(client, store, forward_timeout, SKILL_ID)
    }

    /// Root bot targets `target_skill_id`, which need not be registered
    pub fn build(
        client: MockSkillClient,
        store: Arc<dyn ConversationStateStore>,
        forward_timeout: Duration,
        target_skill_id: &str,
    ) -> Self {
        let registry = registry();
        let client = Arc::new(client);
        let conversation_ids = Arc::new(SkillConversationIdFactory::new());

        let router = SkillSessionRouter::new(
            Arc::clone(&registry),
            client.clone(),
            Arc::clone(&store),
            Arc::clone(&conversation_ids),
            Arc::new(RootBot::new(target_skill_id)),
            forward_timeout,
        );
        let recovery = TurnErrorHandler::new(
            registry,
            client.clone(),
            Arc::clone(&store),
            Arc::clone(&conversation_ids),
            forward_timeout,
        );

        Self {
            adapter: Arc::new(BotAdapter::new(router, recovery, Arc::clone(&store))),
            client,
            store,
            conversation_ids,
        }
    }

    /// Run a turn and return what the bot sent back
    pub async fn turn(&self, activity: Activity) -> Vec<Activity> {
        let sink = Arc::new(BufferedSink::new());
        let reply_sink: Arc<dyn ReplySink> = sink.clone();
        self.adapter
            .process_activity(activity, reply_sink)
            .await
            .unwrap();
        sink.take()
    }

    pub async fn active_skill(&self, conversation_id: &str) -> Option<String> {
        self.store
            .get(conversation_id)
            .await
            .unwrap()
            .active_skill_id
    }
}

pub fn message(conversation_id: &str, text: &str) -> Activity {
    let mut activity = Activity::message(text);
    activity.id = Some(uuid::Uuid::new_v4().to_string());
    activity.channel_id = Some("test".to_string());
    activity.service_url = Some("http://localhost:5000".to_string());
    activity.from = Some(ChannelAccount::new("user1"));
    activity.recipient = Some(ChannelAccount::new("root-bot"));
    activity.conversation = Some(ConversationAccount::new(conversation_id));
    activity
}

pub fn end_of_conversation(conversation_id: &str, code: &str) -> Activity {
    let mut activity = message(conversation_id, "");
    activity.activity_type = ActivityType::EndOfConversation;
    activity.text = None;
    activity.code = Some(code.to_string());
    activity
}

pub fn texts(activities: &[Activity]) -> Vec<String> {
    activities
        .iter()
        .filter(|a| a.is_type(&ActivityType::Message))
        .filter_map(|a| a.text.clone())
        .collect()
}
