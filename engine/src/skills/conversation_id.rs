//! Skill conversation ids
//!
//! A skill sees its own conversation id, not the root's. When the skill calls
//! back into the channel service it addresses that id, and the factory maps it
//! back to the root conversation reference.

use dashmap::DashMap;
use sdk::activity::ConversationReference;

/// Maps skill conversation ids to root conversation references
#[derive(Default)]
pub struct SkillConversationIdFactory {
    references: DashMap<String, ConversationReference>,
}

impl SkillConversationIdFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id handed to `skill_id` for the conversation in `reference`
    ///
    /// Stable for a given (conversation, skill, channel) triple so repeated
    /// forwards within one skill session reuse the same id.
    pub fn create_skill_conversation_id(
        &self,
        reference: &ConversationReference,
        skill_id: &str,
    ) -> String {
        let id = format!(
            "{}-{}-{}-skillconvo",
            reference.conversation.id,
            skill_id,
            reference.channel_id.as_deref().unwrap_or_default()
        );
        self.references.insert(id.clone(), reference.clone());
        id
    }

    pub fn get_conversation_reference(
        &self,
        skill_conversation_id: &str,
    ) -> Option<ConversationReference> {
        self.references
            .get(skill_conversation_id)
            .map(|r| r.value().clone())
    }

    pub fn delete_conversation_reference(&self, skill_conversation_id: &str) {
        self.references.remove(skill_conversation_id);
    }

    /// Forget every skill conversation belonging to a root conversation
    pub fn delete_for_conversation(&self, conversation_id: &str) {
        self.references
            .retain(|_, reference| reference.conversation.id != conversation_id);
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sdk::activity::ConversationAccount;

    fn reference(conversation_id: &str) -> ConversationReference {
        ConversationReference {
            conversation: ConversationAccount::new(conversation_id),
            channel_id: Some("emulator".to_string()),
            service_url: Some("http://localhost:5000".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_round_trip_lookup() {
        let factory = SkillConversationIdFactory::new();
        let id = factory.create_skill_conversation_id(&reference("c1"), "EchoSkillBot");

        assert_eq!(id, "c1-EchoSkillBot-emulator-skillconvo");
        let found = factory.get_conversation_reference(&id).unwrap();
        assert_eq!(found.conversation.id, "c1");

        factory.delete_conversation_reference(&id);
        assert!(factory.get_conversation_reference(&id).is_none());
    }

    #[test]
    fn test_delete_for_conversation() {
        let factory = SkillConversationIdFactory::new();
        factory.create_skill_conversation_id(&reference("c1"), "a");
        factory.create_skill_conversation_id(&reference("c1"), "b");
        let keep = factory.create_skill_conversation_id(&reference("c2"), "a");

        factory.delete_for_conversation("c1");
        assert_eq!(factory.len(), 1);
        assert!(factory.get_conversation_reference(&keep).is_some());
    }

    proptest! {
        #[test]
        fn prop_id_is_stable_per_conversation_and_skill(
            conv in "[a-z0-9]{1,12}",
            skill in "[A-Za-z]{1,12}",
        ) {
            let factory = SkillConversationIdFactory::new();
            let first = factory.create_skill_conversation_id(&reference(&conv), &skill);
            let second = factory.create_skill_conversation_id(&reference(&conv), &skill);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(factory.len(), 1);
        }

        #[test]
        fn prop_distinct_conversations_get_distinct_ids(
            a in "[a-z0-9]{1,12}",
            b in "[a-z0-9]{1,12}",
        ) {
            prop_assume!(a != b);
            let factory = SkillConversationIdFactory::new();
            let id_a = factory.create_skill_conversation_id(&reference(&a), "skill");
            let id_b = factory.create_skill_conversation_id(&reference(&b), "skill");
            prop_assert_ne!(id_a, id_b);
        }
    }
}
