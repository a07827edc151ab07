//! Skills
//!
//! Everything the host knows about its child skills: the static registry,
//! the conversation id mapping used for skill callbacks, and the outbound
//! HTTP client.

pub mod client;
pub mod conversation_id;
pub mod registry;

pub use client::{InvokeResponse, SkillClient, SkillHttpClient};
pub use conversation_id::SkillConversationIdFactory;
pub use registry::{SkillDescriptor, SkillRegistry};
