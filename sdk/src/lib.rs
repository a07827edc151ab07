//! Rootbot SDK
//!
//! Shared library providing the activity schema and error types used by the
//! rootbot engine and by anything that talks to it (skills, test harnesses).

/// Activity schema
pub mod activity;

/// Error types and handling
pub mod errors;

// Re-export commonly used types
pub use activity::{
    Activity, ActivityType, ChannelAccount, ConversationAccount, ConversationReference,
};
pub use errors::{HostError, HostErrorExt};
