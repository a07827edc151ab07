//! Root bot
//!
//! Dialog logic that runs when no skill owns the conversation.

pub mod root;

pub use root::RootBot;
