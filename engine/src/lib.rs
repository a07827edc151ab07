//! Rootbot Engine Library
//!
//! Skill-session host for a root bot: routes each conversation turn either
//! to the root dialog or to the active child skill, and recovers cleanly when
//! a turn fails. Used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Telemetry and Observability
pub mod telemetry;

/// Token minting and validation for bot-to-bot calls
pub mod auth;

/// Conversation state persistence and per-conversation locking
pub mod state;

/// Skill registry, conversation id mapping and outbound client
pub mod skills;

/// Turn pipeline and reply sinks
pub mod adapter;

/// Skill session routing
pub mod router;

/// Turn error recovery
pub mod recovery;

/// Root bot dialog
pub mod bot;

/// HTTP and WebSocket ingress
pub mod server;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
