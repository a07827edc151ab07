//! Error types and handling
//!
//! This module provides the error types used throughout the rootbot host.
//! All errors implement the `HostErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Error messages never carry bearer tokens or app passwords. Auth failures
//! describe the rejected claim, not the credential.

use thiserror::Error;

/// Trait for host error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information.
pub trait HostErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors leave the process healthy; the affected turn is
    /// unwound by the recovery handler and the next turn starts fresh.
    fn is_recoverable(&self) -> bool;
}

/// Main host error type
///
/// # Error Categories
///
/// - **Routing**: active skill id has no registry entry
/// - **Forwarding**: delivering a turn to a skill failed or timed out
/// - **Cleanup**: end-of-conversation could not be delivered during recovery
/// - **Auth**: inbound claims rejected at the transport boundary
/// - **Storage**: conversation state could not be read or written
/// - **Configuration**: invalid or missing configuration
///
/// # Examples
///
/// ```
/// use sdk::errors::{HostError, HostErrorExt};
///
/// let error = HostError::Routing("EchoSkillBot".to_string());
/// assert!(error.is_recoverable());
///
/// let fatal = HostError::Config("missing port".to_string());
/// assert!(!fatal.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum HostError {
    // Routing errors
    #[error("No skill registered with id '{0}'")]
    Routing(String),

    // Forwarding errors
    #[error("Forwarding to skill '{skill_id}' failed: {reason}")]
    Forwarding { skill_id: String, reason: String },

    #[error("Forwarding to skill '{0}' timed out")]
    ForwardTimeout(String),

    // Recovery errors
    #[error("Cleanup error: {0}")]
    Cleanup(String),

    // Transport boundary errors
    #[error("Unauthorized: {0}")]
    Auth(String),

    #[error("Invalid activity: {0}")]
    InvalidActivity(String),

    #[error("Unknown skill conversation: {0}")]
    UnknownSkillConversation(String),

    // Outbound reply errors
    #[error("Reply delivery failed: {0}")]
    Delivery(String),

    // State errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    /// Shorthand for a forwarding failure against `skill_id`
    pub fn forwarding(skill_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Forwarding {
            skill_id: skill_id.into(),
            reason: reason.into(),
        }
    }
}

impl HostErrorExt for HostError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Routing(_) => "The active skill is not configured. Check the [[skills]] table",
            Self::Forwarding { .. } => "The skill could not be reached. Check its endpoint",
            Self::ForwardTimeout(_) => "The skill took too long to respond",
            Self::Cleanup(_) => "The skill may still hold a stale session",
            Self::Auth(_) => "Caller is not allowed. Check auth.allowed_callers",
            Self::InvalidActivity(_) => "The activity payload is malformed",
            Self::UnknownSkillConversation(_) => "The skill conversation has already ended",
            Self::Delivery(_) => "Reply could not be delivered to the channel",
            Self::Storage(_) => "Conversation state unavailable. Check the storage backend",
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::Io(_))
    }
}
