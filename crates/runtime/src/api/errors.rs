//! Unified error types surfaced by the runtime API.
//!
//! Wraps rule failures from `combat-core`, protocol validation and the
//! settings/bus adapters so callers can bubble them up with consistent
//! context. [`RuntimeError::severity`] decides how far a failure travels: a
//! recoverable error aborts one bucket, anything else is logged and surfaced
//! as a failure notice.
use thiserror::Error;

use combat_core::{ActorId, CombatError, ErrorSeverity, ParticipantId, RuleError};

use crate::protocol::MessageKind;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Missing target, or a cancelled/invalid operator entry.
    #[error("operator input required: {0}")]
    UserInput(String),

    #[error("participant {participant} may not act for actor {actor}")]
    PermissionDenied {
        participant: ParticipantId,
        actor: ActorId,
    },

    /// A queued entry points at an actor or item that no longer exists.
    #[error("stale reference: {0}")]
    StaleReference(#[source] RuleError),

    #[error("{kind} rejected by the authority: {reason}")]
    Rejected { kind: MessageKind, reason: String },

    #[error("invalid {kind} message: {reason}")]
    InvalidMessage { kind: MessageKind, reason: String },

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("{0} lock was poisoned")]
    LockPoisoned(&'static str),

    #[error("message bus closed")]
    BusClosed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("macro {name} failed: {reason}")]
    Macro { name: String, reason: String },
}

impl RuntimeError {
    pub fn user_input(message: impl Into<String>) -> Self {
        Self::UserInput(message.into())
    }
}

impl CombatError for RuntimeError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UserInput(_) | Self::Rejected { .. } => ErrorSeverity::Recoverable,
            Self::PermissionDenied { .. } | Self::InvalidMessage { .. } => {
                ErrorSeverity::Validation
            }
            Self::StaleReference(_) | Self::Macro { .. } => ErrorSeverity::Recoverable,
            Self::Rule(e) => e.severity(),
            Self::Json(_) | Self::BusClosed => ErrorSeverity::Internal,
            Self::LockPoisoned(_) => ErrorSeverity::Fatal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UserInput(_) => "user_input",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::StaleReference(_) => "stale_reference",
            Self::Rejected { .. } => "rejected",
            Self::InvalidMessage { .. } => "invalid_message",
            Self::Rule(e) => e.error_code(),
            Self::LockPoisoned(_) => "lock_poisoned",
            Self::BusClosed => "bus_closed",
            Self::Json(_) => "json",
            Self::Macro { .. } => "macro",
        }
    }
}
