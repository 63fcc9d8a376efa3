//! Common error infrastructure for combat-core.
//!
//! Rules-level failures are reported through [`RuleError`]; formula parsing
//! problems have their own [`FormulaError`](crate::formula::FormulaError) and
//! convert into it. Every error type classifies itself with an
//! [`ErrorSeverity`] so the runtime can decide between aborting a single
//! bucket, skipping a queue entry, or surfacing a generic failure notice.

use crate::formula::FormulaError;
use crate::state::{ActorId, ItemId};

/// Severity level of an error, used for categorization and recovery strategies.
///
/// - **Recoverable**: the operator can retry (e.g. a cancelled prompt)
/// - **Validation**: malformed input that should be rejected without retry
/// - **Internal**: unexpected state inconsistencies that require investigation
/// - **Fatal**: shared combat state can no longer be trusted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Recoverable error - can retry with same or alternative input.
    ///
    /// Examples: usage exhausted, operator cancelled a prompt
    Recoverable,

    /// Validation error - invalid input, should not retry without changes.
    ///
    /// Examples: unknown actor id, missing required target
    Validation,

    /// Internal error - unexpected state inconsistency.
    Internal,

    /// Fatal error - combat state corrupted, cannot continue.
    Fatal,
}

impl ErrorSeverity {
    /// Returns a human-readable description of this severity level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    /// Returns true if this error is potentially recoverable.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    /// Returns true if this error indicates an internal bug.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal | Self::Fatal)
    }
}

/// Common trait for all combat errors.
///
/// - Use `#[derive(thiserror::Error)]` for Display/Error impl
/// - Classify severity based on recoverability, not impact
pub trait CombatError: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a static string identifier for this error variant.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

/// Errors raised while evaluating rules against combat state.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RuleError {
    /// Actor not present in combat state.
    #[error("actor {0} not found")]
    ActorNotFound(ActorId),

    /// Item not present on the actor.
    #[error("item {item} not found on actor {actor}")]
    ItemNotFound { actor: ActorId, item: ItemId },

    /// Item has no uses left for the current reset window.
    #[error("item {item} has no remaining uses ({used}/{max})")]
    UsageExhausted { item: ItemId, used: u32, max: u32 },

    /// A selected-targets effect was resolved without any target.
    #[error("effect requires at least one selected target")]
    MissingTarget,

    /// A formula string could not be evaluated.
    #[error("formula `{formula}` failed: {source}")]
    Formula {
        formula: String,
        #[source]
        source: FormulaError,
    },
}

impl RuleError {
    pub fn formula(formula: impl Into<String>, source: FormulaError) -> Self {
        Self::Formula {
            formula: formula.into(),
            source,
        }
    }
}

impl CombatError for RuleError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ActorNotFound(_) | Self::ItemNotFound { .. } => ErrorSeverity::Validation,
            Self::MissingTarget | Self::Formula { .. } => ErrorSeverity::Validation,
            Self::UsageExhausted { .. } => ErrorSeverity::Recoverable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::ActorNotFound(_) => "actor_not_found",
            Self::ItemNotFound { .. } => "item_not_found",
            Self::UsageExhausted { .. } => "usage_exhausted",
            Self::MissingTarget => "missing_target",
            Self::Formula { .. } => "formula",
        }
    }
}
