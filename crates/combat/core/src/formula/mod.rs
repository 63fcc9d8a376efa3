//! Formula evaluation for extension fields.
//!
//! Extension `dice`, `add` and poison-rank fields are strings such as
//! `[level]*2+1`. The evaluator is a port so a host can plug in its own
//! grammar; [`ExpressionEvaluator`] covers integer arithmetic with bracket
//! references to the item level and the acting actor's stats.

mod evaluate;

pub use evaluate::ExpressionEvaluator;

use crate::config::CombatConfig;
use crate::error::{CombatError, ErrorSeverity};
use crate::state::ActorState;

/// Level context a formula is evaluated in: the contributing item's level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelContext {
    pub level: u32,
}

impl LevelContext {
    pub fn new(level: u32) -> Self {
        Self { level }
    }

    /// Falls back to [`CombatConfig::DEFAULT_ITEM_LEVEL`] when the item has no level.
    pub fn from_level(level: Option<u32>) -> Self {
        Self::new(level.unwrap_or(CombatConfig::DEFAULT_ITEM_LEVEL))
    }
}

impl Default for LevelContext {
    fn default() -> Self {
        Self::new(CombatConfig::DEFAULT_ITEM_LEVEL)
    }
}

/// Evaluates extension formula strings to integers.
pub trait FormulaEvaluator: Send + Sync {
    /// Evaluates `formula` with `level` as level context and `actor` as stat
    /// context. An empty or whitespace-only formula evaluates to 0.
    fn evaluate(
        &self,
        formula: &str,
        level: &LevelContext,
        actor: &ActorState,
    ) -> Result<i64, FormulaError>;
}

/// Formula parsing and evaluation failures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FormulaError {
    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("unexpected end of formula")]
    UnexpectedEnd,

    #[error("unknown reference [{0}]")]
    UnknownReference(String),

    #[error("unclosed reference starting at position {0}")]
    UnclosedReference(usize),

    #[error("number out of range at position {0}")]
    NumberOutOfRange(usize),

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow")]
    Overflow,
}

impl CombatError for FormulaError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnexpectedChar { .. } => "formula_unexpected_char",
            Self::UnexpectedEnd => "formula_unexpected_end",
            Self::UnknownReference(_) => "formula_unknown_reference",
            Self::UnclosedReference(_) => "formula_unclosed_reference",
            Self::NumberOutOfRange(_) => "formula_number_out_of_range",
            Self::DivisionByZero => "formula_division_by_zero",
            Self::Overflow => "formula_overflow",
        }
    }
}
