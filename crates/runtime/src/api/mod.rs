//! Public runtime API surface.
//!
//! Errors and the ports a host plugs in: the operator prompt, the replicated
//! settings store and the macro runner.

pub mod errors;
pub mod macros;
pub mod prompt;
pub mod settings;

pub use errors::{Result, RuntimeError};
pub use macros::{MacroRunner, NoopMacros};
pub use prompt::{
    AutoPrompt, ConditionSelection, ConfirmRequest, CustomFormula, DamageOptions,
    DefenseDeclaration, Prompt,
};
pub use settings::{InMemorySettings, SettingsStore};
