//! Deterministic combat rules shared by every participant of a session.
//!
//! `combat-core` defines the effect extension model, the timing classifier,
//! the bucketing and merge engine, and the attack/damage/defense math. All
//! functions here are synchronous and side-effect free apart from the explicit
//! `&mut` state mutations in [`effect`]; orchestration, authority routing and
//! deferred queues live in the runtime crate.
pub mod combat;
pub mod config;
pub mod dice;
pub mod effect;
pub mod error;
pub mod extension;
pub mod formula;
pub mod state;

pub use combat::{
    AttackBaseline, AttackPenalty, DamagePlan, DamageRollInput, DefenseInput, attack_expression,
    effective_guard,
};
pub use config::CombatConfig;
pub use dice::{Dice, DiceExpr, PcgDice, RollOutcome};
pub use effect::{DamageOutcome, HealBlockReason, HealOutcome, apply_damage, apply_heal};
pub use error::{CombatError, ErrorSeverity, RuleError};
pub use extension::{
    BucketKey, EffectFlags, EquipmentCreation, ExtensionBucket, ExtensionDescriptor,
    ExtensionKind, ExtensionSource, ExtensionSpec, MergeFailure, MergeReport, MergedCondition,
    MergedEffect, MergedFormula, PoisonRank, TargetScope, Timing, classify, collect_descriptors,
    evaluate_poison_rank, group, merge, parent_timing,
};
pub use formula::{ExpressionEvaluator, FormulaError, FormulaEvaluator, LevelContext};
pub use state::{
    ActionType, ActiveCondition, ActiveSpec, ActorId, ActorState, AppliedEffectEntry,
    AttackProfile, AttributeKey, BerserkMode, CombatAttributes, CombatState, ConditionChange,
    ConditionDetail, ConditionKind, ConditionSet, DisableMode, ItemId, ItemKind, ItemState,
    ParticipantId, ResourceMeter, RollKind, UsageCounter,
};
