//! Effect extensions and the pipeline that turns them into executable buckets.
//!
//! ```text
//! ItemState ──collect_descriptors──► [ExtensionDescriptor]
//!                                        │ group (by BucketKey)
//!                                        ▼
//!                                  [ExtensionBucket] ──merge──► MergeReport
//! ```
//!
//! Classification and grouping are pure. Merging evaluates formulas through a
//! [`FormulaEvaluator`](crate::formula::FormulaEvaluator) and never touches
//! actor state.

pub mod bucket;
pub mod merge;
pub mod spec;
pub mod timing;

pub use bucket::{
    BucketKey, ExtensionBucket, ExtensionDescriptor, ExtensionSource, collect_descriptors, group,
};
pub use merge::{
    MergeFailure, MergeReport, MergedCondition, MergedEffect, MergedFormula, evaluate_poison_rank,
    merge,
};
pub use spec::{
    EffectFlags, EquipmentCreation, ExtensionKind, ExtensionSpec, PoisonRank, TargetScope, Timing,
};
pub use timing::{classify, parent_timing};
