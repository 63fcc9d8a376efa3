//! Merging of same-bucket contributions into one evaluation.
//!
//! | Bucket | Strategy |
//! |---|---|
//! | heal / damage | dice summed (each source floored at 0), add summed, flags OR'd |
//! | condition | condition types unioned, poison rank maximized |
//! | equipment | never merged; each source creates its own item |
//! | custom | never merged; the operator enters one formula at resolution |
//!
//! Every strategy is commutative and associative, so the source order inside
//! a bucket never changes the result.

use std::collections::BTreeSet;

use super::{BucketKey, EffectFlags, ExtensionBucket, ExtensionSource, PoisonRank};
use crate::config::CombatConfig;
use crate::error::RuleError;
use crate::formula::{FormulaError, FormulaEvaluator, LevelContext};
use crate::state::{ActorState, ConditionKind};

/// Summed dice/add contribution of a heal or damage bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MergedFormula {
    pub dice: i64,
    pub add: i64,
    pub flags: EffectFlags,
}

/// Unioned contribution of a condition bucket.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MergedCondition {
    pub types: BTreeSet<ConditionKind>,
    /// Highest poison rank across sources; set only when poison is present.
    pub poison_rank: Option<i64>,
}

/// Result of merging one bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum MergedEffect {
    Formula(MergedFormula),
    Condition(MergedCondition),
}

/// A bucket whose merge failed; the other buckets are unaffected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeFailure {
    pub key: BucketKey,
    pub error: RuleError,
}

/// Output of [`merge`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub buckets: Vec<ExtensionBucket>,
    pub failures: Vec<MergeFailure>,
}

/// Merges every bucket that supports merging.
///
/// Formulas are evaluated with each source's own item level as level context
/// and the acting actor as stat context. A bucket whose formula fails to
/// evaluate is reported in [`MergeReport::failures`] and left out.
pub fn merge(
    actor: &ActorState,
    evaluator: &dyn FormulaEvaluator,
    buckets: Vec<ExtensionBucket>,
) -> MergeReport {
    let mut report = MergeReport::default();

    for mut bucket in buckets {
        if bucket.is_custom() || bucket.kind().is_equipment() {
            bucket.merged = None;
            report.buckets.push(bucket);
            continue;
        }

        let merged = if bucket.kind().is_formula() {
            merge_formula(actor, evaluator, &bucket.sources).map(MergedEffect::Formula)
        } else {
            Ok(MergedEffect::Condition(merge_condition(
                actor,
                evaluator,
                &bucket.sources,
            )))
        };

        match merged {
            Ok(merged) => {
                bucket.merged = Some(merged);
                report.buckets.push(bucket);
            }
            Err(error) => report.failures.push(MergeFailure {
                key: bucket.key,
                error,
            }),
        }
    }

    report
}

fn source_context(source: &ExtensionSource) -> LevelContext {
    LevelContext::from_level(source.level)
}

fn merge_formula(
    actor: &ActorState,
    evaluator: &dyn FormulaEvaluator,
    sources: &[ExtensionSource],
) -> Result<MergedFormula, RuleError> {
    let mut merged = MergedFormula::default();

    for source in sources {
        let level = source_context(source);
        let dice = evaluator
            .evaluate(&source.spec.dice, &level, actor)
            .map_err(|e| RuleError::formula(&source.spec.dice, e))?;
        let add = evaluator
            .evaluate(&source.spec.add, &level, actor)
            .map_err(|e| RuleError::formula(&source.spec.add, e))?;

        merged.dice = merged
            .dice
            .checked_add(dice.max(0))
            .ok_or_else(|| RuleError::formula(&source.spec.dice, FormulaError::Overflow))?;
        merged.add = merged
            .add
            .checked_add(add)
            .ok_or_else(|| RuleError::formula(&source.spec.add, FormulaError::Overflow))?;
        merged.flags |= source.spec.flags;
    }

    Ok(merged)
}

fn merge_condition(
    actor: &ActorState,
    evaluator: &dyn FormulaEvaluator,
    sources: &[ExtensionSource],
) -> MergedCondition {
    let mut merged = MergedCondition::default();

    for source in sources {
        merged
            .types
            .extend(source.spec.condition_types.iter().copied());

        if source.spec.condition_types.contains(&ConditionKind::Poisoned)
            && let Some(rank) = evaluate_poison_rank(actor, evaluator, source)
        {
            merged.poison_rank = Some(merged.poison_rank.map_or(rank, |r| r.max(rank)));
        }
    }

    if merged.types.contains(&ConditionKind::Poisoned) && merged.poison_rank.is_none() {
        merged.poison_rank = Some(CombatConfig::DEFAULT_POISON_RANK);
    }

    merged
}

/// Evaluates one source's poison rank.
///
/// A formula that fails to evaluate contributes nothing; the bucket falls
/// back to the default rank only if no source produced one.
pub fn evaluate_poison_rank(
    actor: &ActorState,
    evaluator: &dyn FormulaEvaluator,
    source: &ExtensionSource,
) -> Option<i64> {
    match source.spec.poisoned_rank.as_ref()? {
        PoisonRank::Fixed(rank) => Some(*rank),
        PoisonRank::Formula(formula) => evaluator
            .evaluate(formula, &source_context(source), actor)
            .ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{ExtensionKind, ExtensionSpec, TargetScope, Timing};
    use crate::formula::ExpressionEvaluator;
    use crate::state::{ActorId, ItemId, ResourceMeter};

    fn actor() -> ActorState {
        ActorState::new("pc", "PC", ResourceMeter::full(30))
    }

    fn source(item: &str, level: Option<u32>, spec: ExtensionSpec) -> ExtensionSource {
        ExtensionSource {
            item_id: ItemId::new(item),
            item_name: item.to_owned(),
            actor_id: ActorId::new("pc"),
            level,
            spec,
        }
    }

    fn bucket(kind: ExtensionKind, custom: bool, sources: Vec<ExtensionSource>) -> ExtensionBucket {
        ExtensionBucket {
            key: BucketKey {
                kind,
                timing: Timing::Instant,
                target: TargetScope::SelectedTargets,
                parent_timing: Timing::Instant,
                custom,
            },
            sources,
            merged: None,
        }
    }

    fn merge_one(bucket: ExtensionBucket) -> ExtensionBucket {
        let report = merge(&actor(), &ExpressionEvaluator, vec![bucket]);
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        report.buckets.into_iter().next().unwrap()
    }

    #[test]
    fn heal_sources_sum_dice_and_add() {
        let merged = merge_one(bucket(
            ExtensionKind::Heal,
            false,
            vec![
                source("a", None, ExtensionSpec::formula("2", "1")),
                source("b", None, ExtensionSpec::formula("0", "-1")),
                source("c", None, ExtensionSpec::formula("3", "2")),
            ],
        ));

        let formula = merged.merged_formula().unwrap();
        assert_eq!(formula.dice, 5);
        assert_eq!(formula.add, 2);
    }

    #[test]
    fn negative_dice_are_floored_per_source_but_add_is_not() {
        let merged = merge_one(bucket(
            ExtensionKind::Damage,
            false,
            vec![
                source("a", None, ExtensionSpec::formula("-4", "-3")),
                source("b", None, ExtensionSpec::formula("2", "1")),
            ],
        ));

        let formula = merged.merged_formula().unwrap();
        assert_eq!(formula.dice, 2);
        assert_eq!(formula.add, -2);
    }

    #[test]
    fn overflowing_sum_fails_only_that_bucket() {
        let report = merge(
            &actor(),
            &ExpressionEvaluator,
            vec![
                bucket(
                    ExtensionKind::Damage,
                    false,
                    vec![
                        source("a", None, ExtensionSpec::formula("0", "9223372036854775807")),
                        source("b", None, ExtensionSpec::formula("0", "1")),
                    ],
                ),
                bucket(
                    ExtensionKind::Heal,
                    false,
                    vec![source("c", None, ExtensionSpec::formula("1", "1"))],
                ),
            ],
        );

        assert_eq!(report.buckets.len(), 1);
        assert_eq!(report.buckets[0].kind(), ExtensionKind::Heal);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0].error,
            RuleError::Formula {
                source: FormulaError::Overflow,
                ..
            }
        ));
    }

    #[test]
    fn each_source_uses_its_own_item_level() {
        let merged = merge_one(bucket(
            ExtensionKind::Damage,
            false,
            vec![
                source("a", Some(3), ExtensionSpec::formula("[level]", "[level]*2")),
                source("b", None, ExtensionSpec::formula("[level]", "0")),
            ],
        ));

        let formula = merged.merged_formula().unwrap();
        assert_eq!(formula.dice, 4);
        assert_eq!(formula.add, 6);
    }

    #[test]
    fn merge_is_order_independent_for_every_strategy() {
        let a = source(
            "a",
            Some(2),
            ExtensionSpec::formula("2", "1").with_flags(EffectFlags::REVIVAL),
        );
        let b = source(
            "b",
            None,
            ExtensionSpec::formula("1", "4").with_flags(EffectFlags::RESURRECT),
        );
        let c = source(
            "c",
            None,
            ExtensionSpec::formula("0", "-2").with_flags(EffectFlags::IGNORE_REDUCE),
        );

        let orders = [
            vec![a.clone(), b.clone(), c.clone()],
            vec![c.clone(), a.clone(), b.clone()],
            vec![b.clone(), c.clone(), a.clone()],
        ];
        let results: Vec<_> = orders
            .into_iter()
            .map(|sources| merge_one(bucket(ExtensionKind::Heal, false, sources)).merged)
            .collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(
            results[0],
            Some(MergedEffect::Formula(MergedFormula {
                dice: 3,
                add: 3,
                flags: EffectFlags::all(),
            }))
        );

        let poison_low = source(
            "p1",
            Some(2),
            ExtensionSpec::conditions([ConditionKind::Poisoned])
                .with_poison_rank(PoisonRank::Formula("[level]+1".into())),
        );
        let poison_high = source(
            "p2",
            None,
            ExtensionSpec::conditions([ConditionKind::Poisoned, ConditionKind::Dazed])
                .with_poison_rank(PoisonRank::Fixed(5)),
        );
        let fear = source("f", None, ExtensionSpec::conditions([ConditionKind::Fear]));

        let forward = merge_one(bucket(
            ExtensionKind::Condition,
            false,
            vec![poison_low.clone(), poison_high.clone(), fear.clone()],
        ));
        let backward = merge_one(bucket(
            ExtensionKind::Condition,
            false,
            vec![fear, poison_high, poison_low],
        ));

        assert_eq!(forward.merged, backward.merged);
        let condition = forward.merged_condition().unwrap();
        assert_eq!(condition.poison_rank, Some(5));
        assert_eq!(
            condition.types,
            BTreeSet::from([
                ConditionKind::Dazed,
                ConditionKind::Poisoned,
                ConditionKind::Fear
            ])
        );
    }

    #[test]
    fn poison_without_rank_falls_back_to_default() {
        let merged = merge_one(bucket(
            ExtensionKind::Condition,
            false,
            vec![source(
                "p",
                None,
                ExtensionSpec::conditions([ConditionKind::Poisoned])
                    .with_poison_rank(PoisonRank::Formula("[nonsense]".into())),
            )],
        ));

        assert_eq!(
            merged.merged_condition().unwrap().poison_rank,
            Some(CombatConfig::DEFAULT_POISON_RANK)
        );
    }

    #[test]
    fn custom_and_equipment_buckets_pass_through_unmerged() {
        let report = merge(
            &actor(),
            &ExpressionEvaluator,
            vec![
                bucket(
                    ExtensionKind::Damage,
                    true,
                    vec![source("a", None, ExtensionSpec::formula("bad(", ""))],
                ),
                bucket(
                    ExtensionKind::Weapon,
                    false,
                    vec![
                        source("w1", None, ExtensionSpec::default()),
                        source("w2", None, ExtensionSpec::default()),
                    ],
                ),
            ],
        );

        assert!(report.failures.is_empty());
        assert_eq!(report.buckets.len(), 2);
        assert!(report.buckets.iter().all(|b| b.merged.is_none()));
        assert_eq!(report.buckets[1].sources.len(), 2);
    }

    #[test]
    fn bad_formula_fails_only_its_bucket() {
        let report = merge(
            &actor(),
            &ExpressionEvaluator,
            vec![
                bucket(
                    ExtensionKind::Damage,
                    false,
                    vec![source("a", None, ExtensionSpec::formula("2 +", "0"))],
                ),
                bucket(
                    ExtensionKind::Heal,
                    false,
                    vec![source("b", None, ExtensionSpec::formula("1", "1"))],
                ),
            ],
        );

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key.kind, ExtensionKind::Damage);
        assert_eq!(report.buckets.len(), 1);
        assert_eq!(report.buckets[0].kind(), ExtensionKind::Heal);
    }
}
