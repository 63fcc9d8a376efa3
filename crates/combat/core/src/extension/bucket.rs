//! Grouping of raw extension descriptors into execution buckets.

use std::collections::BTreeMap;

use super::merge::{MergedCondition, MergedEffect, MergedFormula};
use super::timing::{classify, parent_timing};
use super::{ExtensionKind, ExtensionSpec, TargetScope, Timing};
use crate::state::{ActorId, ActorState, ItemId, ItemState};

/// One contributing item's view into a bucket. Immutable once captured.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtensionSource {
    pub item_id: ItemId,
    pub item_name: String,
    pub actor_id: ActorId,
    /// Level context of the contributing item.
    pub level: Option<u32>,
    pub spec: ExtensionSpec,
}

/// A raw extension descriptor before grouping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionDescriptor {
    pub kind: ExtensionKind,
    /// Effective phase after classification.
    pub timing: Timing,
    pub target: TargetScope,
    pub parent_timing: Timing,
    pub source: ExtensionSource,
}

impl ExtensionDescriptor {
    pub fn key(&self) -> BucketKey {
        BucketKey {
            kind: self.kind,
            timing: self.timing,
            target: self.target,
            parent_timing: self.parent_timing,
            custom: self.source.spec.custom,
        }
    }
}

/// Composite grouping key of a bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BucketKey {
    pub kind: ExtensionKind,
    pub timing: Timing,
    pub target: TargetScope,
    pub parent_timing: Timing,
    pub custom: bool,
}

/// The unit of execution: same-phase, same-target contributions.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtensionBucket {
    pub key: BucketKey,
    pub sources: Vec<ExtensionSource>,
    /// `None` until merged, and always `None` for custom and equipment buckets.
    pub merged: Option<MergedEffect>,
}

impl ExtensionBucket {
    pub fn new(key: BucketKey) -> Self {
        Self {
            key,
            sources: Vec::new(),
            merged: None,
        }
    }

    pub fn kind(&self) -> ExtensionKind {
        self.key.kind
    }

    pub fn timing(&self) -> Timing {
        self.key.timing
    }

    pub fn target(&self) -> TargetScope {
        self.key.target
    }

    pub fn is_custom(&self) -> bool {
        self.key.custom
    }

    pub fn merged_formula(&self) -> Option<&MergedFormula> {
        match &self.merged {
            Some(MergedEffect::Formula(formula)) => Some(formula),
            _ => None,
        }
    }

    pub fn merged_condition(&self) -> Option<&MergedCondition> {
        match &self.merged {
            Some(MergedEffect::Condition(condition)) => Some(condition),
            _ => None,
        }
    }

    /// Comma-joined names of the contributing items.
    pub fn source_names(&self) -> String {
        self.sources
            .iter()
            .map(|source| source.item_name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Collects the active extensions of a triggering item and its components.
///
/// Components missing from the actor are skipped. Every descriptor carries
/// the triggering item's runtime timing as its parent timing.
pub fn collect_descriptors(actor: &ActorState, trigger: &ItemState) -> Vec<ExtensionDescriptor> {
    let parent = parent_timing(&trigger.active);

    std::iter::once(trigger)
        .chain(trigger.components.iter().filter_map(|id| actor.item(id)))
        .flat_map(|item| {
            item.extensions
                .iter()
                .filter(|(_, spec)| spec.activate)
                .map(move |(kind, spec)| ExtensionDescriptor {
                    kind: *kind,
                    timing: classify(*kind, spec, parent),
                    target: spec.target,
                    parent_timing: parent,
                    source: ExtensionSource {
                        item_id: item.id.clone(),
                        item_name: item.name.clone(),
                        actor_id: actor.id.clone(),
                        level: item.level,
                        spec: spec.clone(),
                    },
                })
        })
        .collect()
}

/// Partitions descriptors by their composite key.
///
/// Buckets come out in key order regardless of input order; within a bucket
/// the sources keep their input order.
pub fn group(descriptors: impl IntoIterator<Item = ExtensionDescriptor>) -> Vec<ExtensionBucket> {
    let mut buckets: BTreeMap<BucketKey, ExtensionBucket> = BTreeMap::new();

    for descriptor in descriptors {
        let key = descriptor.key();
        buckets
            .entry(key)
            .or_insert_with(|| ExtensionBucket::new(key))
            .sources
            .push(descriptor.source);
    }

    buckets.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ResourceMeter;

    fn descriptor(item: &str, kind: ExtensionKind, timing: Timing, custom: bool) -> ExtensionDescriptor {
        let mut spec = ExtensionSpec::formula("1", "0").at(timing);
        spec.custom = custom;
        ExtensionDescriptor {
            kind,
            timing,
            target: TargetScope::SelectedTargets,
            parent_timing: Timing::Instant,
            source: ExtensionSource {
                item_id: ItemId::new(item),
                item_name: item.to_owned(),
                actor_id: ActorId::new("pc"),
                level: None,
                spec,
            },
        }
    }

    #[test]
    fn same_key_from_different_items_shares_a_bucket() {
        let buckets = group(vec![
            descriptor("a", ExtensionKind::Heal, Timing::Instant, false),
            descriptor("b", ExtensionKind::Heal, Timing::Instant, false),
            descriptor("c", ExtensionKind::Heal, Timing::AfterMain, false),
        ]);

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].sources.len(), 2);
        assert_eq!(buckets[1].key.timing, Timing::AfterMain);
    }

    #[test]
    fn custom_flag_splits_buckets() {
        let buckets = group(vec![
            descriptor("a", ExtensionKind::Damage, Timing::Instant, false),
            descriptor("b", ExtensionKind::Damage, Timing::Instant, true),
        ]);

        assert_eq!(buckets.len(), 2);
        assert!(buckets.iter().any(ExtensionBucket::is_custom));
    }

    #[test]
    fn grouping_ignores_input_order() {
        let forward = group(vec![
            descriptor("a", ExtensionKind::Damage, Timing::Instant, false),
            descriptor("b", ExtensionKind::Heal, Timing::AfterDamage, false),
        ]);
        let backward = group(vec![
            descriptor("b", ExtensionKind::Heal, Timing::AfterDamage, false),
            descriptor("a", ExtensionKind::Damage, Timing::Instant, false),
        ]);

        let keys = |buckets: &[ExtensionBucket]| buckets.iter().map(|b| b.key).collect::<Vec<_>>();
        assert_eq!(keys(&forward), keys(&backward));
    }

    #[test]
    fn combo_collects_component_extensions_with_parent_timing() {
        let strike = ItemState::new("strike", "Strike", crate::state::ItemKind::Effect)
            .with_extension(ExtensionKind::Damage, ExtensionSpec::formula("1", "2"));
        let venom = ItemState::new("venom", "Venom", crate::state::ItemKind::Effect)
            .with_extension(
                ExtensionKind::Condition,
                ExtensionSpec::conditions([crate::state::ConditionKind::Poisoned])
                    .at(Timing::AfterDamage),
            )
            .with_extension(ExtensionKind::Heal, ExtensionSpec::formula("1", "0").inactive());
        let combo = ItemState::new("combo", "Combo", crate::state::ItemKind::Combo)
            .with_active(crate::state::ActiveSpec {
                run_timing: Some(Timing::AfterSuccess),
                ..Default::default()
            })
            .with_components(vec![ItemId::new("strike"), ItemId::new("venom"), ItemId::new("gone")]);
        let actor = ActorState::new("pc", "PC", ResourceMeter::full(20))
            .with_item(strike)
            .with_item(venom);

        let descriptors = collect_descriptors(&actor, &combo);

        assert_eq!(descriptors.len(), 2);
        assert!(descriptors
            .iter()
            .all(|d| d.parent_timing == Timing::AfterSuccess));
        assert!(descriptors
            .iter()
            .any(|d| d.kind == ExtensionKind::Condition && d.timing == Timing::AfterDamage));
    }
}
