mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use combat_core::{
    AttackProfile, AttributeKey, ConditionDetail, ConditionKind, DisableMode, EffectFlags,
    EquipmentCreation, ExtensionKind, ExtensionSpec, HealBlockReason, ItemId, MergedFormula,
    ResourceMeter, RuleError, TargetScope, Timing, UsageCounter,
};
use combat_runtime::protocol::{AttributeGrant, ConditionGrant};
use combat_runtime::testing::{RecordingBus, ScriptedPrompt};
use combat_runtime::{
    CombatEvent, ConditionSelection, CustomFormula, Event, Message, RuntimeError, Topic,
};

use common::*;

fn formula(dice: i64, add: i64, flags: EffectFlags) -> MergedFormula {
    MergedFormula { dice, add, flags }
}

#[tokio::test]
async fn cancelled_custom_bucket_aborts_only_itself() {
    let mut state = arena();
    give(
        &mut state,
        &pc(),
        item_with(
            "surge",
            ExtensionKind::Heal,
            ExtensionSpec::formula("", "")
                .targeting(TargetScope::SelfOnly)
                .custom(),
        )
        .with_extension(ExtensionKind::Damage, ExtensionSpec::formula("1", "0")),
    );
    let prompt = Arc::new(ScriptedPrompt::new().with_formula(None));
    let session = authority(state, prompt);

    let pass = session
        .executor()
        .process_extensions(&pc(), &ItemId::new("surge"), Timing::Instant, &[npc()])
        .await
        .unwrap();

    assert_eq!(pass.executed.len(), 1);
    assert_eq!(pass.executed[0].kind, ExtensionKind::Damage);
    assert_eq!(pass.failures.len(), 1);
    assert!(matches!(pass.failures[0].1, RuntimeError::UserInput(_)));
    assert_eq!(hp(&session, &npc()).await, 5);
    assert_eq!(hp(&session, &pc()).await, 20);
}

#[tokio::test]
async fn custom_formula_is_evaluated_with_the_item_level() {
    let mut state = arena();
    give(
        &mut state,
        &pc(),
        item_with(
            "surge",
            ExtensionKind::Heal,
            ExtensionSpec::formula("", "")
                .targeting(TargetScope::SelfOnly)
                .custom(),
        )
        .with_level(3),
    );
    let prompt = Arc::new(
        ScriptedPrompt::new().with_formula(Some(CustomFormula::new("1", "[level]"))),
    );
    let session = authority(state, prompt);

    session
        .executor()
        .process_extensions(&pc(), &ItemId::new("surge"), Timing::Instant, &[])
        .await
        .unwrap();

    // 1d10 on a five plus level 3.
    assert_eq!(hp(&session, &pc()).await, 28);
}

#[tokio::test]
async fn selected_target_bucket_without_targets_fails_alone() {
    let mut state = arena();
    give(
        &mut state,
        &pc(),
        item_with("jab", ExtensionKind::Damage, ExtensionSpec::formula("1", "0")).with_extension(
            ExtensionKind::Heal,
            ExtensionSpec::formula("1", "0").targeting(TargetScope::SelfOnly),
        ),
    );
    let session = authority(state, Arc::new(ScriptedPrompt::new()));

    let pass = session
        .executor()
        .process_extensions(&pc(), &ItemId::new("jab"), Timing::Instant, &[])
        .await
        .unwrap();

    assert_eq!(pass.failures.len(), 1);
    assert_eq!(pass.executed.len(), 1);
    assert_eq!(hp(&session, &pc()).await, 25);
}

#[tokio::test]
async fn heal_on_a_downed_target_needs_revival() {
    let mut state = arena();
    if let Some(grunt) = state.actor_mut(&npc()) {
        grunt.hp = ResourceMeter::new(0, 30);
        grunt.encroachment = 40;
    }
    let session = authority(state, Arc::new(ScriptedPrompt::new()));
    let mut combat = session.subscribe(Topic::Combat);
    let executor = session.executor();

    executor
        .execute_heal_now(&pc(), "Salve", &[npc()], formula(1, 0, EffectFlags::empty()), true)
        .await
        .unwrap();
    assert_eq!(hp(&session, &npc()).await, 0);
    assert!(matches!(
        combat.try_recv(),
        Ok(Event::Combat(CombatEvent::HealBlocked {
            reason: HealBlockReason::Incapacitated,
            ..
        }))
    ));

    executor
        .execute_heal_now(
            &pc(),
            "Rebirth",
            &[npc()],
            formula(1, 0, EffectFlags::REVIVAL | EffectFlags::RESURRECT),
            true,
        )
        .await
        .unwrap();
    let state = session.state().read().await;
    let grunt = state.actor(&npc()).unwrap();
    assert_eq!(grunt.hp.current, 5);
    assert_eq!(grunt.encroachment, 45);
}

#[tokio::test]
async fn selection_conditions_prompt_once_per_batch() {
    let mut state = arena();
    give(
        &mut state,
        &pc(),
        item_with(
            "taunt",
            ExtensionKind::Condition,
            ExtensionSpec::conditions([ConditionKind::Hatred, ConditionKind::Dazed]),
        ),
    );
    let prompt =
        Arc::new(ScriptedPrompt::new().with_selection(Some(ConditionSelection::Target(pc()))));
    let session = authority(state, prompt.clone());

    session
        .executor()
        .process_extensions(&pc(), &ItemId::new("taunt"), Timing::Instant, &[npc()])
        .await
        .unwrap();

    assert_eq!(prompt.selection_calls(), 1);
    let state = session.state().read().await;
    let grunt = state.actor(&npc()).unwrap();
    assert_eq!(
        grunt.conditions.get(ConditionKind::Hatred).unwrap().detail,
        ConditionDetail::Hatred { target: pc() }
    );
    assert!(grunt.conditions.has(ConditionKind::Dazed));
}

#[tokio::test]
async fn repeated_condition_is_not_announced_twice() {
    let session = authority(arena(), Arc::new(ScriptedPrompt::new()));
    let mut combat = session.subscribe(Topic::Combat);
    let executor = session.executor();
    let grant = ConditionGrant::new(
        ConditionKind::Poisoned,
        ConditionDetail::Poison { rank: 2 },
    );

    for _ in 0..2 {
        executor
            .execute_condition_now(&pc(), "Venom", &[npc()], grant.clone(), true)
            .await
            .unwrap();
    }

    let mut announced = 0;
    while let Ok(event) = combat.try_recv() {
        if matches!(event, Event::Combat(CombatEvent::ConditionApplied { .. })) {
            announced += 1;
        }
    }
    assert_eq!(announced, 1);
}

#[tokio::test]
async fn player_sends_several_conditions_as_one_bulk_request() {
    let mut state = arena();
    give(
        &mut state,
        &pc(),
        item_with(
            "venom",
            ExtensionKind::Condition,
            ExtensionSpec::conditions([ConditionKind::Poisoned, ConditionKind::Dazed]),
        ),
    );
    let bus = Arc::new(RecordingBus::new());
    let session = player(state, bus.clone());

    session
        .executor()
        .process_extensions(&pc(), &ItemId::new("venom"), Timing::Instant, &[npc()])
        .await
        .unwrap();

    let messages = bus.messages();
    assert_eq!(messages.len(), 1);
    let Message::ConditionRequestBulk(request) = &messages[0] else {
        panic!("expected a bulk condition request, got {:?}", messages[0]);
    };
    assert_eq!(request.grants.len(), 2);
    assert_eq!(request.targets, vec![npc()]);
}

#[tokio::test]
async fn exhausted_usage_sends_nothing_until_the_round_resets() {
    let mut state = arena();
    give(
        &mut state,
        &pc(),
        item_with("burst", ExtensionKind::Damage, ExtensionSpec::formula("1", "0"))
            .with_usage(UsageCounter::limited(1, DisableMode::Round)),
    );
    let session = authority(state, Arc::new(ScriptedPrompt::new()));
    let executor = session.executor();
    let burst = ItemId::new("burst");

    executor.process_usage_cost(&pc(), &burst).await.unwrap();
    let exhausted = executor.process_usage_cost(&pc(), &burst).await;
    assert!(matches!(
        exhausted,
        Err(RuntimeError::Rule(RuleError::UsageExhausted { .. }))
    ));

    session.begin_round().await.unwrap();
    executor.process_usage_cost(&pc(), &burst).await.unwrap();
}

#[tokio::test]
async fn equipment_extension_creates_and_equips_temporary_items() {
    let mut state = arena();
    give(
        &mut state,
        &pc(),
        item_with(
            "forge",
            ExtensionKind::Weapon,
            ExtensionSpec::equipment(EquipmentCreation::new(
                "Spirit Blade",
                AttackProfile {
                    guard: 4,
                    ..AttackProfile::default()
                },
            ))
            .targeting(TargetScope::SelfOnly),
        ),
    );
    let session = authority(state, Arc::new(ScriptedPrompt::new()));

    session
        .executor()
        .process_extensions(&pc(), &ItemId::new("forge"), Timing::Instant, &[])
        .await
        .unwrap();

    let state = session.state().read().await;
    let hero = state.actor(&pc()).unwrap();
    let created = hero.item(&ItemId::new("forge@pc")).unwrap();
    assert_eq!(created.name, "Spirit Blade");
    assert!(created.temporary);
    assert!(created.equipped);
    assert_eq!(hero.temporary_guard(), 4);
}

#[tokio::test]
async fn applying_attributes_twice_updates_the_same_entry() {
    let session = authority(arena(), Arc::new(ScriptedPrompt::new()));
    let executor = session.executor();
    let grant = |value: i64| AttributeGrant {
        actor: pc(),
        item: None,
        name: "Rally".into(),
        targets: vec![npc()],
        attributes: BTreeMap::from([(AttributeKey::Attack, value)]),
        skip_dialog: true,
    };

    executor.apply_to_targets(grant(1)).await.unwrap();
    executor.apply_to_targets(grant(3)).await.unwrap();

    let state = session.state().read().await;
    let grunt = state.actor(&npc()).unwrap();
    assert_eq!(grunt.applied.len(), 1);
    assert_eq!(grunt.applied["pc:Rally"].attributes[&AttributeKey::Attack], 3);
}
