mod common;

use std::sync::Arc;

use async_trait::async_trait;
use combat_core::{
    ActorId, ActorState, AttackBaseline, BucketKey, ConditionDetail, ConditionKind,
    ExtensionBucket, ExtensionKind, ExtensionSpec, ItemId, ItemState, ResourceMeter, TargetScope,
    Timing,
};
use combat_runtime::protocol::{AfterMainEntry, DefenseRequest};
use combat_runtime::testing::{FixedDice, RecordingBus, ScriptedPrompt};
use combat_runtime::{
    AfterMainQueue, AutoPrompt, CombatEvent, ConditionSelection, ConfirmRequest, CustomFormula,
    DamageOptions, DefenseDeclaration, Event, InMemorySettings, Prompt, QueueEvent, Session,
    SessionConfig, SettingsStore, Topic,
};

use common::*;

fn ghost() -> ActorId {
    ActorId::new("ghost")
}

#[tokio::test]
async fn after_main_buckets_wait_for_the_round_boundary() {
    let mut state = arena();
    give(
        &mut state,
        &pc(),
        item_with(
            "salve",
            ExtensionKind::Heal,
            ExtensionSpec::formula("1", "0").at(Timing::AfterMain),
        ),
    );
    let session = authority(state, Arc::new(ScriptedPrompt::new()));

    let pass = session
        .executor()
        .process_extensions(&pc(), &ItemId::new("salve"), Timing::Instant, &[npc()])
        .await
        .unwrap();

    assert_eq!(pass.enqueued.len(), 1);
    assert!(pass.executed.is_empty());
    assert_eq!(hp(&session, &npc()).await, 10);
    let queue = AfterMainQueue::new(Arc::clone(&session.context().settings));
    assert_eq!(queue.len().unwrap(), 1);
}

#[tokio::test]
async fn drain_runs_in_insertion_order_and_skips_stale_entries() {
    let mut state = arena();
    state.insert(ActorState::new("ghost", "Ghost", ResourceMeter::full(5)));
    give(
        &mut state,
        &pc(),
        item_with(
            "salve",
            ExtensionKind::Heal,
            ExtensionSpec::formula("1", "0").at(Timing::AfterMain),
        ),
    );
    give(
        &mut state,
        &ghost(),
        item_with(
            "hex",
            ExtensionKind::Damage,
            ExtensionSpec::formula("1", "0").at(Timing::AfterMain),
        ),
    );
    give(
        &mut state,
        &pc(),
        item_with(
            "venom",
            ExtensionKind::Condition,
            ExtensionSpec::conditions([ConditionKind::Poisoned]).at(Timing::AfterMain),
        ),
    );
    let session = authority(state, Arc::new(ScriptedPrompt::new()));
    let executor = session.executor();

    for (actor, item) in [(pc(), "salve"), (ghost(), "hex"), (pc(), "venom")] {
        executor
            .process_extensions(&actor, &ItemId::new(item), Timing::Instant, &[npc()])
            .await
            .unwrap();
    }
    session.state().write().await.remove(&ghost());

    let mut combat = session.subscribe(Topic::Combat);
    let mut queue_events = session.subscribe(Topic::Queue);
    let report = session.begin_round().await.unwrap();

    assert_eq!(report.executed, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(hp(&session, &npc()).await, 15);

    let state = session.state().read().await;
    let poisoned = state
        .actor(&npc())
        .unwrap()
        .conditions
        .get(ConditionKind::Poisoned)
        .unwrap();
    assert_eq!(poisoned.detail, ConditionDetail::Poison { rank: 1 });
    drop(state);

    let mut order = Vec::new();
    while let Ok(Event::Combat(event)) = combat.try_recv() {
        order.push(match event {
            CombatEvent::Healed { .. } => "healed",
            CombatEvent::Damaged { .. } => "damaged",
            CombatEvent::ConditionApplied { .. } => "condition",
            _ => "other",
        });
    }
    assert_eq!(order, vec!["healed", "condition"]);

    let queue = AfterMainQueue::new(Arc::clone(&session.context().settings));
    assert!(queue.is_empty().unwrap());
    let mut drained = false;
    while let Ok(event) = queue_events.try_recv() {
        drained |= matches!(event, Event::Queue(QueueEvent::AfterMainDrained { .. }));
    }
    assert!(drained);
}

#[tokio::test]
async fn end_combat_drops_pending_entries_without_running_them() {
    let mut state = arena();
    give(
        &mut state,
        &pc(),
        item_with(
            "hex",
            ExtensionKind::Damage,
            ExtensionSpec::formula("2", "0").at(Timing::AfterMain),
        ),
    );
    let session = authority(state, Arc::new(ScriptedPrompt::new()));

    session.start_combat().await.unwrap();
    session
        .executor()
        .process_extensions(&pc(), &ItemId::new("hex"), Timing::Instant, &[npc()])
        .await
        .unwrap();
    session.end_combat().await.unwrap();

    let report = session.begin_round().await.unwrap();
    assert_eq!(report.executed, 0);
    assert_eq!(hp(&session, &npc()).await, 10);
}

#[tokio::test]
async fn player_drain_is_a_no_op() {
    let bus = Arc::new(RecordingBus::new());
    let session = player(arena(), bus.clone());

    let report = session.begin_round().await.unwrap();

    assert_eq!(report, Default::default());
    assert!(bus.sent().is_empty());
}

/// Enqueues `late` the first time a custom formula is asked for, as a
/// request handled mid-drain would.
struct EnqueueOnCustom {
    queue: AfterMainQueue,
    late: std::sync::Mutex<Option<AfterMainEntry>>,
}

#[async_trait]
impl Prompt for EnqueueOnCustom {
    async fn confirm(&self, request: &ConfirmRequest) -> bool {
        AutoPrompt.confirm(request).await
    }

    async fn custom_formula(&self, _bucket: &ExtensionBucket) -> Option<CustomFormula> {
        if let Some(entry) = self.late.lock().unwrap().take() {
            self.queue.push(entry).unwrap();
        }
        Some(CustomFormula::new("0", "1"))
    }

    async fn select_condition(
        &self,
        kind: ConditionKind,
        candidates: &[ActorId],
    ) -> Option<ConditionSelection> {
        AutoPrompt.select_condition(kind, candidates).await
    }

    async fn damage_options(
        &self,
        attack_total: i64,
        baseline: &AttackBaseline,
    ) -> Option<DamageOptions> {
        AutoPrompt.damage_options(attack_total, baseline).await
    }

    async fn declare_defense(&self, request: &DefenseRequest) -> Option<DefenseDeclaration> {
        AutoPrompt.declare_defense(request).await
    }

    async fn select_equipment(&self, target: &ActorId, created: &[ItemState]) -> Vec<ItemId> {
        AutoPrompt.select_equipment(target, created).await
    }
}

#[tokio::test]
async fn entries_enqueued_during_a_drain_wait_for_the_next_round() {
    let mut state = arena();
    give(
        &mut state,
        &pc(),
        item_with(
            "surge",
            ExtensionKind::Heal,
            ExtensionSpec::formula("", "")
                .at(Timing::AfterMain)
                .targeting(TargetScope::SelfOnly)
                .custom(),
        ),
    );
    let settings = Arc::new(InMemorySettings::new());
    let queue = AfterMainQueue::new(settings.clone() as Arc<dyn SettingsStore>);
    let late = AfterMainEntry {
        kind: ExtensionKind::Heal,
        actor_id: pc(),
        item_id: ItemId::new("late"),
        bucket: ExtensionBucket::new(BucketKey {
            kind: ExtensionKind::Heal,
            timing: Timing::AfterMain,
            target: TargetScope::SelfOnly,
            parent_timing: Timing::Instant,
            custom: false,
        }),
        targets: Vec::new(),
    };
    let prompt = Arc::new(EnqueueOnCustom {
        queue: queue.clone(),
        late: std::sync::Mutex::new(Some(late)),
    });
    let session = Session::builder(gm(), gm())
        .config(SessionConfig::default())
        .state(state)
        .prompt(prompt as Arc<dyn Prompt>)
        .dice(Arc::new(FixedDice::constant(5)))
        .settings(settings as Arc<dyn SettingsStore>)
        .build();

    session
        .executor()
        .process_extensions(&pc(), &ItemId::new("surge"), Timing::Instant, &[])
        .await
        .unwrap();
    let report = session.begin_round().await.unwrap();

    assert_eq!(report.executed, 1);
    assert_eq!(hp(&session, &pc()).await, 21);
    let pending = queue.entries().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].item_id, ItemId::new("late"));
}
