//! Headless combat demo.
//!
//! Runs an authority session and one player session in the same process,
//! connected through a loopback bus, and plays a single attack with deferred
//! riders followed by a round boundary.
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use combat_core::{
    ActorId, ActorState, AttackProfile, CombatAttributes, CombatState, ExtensionKind,
    ExtensionSpec, ItemId, ItemKind, ItemState, ParticipantId, PcgDice, ResourceMeter,
    TargetScope, Timing,
};
use combat_runtime::{
    Event, LoopbackBus, MessageBus, QueueEvent, Session, SessionConfig, SharedState, Topic,
};
use tokio::sync::{RwLock, broadcast};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const FINALIZE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    setup_logging();

    let config = SessionConfig::from_env();
    let seed = std::env::var("COMBAT_DICE_SEED")
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(7);

    let gm = ParticipantId::new("gm");
    let alice = ParticipantId::new("alice");
    let state: SharedState = Arc::new(RwLock::new(demo_state()));
    let bus = Arc::new(LoopbackBus::new(config.bus_buffer_size));

    let authority = Arc::new(
        Session::builder(gm.clone(), gm.clone())
            .config(config.clone())
            .shared_state(Arc::clone(&state))
            .dice(Arc::new(PcgDice::new(seed)))
            .bus(bus.clone() as Arc<dyn MessageBus>)
            .build(),
    );
    let player = Session::builder(alice, gm)
        .config(config)
        .shared_state(state)
        .dice(Arc::new(PcgDice::new(seed.wrapping_add(1))))
        .bus(bus.clone() as Arc<dyn MessageBus>)
        .build();

    let mut queue_events = authority.subscribe(Topic::Queue);
    let mut combat_events = authority.subscribe(Topic::Combat);
    let inbox = bus.subscribe();
    let worker = {
        let authority = Arc::clone(&authority);
        tokio::spawn(async move { authority.run(inbox).await })
    };

    authority.start_combat().await?;

    let hero = ActorId::new("hero");
    let grunt = ActorId::new("grunt");
    let sword = ItemId::new("runesword");

    let pass = player
        .executor()
        .process_extensions(&hero, &sword, Timing::Instant, &[grunt.clone()])
        .await?;
    tracing::info!(
        executed = pass.executed.len(),
        deferred = pass.deferred.len(),
        enqueued = pass.enqueued.len(),
        "Extensions processed"
    );

    let resolver = player.resolver();
    let attack = resolver.resolve_attack_roll(&hero, &sword).await?;
    tracing::info!(total = attack.outcome.total, "Attack rolled");
    let damage = resolver.resolve_damage_roll(&hero, &sword, &attack).await?;
    tracing::info!(total = damage.outcome.total, "Damage rolled");
    resolver
        .announce_damage(&damage, &[grunt.clone()], pass.deferred, None)
        .await?;

    wait_for_finalize(&mut queue_events)
        .await
        .context("after-damage riders never finalized")?;

    let report = authority.begin_round().await?;
    tracing::info!(
        executed = report.executed,
        skipped = report.skipped,
        failed = report.failed,
        "Round started"
    );

    while let Ok(event) = combat_events.try_recv() {
        tracing::info!(?event, "Combat event");
    }

    {
        let state = authority.state().read().await;
        for actor in [&hero, &grunt] {
            if let Some(actor) = state.actor(actor) {
                tracing::info!(
                    actor = %actor.id,
                    hp = actor.hp.current,
                    max = actor.hp.maximum,
                    "Final state"
                );
            }
        }
    }

    authority.end_combat().await?;
    worker.abort();
    Ok(())
}

async fn wait_for_finalize(events: &mut broadcast::Receiver<Event>) -> Result<()> {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(Event::Queue(QueueEvent::AfterDamageFinalized { .. })) => return Ok(()),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => bail!("event bus closed"),
            }
        }
    };
    tokio::time::timeout(FINALIZE_TIMEOUT, wait).await?
}

/// Alice's hero with a rune sword against an unowned grunt.
fn demo_state() -> CombatState {
    let sword = ItemState::new("runesword", "Rune Sword", ItemKind::Weapon)
        .with_attack(AttackProfile {
            dice: 2,
            attack: 4,
            ..AttackProfile::default()
        })
        .with_extension(
            ExtensionKind::Damage,
            ExtensionSpec::formula("1", "2").at(Timing::AfterDamage),
        )
        .with_extension(
            ExtensionKind::Heal,
            ExtensionSpec::formula("1", "0")
                .at(Timing::AfterMain)
                .targeting(TargetScope::SelfOnly),
        );

    let mut hero = ActorState::new("hero", "Hero", ResourceMeter::new(18, 30))
        .with_owner("alice")
        .with_attributes(CombatAttributes {
            dice: 3,
            attack: 1,
            ..CombatAttributes::default()
        });
    hero.items.insert(sword.id.clone(), sword);

    CombatState::new()
        .with_actor(hero)
        .with_actor(ActorState::new("grunt", "Grunt", ResourceMeter::full(40)))
}

fn setup_logging() {
    let env_filter =
        EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();
}
