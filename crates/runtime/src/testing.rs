//! Scripted port implementations for tests and demos.
//!
//! Each double answers from a queue and falls back to a fixed default once
//! the queue runs dry, and records what it was asked.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;

use combat_core::{
    ActorId, AttackBaseline, ConditionKind, Dice, ExtensionBucket, ItemId, ItemState,
};

use crate::api::{
    ConditionSelection, ConfirmRequest, CustomFormula, DamageOptions, DefenseDeclaration,
    MacroRunner, Prompt, Result, RuntimeError,
};
use crate::protocol::{DefenseRequest, Envelope, LoopbackBus, Message, MessageBus};

fn next<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    queue.lock().ok()?.pop_front()
}

/// Prompt that replays queued answers.
///
/// Defaults once a queue is empty: confirm, no custom formula, no selection,
/// plain defense, plain damage options, equip everything.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    confirms: Mutex<VecDeque<bool>>,
    formulas: Mutex<VecDeque<Option<CustomFormula>>>,
    selections: Mutex<VecDeque<Option<ConditionSelection>>>,
    defenses: Mutex<VecDeque<Option<DefenseDeclaration>>>,
    damage: Mutex<VecDeque<Option<DamageOptions>>>,
    confirm_calls: AtomicUsize,
    selection_calls: AtomicUsize,
    defense_calls: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_confirm(self, answer: bool) -> Self {
        push(&self.confirms, answer);
        self
    }

    /// `None` cancels the dialog.
    pub fn with_formula(self, formula: Option<CustomFormula>) -> Self {
        push(&self.formulas, formula);
        self
    }

    pub fn with_selection(self, selection: Option<ConditionSelection>) -> Self {
        push(&self.selections, selection);
        self
    }

    pub fn with_defense(self, defense: Option<DefenseDeclaration>) -> Self {
        push(&self.defenses, defense);
        self
    }

    pub fn with_damage_options(self, options: Option<DamageOptions>) -> Self {
        push(&self.damage, options);
        self
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn selection_calls(&self) -> usize {
        self.selection_calls.load(Ordering::SeqCst)
    }

    pub fn defense_calls(&self) -> usize {
        self.defense_calls.load(Ordering::SeqCst)
    }
}

fn push<T>(queue: &Mutex<VecDeque<T>>, value: T) {
    if let Ok(mut queue) = queue.lock() {
        queue.push_back(value);
    }
}

#[async_trait]
impl Prompt for ScriptedPrompt {
    async fn confirm(&self, _request: &ConfirmRequest) -> bool {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.confirms).unwrap_or(true)
    }

    async fn custom_formula(&self, _bucket: &ExtensionBucket) -> Option<CustomFormula> {
        next(&self.formulas).flatten()
    }

    async fn select_condition(
        &self,
        _kind: ConditionKind,
        _candidates: &[ActorId],
    ) -> Option<ConditionSelection> {
        self.selection_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.selections).flatten()
    }

    async fn damage_options(
        &self,
        _attack_total: i64,
        _baseline: &AttackBaseline,
    ) -> Option<DamageOptions> {
        next(&self.damage).unwrap_or(Some(DamageOptions::default()))
    }

    async fn declare_defense(&self, _request: &DefenseRequest) -> Option<DefenseDeclaration> {
        self.defense_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.defenses).unwrap_or(Some(DefenseDeclaration::default()))
    }

    async fn select_equipment(&self, _target: &ActorId, created: &[ItemState]) -> Vec<ItemId> {
        created.iter().map(|item| item.id.clone()).collect()
    }
}

/// Bus that records every emitted envelope and still delivers it.
#[derive(Default)]
pub struct RecordingBus {
    sent: Mutex<Vec<Envelope>>,
    inner: LoopbackBus,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.sent()
            .into_iter()
            .map(|envelope| envelope.message)
            .collect()
    }
}

impl MessageBus for RecordingBus {
    fn emit(&self, envelope: Envelope) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| RuntimeError::LockPoisoned("recording bus"))?
            .push(envelope.clone());
        self.inner.emit(envelope)
    }

    fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.inner.subscribe()
    }
}

/// Dice that always land on the same faces.
#[derive(Debug)]
pub struct FixedDice {
    faces: Vec<u32>,
    cursor: AtomicUsize,
}

impl FixedDice {
    /// Every die shows `face`, clamped to the die's sides.
    pub fn constant(face: u32) -> Self {
        Self::sequence(vec![face])
    }

    /// Dice cycle through `faces`.
    pub fn sequence(faces: Vec<u32>) -> Self {
        Self {
            faces: if faces.is_empty() { vec![1] } else { faces },
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Dice for FixedDice {
    fn roll_die(&self, sides: u32) -> u32 {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.faces.len();
        self.faces[index].clamp(1, sides.max(1))
    }
}

/// Macro runner that records each invocation.
#[derive(Debug, Default)]
pub struct RecordingMacros {
    calls: Mutex<Vec<(String, ActorId, Vec<ActorId>)>>,
}

impl RecordingMacros {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(String, ActorId, Vec<ActorId>)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MacroRunner for RecordingMacros {
    async fn run(&self, name: &str, actor: &ActorId, targets: &[ActorId]) -> Result<()> {
        self.calls
            .lock()
            .map_err(|_| RuntimeError::LockPoisoned("recording macros"))?
            .push((name.to_owned(), actor.clone(), targets.to_vec()));
        Ok(())
    }
}
