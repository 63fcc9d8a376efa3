//! Awaitable operator prompts.
//!
//! Every interactive step of a resolution is a call on [`Prompt`]. Returning
//! `None` means the operator cancelled; callers abort only the bucket or
//! batch that asked. There is no timeout.
use async_trait::async_trait;

use combat_core::{
    ActorId, AttackBaseline, BerserkMode, ConditionKind, ExtensionBucket, ItemId, ItemState,
};

use crate::protocol::DefenseRequest;

/// Yes/no confirmation shown to the authority before applying a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmRequest {
    pub title: String,
    pub body: String,
}

impl ConfirmRequest {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Manually entered dice/add formulas for a custom bucket.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomFormula {
    pub dice: String,
    pub add: String,
}

impl CustomFormula {
    pub fn new(dice: impl Into<String>, add: impl Into<String>) -> Self {
        Self {
            dice: dice.into(),
            add: add.into(),
        }
    }
}

/// Answer to a hatred/fear/berserk selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConditionSelection {
    /// Hated or feared actor.
    Target(ActorId),
    Berserk(BerserkMode),
}

/// Operator adjustments to a damage roll.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DamageOptions {
    pub extra_dice: i64,
    pub extra_add: i64,
    /// Declared penetrate; `None` keeps the attacker's baseline.
    pub penetrate: Option<i64>,
}

/// A target's answer to a defense dialog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DefenseDeclaration {
    pub guarding: bool,
    /// Covering multiplier; 0 when not covering.
    pub covering: u32,
}

/// Operator prompt port.
#[async_trait]
pub trait Prompt: Send + Sync {
    async fn confirm(&self, request: &ConfirmRequest) -> bool;

    /// Asks for the formulas of a custom heal/damage bucket.
    async fn custom_formula(&self, bucket: &ExtensionBucket) -> Option<CustomFormula>;

    /// Asks once per batch for the detail of a selection condition.
    async fn select_condition(
        &self,
        kind: ConditionKind,
        candidates: &[ActorId],
    ) -> Option<ConditionSelection>;

    async fn damage_options(
        &self,
        attack_total: i64,
        baseline: &AttackBaseline,
    ) -> Option<DamageOptions>;

    /// Asked on the target owner's side. `None` declares no guard and no cover.
    async fn declare_defense(&self, request: &DefenseRequest) -> Option<DefenseDeclaration>;

    /// Picks which freshly created items the target equips.
    async fn select_equipment(&self, target: &ActorId, created: &[ItemState]) -> Vec<ItemId>;
}

/// Non-interactive prompt for headless sessions.
///
/// Accepts every confirmation, declines free-form input, picks the first
/// candidate for selections, guards every defense and equips everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoPrompt;

#[async_trait]
impl Prompt for AutoPrompt {
    async fn confirm(&self, _request: &ConfirmRequest) -> bool {
        true
    }

    async fn custom_formula(&self, _bucket: &ExtensionBucket) -> Option<CustomFormula> {
        None
    }

    async fn select_condition(
        &self,
        kind: ConditionKind,
        candidates: &[ActorId],
    ) -> Option<ConditionSelection> {
        match kind {
            ConditionKind::Berserk => Some(ConditionSelection::Berserk(BerserkMode::Release)),
            _ => candidates.first().cloned().map(ConditionSelection::Target),
        }
    }

    async fn damage_options(
        &self,
        _attack_total: i64,
        _baseline: &AttackBaseline,
    ) -> Option<DamageOptions> {
        Some(DamageOptions::default())
    }

    async fn declare_defense(&self, _request: &DefenseRequest) -> Option<DefenseDeclaration> {
        Some(DefenseDeclaration {
            guarding: true,
            covering: 0,
        })
    }

    async fn select_equipment(&self, _target: &ActorId, created: &[ItemState]) -> Vec<ItemId> {
        created.iter().map(|item| item.id.clone()).collect()
    }
}
