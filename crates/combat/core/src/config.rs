/// Combat rule constants and tunable parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombatConfig {
    /// Dice removed from an attack pool while the attacker is dazed.
    pub dazed_dice_penalty: u32,
    /// Flat modifier added to a damage roll while the attacker is afraid.
    pub fear_damage_penalty: i64,
}

impl CombatConfig {
    // ===== compile-time constants used as type parameters =====
    pub const MAX_CONDITIONS: usize = 12;

    // ===== rule constants =====
    /// Level used for formula evaluation when an item carries none.
    pub const DEFAULT_ITEM_LEVEL: u32 = 1;
    pub const ATTACK_DIE_SIDES: u32 = 10;
    pub const DAMAGE_DIE_SIDES: u32 = 10;
    pub const HEAL_DIE_SIDES: u32 = 10;
    /// Lowest critical value an attack pool may use.
    pub const MIN_CRITICAL: u32 = 2;
    /// Critical value of an item that declares none.
    pub const DEFAULT_CRITICAL: u32 = 10;
    /// Poison rank applied when no source declares an evaluable one.
    pub const DEFAULT_POISON_RANK: i64 = 1;

    // ===== runtime-tunable defaults =====
    pub const DEFAULT_DAZED_DICE_PENALTY: u32 = 2;
    pub const DEFAULT_FEAR_DAMAGE_PENALTY: i64 = -2;

    pub fn new() -> Self {
        Self {
            dazed_dice_penalty: Self::DEFAULT_DAZED_DICE_PENALTY,
            fear_damage_penalty: Self::DEFAULT_FEAR_DAMAGE_PENALTY,
        }
    }

    pub fn with_penalties(dazed_dice_penalty: u32, fear_damage_penalty: i64) -> Self {
        Self {
            dazed_dice_penalty,
            fear_damage_penalty,
        }
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self::new()
    }
}
