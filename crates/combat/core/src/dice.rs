//! Dice expressions and the roller port.
//!
//! Two shapes of roll exist: the exploding critical pool used by attack
//! judgements (`NdxC+A`) and the plain summed pool used by damage and heal
//! (`NdS+A`). Implementations of [`Dice`] only supply single die faces; the
//! expression rules live in the provided [`Dice::roll`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::CombatConfig;

/// A roll request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum DiceExpr {
    /// `count` d10; every die at or above `critical` is rolled again and each
    /// such round adds 10. Total is `10 * rerolls + highest final die + add`.
    Critical { count: u32, critical: u32, add: i64 },
    /// Sum of `count` d`sides` plus `add`.
    Pool { count: u32, sides: u32, add: i64 },
}

impl DiceExpr {
    /// `count`d10 pool, the shape of every damage and heal roll.
    pub fn d10(count: i64, add: i64) -> Self {
        Self::Pool {
            count: count.clamp(0, i64::from(u32::MAX)) as u32,
            sides: CombatConfig::DAMAGE_DIE_SIDES,
            add,
        }
    }
}

impl fmt::Display for DiceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (body, add) = match self {
            Self::Critical {
                count,
                critical,
                add,
            } => (format!("{count}dx{critical}"), *add),
            Self::Pool { count, sides, add } => (format!("{count}d{sides}"), *add),
        };
        match add {
            0 => write!(f, "{body}"),
            a if a > 0 => write!(f, "{body}+{a}"),
            a => write!(f, "{body}{a}"),
        }
    }
}

/// Result of evaluating a [`DiceExpr`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RollOutcome {
    pub total: i64,
    /// The expression as rolled, e.g. `3dx8+2`.
    pub rendered: String,
    /// Every die face in roll order, rerolls included.
    pub dice: Vec<u32>,
}

/// Dice roller.
///
/// Implementations must be safe to share between the resolver and queue
/// drains running on different tasks.
pub trait Dice: Send + Sync {
    /// Rolls one die with `sides` faces (1..=sides).
    fn roll_die(&self, sides: u32) -> u32;

    /// Evaluates a full expression.
    fn roll(&self, expr: &DiceExpr) -> RollOutcome {
        let mut faces = Vec::new();
        let total = match *expr {
            DiceExpr::Pool { count, sides, add } => {
                let mut sum = 0i64;
                for _ in 0..count {
                    let face = self.roll_die(sides.max(1));
                    faces.push(face);
                    sum = sum.saturating_add(i64::from(face));
                }
                sum.saturating_add(add)
            }
            DiceExpr::Critical {
                count,
                critical,
                add,
            } => {
                let critical = critical.max(CombatConfig::MIN_CRITICAL);
                let mut remaining = count;
                let mut base = 0i64;
                let mut last_high = 0u32;

                while remaining > 0 {
                    let mut crits = 0u32;
                    last_high = 0;
                    for _ in 0..remaining {
                        let face = self.roll_die(CombatConfig::ATTACK_DIE_SIDES);
                        faces.push(face);
                        last_high = last_high.max(face);
                        if face >= critical {
                            crits += 1;
                        }
                    }
                    if crits == 0 {
                        break;
                    }
                    base = base.saturating_add(10);
                    remaining = crits;
                }

                base.saturating_add(i64::from(last_high))
                    .saturating_add(add)
            }
        };

        RollOutcome {
            total,
            rendered: expr.to_string(),
            dice: faces,
        }
    }
}

/// PCG-XSH-RR roller with shared, advancing state.
#[derive(Debug)]
pub struct PcgDice {
    state: AtomicU64,
}

impl PcgDice {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    pub fn new(seed: u64) -> Self {
        Self {
            state: AtomicU64::new(seed),
        }
    }

    #[inline]
    fn step(state: u64) -> u64 {
        state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT)
    }

    #[inline]
    fn output(state: u64) -> u32 {
        let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
        let rot = (state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    fn next_u32(&self) -> u32 {
        let previous = match self
            .state
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |s| Some(Self::step(s)))
        {
            Ok(previous) | Err(previous) => previous,
        };
        Self::output(Self::step(previous))
    }
}

impl Default for PcgDice {
    fn default() -> Self {
        Self::new(0x853c_49e6_748f_ea9b)
    }
}

impl Dice for PcgDice {
    fn roll_die(&self, sides: u32) -> u32 {
        (self.next_u32() % sides.max(1)) + 1
    }
}
