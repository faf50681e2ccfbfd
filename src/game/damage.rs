//! Damage Resolution
//!
//! Single extension point for turning base damage into health loss.
//! Mitigation and resistances are not modeled: `calculate_damage` is the
//! identity today and is the one place to change when they are.

use serde::{Serialize, Deserialize};

use crate::game::enemy::{Enemy, EnemyId};
use crate::game::minion::MinionId;
use crate::game::player::{Player, PlayerId};
use crate::game::status::StatusPayload;

/// Damage school.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum DamageType {
    /// Weapons, claws, charges
    #[default]
    Physical,
    /// Fireball, explosions
    Fire,
    /// Frostbolt
    Frost,
    /// Lightning beam
    Lightning,
}

/// Anything that can take damage.
pub trait Damageable {
    /// Reduce health by `amount` (already final). Health never drops below
    /// zero. Returns true if this hit killed the target. A dead target
    /// ignores further damage and returns false.
    fn take_damage(&mut self, amount: f32, now: f64) -> bool;

    /// Current health.
    fn health(&self) -> f32;

    /// Maximum health.
    fn max_health(&self) -> f32;

    /// True once the target has died.
    fn is_dead(&self) -> bool;

    /// Health as a fraction of max health in `[0, 1]`.
    fn health_fraction(&self) -> f32 {
        if self.max_health() <= 0.0 {
            return 0.0;
        }
        (self.health() / self.max_health()).clamp(0.0, 1.0)
    }
}

/// Reference to a damageable entity in a world.
///
/// Exactly two variants: players and enemies are the only things combat
/// can hurt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DamageTarget {
    /// A player
    Player(PlayerId),
    /// An enemy
    Enemy(EnemyId),
}

/// Who dealt a hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DamageSource {
    /// A player's ability
    Player(PlayerId),
    /// An enemy attack
    Enemy(EnemyId),
    /// A player-owned minion
    Minion(MinionId),
}

impl DamageSource {
    /// True for sources on the players' side.
    pub fn is_player_side(&self) -> bool {
        !matches!(self, DamageSource::Enemy(_))
    }
}

/// Borrowed damageable entity, resolved from a [`DamageTarget`].
pub enum DamageableMut<'a> {
    /// A player
    Player(&'a mut Player),
    /// An enemy
    Enemy(&'a mut Enemy),
}

impl Damageable for DamageableMut<'_> {
    fn take_damage(&mut self, amount: f32, now: f64) -> bool {
        match self {
            DamageableMut::Player(p) => p.take_damage(amount, now),
            DamageableMut::Enemy(e) => e.take_damage(amount, now),
        }
    }

    fn health(&self) -> f32 {
        match self {
            DamageableMut::Player(p) => p.health(),
            DamageableMut::Enemy(e) => e.health(),
        }
    }

    fn max_health(&self) -> f32 {
        match self {
            DamageableMut::Player(p) => p.max_health(),
            DamageableMut::Enemy(e) => e.max_health(),
        }
    }

    fn is_dead(&self) -> bool {
        match self {
            DamageableMut::Player(p) => p.is_dead(),
            DamageableMut::Enemy(e) => e.is_dead(),
        }
    }
}

/// Outcome of one damage application.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DamageOutcome {
    /// Health actually removed
    pub dealt: f32,
    /// True if this hit killed the target
    pub killed: bool,
}

/// What a single hit carries.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HitSpec {
    /// Base damage before `calculate_damage`
    pub damage: f32,
    /// Damage school
    pub damage_type: DamageType,
    /// Effect applied to an enemy that survives the hit
    pub status: Option<StatusPayload>,
}

impl HitSpec {
    /// Plain physical hit.
    pub fn physical(damage: f32) -> Self {
        Self { damage, damage_type: DamageType::Physical, status: None }
    }
}

/// Final damage for a base amount and damage type.
#[inline]
pub fn calculate_damage(base_damage: f32, _damage_type: DamageType) -> f32 {
    base_damage.max(0.0)
}

/// Apply damage to a target through the `Damageable` capability.
pub fn apply_damage<T: Damageable + ?Sized>(
    target: &mut T,
    base_damage: f32,
    damage_type: DamageType,
    now: f64,
) -> DamageOutcome {
    if target.is_dead() {
        return DamageOutcome { dealt: 0.0, killed: false };
    }

    let amount = calculate_damage(base_damage, damage_type);
    let before = target.health();
    let killed = target.take_damage(amount, now);

    DamageOutcome {
        dealt: before - target.health(),
        killed,
    }
}
