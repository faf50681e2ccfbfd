//! Enemy State
//!
//! Enemy entity: health, status effects, support buffs and the AI that
//! drives it. Death is terminal: a dead enemy takes no damage and never
//! runs its AI again.

use std::fmt;
use std::sync::Arc;
use serde::{Serialize, Deserialize};

use crate::ai::enemy_ai::{EnemyAI, EnemyProfile};
use crate::core::vec3::Vec3;
use crate::game::damage::Damageable;
use crate::game::status::{StatusEffects, TimedBuff};

/// Enemy identifier, unique within a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnemyId(pub u32);

impl fmt::Display for EnemyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enemy_{}", self.0)
    }
}

/// An enemy in the world.
#[derive(Clone, Debug)]
pub struct Enemy {
    /// Unique identifier
    pub id: EnemyId,
    /// Type name (key into the enemy profile table)
    pub enemy_type: String,
    /// World position
    pub position: Vec3,
    /// Current velocity (units/second)
    pub velocity: Vec3,
    /// Current health (never negative)
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
    /// Slow / stun store
    pub status: StatusEffects,
    /// Damage buff from a support enemy
    pub damage_buff: Option<TimedBuff>,
    /// Speed buff from a support enemy
    pub speed_buff: Option<TimedBuff>,
    /// Behavior state machine
    pub ai: EnemyAI,
    /// Terminal death flag
    pub dead: bool,
    /// World clock time of death
    pub died_at: Option<f64>,
    /// Summoner that spawned this enemy
    pub summoned_by: Option<EnemyId>,
}

impl Enemy {
    /// Create a full-health enemy from its type profile.
    pub fn new(id: EnemyId, enemy_type: impl Into<String>, position: Vec3, profile: Arc<EnemyProfile>) -> Self {
        let max_health = profile.max_health.max(1.0);
        Self {
            id,
            enemy_type: enemy_type.into(),
            position,
            velocity: Vec3::ZERO,
            health: max_health,
            max_health,
            status: StatusEffects::new(),
            damage_buff: None,
            speed_buff: None,
            ai: EnemyAI::new(profile),
            dead: false,
            died_at: None,
            summoned_by: None,
        }
    }

    /// Alive check.
    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.dead
    }

    /// Purge expired status effects and buffs.
    pub fn purge_expired(&mut self, now: f64) {
        self.status.purge_expired(now);
        if matches!(self.damage_buff, Some(b) if now >= b.expires_at) {
            self.damage_buff = None;
        }
        if matches!(self.speed_buff, Some(b) if now >= b.expires_at) {
            self.speed_buff = None;
        }
    }

    /// Combined movement multiplier: strongest slow times speed buff.
    pub fn speed_multiplier(&self, now: f64) -> f32 {
        self.status.speed_multiplier(now) * TimedBuff::value(self.speed_buff, now)
    }

    /// Damage multiplier from support buffs.
    pub fn damage_multiplier(&self, now: f64) -> f32 {
        TimedBuff::value(self.damage_buff, now)
    }

    /// Apply a support buff at `now`. Overlapping buffs merge: the result
    /// keeps the larger multiplier and the later expiry.
    pub fn apply_buff(&mut self, damage_multiplier: f32, speed_multiplier: f32, expires_at: f64, now: f64) {
        let merge = |current: Option<TimedBuff>, multiplier: f32| match current {
            Some(b) if now < b.expires_at => TimedBuff {
                multiplier: b.multiplier.max(multiplier),
                expires_at: b.expires_at.max(expires_at),
            },
            _ => TimedBuff { multiplier, expires_at },
        };
        self.damage_buff = Some(merge(self.damage_buff, damage_multiplier));
        self.speed_buff = Some(merge(self.speed_buff, speed_multiplier));
    }

    /// Mark dead without damage (exploders detonating).
    pub fn kill(&mut self, now: f64) {
        if self.dead {
            return;
        }
        self.health = 0.0;
        self.dead = true;
        self.died_at = Some(now);
        self.velocity = Vec3::ZERO;
    }
}

impl Damageable for Enemy {
    fn take_damage(&mut self, amount: f32, now: f64) -> bool {
        if self.dead {
            return false;
        }
        self.health = (self.health - amount.max(0.0)).max(0.0);
        // Rage is checked on every health change, not only in the AI update
        self.ai.check_rage(self.health_fraction());
        if self.health <= 0.0 {
            self.kill(now);
            return true;
        }
        false
    }

    fn health(&self) -> f32 {
        self.health
    }

    fn max_health(&self) -> f32 {
        self.max_health
    }

    fn is_dead(&self) -> bool {
        self.dead
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::status::{StatusEffect, StatusKind};

    fn skeleton() -> Enemy {
        Enemy::new(EnemyId(1), "skeleton", Vec3::ZERO, Arc::new(EnemyProfile::default()))
    }

    #[test]
    fn test_health_never_negative_and_death_terminal() {
        let mut e = skeleton();
        assert!(!e.take_damage(10.0, 1.0));
        assert!(e.take_damage(1000.0, 2.0));
        assert_eq!(e.health, 0.0);
        assert_eq!(e.died_at, Some(2.0));

        assert!(!e.take_damage(10.0, 3.0));
        assert_eq!(e.died_at, Some(2.0));
    }

    #[test]
    fn test_damage_triggers_rage() {
        let mut e = skeleton();
        e.take_damage(e.max_health * 0.8, 0.0);
        assert!(e.ai.is_enraged());

        // Healing does not undo it
        e.health = e.max_health;
        assert!(e.ai.is_enraged());
    }

    #[test]
    fn test_buff_expiry_and_purge() {
        let mut e = skeleton();
        e.apply_buff(1.5, 1.2, 5.0, 0.0);
        assert_eq!(e.damage_multiplier(4.0), 1.5);
        assert!((e.speed_multiplier(4.0) - 1.2).abs() < 1e-6);

        e.purge_expired(5.0);
        assert!(e.damage_buff.is_none());
        assert_eq!(e.damage_multiplier(5.0), 1.0);
    }

    #[test]
    fn test_slow_and_buff_combine() {
        let mut e = skeleton();
        e.apply_buff(1.0, 2.0, 10.0, 0.0);
        e.status.apply(StatusEffect { kind: StatusKind::Slow, magnitude: 0.5, duration: 3.0, applied_at: 0.0 });
        assert!((e.speed_multiplier(1.0) - 1.0).abs() < 1e-6);
        assert!((e.speed_multiplier(4.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_weaker_buff_does_not_replace_stronger() {
        let mut e = skeleton();
        e.apply_buff(2.0, 2.0, 10.0, 0.0);
        e.apply_buff(1.2, 1.2, 8.0, 1.0);
        assert_eq!(e.damage_multiplier(1.0), 2.0);
    }

    #[test]
    fn test_longer_weaker_buff_keeps_strength() {
        let mut e = skeleton();
        e.apply_buff(2.0, 1.5, 5.0, 0.0);
        e.apply_buff(1.2, 1.1, 12.0, 1.0);

        // Strength of the first, duration of the second
        assert_eq!(e.damage_multiplier(4.0), 2.0);
        assert_eq!(e.damage_multiplier(11.0), 2.0);
        assert!((e.speed_multiplier(11.0) - 1.5).abs() < 1e-6);
        assert_eq!(e.damage_multiplier(12.0), 1.0);
    }

    #[test]
    fn test_expired_buff_does_not_merge() {
        let mut e = skeleton();
        e.apply_buff(3.0, 1.0, 2.0, 0.0);
        e.apply_buff(1.2, 1.0, 8.0, 5.0);
        assert_eq!(e.damage_multiplier(6.0), 1.2);
    }
}
