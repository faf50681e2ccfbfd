//! Minions
//!
//! Player-owned allies. A minion seeks the nearest live enemy inside its
//! aggro range, walks into reach and strikes on a cooldown until its
//! lifetime runs out or it is destroyed.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::ai::action::EnemySighting;
use crate::config::MinionConfig;
use crate::core::vec3::Vec3;
use crate::game::damage::Damageable;
use crate::game::enemy::EnemyId;
use crate::game::player::PlayerId;

/// Minion identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MinionId(pub u32);

impl fmt::Display for MinionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "minion_{}", self.0)
    }
}

/// A strike requested by a minion this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinionStrike {
    /// Victim
    pub target: EnemyId,
    /// Damage
    pub damage: f32,
}

/// A player-owned ally.
#[derive(Clone, Debug)]
pub struct Minion {
    /// Unique id
    pub id: MinionId,
    /// Owning player
    pub owner: PlayerId,
    /// Current position
    pub position: Vec3,
    /// Current velocity
    pub velocity: Vec3,
    /// Current health
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
    /// Damage per strike
    pub damage: f32,
    /// Units/second
    pub speed: f32,
    /// Strike reach
    pub attack_range: f32,
    /// Seconds between strikes
    pub attack_cooldown: f64,
    /// Seek radius
    pub aggro_range: f32,
    /// Seconds before expiry
    pub lifetime: f64,
    /// Seconds since spawn
    pub age: f64,
    /// Current target
    pub target: Option<EnemyId>,
    last_attack: Option<f64>,
    dead: bool,
}

impl Minion {
    /// Create a minion from the configured defaults.
    pub fn new(id: MinionId, owner: PlayerId, position: Vec3, config: &MinionConfig) -> Self {
        Self {
            id,
            owner,
            position,
            velocity: Vec3::ZERO,
            health: config.max_health,
            max_health: config.max_health,
            damage: config.damage,
            speed: config.speed,
            attack_range: config.attack_range,
            attack_cooldown: config.attack_cooldown,
            aggro_range: config.aggro_range,
            lifetime: config.lifetime,
            age: 0.0,
            target: None,
            last_attack: None,
            dead: false,
        }
    }

    /// True once the lifetime has run out.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.age >= self.lifetime
    }

    /// True while the minion should stay in the world.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.dead && !self.is_expired()
    }

    fn acquire(&mut self, enemies: &[EnemySighting]) -> Option<EnemySighting> {
        if let Some(current) = self.target.and_then(|id| enemies.iter().find(|e| e.id == id)) {
            if self.position.distance_2d(current.position) <= self.aggro_range {
                return Some(*current);
            }
        }

        let found = enemies
            .iter()
            .filter(|e| self.position.distance_2d(e.position) <= self.aggro_range)
            .min_by(|a, b| {
                self.position
                    .distance_2d(a.position)
                    .total_cmp(&self.position.distance_2d(b.position))
                    .then(a.id.cmp(&b.id))
            })
            .copied();
        self.target = found.map(|e| e.id);
        found
    }

    /// Advance by `dt`: age, seek, move, strike.
    ///
    /// `enemies` lists live enemies only.
    pub fn update(&mut self, dt: f32, now: f64, enemies: &[EnemySighting]) -> Option<MinionStrike> {
        self.age += dt as f64;
        if !self.is_active() {
            self.velocity = Vec3::ZERO;
            return None;
        }

        let Some(target) = self.acquire(enemies) else {
            self.velocity = Vec3::ZERO;
            return None;
        };

        if self.position.distance_2d(target.position) > self.attack_range {
            self.velocity = (target.position - self.position).normalize_2d().scale(self.speed);
            self.position = self.position.step_toward(target.position, self.speed * dt);
            return None;
        }

        self.velocity = Vec3::ZERO;
        let ready = self.last_attack.map_or(true, |t| now - t >= self.attack_cooldown);
        if !ready {
            return None;
        }
        self.last_attack = Some(now);
        Some(MinionStrike { target: target.id, damage: self.damage })
    }
}

impl Damageable for Minion {
    fn take_damage(&mut self, amount: f32, _now: f64) -> bool {
        if self.dead {
            return false;
        }
        self.health = (self.health - amount.max(0.0)).max(0.0);
        if self.health <= 0.0 {
            self.dead = true;
            self.velocity = Vec3::ZERO;
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

    fn minion() -> Minion {
        Minion::new(MinionId(1), PlayerId::from_bytes([1; 16]), Vec3::ZERO, &MinionConfig::default())
    }

    fn sighting(id: u32, x: f32) -> EnemySighting {
        EnemySighting { id: EnemyId(id), position: Vec3::flat(x, 0.0), health_fraction: 1.0 }
    }

    #[test]
    fn test_seeks_nearest_in_aggro() {
        let mut m = minion();
        let enemies = [sighting(1, 10.0), sighting(2, 5.0), sighting(3, 40.0)];
        assert_eq!(m.update(0.1, 0.1, &enemies), None);
        assert_eq!(m.target, Some(EnemyId(2)));
        assert!((m.position.x - 0.45).abs() < 1e-5);
    }

    #[test]
    fn test_ignores_enemies_outside_aggro() {
        let mut m = minion();
        assert_eq!(m.update(0.1, 0.1, &[sighting(1, 30.0)]), None);
        assert_eq!(m.target, None);
        assert_eq!(m.position, Vec3::ZERO);
    }

    #[test]
    fn test_strikes_on_cooldown() {
        let mut m = minion();
        let enemies = [sighting(4, 1.0)];

        let first = m.update(0.05, 1.0, &enemies);
        assert_eq!(first, Some(MinionStrike { target: EnemyId(4), damage: 6.0 }));
        assert_eq!(m.update(0.05, 1.5, &enemies), None);
        assert!(m.update(0.05, 2.0, &enemies).is_some());
    }

    #[test]
    fn test_expires_and_dies() {
        let mut m = minion();
        m.update(29.0, 29.0, &[]);
        assert!(m.is_active());
        m.update(1.0, 30.0, &[]);
        assert!(!m.is_active());
        assert_eq!(m.update(0.1, 30.1, &[sighting(1, 1.0)]), None);

        let mut m = minion();
        assert!(!m.take_damage(10.0, 0.0));
        assert!(m.take_damage(100.0, 0.0));
        assert!(!m.is_active());
        assert!(!m.take_damage(5.0, 0.0));
    }
}
