//! Projectiles
//!
//! Straight-line shots fired by player abilities and ranged enemies.
//! A projectile only hits the side opposing its owner and is destroyed on
//! its first hit or once its age passes its lifetime.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::geometry::{check_line_collision, check_radius_collision};
use crate::core::vec3::Vec3;
use crate::game::damage::{DamageSource, DamageType, HitSpec};
use crate::game::status::StatusPayload;

/// Projectile identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectileId(pub u32);

impl fmt::Display for ProjectileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projectile_{}", self.0)
    }
}

/// Everything needed to fire a projectile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectileLaunch {
    /// Who fires it
    pub owner: DamageSource,
    /// Spawn position
    pub origin: Vec3,
    /// Travel direction (normalized on the ground plane)
    pub direction: Vec3,
    /// Units/second
    pub speed: f32,
    /// Hit radius
    pub radius: f32,
    /// Seconds before expiry
    pub lifetime: f64,
    /// Payload
    pub hit: HitSpec,
}

/// A projectile in flight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Unique id
    pub id: ProjectileId,
    /// Who fired it
    pub owner: DamageSource,
    /// Current position
    pub position: Vec3,
    /// Units/second
    pub velocity: Vec3,
    /// Hit radius
    pub radius: f32,
    /// Damage on hit
    pub damage: f32,
    /// Damage school
    pub damage_type: DamageType,
    /// Effect applied to an enemy on hit
    pub status_effect: Option<StatusPayload>,
    /// Seconds since spawn
    pub age: f64,
    /// Seconds before expiry
    pub lifetime: f64,
}

impl Projectile {
    /// Create a projectile from a launch description.
    pub fn launch(id: ProjectileId, launch: ProjectileLaunch) -> Self {
        Self {
            id,
            owner: launch.owner,
            position: launch.origin,
            velocity: launch.direction.normalize_2d().scale(launch.speed),
            radius: launch.radius,
            damage: launch.hit.damage,
            damage_type: launch.hit.damage_type,
            status_effect: launch.hit.status,
            age: 0.0,
            lifetime: launch.lifetime,
        }
    }

    /// Payload delivered on hit.
    pub fn hit_spec(&self) -> HitSpec {
        HitSpec { damage: self.damage, damage_type: self.damage_type, status: self.status_effect }
    }

    /// Advance by `dt`. Returns the position before the move.
    pub fn advance(&mut self, dt: f32) -> Vec3 {
        let previous = self.position;
        self.position += self.velocity.scale(dt);
        self.age += dt as f64;
        previous
    }

    /// Expired once `age > lifetime`.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.age > self.lifetime
    }

    /// True if fired by an enemy, so it hits players.
    #[inline]
    pub fn hits_players(&self) -> bool {
        !self.owner.is_player_side()
    }

    /// Hit test for the step from `previous` to the current position.
    ///
    /// A target within `radius` of the current position is hit. Targets
    /// passed over during the step are also hit, so fast projectiles
    /// cannot skip through a target between two ticks.
    pub fn sweep_hits(&self, previous: Vec3, target: Vec3) -> bool {
        if check_radius_collision(self.position, self.radius, target) {
            return true;
        }
        let step = self.position - previous;
        let length = step.horizontal_length();
        length > 0.0 && check_line_collision(previous, step, length, self.radius, target)
    }
}
