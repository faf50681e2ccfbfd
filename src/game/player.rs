//! Player State
//!
//! A connected player's character: movement integration, health,
//! abilities and the optional companion AI that can drive it.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::ai::companion::CharacterAI;
use crate::core::vec3::Vec3;
use crate::game::ability::AbilityManager;
use crate::game::damage::Damageable;
use crate::persistence::PlayerSaveRecord;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID).
///
/// Implements Ord so world maps iterate in a stable order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub uuid::Uuid);

impl PlayerId {
    /// Fresh random id.
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(uuid::Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// Short high-speed sidestep triggered by a dodge action.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DodgeBurst {
    /// Extra velocity (units/second) while active
    pub velocity: Vec3,
    /// World clock time the burst ends
    pub until: f64,
}

/// A player's character.
#[derive(Debug)]
pub struct Player {
    /// Unique identifier
    pub id: PlayerId,
    /// Account name, persistence key
    pub username: String,
    /// World position
    pub position: Vec3,
    /// Movement intent (unit length or less)
    pub velocity: Vec3,
    /// Facing yaw in radians
    pub rotation: f32,
    /// Current health
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
    /// Movement speed in units/second
    pub speed: f32,
    /// Dungeon layer; negative is underground
    pub depth: i32,
    /// Perception radius underground (None = world default)
    pub light_radius: Option<f32>,
    /// Cooldown tracking
    pub abilities: AbilityManager,
    /// Autonomous combat controller, if enabled
    pub companion: Option<CharacterAI>,
    /// Equipped items, owned by the inventory collaborator
    pub equipped_items_json: String,
    /// Bag contents, owned by the inventory collaborator
    pub bag_items_json: String,
    /// Alive flag
    pub alive: bool,
    /// Active dodge burst
    pub dodge: Option<DodgeBurst>,
}

impl Player {
    /// Create a new player at a position with full health.
    pub fn new(
        id: PlayerId,
        username: impl Into<String>,
        position: Vec3,
        max_health: f32,
        speed: f32,
        abilities: AbilityManager,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            position,
            velocity: Vec3::ZERO,
            rotation: 0.0,
            health: max_health,
            max_health,
            speed,
            depth: 0,
            light_radius: None,
            abilities,
            companion: None,
            equipped_items_json: "[]".to_string(),
            bag_items_json: "[]".to_string(),
            alive: true,
            dodge: None,
        }
    }

    /// True if the player is in a dungeon layer.
    pub fn is_underground(&self) -> bool {
        self.depth < 0
    }

    /// Set the movement intent. Longer-than-unit vectors are normalized so
    /// diagonal input is not faster.
    pub fn set_movement(&mut self, direction: Vec3) {
        let flat = direction.horizontal();
        self.velocity = if flat.horizontal_length_squared() > 1.0 {
            flat.normalize_2d()
        } else {
            flat
        };
    }

    /// Integrate movement: `position += velocity * speed * dt`, plus any
    /// active dodge burst.
    pub fn update(&mut self, dt: f32, now: f64) {
        if !self.alive {
            return;
        }

        self.position += self.velocity.scale(self.speed * dt);

        if let Some(burst) = self.dodge {
            if now < burst.until {
                self.position += burst.velocity.scale(dt);
            } else {
                self.dodge = None;
            }
        }
    }

    /// Facing direction on the ground plane.
    pub fn facing(&self) -> Vec3 {
        Vec3::from_yaw(self.rotation)
    }

    /// Persistence record for the save sweep.
    pub fn save_record(&self) -> PlayerSaveRecord {
        PlayerSaveRecord {
            username: self.username.clone(),
            position: self.position,
            rotation: self.rotation,
            health: self.health,
            equipped_items_json: self.equipped_items_json.clone(),
            bag_items_json: self.bag_items_json.clone(),
        }
    }
}

impl Damageable for Player {
    fn take_damage(&mut self, amount: f32, _now: f64) -> bool {
        if !self.alive {
            return false;
        }
        self.health = (self.health - amount.max(0.0)).max(0.0);
        if self.health <= 0.0 {
            self.alive = false;
            self.velocity = Vec3::ZERO;
            self.dodge = None;
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
        !self.alive
    }
}
