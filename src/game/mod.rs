//! Game Logic Module
//!
//! World simulation: entities, combat and the per-tick update.
//!
//! ## Module Structure
//!
//! - `damage`: Damage types, sources and the `Damageable` seam
//! - `status`: Timed status effects on enemies
//! - `ability`: Ability definitions and per-player cooldowns
//! - `player`: Player entity and dodge bursts
//! - `enemy`: Enemy entity wrapping its AI state machine
//! - `projectile`, `minion`, `item`: Short-lived world entities
//! - `state`: Everything one world simulates
//! - `combat`: Hit resolution, ability casts, enemy and companion actions
//! - `events`: Prioritized events reported by each tick
//! - `tick`: The per-tick update
//! - `world`: Locked world handle with the public API

pub mod damage;
pub mod status;
pub mod ability;
pub mod player;
pub mod enemy;
pub mod projectile;
pub mod minion;
pub mod item;
pub mod state;
pub mod combat;
pub mod events;
pub mod tick;
pub mod world;

// Re-export key types
pub use damage::{DamageSource, DamageTarget, DamageType, Damageable};
pub use ability::{AbilityType, AbilityError};
pub use player::{Player, PlayerId};
pub use enemy::{Enemy, EnemyId};
pub use state::{WorldId, WorldState};
pub use events::{WorldEvent, WorldEventData, EventPriority};
pub use tick::TickResult;
pub use world::{World, WorldError, WorldStateView};
