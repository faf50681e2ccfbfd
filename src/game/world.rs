//! World
//!
//! Lock owner for one [`WorldState`]. Mutations take the write lock,
//! exports take the read lock and return deep copies, so no caller ever
//! holds a reference into live state.

use std::sync::Arc;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::ai::action::{ActionType, Mood};
use crate::ai::enemy_ai::AiState;
use crate::ai::snapshot::{build_state_snapshot, StateSnapshot};
use crate::config::GameConfig;
use crate::core::vec3::Vec3;
use crate::game::ability::{AbilityError, AbilityType};
use crate::game::combat::{self, AbilityCast};
use crate::game::enemy::EnemyId;
use crate::game::events::{EventLog, WorldEventData};
use crate::game::item::{GroundItem, ItemId};
use crate::game::minion::MinionId;
use crate::game::player::PlayerId;
use crate::game::projectile::Projectile;
use crate::game::state::{WorldId, WorldState};
use crate::game::tick::{tick, TickResult};
use crate::llm::manager::LlmManager;
use crate::persistence::PlayerSaveRecord;

// =============================================================================
// ERRORS
// =============================================================================

/// World API errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    /// No such player.
    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    /// Player is dead.
    #[error("Player is dead: {0}")]
    PlayerDead(PlayerId),

    /// Player has no companion.
    #[error("Player {0} has no companion")]
    NoCompanion(PlayerId),

    /// No such live enemy.
    #[error("Enemy not found: {0}")]
    EnemyNotFound(EnemyId),

    /// No such ground item.
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    /// Item too far away to pick up.
    #[error("Item {item} out of reach ({distance:.2} > {radius:.2})")]
    ItemOutOfReach {
        /// Requested item
        item: ItemId,
        /// Horizontal distance to the item
        distance: f32,
        /// Pickup radius
        radius: f32,
    },
}

// =============================================================================
// VIEWS
// =============================================================================

/// Companion state as exported.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompanionStatus {
    /// Trust (0-100)
    pub trust: f32,
    /// Mood derived from trust
    pub mood: Mood,
    /// Aggression (0-1)
    pub aggression: f32,
    /// Focus target set by the player
    pub priority_target: Option<EnemyId>,
    /// Last applied action
    pub last_action: Option<ActionType>,
    /// LLM decision outstanding
    pub thinking: bool,
}

/// Player as exported.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlayerView {
    /// Player id
    pub id: PlayerId,
    /// Username
    pub username: String,
    /// Position
    pub position: Vec3,
    /// Movement intent
    pub velocity: Vec3,
    /// Yaw (radians)
    pub rotation: f32,
    /// Current health
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
    /// Alive flag
    pub alive: bool,
    /// Dungeon layer
    pub depth: i32,
    /// Companion, if any
    pub companion: Option<CompanionStatus>,
}

/// Enemy as exported.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnemyView {
    /// Enemy id
    pub id: EnemyId,
    /// Type name
    pub enemy_type: String,
    /// Position
    pub position: Vec3,
    /// Velocity
    pub velocity: Vec3,
    /// Current health
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
    /// AI state
    pub state: AiState,
    /// Rage mode
    pub enraged: bool,
    /// Stunned right now
    pub stunned: bool,
    /// Corpse awaiting cleanup
    pub dead: bool,
}

/// Minion as exported.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MinionView {
    /// Minion id
    pub id: MinionId,
    /// Owner
    pub owner: PlayerId,
    /// Position
    pub position: Vec3,
    /// Current health
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
    /// Current target
    pub target: Option<EnemyId>,
}

/// Deep copy of a world for broadcasting.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorldStateView {
    /// World id
    pub world_id: WorldId,
    /// Display name
    pub name: String,
    /// Tick count
    pub tick: u64,
    /// World clock
    pub clock: f64,
    /// Players in id order
    pub players: Vec<PlayerView>,
    /// Enemies in id order, corpses included
    pub enemies: Vec<EnemyView>,
    /// Projectiles in flight
    pub projectiles: Vec<Projectile>,
    /// Minions
    pub minions: Vec<MinionView>,
    /// Ground items
    pub items: Vec<GroundItem>,
}

impl WorldStateView {
    fn capture(state: &WorldState) -> Self {
        let now = state.clock;
        Self {
            world_id: state.id,
            name: state.name.clone(),
            tick: state.tick,
            clock: now,
            players: state
                .players
                .values()
                .map(|p| PlayerView {
                    id: p.id,
                    username: p.username.clone(),
                    position: p.position,
                    velocity: p.velocity,
                    rotation: p.rotation,
                    health: p.health,
                    max_health: p.max_health,
                    alive: p.alive,
                    depth: p.depth,
                    companion: p.companion.as_ref().map(|c| CompanionStatus {
                        trust: c.trust(),
                        mood: c.mood(),
                        aggression: c.aggression(),
                        priority_target: c.priority_target(),
                        last_action: c.last_action().map(|a| a.action_type),
                        thinking: c.has_pending(),
                    }),
                })
                .collect(),
            enemies: state
                .enemies
                .values()
                .map(|e| EnemyView {
                    id: e.id,
                    enemy_type: e.enemy_type.clone(),
                    position: e.position,
                    velocity: e.velocity,
                    health: e.health,
                    max_health: e.max_health,
                    state: e.ai.state(),
                    enraged: e.ai.is_enraged(),
                    stunned: e.status.is_stunned(now),
                    dead: e.dead,
                })
                .collect(),
            projectiles: state.projectiles.values().cloned().collect(),
            minions: state
                .minions
                .values()
                .map(|m| MinionView {
                    id: m.id,
                    owner: m.owner,
                    position: m.position,
                    health: m.health,
                    max_health: m.max_health,
                    target: m.target,
                })
                .collect(),
            items: state.items.values().cloned().collect(),
        }
    }
}

// =============================================================================
// WORLD
// =============================================================================

/// One simulated world.
pub struct World {
    id: WorldId,
    state: RwLock<WorldState>,
    llm: Option<LlmManager>,
}

impl World {
    /// Create an empty world with a random id.
    pub fn new(name: impl Into<String>, config: Arc<GameConfig>, llm: Option<LlmManager>) -> Self {
        Self::with_id(WorldId::new_v4(), name, config, llm)
    }

    /// Create an empty world with a fixed id (same id, same RNG stream).
    pub fn with_id(id: WorldId, name: impl Into<String>, config: Arc<GameConfig>, llm: Option<LlmManager>) -> Self {
        Self {
            id,
            state: RwLock::new(WorldState::new(id, name, config)),
            llm,
        }
    }

    /// World id.
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// Run one tick under the write lock.
    pub async fn update(&self, dt: f64) -> TickResult {
        let mut state = self.state.write().await;
        tick(&mut state, dt, self.llm.as_ref())
    }

    /// Current world clock.
    pub async fn clock(&self) -> f64 {
        self.state.read().await.clock
    }

    /// Number of players.
    pub async fn player_count(&self) -> usize {
        self.state.read().await.players.len()
    }

    // -------------------------------------------------------------------------
    // Players
    // -------------------------------------------------------------------------

    /// Add a player. Adding an existing id keeps the existing player.
    #[instrument(skip(self))]
    pub async fn add_player(&self, id: PlayerId, username: &str, position: Vec3, with_companion: bool) {
        let mut state = self.state.write().await;
        state.add_player(id, username, position, with_companion);
        info!("Player {} ({}) joined world {}", username, id, self.id);
    }

    /// Remove a player, returning its save record.
    #[instrument(skip(self))]
    pub async fn remove_player(&self, id: PlayerId) -> Option<PlayerSaveRecord> {
        let mut state = self.state.write().await;
        let player = state.players.remove(&id)?;
        state.minions.retain(|_, m| m.owner != id);
        info!("Player {} left world {}", player.username, self.id);
        Some(player.save_record())
    }

    /// Set a player's movement intent.
    pub async fn set_player_movement(&self, id: PlayerId, direction: Vec3) -> Result<(), WorldError> {
        let mut state = self.state.write().await;
        let player = state.players.get_mut(&id).ok_or(WorldError::PlayerNotFound(id))?;
        if !player.alive {
            return Err(WorldError::PlayerDead(id));
        }
        player.set_movement(direction);
        Ok(())
    }

    /// Set a player's facing (yaw, radians).
    pub async fn set_player_rotation(&self, id: PlayerId, yaw: f32) -> Result<(), WorldError> {
        let mut state = self.state.write().await;
        let player = state.players.get_mut(&id).ok_or(WorldError::PlayerNotFound(id))?;
        player.rotation = yaw;
        Ok(())
    }

    /// Move a player to another dungeon layer.
    pub async fn set_player_depth(&self, id: PlayerId, depth: i32, light_radius: Option<f32>) -> Result<(), WorldError> {
        let mut state = self.state.write().await;
        let player = state.players.get_mut(&id).ok_or(WorldError::PlayerNotFound(id))?;
        player.depth = depth;
        player.light_radius = light_radius;
        debug!("Player {} moved to depth {}", id, depth);
        Ok(())
    }

    /// Cast an ability. Events are reported by the next tick.
    pub async fn use_ability(
        &self,
        id: PlayerId,
        ability: AbilityType,
        aim: Option<Vec3>,
    ) -> Result<AbilityCast, AbilityError> {
        let mut state = self.state.write().await;
        let mut log = EventLog::new(state.tick, state.clock);
        let cast = combat::use_ability(&mut state, id, ability, aim, &mut log);
        state.deferred_events.extend(log.into_events());
        cast
    }

    /// Cast an ability by wire name.
    pub async fn use_ability_by_name(
        &self,
        id: PlayerId,
        name: &str,
        aim: Option<Vec3>,
    ) -> Result<AbilityCast, AbilityError> {
        let ability: AbilityType = name.parse()?;
        self.use_ability(id, ability, aim).await
    }

    // -------------------------------------------------------------------------
    // Entities
    // -------------------------------------------------------------------------

    /// Spawn an enemy. Unknown types use the default profile.
    pub async fn spawn_enemy(&self, enemy_type: &str, position: Vec3) -> EnemyId {
        let mut state = self.state.write().await;
        let enemy_id = state.spawn_enemy(enemy_type, position, None);
        state.defer(WorldEventData::EnemySpawned {
            enemy_id,
            enemy_type: enemy_type.to_string(),
            summoned_by: None,
        });
        debug!("Spawned {} ({}) at {}", enemy_id, enemy_type, position);
        enemy_id
    }

    /// Spawn a minion for a player.
    pub async fn spawn_minion(&self, owner: PlayerId, position: Vec3) -> Result<MinionId, WorldError> {
        let mut state = self.state.write().await;
        if !state.players.contains_key(&owner) {
            return Err(WorldError::PlayerNotFound(owner));
        }
        let minion_id = state.spawn_minion(owner, position);
        state.defer(WorldEventData::MinionSpawned { minion_id, owner });
        Ok(minion_id)
    }

    /// Drop an item on the ground.
    pub async fn drop_item(&self, position: Vec3, item_json: &str) -> ItemId {
        let mut state = self.state.write().await;
        let item_id = state.drop_item(position, item_json);
        state.defer(WorldEventData::ItemDropped { item_id, position });
        item_id
    }

    /// Pick up an item within reach. Returns the removed item; adding it
    /// to an inventory is the caller's job.
    pub async fn pickup_item(&self, player_id: PlayerId, item_id: ItemId) -> Result<GroundItem, WorldError> {
        let mut state = self.state.write().await;
        let radius = state.config.world.pickup_radius;

        let player = state.players.get(&player_id).ok_or(WorldError::PlayerNotFound(player_id))?;
        if !player.alive {
            return Err(WorldError::PlayerDead(player_id));
        }
        let position = player.position;

        let item = state.items.get(&item_id).ok_or(WorldError::ItemNotFound(item_id))?;
        if !item.in_reach(position, radius) {
            return Err(WorldError::ItemOutOfReach {
                item: item_id,
                distance: item.position.distance_2d(position),
                radius,
            });
        }

        let item = state.items.remove(&item_id).ok_or(WorldError::ItemNotFound(item_id))?;
        state.defer(WorldEventData::ItemPickedUp { item_id, player_id });
        Ok(item)
    }

    // -------------------------------------------------------------------------
    // Companion
    // -------------------------------------------------------------------------

    /// Mark (or clear) the companion's focus target.
    pub async fn set_priority_target(&self, player_id: PlayerId, target: Option<EnemyId>) -> Result<(), WorldError> {
        let mut state = self.state.write().await;
        if let Some(enemy_id) = target {
            if !state.enemies.get(&enemy_id).is_some_and(|e| e.is_alive()) {
                return Err(WorldError::EnemyNotFound(enemy_id));
            }
        }
        let player = state.players.get_mut(&player_id).ok_or(WorldError::PlayerNotFound(player_id))?;
        let companion = player.companion.as_mut().ok_or(WorldError::NoCompanion(player_id))?;
        companion.set_priority_target(target);
        Ok(())
    }

    /// Feed back whether the player's last strategic call was good.
    pub async fn record_strategic_call(&self, player_id: PlayerId, good: bool) -> Result<Mood, WorldError> {
        let mut state = self.state.write().await;
        let player = state.players.get_mut(&player_id).ok_or(WorldError::PlayerNotFound(player_id))?;
        let companion = player.companion.as_mut().ok_or(WorldError::NoCompanion(player_id))?;
        let mood = companion.record_strategic_call(good);
        debug!("Strategic call for {} (good={}): trust {:.1}", player_id, good, companion.trust());
        Ok(mood)
    }

    // -------------------------------------------------------------------------
    // Exports
    // -------------------------------------------------------------------------

    /// Deep copy of the whole world.
    pub async fn get_world_state(&self) -> WorldStateView {
        let state = self.state.read().await;
        WorldStateView::capture(&state)
    }

    /// Snapshot from one player's point of view.
    pub async fn snapshot_for(&self, player_id: PlayerId) -> Option<StateSnapshot> {
        let state = self.state.read().await;
        let player = state.players.get(&player_id)?;
        Some(build_state_snapshot(player, state.enemies.values(), state.clock, &state.config.perception))
    }

    /// Save records for every player.
    pub async fn save_records(&self) -> Vec<PlayerSaveRecord> {
        let state = self.state.read().await;
        state.players.values().map(|p| p.save_record()).collect()
    }
}
