//! World State
//!
//! Everything one world simulates. Uses BTreeMap for deterministic
//! iteration order; every per-tick sweep visits entities in id order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use serde::{Serialize, Deserialize};

use crate::ai::action::EnemySighting;
use crate::ai::companion::CharacterAI;
use crate::ai::enemy_ai::TargetInfo;
use crate::config::{EnemyCatalog, GameConfig};
use crate::core::rng::DeterministicRng;
use crate::core::vec3::Vec3;
use crate::game::ability::{AbilityCatalog, AbilityManager, AbilityType};
use crate::game::damage::{DamageTarget, Damageable, DamageableMut};
use crate::game::enemy::{Enemy, EnemyId};
use crate::game::events::{WorldEvent, WorldEventData};
use crate::game::item::{GroundItem, ItemId};
use crate::game::minion::{Minion, MinionId};
use crate::game::player::{Player, PlayerId};
use crate::game::projectile::{Projectile, ProjectileId, ProjectileLaunch};

// =============================================================================
// WORLD ID
// =============================================================================

/// World identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorldId(pub uuid::Uuid);

impl WorldId {
    /// Random id.
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Id from raw bytes (tests, replays).
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(uuid::Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// WORLD STATE
// =============================================================================

/// Complete state of one world.
#[derive(Debug)]
pub struct WorldState {
    /// World id
    pub id: WorldId,
    /// Display name
    pub name: String,
    /// Updates run so far
    pub tick: u64,
    /// Game clock in seconds
    pub clock: f64,
    /// Players by id
    pub players: BTreeMap<PlayerId, Player>,
    /// Enemies by id, corpses included until they are cleaned up
    pub enemies: BTreeMap<EnemyId, Enemy>,
    /// Projectiles in flight
    pub projectiles: BTreeMap<ProjectileId, Projectile>,
    /// Player-owned minions
    pub minions: BTreeMap<MinionId, Minion>,
    /// Items on the ground
    pub items: BTreeMap<ItemId, GroundItem>,
    /// World RNG (spawn jitter, companion seeds)
    pub rng: DeterministicRng,
    /// Shared configuration
    pub config: Arc<GameConfig>,
    /// Ability definitions shared by every player
    pub abilities: Arc<AbilityCatalog>,
    /// Enemy type profiles
    pub enemy_catalog: EnemyCatalog,
    /// Events from calls made between ticks, reported by the next tick
    pub deferred_events: Vec<WorldEvent>,
    next_entity_id: u32,
}

impl WorldState {
    /// Create an empty world. The RNG is seeded from the world id.
    pub fn new(id: WorldId, name: impl Into<String>, config: Arc<GameConfig>) -> Self {
        Self {
            id,
            name: name.into(),
            tick: 0,
            clock: 0.0,
            players: BTreeMap::new(),
            enemies: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            minions: BTreeMap::new(),
            items: BTreeMap::new(),
            rng: DeterministicRng::for_world(&id.0),
            abilities: Arc::new(config.ability_catalog()),
            enemy_catalog: config.enemy_catalog(),
            config,
            deferred_events: Vec::new(),
            next_entity_id: 1,
        }
    }

    /// Allocate the next entity id. One counter serves every entity kind.
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_entity_id;
        self.next_entity_id = self.next_entity_id.wrapping_add(1);
        id
    }

    /// Insert a new player with every built-in ability.
    pub fn add_player(
        &mut self,
        id: PlayerId,
        username: impl Into<String>,
        position: Vec3,
        with_companion: bool,
    ) -> &mut Player {
        let abilities = AbilityManager::new(self.abilities.clone(), &AbilityType::ALL);
        let world = &self.config.world;
        let mut player = Player::new(id, username, position, world.player_max_health, world.player_speed, abilities);
        if with_companion {
            let companion_config = Arc::new(self.config.companion.clone());
            player.companion = Some(CharacterAI::new(companion_config, self.rng.next_u64()));
        }
        self.players.entry(id).or_insert(player)
    }

    /// Insert an enemy of the named type.
    pub fn spawn_enemy(&mut self, enemy_type: &str, position: Vec3, summoned_by: Option<EnemyId>) -> EnemyId {
        let id = EnemyId(self.next_entity_id());
        let profile = self.enemy_catalog.get(enemy_type);
        let mut enemy = Enemy::new(id, enemy_type, position, profile);
        enemy.summoned_by = summoned_by;
        self.enemies.insert(id, enemy);
        id
    }

    /// Insert a projectile.
    pub fn spawn_projectile(&mut self, launch: ProjectileLaunch) -> ProjectileId {
        let id = ProjectileId(self.next_entity_id());
        self.projectiles.insert(id, Projectile::launch(id, launch));
        id
    }

    /// Insert a minion with the configured defaults.
    pub fn spawn_minion(&mut self, owner: PlayerId, position: Vec3) -> MinionId {
        let id = MinionId(self.next_entity_id());
        let minion = Minion::new(id, owner, position, &self.config.world.minion);
        self.minions.insert(id, minion);
        id
    }

    /// Insert a ground item.
    pub fn drop_item(&mut self, position: Vec3, item_json: impl Into<String>) -> ItemId {
        let id = ItemId(self.next_entity_id());
        let item = GroundItem { id, position, item_json: item_json.into(), dropped_at: self.clock };
        self.items.insert(id, item);
        id
    }

    /// Record an event from a call made between ticks.
    pub fn defer(&mut self, data: WorldEventData) {
        self.deferred_events.push(WorldEvent::new(self.tick, self.clock, data));
    }

    /// Live enemies in id order.
    pub fn enemy_sightings(&self) -> Vec<EnemySighting> {
        self.enemies
            .values()
            .filter(|e| e.is_alive())
            .map(|e| EnemySighting { id: e.id, position: e.position, health_fraction: e.health_fraction() })
            .collect()
    }

    /// Players as enemy AI sees them, in id order.
    pub fn target_infos(&self) -> Vec<TargetInfo> {
        self.players
            .values()
            .map(|p| TargetInfo { id: p.id, position: p.position, alive: p.alive })
            .collect()
    }

    /// Live summons per summoner.
    pub fn live_summons(&self) -> BTreeMap<EnemyId, usize> {
        let mut counts = BTreeMap::new();
        for parent in self.enemies.values().filter(|e| e.is_alive()).filter_map(|e| e.summoned_by) {
            *counts.entry(parent).or_insert(0) += 1;
        }
        counts
    }

    /// Resolve a damage target to a mutable entity.
    pub fn damageable(&mut self, target: DamageTarget) -> Option<DamageableMut<'_>> {
        match target {
            DamageTarget::Player(id) => self.players.get_mut(&id).map(DamageableMut::Player),
            DamageTarget::Enemy(id) => self.enemies.get_mut(&id).map(DamageableMut::Enemy),
        }
    }
}
