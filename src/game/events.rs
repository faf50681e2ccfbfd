//! World Events
//!
//! Events generated during a world update. The tick returns them in a
//! [`TickResult`](crate::game::tick::TickResult) for broadcasting and logging.

use serde::{Serialize, Deserialize};

use crate::ai::action::{ActionType, Mood};
use crate::core::vec3::Vec3;
use crate::game::ability::AbilityType;
use crate::game::damage::{DamageSource, DamageTarget, DamageType};
use crate::game::enemy::EnemyId;
use crate::game::item::ItemId;
use crate::game::minion::MinionId;
use crate::game::player::PlayerId;
use crate::game::projectile::ProjectileId;
use crate::game::status::StatusKind;

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Player deaths first
    PlayerDeath = 0,
    /// Then enemy deaths
    EnemyDeath = 1,
    /// Then damage
    Damage = 2,
    /// Then ability casts and enemy actions
    Action = 3,
    /// Then spawns
    Spawn = 4,
    /// Then companion decisions
    Companion = 5,
    /// Lowest priority
    Other = 255,
}

/// World event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WorldEventData {
    /// A player died
    PlayerDied {
        player_id: PlayerId,
        killer: Option<DamageSource>,
    },

    /// An enemy died
    EnemyDied {
        enemy_id: EnemyId,
        killer: Option<DamageSource>,
    },

    /// Health was removed from a target
    DamageDealt {
        source: DamageSource,
        target: DamageTarget,
        amount: f32,
        damage_type: DamageType,
    },

    /// A status effect landed on an enemy
    StatusApplied {
        enemy_id: EnemyId,
        kind: StatusKind,
        duration: f64,
    },

    /// A player cast an ability
    AbilityUsed {
        player_id: PlayerId,
        ability: AbilityType,
    },

    /// An exploder detonated
    EnemyExploded {
        enemy_id: EnemyId,
        center: Vec3,
        radius: f32,
    },

    /// A support enemy buffed an ally
    EnemyBuffed {
        source: EnemyId,
        target: EnemyId,
    },

    /// An enemy entered the world
    EnemySpawned {
        enemy_id: EnemyId,
        enemy_type: String,
        summoned_by: Option<EnemyId>,
    },

    /// A projectile was fired
    ProjectileSpawned {
        projectile_id: ProjectileId,
        owner: DamageSource,
    },

    /// A projectile ran out of lifetime without hitting
    ProjectileExpired {
        projectile_id: ProjectileId,
    },

    /// A minion entered the world
    MinionSpawned {
        minion_id: MinionId,
        owner: PlayerId,
    },

    /// A minion expired or was destroyed
    MinionExpired {
        minion_id: MinionId,
    },

    /// A ground item appeared
    ItemDropped {
        item_id: ItemId,
        position: Vec3,
    },

    /// A ground item was picked up
    ItemPickedUp {
        item_id: ItemId,
        player_id: PlayerId,
    },

    /// A ground item timed out
    ItemExpired {
        item_id: ItemId,
    },

    /// A corpse was removed
    CorpseRemoved {
        enemy_id: EnemyId,
    },

    /// A companion acted for its player
    CompanionActed {
        player_id: PlayerId,
        action: ActionType,
        mood: Mood,
        dialogue: Option<String>,
        from_llm: bool,
    },
}

/// A world event with timing and priority.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldEvent {
    /// Tick when the event occurred
    pub tick: u64,
    /// World clock when the event occurred
    pub time: f64,
    /// Processing priority
    pub priority: EventPriority,
    /// Event data
    pub data: WorldEventData,
}

impl WorldEvent {
    /// Create a new event with the priority its kind implies.
    pub fn new(tick: u64, time: f64, data: WorldEventData) -> Self {
        let priority = match &data {
            WorldEventData::PlayerDied { .. } => EventPriority::PlayerDeath,
            WorldEventData::EnemyDied { .. } => EventPriority::EnemyDeath,
            WorldEventData::DamageDealt { .. } | WorldEventData::StatusApplied { .. } => EventPriority::Damage,
            WorldEventData::AbilityUsed { .. }
            | WorldEventData::EnemyExploded { .. }
            | WorldEventData::EnemyBuffed { .. } => EventPriority::Action,
            WorldEventData::EnemySpawned { .. }
            | WorldEventData::ProjectileSpawned { .. }
            | WorldEventData::MinionSpawned { .. }
            | WorldEventData::ItemDropped { .. } => EventPriority::Spawn,
            WorldEventData::CompanionActed { .. } => EventPriority::Companion,
            _ => EventPriority::Other,
        };

        Self { tick, time, priority, data }
    }

    /// True for death events.
    pub fn is_death(&self) -> bool {
        matches!(self.priority, EventPriority::PlayerDeath | EventPriority::EnemyDeath)
    }
}

/// Collects events for one update, stamping each with the current tick.
#[derive(Debug, Default)]
pub struct EventLog {
    tick: u64,
    time: f64,
    events: Vec<WorldEvent>,
}

impl EventLog {
    /// Start a log for the given tick.
    pub fn new(tick: u64, time: f64) -> Self {
        Self { tick, time, events: Vec::new() }
    }

    /// Record an event.
    pub fn push(&mut self, data: WorldEventData) {
        self.events.push(WorldEvent::new(self.tick, self.time, data));
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Recorded events in emission order.
    pub fn iter(&self) -> impl Iterator<Item = &WorldEvent> {
        self.events.iter()
    }

    /// Append events recorded elsewhere (outside the tick).
    pub fn absorb(&mut self, events: impl IntoIterator<Item = WorldEvent>) {
        self.events.extend(events);
    }

    /// Consume the log in emission order.
    pub fn into_events(self) -> Vec<WorldEvent> {
        self.events
    }

    /// Consume the log, ordered by priority. Events of equal priority keep
    /// emission order.
    pub fn into_sorted(mut self) -> Vec<WorldEvent> {
        self.events.sort_by_key(|e| e.priority);
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_from_kind() {
        let death = WorldEvent::new(1, 0.05, WorldEventData::EnemyDied { enemy_id: EnemyId(1), killer: None });
        let cast = WorldEvent::new(
            1,
            0.05,
            WorldEventData::AbilityUsed { player_id: PlayerId::from_bytes([1; 16]), ability: AbilityType::Fireball },
        );
        assert_eq!(death.priority, EventPriority::EnemyDeath);
        assert!(death.is_death());
        assert_eq!(cast.priority, EventPriority::Action);
        assert!(!cast.is_death());
    }

    #[test]
    fn test_event_ordering() {
        let mut log = EventLog::new(10, 0.5);
        log.push(WorldEventData::ItemExpired { item_id: ItemId(3) });
        log.push(WorldEventData::EnemyDied { enemy_id: EnemyId(2), killer: None });
        log.push(WorldEventData::CorpseRemoved { enemy_id: EnemyId(1) });
        log.push(WorldEventData::PlayerDied { player_id: PlayerId::from_bytes([2; 16]), killer: None });
        assert_eq!(log.len(), 4);

        let sorted = log.into_sorted();
        assert_eq!(sorted[0].priority, EventPriority::PlayerDeath);
        assert_eq!(sorted[1].priority, EventPriority::EnemyDeath);
        // Equal priority keeps emission order
        assert_eq!(sorted[2].data, WorldEventData::ItemExpired { item_id: ItemId(3) });
        assert_eq!(sorted[3].data, WorldEventData::CorpseRemoved { enemy_id: EnemyId(1) });
        assert!(sorted.iter().all(|e| e.tick == 10));
    }
}
