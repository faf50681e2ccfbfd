//! World Update Tick
//!
//! One pass of the simulation for a single world. The caller holds the
//! world's write lock for the whole pass. Entities are always visited in
//! id order, so two worlds with the same id, inputs and deltas evolve
//! identically (LLM timing aside).

use tracing::{debug, trace};

use crate::ai::action::{AIAction, EnemySighting};
use crate::ai::companion::{CompanionView, PendingPoll};
use crate::ai::enemy_ai::EnemyContext;
use crate::ai::snapshot::build_state_snapshot;
use crate::game::combat;
use crate::game::damage::{DamageSource, DamageTarget, Damageable, HitSpec};
use crate::game::enemy::EnemyId;
use crate::game::events::{EventLog, WorldEvent, WorldEventData};
use crate::game::item::ItemId;
use crate::game::minion::MinionId;
use crate::game::player::{Player, PlayerId};
use crate::game::projectile::ProjectileId;
use crate::game::state::WorldState;
use crate::llm::manager::LlmManager;

/// Result of a tick.
#[derive(Debug)]
#[derive(Default)]
pub struct TickResult {
    /// Tick number after the update
    pub tick: u64,
    /// World clock after the update
    pub clock: f64,
    /// Events generated this tick, ordered by priority
    pub events: Vec<WorldEvent>,
    /// Decisions sent to the LLM pipeline
    pub llm_requests: usize,
    /// Companion actions applied (LLM or heuristic)
    pub companion_actions: usize,
}

impl TickResult {
    /// Death events this tick.
    pub fn deaths(&self) -> impl Iterator<Item = &WorldEvent> {
        self.events.iter().filter(|e| e.is_death())
    }
}

/// A companion decision waiting to be applied after movement.
struct QueuedDecision {
    player_id: PlayerId,
    action: AIAction,
    from_llm: bool,
}

/// Run one simulation tick.
///
/// # Arguments
///
/// * `state` - The world state (will be mutated)
/// * `dt` - Seconds since the previous tick (negative or non-finite counts as 0)
/// * `llm` - LLM pipeline, if enabled; without it companions use the heuristic
pub fn tick(state: &mut WorldState, dt: f64, llm: Option<&LlmManager>) -> TickResult {
    let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

    // 1. Advance clock
    state.tick += 1;
    state.clock += dt;

    let mut log = EventLog::new(state.tick, state.clock);
    log.absorb(std::mem::take(&mut state.deferred_events));

    let mut result = TickResult { tick: state.tick, clock: state.clock, ..TickResult::default() };

    // 2. Players: companions decide, movement, queued companion actions
    let decisions = update_companions(state, dt, llm, &mut result);
    for player in state.players.values_mut() {
        player.update(dt as f32, state.clock);
    }
    result.companion_actions = decisions.len();
    for decision in decisions {
        combat::apply_companion_action(state, decision.player_id, decision.action, decision.from_llm, &mut log);
    }

    // 3. Enemies
    update_enemies(state, dt, &mut log);

    // 4. Projectiles
    update_projectiles(state, dt, &mut log);

    // 5. Minions
    update_minions(state, dt, &mut log);

    // 6. Corpses and ground items
    cleanup(state, &mut log);

    result.events = log.into_sorted();
    trace!("World {} tick {} produced {} events", state.id, state.tick, result.events.len());
    result
}

// =============================================================================
// PLAYERS
// =============================================================================

fn heuristic_decision(player: &mut Player, enemies: &[EnemySighting], now: f64) -> Option<AIAction> {
    let view = CompanionView {
        position: player.position,
        health_fraction: player.health_fraction(),
        abilities: &player.abilities,
        enemies,
        now,
    };
    player.companion.as_mut().map(|c| c.decide(&view))
}

/// Advance every companion's decision cadence and collect ready decisions.
fn update_companions(
    state: &mut WorldState,
    dt: f64,
    llm: Option<&LlmManager>,
    result: &mut TickResult,
) -> Vec<QueuedDecision> {
    let now = state.clock;
    let sightings = state.enemy_sightings();
    let mut decisions = Vec::new();

    for player in state.players.values_mut() {
        if !player.alive {
            continue;
        }
        let (due, pending) = match player.companion.as_mut() {
            Some(c) => (c.tick(dt), c.has_pending()),
            None => continue,
        };

        if due && !pending {
            match llm {
                Some(manager) => {
                    let snapshot = build_state_snapshot(player, state.enemies.values(), now, &state.config.perception);
                    let rx = manager.request_decision(snapshot);
                    if let Some(c) = player.companion.as_mut() {
                        c.set_pending(rx);
                    }
                    result.llm_requests += 1;
                }
                None => {
                    if let Some(action) = heuristic_decision(player, &sightings, now) {
                        decisions.push(QueuedDecision { player_id: player.id, action, from_llm: false });
                    }
                }
            }
        }

        let poll = player.companion.as_mut().map_or(PendingPoll::Idle, |c| c.poll_pending());
        match poll {
            PendingPoll::Ready(action) => {
                decisions.push(QueuedDecision { player_id: player.id, action, from_llm: true });
            }
            PendingPoll::Fallback => {
                debug!("LLM fallback for {}", player.id);
                if let Some(action) = heuristic_decision(player, &sightings, now) {
                    decisions.push(QueuedDecision { player_id: player.id, action, from_llm: false });
                }
            }
            PendingPoll::Idle | PendingPoll::Waiting => {}
        }
    }

    decisions
}

// =============================================================================
// ENEMIES
// =============================================================================

fn update_enemies(state: &mut WorldState, dt: f64, log: &mut EventLog) {
    let now = state.clock;
    let targets = state.target_infos();
    let summons = state.live_summons();
    let mut actions = Vec::new();

    for enemy in state.enemies.values_mut() {
        if !enemy.is_alive() {
            continue;
        }
        enemy.purge_expired(now);

        let ctx = EnemyContext {
            position: enemy.position,
            health_fraction: enemy.health_fraction(),
            now,
            stunned: enemy.status.is_stunned(now),
            speed_multiplier: enemy.speed_multiplier(now),
            damage_multiplier: enemy.damage_multiplier(now),
            live_summons: summons.get(&enemy.id).copied().unwrap_or(0),
            players: &targets,
        };
        let output = enemy.ai.update(&ctx);

        enemy.velocity = output.velocity;
        enemy.position += output.velocity.scale(dt as f32);
        if let Some(action) = output.action {
            actions.push((enemy.id, action));
        }
    }

    for (enemy_id, action) in actions {
        combat::resolve_enemy_action(state, enemy_id, action, log);
    }
}

// =============================================================================
// PROJECTILES
// =============================================================================

fn update_projectiles(state: &mut WorldState, dt: f64, log: &mut EventLog) {
    let ids: Vec<ProjectileId> = state.projectiles.keys().copied().collect();

    for id in ids {
        let Some(projectile) = state.projectiles.get_mut(&id) else {
            continue;
        };
        let previous = projectile.advance(dt as f32);
        let projectile = projectile.clone();

        // Nearest target along the path on the opposing side
        let target = if projectile.hits_players() {
            state
                .players
                .values()
                .filter(|p| p.alive && projectile.sweep_hits(previous, p.position))
                .min_by(|a, b| previous.distance_2d(a.position).total_cmp(&previous.distance_2d(b.position)))
                .map(|p| DamageTarget::Player(p.id))
        } else {
            state
                .enemies
                .values()
                .filter(|e| e.is_alive() && projectile.sweep_hits(previous, e.position))
                .min_by(|a, b| previous.distance_2d(a.position).total_cmp(&previous.distance_2d(b.position)))
                .map(|e| DamageTarget::Enemy(e.id))
        };

        if let Some(target) = target {
            combat::hit(state, target, projectile.hit_spec(), projectile.owner, log);
            state.projectiles.remove(&id);
        } else if projectile.is_expired() {
            state.projectiles.remove(&id);
            log.push(WorldEventData::ProjectileExpired { projectile_id: id });
        }
    }
}

// =============================================================================
// MINIONS
// =============================================================================

fn update_minions(state: &mut WorldState, dt: f64, log: &mut EventLog) {
    let now = state.clock;
    let sightings = state.enemy_sightings();
    let mut strikes = Vec::new();

    for minion in state.minions.values_mut() {
        if let Some(strike) = minion.update(dt as f32, now, &sightings) {
            strikes.push((minion.id, strike));
        }
    }

    for (minion_id, strike) in strikes {
        let spec = HitSpec::physical(strike.damage);
        combat::hit(state, DamageTarget::Enemy(strike.target), spec, DamageSource::Minion(minion_id), log);
    }

    let gone: Vec<MinionId> = state.minions.values().filter(|m| !m.is_active()).map(|m| m.id).collect();
    for minion_id in gone {
        state.minions.remove(&minion_id);
        log.push(WorldEventData::MinionExpired { minion_id });
    }
}

// =============================================================================
// CLEANUP
// =============================================================================

fn cleanup(state: &mut WorldState, log: &mut EventLog) {
    let now = state.clock;
    let linger = state.config.world.corpse_linger_secs;
    let item_lifetime = state.config.world.item_lifetime_secs;

    let corpses: Vec<EnemyId> = state
        .enemies
        .values()
        .filter(|e| e.died_at.is_some_and(|t| now - t >= linger))
        .map(|e| e.id)
        .collect();
    for enemy_id in corpses {
        state.enemies.remove(&enemy_id);
        log.push(WorldEventData::CorpseRemoved { enemy_id });
    }

    let expired: Vec<ItemId> = state
        .items
        .values()
        .filter(|i| i.is_expired(now, item_lifetime))
        .map(|i| i.id)
        .collect();
    for item_id in expired {
        state.items.remove(&item_id);
        log.push(WorldEventData::ItemExpired { item_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::ai::action::{ActionType, Mood};
    use crate::ai::enemy_ai::AiState;
    use crate::config::GameConfig;
    use crate::core::vec3::Vec3;
    use crate::game::ability::AbilityType;
    use crate::game::events::EventPriority;
    use crate::game::state::WorldId;
    use crate::game::status::{StatusKind, StatusPayload};
    use crate::llm::manager::ManagerSettings;
    use crate::llm::provider::{BoxFuture, LlmError, LlmProvider};

    const HERO: PlayerId = PlayerId::from_bytes([1; 16]);
    const DT: f64 = 0.05;

    fn world_with(config: GameConfig) -> WorldState {
        WorldState::new(WorldId::from_bytes([5; 16]), "test", Arc::new(config))
    }

    fn world() -> WorldState {
        world_with(GameConfig::default())
    }

    #[test]
    fn test_clock_and_movement() {
        let mut s = world();
        s.add_player(HERO, "hero", Vec3::ZERO, false).set_movement(Vec3::flat(0.0, 1.0));

        let result = tick(&mut s, 0.1, None);
        assert_eq!(result.tick, 1);
        assert!((s.clock - 0.1).abs() < 1e-12);
        assert!((s.players[&HERO].position.z - 0.5).abs() < 1e-5);

        // Bad deltas do not move the clock
        tick(&mut s, f64::NAN, None);
        tick(&mut s, -1.0, None);
        assert!((s.clock - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_enemy_chases_and_hits_player() {
        let mut s = world();
        s.add_player(HERO, "hero", Vec3::ZERO, false);
        let id = s.spawn_enemy("skeleton", Vec3::flat(0.0, 5.0), None);

        tick(&mut s, DT, None);
        assert_eq!(s.enemies[&id].ai.state(), AiState::Chase);
        assert!(s.enemies[&id].position.z < 5.0);

        for _ in 0..100 {
            tick(&mut s, DT, None);
        }
        assert!(s.players[&HERO].health < s.players[&HERO].max_health);
    }

    #[test]
    fn test_stunned_enemy_does_not_move() {
        let mut s = world();
        s.add_player(HERO, "hero", Vec3::ZERO, false);
        let id = s.spawn_enemy("skeleton", Vec3::flat(0.0, 5.0), None);
        let stun = StatusPayload { kind: StatusKind::Stun, magnitude: 1.0, duration: 1.0 };
        s.enemies.get_mut(&id).unwrap().status.apply(stun.apply_at(0.0));

        for _ in 0..10 {
            tick(&mut s, DT, None);
        }
        assert_eq!(s.enemies[&id].position, Vec3::flat(0.0, 5.0));
        assert_eq!(s.enemies[&id].velocity, Vec3::ZERO);

        // Stun expired at t=1.0
        for _ in 0..12 {
            tick(&mut s, DT, None);
        }
        assert!(s.enemies[&id].position.z < 5.0);
        assert!(s.enemies[&id].status.is_empty());
    }

    #[test]
    fn test_projectile_travels_and_hits() {
        let mut s = world();
        s.add_player(HERO, "hero", Vec3::ZERO, false);
        let target = s.spawn_enemy("totem", Vec3::flat(0.0, 6.0), None);
        let mut log = EventLog::new(0, 0.0);
        combat::use_ability(&mut s, HERO, AbilityType::Fireball, None, &mut log).unwrap();

        let mut hit_tick = None;
        for _ in 0..20 {
            let result = tick(&mut s, DT, None);
            if result.events.iter().any(|e| matches!(e.data, WorldEventData::DamageDealt { .. })) {
                hit_tick = Some(result.tick);
                break;
            }
        }
        assert!(hit_tick.is_some());
        assert!(s.projectiles.is_empty());
        assert_eq!(s.enemies[&target].health, 50.0);
    }

    #[test]
    fn test_projectile_expires_without_target() {
        let mut s = world();
        s.add_player(HERO, "hero", Vec3::ZERO, false);
        let mut log = EventLog::new(0, 0.0);
        let cast = combat::use_ability(&mut s, HERO, AbilityType::Frostbolt, None, &mut log).unwrap();
        let id = cast.projectile.unwrap();

        let mut expired = false;
        for _ in 0..40 {
            let result = tick(&mut s, DT, None);
            expired |= result
                .events
                .iter()
                .any(|e| e.data == WorldEventData::ProjectileExpired { projectile_id: id });
        }
        assert!(expired);
        assert!(s.projectiles.is_empty());
    }

    #[test]
    fn test_corpse_and_item_cleanup() {
        let mut config = GameConfig::default();
        config.world.corpse_linger_secs = 0.1;
        config.world.item_lifetime_secs = 0.2;
        let mut s = world_with(config);
        let id = s.spawn_enemy("skeleton", Vec3::ZERO, None);
        s.enemies.get_mut(&id).unwrap().kill(0.0);
        s.drop_item(Vec3::ZERO, "{}");

        tick(&mut s, 0.05, None);
        assert!(s.enemies.contains_key(&id));
        tick(&mut s, 0.05, None);
        assert!(!s.enemies.contains_key(&id));
        assert_eq!(s.items.len(), 1);
        tick(&mut s, 0.1, None);
        assert!(s.items.is_empty());
    }

    #[test]
    fn test_minion_fights_and_expires() {
        let mut config = GameConfig::default();
        config.world.minion.lifetime = 1.0;
        let mut s = world_with(config);
        s.add_player(HERO, "hero", Vec3::flat(50.0, 50.0), false);
        let target = s.spawn_enemy("totem", Vec3::flat(1.0, 0.0), None);
        let minion = s.spawn_minion(HERO, Vec3::ZERO);

        tick(&mut s, DT, None);
        assert!(s.enemies[&target].health < s.enemies[&target].max_health);

        let mut expired = false;
        for _ in 0..30 {
            let result = tick(&mut s, DT, None);
            expired |= result.events.iter().any(|e| e.data == WorldEventData::MinionExpired { minion_id: minion });
        }
        assert!(expired);
        assert!(s.minions.is_empty());
    }

    #[test]
    fn test_heuristic_companion_acts_without_llm() {
        let mut s = world();
        s.add_player(HERO, "hero", Vec3::ZERO, true);
        let target = s.spawn_enemy("totem", Vec3::flat(0.0, 2.0), None);

        let mut acted = 0;
        for _ in 0..12 {
            acted += tick(&mut s, DT, None).companion_actions;
        }
        // First decision once 0.5 s has accumulated (tick 11), the next not before tick 21
        assert_eq!(acted, 1);
        assert!(s.enemies[&target].health < s.enemies[&target].max_health);
    }

    #[test]
    fn test_events_sorted_by_priority() {
        let mut s = world();
        s.add_player(HERO, "hero", Vec3::ZERO, false);
        let weak = s.spawn_enemy("bomber", Vec3::flat(0.0, 1.0), None);
        let mut log = EventLog::new(0, 0.0);
        combat::use_ability(&mut s, HERO, AbilityType::Lightning, None, &mut log).unwrap();
        s.deferred_events = log.into_events();

        let result = tick(&mut s, DT, None);
        assert!(result.events.windows(2).all(|w| w[0].priority <= w[1].priority));
        assert_eq!(result.events[0].priority, EventPriority::EnemyDeath);
        assert_eq!(result.deaths().count(), 1);
        assert!(s.enemies[&weak].is_dead());
    }

    // -------------------------------------------------------------------------
    // LLM integration
    // -------------------------------------------------------------------------

    struct FixedProvider {
        reply: String,
    }

    impl LlmProvider for FixedProvider {
        fn generate<'a>(&'a self, _prompt: &'a str, _grammar: &'a str) -> BoxFuture<'a, Result<String, LlmError>> {
            let reply = self.reply.clone();
            Box::pin(async move { Ok(reply) })
        }

        fn name(&self) -> &str {
            "fixed"
        }

        fn is_available(&self) -> BoxFuture<'_, bool> {
            Box::pin(async { true })
        }
    }

    fn settings() -> ManagerSettings {
        ManagerSettings {
            queue_capacity: 4,
            max_batch_size: 2,
            batch_timeout: std::time::Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_llm_decision_applied_on_later_tick() {
        let provider = Arc::new(FixedProvider {
            reply: r#"{"action":"dodge","direction":"left","mood":"anxious","dialogue":"Whoa!"}"#.into(),
        });
        let (manager, handle) = LlmManager::start(provider, settings());

        let mut s = world();
        s.add_player(HERO, "hero", Vec3::ZERO, true);
        s.spawn_enemy("totem", Vec3::flat(0.0, 3.0), None);

        let mut requests = 0;
        let mut applied = None;
        for _ in 0..40 {
            let result = tick(&mut s, 0.1, Some(&manager));
            requests += result.llm_requests;
            if let Some(event) = result.events.iter().find(|e| matches!(e.data, WorldEventData::CompanionActed { .. })) {
                applied = Some(event.data.clone());
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert!(requests >= 1);
        match applied {
            Some(WorldEventData::CompanionActed { action, mood, dialogue, from_llm, .. }) => {
                assert_eq!(action, ActionType::Dodge);
                assert_eq!(mood, Mood::Anxious);
                assert_eq!(dialogue.as_deref(), Some("Whoa!"));
                assert!(from_llm);
            }
            other => panic!("expected companion action, got {:?}", other),
        }

        manager.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_llm_garbage_falls_back_to_heuristic() {
        let provider = Arc::new(FixedProvider { reply: "I refuse to answer in JSON".into() });
        let (manager, handle) = LlmManager::start(provider, settings());

        let mut s = world();
        s.add_player(HERO, "hero", Vec3::ZERO, true);
        s.spawn_enemy("totem", Vec3::flat(0.0, 2.0), None);

        let mut fallback = false;
        for _ in 0..40 {
            let result = tick(&mut s, 0.1, Some(&manager));
            fallback |= result
                .events
                .iter()
                .any(|e| matches!(e.data, WorldEventData::CompanionActed { from_llm: false, .. }));
            if fallback {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(fallback);
        assert!(manager.stats().fallback_count >= 1);

        manager.shutdown();
        handle.await.unwrap();
    }
}
