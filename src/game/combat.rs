//! Combat Resolution
//!
//! Turns intents into world changes: player ability casts, enemy actions
//! and companion decisions. All hit tests skip dead entities.

use tracing::debug;

use crate::ai::action::{resolve_direction, resolve_target, AIAction, ActionType, Direction, TargetSpec};
use crate::ai::enemy_ai::EnemyAction;
use crate::core::geometry::{check_cone_collision, check_line_collision, check_radius_collision};
use crate::core::vec3::Vec3;
use crate::game::ability::{AbilityCategory, AbilityError, AbilityType};
use crate::game::damage::{
    apply_damage, DamageOutcome, DamageSource, DamageTarget, DamageType, Damageable, DamageableMut, HitSpec,
};
use crate::game::enemy::EnemyId;
use crate::game::events::{EventLog, WorldEventData};
use crate::game::minion::MinionId;
use crate::game::player::{DodgeBurst, PlayerId};
use crate::game::projectile::{ProjectileId, ProjectileLaunch};
use crate::game::state::WorldState;

/// Outcome of a successful ability cast.
#[derive(Clone, Debug, PartialEq)]
pub struct AbilityCast {
    /// Ability used
    pub ability: AbilityType,
    /// Enemies hit immediately (melee and instant abilities)
    pub hits: Vec<EnemyId>,
    /// Projectile fired (projectile abilities)
    pub projectile: Option<ProjectileId>,
}

// =============================================================================
// DAMAGE
// =============================================================================

/// Deliver one hit to a target.
///
/// Returns `None` if the target is missing or already dead. A status
/// payload only lands on enemies that survive the hit.
pub fn hit(
    state: &mut WorldState,
    target: DamageTarget,
    spec: HitSpec,
    source: DamageSource,
    log: &mut EventLog,
) -> Option<DamageOutcome> {
    let now = state.clock;
    let mut entity = state.damageable(target)?;
    if entity.is_dead() {
        return None;
    }

    let outcome = apply_damage(&mut entity, spec.damage, spec.damage_type, now);
    log.push(WorldEventData::DamageDealt {
        source,
        target,
        amount: outcome.dealt,
        damage_type: spec.damage_type,
    });

    if let (DamageableMut::Enemy(enemy), Some(payload)) = (&mut entity, spec.status) {
        if !outcome.killed {
            enemy.status.apply(payload.apply_at(now));
            log.push(WorldEventData::StatusApplied {
                enemy_id: enemy.id,
                kind: payload.kind,
                duration: payload.duration,
            });
        }
    }

    if outcome.killed {
        match target {
            DamageTarget::Player(player_id) => {
                debug!("Player {} killed by {:?}", player_id, source);
                log.push(WorldEventData::PlayerDied { player_id, killer: Some(source) });
            }
            DamageTarget::Enemy(enemy_id) => {
                debug!("{} killed by {:?}", enemy_id, source);
                log.push(WorldEventData::EnemyDied { enemy_id, killer: Some(source) });
            }
        }
    }

    Some(outcome)
}

// =============================================================================
// PLAYER ABILITIES
// =============================================================================

/// Cast an ability for a player.
///
/// `aim` (if non-zero on the ground plane) turns the player before the
/// cast. Melee abilities hit every live enemy in the cone, instant
/// abilities every live enemy on the line, projectile abilities fire one
/// projectile along the facing.
pub fn use_ability(
    state: &mut WorldState,
    player_id: PlayerId,
    ability: AbilityType,
    aim: Option<Vec3>,
    log: &mut EventLog,
) -> Result<AbilityCast, AbilityError> {
    let now = state.clock;
    let player = state.players.get_mut(&player_id).ok_or(AbilityError::PlayerNotFound)?;
    if !player.alive {
        return Err(AbilityError::PlayerDead);
    }

    if let Some(aim) = aim.map(Vec3::horizontal) {
        if aim.horizontal_length_squared() > 0.0 {
            player.rotation = aim.yaw();
        }
    }

    let def = player.abilities.use_ability(ability, now)?;
    let origin = player.position;
    let facing = player.facing();
    let source = DamageSource::Player(player_id);
    let spec = HitSpec { damage: def.damage, damage_type: def.damage_type, status: def.status_effect };

    log.push(WorldEventData::AbilityUsed { player_id, ability });

    let mut cast = AbilityCast { ability, hits: Vec::new(), projectile: None };

    match def.category {
        AbilityCategory::Melee | AbilityCategory::Instant => {
            let victims: Vec<EnemyId> = state
                .enemies
                .values()
                .filter(|e| e.is_alive())
                .filter(|e| match def.category {
                    AbilityCategory::Melee => {
                        check_cone_collision(origin, facing, def.range, def.cone_angle_deg, e.position)
                    }
                    _ => check_line_collision(origin, facing, def.range, def.line_width, e.position),
                })
                .map(|e| e.id)
                .collect();

            for enemy_id in victims {
                if hit(state, DamageTarget::Enemy(enemy_id), spec, source, log).is_some() {
                    cast.hits.push(enemy_id);
                }
            }
        }
        AbilityCategory::Projectile => {
            let projectile_id = state.spawn_projectile(ProjectileLaunch {
                owner: source,
                origin,
                direction: facing,
                speed: def.projectile_speed,
                radius: def.projectile_radius,
                lifetime: def.projectile_lifetime(),
                hit: spec,
            });
            log.push(WorldEventData::ProjectileSpawned { projectile_id, owner: source });
            cast.projectile = Some(projectile_id);
        }
    }

    Ok(cast)
}

// =============================================================================
// ENEMY ACTIONS
// =============================================================================

/// Resolve an action requested by an enemy's AI.
pub fn resolve_enemy_action(state: &mut WorldState, enemy_id: EnemyId, action: EnemyAction, log: &mut EventLog) {
    let now = state.clock;
    let Some(origin) = state.enemies.get(&enemy_id).filter(|e| e.is_alive()).map(|e| e.position) else {
        return;
    };
    let source = DamageSource::Enemy(enemy_id);

    match action {
        EnemyAction::Melee { target, damage } => {
            hit(state, DamageTarget::Player(target), HitSpec::physical(damage), source, log);
        }

        EnemyAction::Projectile { direction, speed, radius, damage, lifetime } => {
            let projectile_id = state.spawn_projectile(ProjectileLaunch {
                owner: source,
                origin,
                direction,
                speed,
                radius,
                lifetime,
                hit: HitSpec::physical(damage),
            });
            log.push(WorldEventData::ProjectileSpawned { projectile_id, owner: source });
        }

        EnemyAction::Explode { radius, damage } => {
            log.push(WorldEventData::EnemyExploded { enemy_id, center: origin, radius });
            let blast = HitSpec { damage, damage_type: DamageType::Fire, status: None };

            let players: Vec<PlayerId> = state
                .players
                .values()
                .filter(|p| p.alive && check_radius_collision(origin, radius, p.position))
                .map(|p| p.id)
                .collect();
            for player_id in players {
                hit(state, DamageTarget::Player(player_id), blast, source, log);
            }

            let minions: Vec<MinionId> = state
                .minions
                .values()
                .filter(|m| m.is_active() && check_radius_collision(origin, radius, m.position))
                .map(|m| m.id)
                .collect();
            for minion_id in minions {
                if let Some(minion) = state.minions.get_mut(&minion_id) {
                    apply_damage(minion, blast.damage, blast.damage_type, now);
                }
            }

            if let Some(enemy) = state.enemies.get_mut(&enemy_id) {
                enemy.kill(now);
            }
            log.push(WorldEventData::EnemyDied { enemy_id, killer: None });
        }

        EnemyAction::Buff { radius, damage_multiplier, speed_multiplier, duration } => {
            let expires_at = now + duration;
            let allies: Vec<EnemyId> = state
                .enemies
                .values()
                .filter(|e| e.id != enemy_id && e.is_alive())
                .filter(|e| check_radius_collision(origin, radius, e.position))
                .map(|e| e.id)
                .collect();
            for ally in allies {
                if let Some(enemy) = state.enemies.get_mut(&ally) {
                    enemy.apply_buff(damage_multiplier, speed_multiplier, expires_at, now);
                    log.push(WorldEventData::EnemyBuffed { source: enemy_id, target: ally });
                }
            }
        }

        EnemyAction::Summon { enemy_type, radius } => {
            let position = state.rng.point_in_circle(origin, radius);
            let summoned = state.spawn_enemy(&enemy_type, position, Some(enemy_id));
            debug!("{} summoned {} ({})", enemy_id, summoned, enemy_type);
            log.push(WorldEventData::EnemySpawned {
                enemy_id: summoned,
                enemy_type,
                summoned_by: Some(enemy_id),
            });
        }
    }
}

// =============================================================================
// COMPANION ACTIONS
// =============================================================================

/// Apply a companion decision to its player.
///
/// Targets and directions are resolved against the enemies alive now,
/// not when the decision was made. A failed cast (cooldown, unknown
/// ability) is logged and otherwise ignored.
pub fn apply_companion_action(
    state: &mut WorldState,
    player_id: PlayerId,
    action: AIAction,
    from_llm: bool,
    log: &mut EventLog,
) {
    let now = state.clock;
    let sightings = state.enemy_sightings();
    let companion_config = &state.config.companion;
    let (dodge_speed, dodge_duration, decision_interval) = (
        companion_config.dodge_speed,
        companion_config.dodge_duration,
        companion_config.decision_interval,
    );

    let Some(player) = state.players.get_mut(&player_id).filter(|p| p.alive) else {
        return;
    };
    let origin = player.position;
    let facing = player.facing();
    let priority = player.companion.as_ref().and_then(|c| c.priority_target());

    let mut cast = None;
    match action.action_type {
        ActionType::Ability => {
            let spec = action.target.unwrap_or(TargetSpec::Nearest);
            if let (Some(ability), Some(target)) = (action.ability, resolve_target(spec, origin, &sightings, priority)) {
                cast = Some((ability, target.position - origin));
            }
        }
        ActionType::Dodge => {
            let direction = resolve_direction(action.direction.unwrap_or(Direction::Away), origin, facing, &sightings);
            player.dodge = Some(DodgeBurst { velocity: direction.scale(dodge_speed), until: now + dodge_duration });
        }
        ActionType::Retreat => {
            let direction = resolve_direction(Direction::Away, origin, facing, &sightings);
            player.dodge = Some(DodgeBurst {
                velocity: direction.scale(player.speed),
                until: now + decision_interval,
            });
        }
        ActionType::Idle => {}
    }

    log.push(WorldEventData::CompanionActed {
        player_id,
        action: action.action_type,
        mood: action.mood,
        dialogue: action.dialogue.clone(),
        from_llm,
    });
    if let Some(companion) = player.companion.as_mut() {
        companion.record_action(action);
    }

    if let Some((ability, aim)) = cast {
        if let Err(e) = use_ability(state, player_id, ability, Some(aim), log) {
            debug!("Companion cast for {} failed: {}", player_id, e);
        }
    }
}
