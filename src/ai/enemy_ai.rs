//! Enemy AI State Machine
//!
//! Per-enemy behavior: target acquisition, state transitions and the
//! action each behavior produces. The AI never touches world state; it
//! reads an [`EnemyContext`] and returns an [`AiOutput`] that the tick
//! resolves (damage, projectile spawns, buffs, summons).
//!
//! ```text
//!            acquire            dist <= attack
//!   Idle ─────────────▶ Chase ─────────────────▶ Attack / Support
//!    ▲                    ▲  ◀─────────────────────┘
//!    └── target lost /    │     out of attack range
//!        out of aggro     │
//!                      health <= flee_health (any state) ──▶ Flee
//! ```

use std::fmt;
use std::sync::Arc;
use serde::{Serialize, Deserialize};

use crate::core::vec3::Vec3;
use crate::game::player::PlayerId;

// =============================================================================
// PROFILE (immutable per enemy type)
// =============================================================================

/// Behavior family of an enemy type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum Behavior {
    /// Never acts
    Idle,
    /// Chase and strike
    #[default]
    Melee,
    /// Hold position in range and shoot
    Ranged,
    /// Melee with a timed speed charge and bonus damage
    Charger,
    /// Detonate on contact
    Exploder,
    /// Keep distance and buff allies
    Support,
    /// Keep maximum distance and summon allies
    Summoner,
}

/// Immutable configuration for one enemy type, injected into every
/// [`EnemyAI`] of that type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyProfile {
    /// Behavior family
    pub behavior: Behavior,
    /// Maximum health
    pub max_health: f32,
    /// Movement speed in units/second
    pub speed: f32,
    /// Base damage per attack
    pub damage: f32,
    /// Distance at which the enemy attacks (or supports)
    pub attack_range: f32,
    /// Distance at which the enemy notices a player
    pub aggro_range: f32,
    /// Seconds between attacks
    pub attack_cooldown: f64,
    /// Health fraction at or below which the enemy flees
    pub flee_health: f32,
    /// Health fraction at or below which rage turns on (permanently)
    pub rage_threshold: f32,
    /// Damage multiplier while enraged
    pub rage_damage_multiplier: f32,
    /// Speed multiplier while enraged
    pub rage_speed_multiplier: f32,
    /// Ranged: projectile speed
    pub projectile_speed: f32,
    /// Ranged: projectile hit radius
    pub projectile_radius: f32,
    /// Exploder: blast radius
    pub explosion_radius: f32,
    /// Charger: distance at which a charge starts
    pub charge_trigger_range: f32,
    /// Charger: speed multiplier during the charge window
    pub charge_speed_multiplier: f32,
    /// Charger: charge window length in seconds
    pub charge_duration: f64,
    /// Charger: extra damage for a hit landed during the charge
    pub charge_bonus_damage: f32,
    /// Support: buff radius
    pub buff_radius: f32,
    /// Support: damage multiplier granted
    pub buff_damage_multiplier: f32,
    /// Support: speed multiplier granted
    pub buff_speed_multiplier: f32,
    /// Support: buff duration in seconds
    pub buff_duration: f64,
    /// Support: seconds between buffs
    pub buff_cooldown: f64,
    /// Summoner: enemy type name to summon
    pub summon_type: String,
    /// Summoner: seconds between summons
    pub summon_cooldown: f64,
    /// Summoner: hard cap on live summons
    pub max_summons: usize,
    /// Summoner: spawn radius around the summoner
    pub summon_radius: f32,
}

impl Default for EnemyProfile {
    fn default() -> Self {
        Self {
            behavior: Behavior::Melee,
            max_health: 50.0,
            speed: 3.5,
            damage: 8.0,
            attack_range: 1.8,
            aggro_range: 12.0,
            attack_cooldown: 1.2,
            flee_health: 0.0,
            rage_threshold: 0.3,
            rage_damage_multiplier: 1.5,
            rage_speed_multiplier: 1.3,
            projectile_speed: 12.0,
            projectile_radius: 0.5,
            explosion_radius: 3.0,
            charge_trigger_range: 6.0,
            charge_speed_multiplier: 2.5,
            charge_duration: 1.0,
            charge_bonus_damage: 10.0,
            buff_radius: 8.0,
            buff_damage_multiplier: 1.25,
            buff_speed_multiplier: 1.2,
            buff_duration: 5.0,
            buff_cooldown: 8.0,
            summon_type: "skeleton".to_string(),
            summon_cooldown: 10.0,
            max_summons: 3,
            summon_radius: 2.5,
        }
    }
}

impl EnemyProfile {
    /// Built-in enemy types keyed by name, used when no configuration
    /// overrides them.
    pub fn builtin_types() -> Vec<(&'static str, EnemyProfile)> {
        let base = EnemyProfile::default();
        vec![
            ("skeleton", base.clone()),
            ("archer", EnemyProfile {
                behavior: Behavior::Ranged,
                max_health: 35.0,
                damage: 10.0,
                attack_range: 10.0,
                aggro_range: 16.0,
                attack_cooldown: 2.0,
                flee_health: 0.2,
                ..base.clone()
            }),
            ("brute", EnemyProfile {
                behavior: Behavior::Charger,
                max_health: 120.0,
                speed: 3.0,
                damage: 15.0,
                attack_range: 2.2,
                attack_cooldown: 2.5,
                ..base.clone()
            }),
            ("bomber", EnemyProfile {
                behavior: Behavior::Exploder,
                max_health: 25.0,
                speed: 5.0,
                damage: 30.0,
                attack_range: 1.2,
                rage_threshold: 0.0,
                ..base.clone()
            }),
            ("shaman", EnemyProfile {
                behavior: Behavior::Support,
                max_health: 40.0,
                damage: 0.0,
                attack_range: 9.0,
                aggro_range: 14.0,
                flee_health: 0.25,
                ..base.clone()
            }),
            ("necromancer", EnemyProfile {
                behavior: Behavior::Summoner,
                max_health: 60.0,
                damage: 0.0,
                attack_range: 12.0,
                aggro_range: 16.0,
                ..base.clone()
            }),
            ("totem", EnemyProfile {
                behavior: Behavior::Idle,
                max_health: 80.0,
                speed: 0.0,
                ..base
            }),
        ]
    }
}

// =============================================================================
// STATE MACHINE
// =============================================================================

/// Current AI state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiState {
    /// No target
    Idle,
    /// Moving toward the target
    Chase,
    /// In range, attacking
    Attack,
    /// Low health, moving away
    Flee,
    /// In range, supporting (buff or summon)
    Support,
}

impl fmt::Display for AiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AiState::Idle => "idle",
            AiState::Chase => "chase",
            AiState::Attack => "attack",
            AiState::Flee => "flee",
            AiState::Support => "support",
        };
        f.write_str(s)
    }
}

/// A player as seen by enemy AI.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetInfo {
    /// Player id
    pub id: PlayerId,
    /// Position
    pub position: Vec3,
    /// Alive flag
    pub alive: bool,
}

/// Everything the AI reads for one update.
#[derive(Clone, Copy, Debug)]
pub struct EnemyContext<'a> {
    /// Enemy position
    pub position: Vec3,
    /// Health / max health
    pub health_fraction: f32,
    /// World clock
    pub now: f64,
    /// Stunned this tick
    pub stunned: bool,
    /// Combined slow and buff speed multiplier
    pub speed_multiplier: f32,
    /// Buff damage multiplier
    pub damage_multiplier: f32,
    /// Live enemies this enemy has summoned
    pub live_summons: usize,
    /// Candidate targets, in id order
    pub players: &'a [TargetInfo],
}

/// Action requested by an enemy, resolved by the tick.
#[derive(Clone, Debug, PartialEq)]
pub enum EnemyAction {
    /// Strike the target directly.
    Melee {
        /// Victim
        target: PlayerId,
        /// Final damage
        damage: f32,
    },
    /// Fire a projectile.
    Projectile {
        /// Unit direction
        direction: Vec3,
        /// Units/second
        speed: f32,
        /// Hit radius
        radius: f32,
        /// Damage on hit
        damage: f32,
        /// Seconds before the projectile expires
        lifetime: f64,
    },
    /// Detonate, hurting every player in the radius. The enemy dies.
    Explode {
        /// Blast radius
        radius: f32,
        /// Damage to each player hit
        damage: f32,
    },
    /// Buff allies in the radius.
    Buff {
        /// Radius around the caster
        radius: f32,
        /// Damage multiplier
        damage_multiplier: f32,
        /// Speed multiplier
        speed_multiplier: f32,
        /// Duration in seconds
        duration: f64,
    },
    /// Spawn a new enemy near the caster.
    Summon {
        /// Enemy type name
        enemy_type: String,
        /// Spawn radius around the caster
        radius: f32,
    },
}

/// Result of one AI update.
#[derive(Clone, Debug, PartialEq)]
pub struct AiOutput {
    /// Desired velocity (units/second)
    pub velocity: Vec3,
    /// Action to resolve this tick
    pub action: Option<EnemyAction>,
}

impl AiOutput {
    fn idle() -> Self {
        Self { velocity: Vec3::ZERO, action: None }
    }

    fn moving(velocity: Vec3) -> Self {
        Self { velocity, action: None }
    }
}

/// Behavior state machine for one enemy.
#[derive(Clone, Debug)]
pub struct EnemyAI {
    profile: Arc<EnemyProfile>,
    state: AiState,
    target: Option<PlayerId>,
    rage: bool,
    last_attack: Option<f64>,
    last_buff: Option<f64>,
    last_summon: Option<f64>,
    charge_until: Option<f64>,
}

impl EnemyAI {
    /// Create an idle AI for the given profile.
    pub fn new(profile: Arc<EnemyProfile>) -> Self {
        Self {
            profile,
            state: AiState::Idle,
            target: None,
            rage: false,
            last_attack: None,
            last_buff: None,
            last_summon: None,
            charge_until: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> AiState {
        self.state
    }

    /// Current target.
    pub fn target(&self) -> Option<PlayerId> {
        self.target
    }

    /// Behavior family.
    pub fn behavior(&self) -> Behavior {
        self.profile.behavior
    }

    /// Injected profile.
    pub fn profile(&self) -> &EnemyProfile {
        &self.profile
    }

    /// True once rage has triggered. Rage is one-way: after the health
    /// fraction first reaches `rage_threshold` this stays true for the
    /// enemy's whole life, even if it is healed back above the threshold.
    pub fn is_enraged(&self) -> bool {
        self.rage
    }

    /// True while a charger's charge window is open.
    pub fn is_charging(&self, now: f64) -> bool {
        matches!(self.charge_until, Some(until) if now < until)
    }

    /// Flip rage on if the health fraction is at or below the threshold.
    /// Never flips it off.
    pub fn check_rage(&mut self, health_fraction: f32) {
        if !self.rage && health_fraction <= self.profile.rage_threshold {
            self.rage = true;
        }
    }

    fn rage_damage(&self) -> f32 {
        if self.rage { self.profile.rage_damage_multiplier } else { 1.0 }
    }

    fn rage_speed(&self) -> f32 {
        if self.rage { self.profile.rage_speed_multiplier } else { 1.0 }
    }

    fn attack_ready(&self, now: f64) -> bool {
        Self::cooldown_ready(self.last_attack, self.profile.attack_cooldown, now)
    }

    fn cooldown_ready(last: Option<f64>, cooldown: f64, now: f64) -> bool {
        match last {
            Some(t) => now - t >= cooldown,
            None => true,
        }
    }

    /// Keep the current target if it is still alive, otherwise pick the
    /// nearest live player inside aggro range (ties go to the lower id).
    fn validate_target(&mut self, ctx: &EnemyContext<'_>) -> Option<TargetInfo> {
        if let Some(id) = self.target {
            if let Some(t) = ctx.players.iter().find(|p| p.id == id && p.alive) {
                return Some(*t);
            }
            self.target = None;
        }

        let mut best: Option<(f32, TargetInfo)> = None;
        for p in ctx.players.iter().filter(|p| p.alive) {
            let d = ctx.position.distance_2d(p.position);
            if d > self.profile.aggro_range {
                continue;
            }
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, *p));
            }
        }

        let (_, found) = best?;
        self.target = Some(found.id);
        self.state = AiState::Chase;
        Some(found)
    }

    /// Run one update.
    pub fn update(&mut self, ctx: &EnemyContext<'_>) -> AiOutput {
        self.check_rage(ctx.health_fraction);

        // 1. Idle behavior never acts
        if self.profile.behavior == Behavior::Idle {
            self.state = AiState::Idle;
            return AiOutput::idle();
        }

        // Stunned: no movement, no action
        if ctx.stunned {
            return AiOutput::idle();
        }

        // 2. Target validation / acquisition
        let target = match self.validate_target(ctx) {
            Some(t) => t,
            None => {
                self.state = AiState::Idle;
                self.charge_until = None;
                return AiOutput::idle();
            }
        };

        let distance = ctx.position.distance_2d(target.position);
        let speed = self.profile.speed * ctx.speed_multiplier * self.rage_speed();
        let toward = (target.position - ctx.position).normalize_2d();

        // 3. Flee overrides everything else
        if ctx.health_fraction <= self.profile.flee_health {
            self.state = AiState::Flee;
            self.charge_until = None;
            return AiOutput::moving(-toward * speed);
        }

        // 4./5. Distance bands
        if distance <= self.profile.attack_range {
            self.state = match self.profile.behavior {
                Behavior::Support | Behavior::Summoner => AiState::Support,
                _ => AiState::Attack,
            };
        } else if distance <= self.profile.aggro_range {
            self.state = AiState::Chase;
        } else {
            self.state = AiState::Idle;
            self.target = None;
            self.charge_until = None;
            return AiOutput::idle();
        }

        match self.state {
            AiState::Chase => self.execute_chase(ctx, distance, toward, speed),
            AiState::Attack => self.execute_attack(ctx, target, toward, speed),
            AiState::Support => self.execute_support(ctx, distance, toward, speed),
            AiState::Idle | AiState::Flee => AiOutput::idle(),
        }
    }

    fn execute_chase(&mut self, ctx: &EnemyContext<'_>, distance: f32, toward: Vec3, speed: f32) -> AiOutput {
        let mut speed = speed;

        if self.profile.behavior == Behavior::Charger {
            if !self.is_charging(ctx.now)
                && distance <= self.profile.charge_trigger_range
                && self.attack_ready(ctx.now)
            {
                self.charge_until = Some(ctx.now + self.profile.charge_duration);
            }
            if self.is_charging(ctx.now) {
                speed *= self.profile.charge_speed_multiplier;
            }
        }

        AiOutput::moving(toward * speed)
    }

    fn execute_attack(
        &mut self,
        ctx: &EnemyContext<'_>,
        target: TargetInfo,
        toward: Vec3,
        speed: f32,
    ) -> AiOutput {
        let damage = self.profile.damage * ctx.damage_multiplier * self.rage_damage();

        match self.profile.behavior {
            Behavior::Melee | Behavior::Charger => {
                if !self.attack_ready(ctx.now) {
                    // On cooldown: keep closing in
                    return AiOutput::moving(toward * speed);
                }

                let mut damage = damage;
                if self.is_charging(ctx.now) {
                    damage += self.profile.charge_bonus_damage;
                }
                self.charge_until = None;
                self.last_attack = Some(ctx.now);

                AiOutput {
                    velocity: Vec3::ZERO,
                    action: Some(EnemyAction::Melee { target: target.id, damage }),
                }
            }
            Behavior::Ranged => {
                if !self.attack_ready(ctx.now) {
                    return AiOutput::idle();
                }
                self.last_attack = Some(ctx.now);

                let speed = self.profile.projectile_speed.max(0.1);
                let lifetime = (self.profile.attack_range * 1.5 / speed) as f64;
                AiOutput {
                    velocity: Vec3::ZERO,
                    action: Some(EnemyAction::Projectile {
                        direction: toward,
                        speed,
                        radius: self.profile.projectile_radius,
                        damage,
                        lifetime,
                    }),
                }
            }
            Behavior::Exploder => {
                self.last_attack = Some(ctx.now);
                AiOutput {
                    velocity: Vec3::ZERO,
                    action: Some(EnemyAction::Explode {
                        radius: self.profile.explosion_radius,
                        damage,
                    }),
                }
            }
            // Idle never gets here; support/summoner resolve to Support state
            Behavior::Idle | Behavior::Support | Behavior::Summoner => AiOutput::idle(),
        }
    }

    fn execute_support(&mut self, ctx: &EnemyContext<'_>, distance: f32, toward: Vec3, speed: f32) -> AiOutput {
        match self.profile.behavior {
            Behavior::Support => {
                let velocity = if distance < self.profile.attack_range * 0.5 {
                    -toward * speed
                } else {
                    Vec3::ZERO
                };

                let action = if Self::cooldown_ready(self.last_buff, self.profile.buff_cooldown, ctx.now) {
                    self.last_buff = Some(ctx.now);
                    Some(EnemyAction::Buff {
                        radius: self.profile.buff_radius,
                        damage_multiplier: self.profile.buff_damage_multiplier,
                        speed_multiplier: self.profile.buff_speed_multiplier,
                        duration: self.profile.buff_duration,
                    })
                } else {
                    None
                };

                AiOutput { velocity, action }
            }
            Behavior::Summoner => {
                // Inside attack range means too close: back off toward max distance
                let velocity = -toward * speed;

                let can_summon = ctx.live_summons < self.profile.max_summons
                    && Self::cooldown_ready(self.last_summon, self.profile.summon_cooldown, ctx.now);
                let action = if can_summon {
                    self.last_summon = Some(ctx.now);
                    Some(EnemyAction::Summon {
                        enemy_type: self.profile.summon_type.clone(),
                        radius: self.profile.summon_radius,
                    })
                } else {
                    None
                };

                AiOutput { velocity, action }
            }
            _ => AiOutput::idle(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn profile_for(behavior: Behavior) -> Arc<EnemyProfile> {
        Arc::new(EnemyProfile { behavior, ..EnemyProfile::default() })
    }

    fn player(id: u8, x: f32, z: f32) -> TargetInfo {
        TargetInfo { id: PlayerId::from_bytes([id; 16]), position: Vec3::flat(x, z), alive: true }
    }

    fn ctx<'a>(players: &'a [TargetInfo], health_fraction: f32, now: f64) -> EnemyContext<'a> {
        EnemyContext {
            position: Vec3::ZERO,
            health_fraction,
            now,
            stunned: false,
            speed_multiplier: 1.0,
            damage_multiplier: 1.0,
            live_summons: 0,
            players,
        }
    }

    #[test]
    fn test_idle_behavior_never_acts() {
        let mut ai = EnemyAI::new(profile_for(Behavior::Idle));
        let players = [player(1, 1.0, 0.0)];
        let out = ai.update(&ctx(&players, 1.0, 0.0));
        assert_eq!(ai.state(), AiState::Idle);
        assert_eq!(out, AiOutput::idle());
    }

    #[test]
    fn test_acquires_nearest_in_aggro() {
        let mut ai = EnemyAI::new(profile_for(Behavior::Melee));
        let players = [player(1, 10.0, 0.0), player(2, 5.0, 0.0), player(3, 50.0, 0.0)];

        let out = ai.update(&ctx(&players, 1.0, 0.0));
        assert_eq!(ai.state(), AiState::Chase);
        assert_eq!(ai.target(), Some(players[1].id));
        assert!(out.velocity.x > 0.0);
    }

    #[test]
    fn test_no_target_stays_idle() {
        let mut ai = EnemyAI::new(profile_for(Behavior::Melee));
        let players = [player(1, 40.0, 0.0)];
        let out = ai.update(&ctx(&players, 1.0, 0.0));
        assert_eq!(ai.state(), AiState::Idle);
        assert!(ai.target().is_none());
        assert_eq!(out.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_dead_target_is_replaced() {
        let mut ai = EnemyAI::new(profile_for(Behavior::Melee));
        let mut players = [player(1, 3.0, 0.0), player(2, 6.0, 0.0)];
        ai.update(&ctx(&players, 1.0, 0.0));
        assert_eq!(ai.target(), Some(players[0].id));

        players[0].alive = false;
        ai.update(&ctx(&players, 1.0, 0.1));
        assert_eq!(ai.target(), Some(players[1].id));
    }

    #[test]
    fn test_melee_attacks_then_chases_on_cooldown() {
        let mut ai = EnemyAI::new(profile_for(Behavior::Melee));
        let players = [player(1, 1.0, 0.0)];

        let out = ai.update(&ctx(&players, 1.0, 0.0));
        assert_eq!(ai.state(), AiState::Attack);
        assert!(matches!(out.action, Some(EnemyAction::Melee { damage, .. }) if damage == 8.0));

        // On cooldown: no attack, still moving toward the target
        let out = ai.update(&ctx(&players, 1.0, 0.5));
        assert!(out.action.is_none());
        assert!(out.velocity.x > 0.0);

        // Cooldown elapsed
        let out = ai.update(&ctx(&players, 1.0, 1.2));
        assert!(out.action.is_some());
    }

    #[test]
    fn test_attack_to_chase_when_target_moves_away() {
        let mut ai = EnemyAI::new(profile_for(Behavior::Melee));
        let near = [player(1, 1.0, 0.0)];
        ai.update(&ctx(&near, 1.0, 0.0));
        assert_eq!(ai.state(), AiState::Attack);

        let far = [player(1, 8.0, 0.0)];
        ai.update(&ctx(&far, 1.0, 0.1));
        assert_eq!(ai.state(), AiState::Chase);

        // Beyond aggro: drop the target
        let gone = [player(1, 30.0, 0.0)];
        ai.update(&ctx(&gone, 1.0, 0.2));
        assert_eq!(ai.state(), AiState::Idle);
        assert!(ai.target().is_none());
    }

    #[test]
    fn test_flee_overrides_distance() {
        let profile = Arc::new(EnemyProfile { flee_health: 0.25, ..EnemyProfile::default() });
        let mut ai = EnemyAI::new(profile);

        // Acquire while healthy
        let near = [player(1, 5.0, 0.0)];
        ai.update(&ctx(&near, 1.0, 0.0));
        assert_eq!(ai.state(), AiState::Chase);

        // In melee range at 20% health: flee, not attack
        let touching = [player(1, 1.0, 0.0)];
        let out = ai.update(&ctx(&touching, 0.2, 0.1));
        assert_eq!(ai.state(), AiState::Flee);
        assert!(out.velocity.x < 0.0);
        assert!(out.action.is_none());

        // Far outside aggro range, still a living target: flee
        let far = [player(1, 100.0, 0.0)];
        ai.update(&ctx(&far, 0.2, 0.2));
        assert_eq!(ai.state(), AiState::Flee);
    }

    #[test]
    fn test_stun_suppresses_everything() {
        let mut ai = EnemyAI::new(profile_for(Behavior::Melee));
        let players = [player(1, 1.0, 0.0)];
        let mut c = ctx(&players, 1.0, 0.0);
        c.stunned = true;

        let out = ai.update(&c);
        assert_eq!(out.velocity, Vec3::ZERO);
        assert!(out.action.is_none());
    }

    #[test]
    fn test_slow_scales_speed() {
        let mut ai = EnemyAI::new(profile_for(Behavior::Melee));
        let players = [player(1, 8.0, 0.0)];
        let mut c = ctx(&players, 1.0, 0.0);
        c.speed_multiplier = 0.5;

        let out = ai.update(&c);
        assert!((out.velocity.horizontal_length() - 1.75).abs() < 1e-5);
    }

    #[test]
    fn test_rage_multiplies_damage_and_is_sticky() {
        let mut ai = EnemyAI::new(profile_for(Behavior::Melee));
        let players = [player(1, 1.0, 0.0)];

        let out = ai.update(&ctx(&players, 0.25, 0.0));
        assert!(ai.is_enraged());
        assert!(matches!(out.action, Some(EnemyAction::Melee { damage, .. }) if (damage - 12.0).abs() < 1e-5));

        // Healed to full: still enraged
        ai.update(&ctx(&players, 1.0, 5.0));
        assert!(ai.is_enraged());
    }

    #[test]
    fn test_ranged_holds_position_and_fires() {
        let profile = Arc::new(EnemyProfile {
            behavior: Behavior::Ranged,
            attack_range: 10.0,
            ..EnemyProfile::default()
        });
        let mut ai = EnemyAI::new(profile);
        let players = [player(1, 0.0, 7.0)];

        let out = ai.update(&ctx(&players, 1.0, 0.0));
        assert_eq!(out.velocity, Vec3::ZERO);
        match out.action {
            Some(EnemyAction::Projectile { direction, .. }) => assert!(direction.z > 0.99),
            other => panic!("expected projectile, got {:?}", other),
        }

        let out = ai.update(&ctx(&players, 1.0, 0.1));
        assert_eq!(out.velocity, Vec3::ZERO);
        assert!(out.action.is_none());
    }

    #[test]
    fn test_exploder_detonates_on_contact() {
        let mut ai = EnemyAI::new(profile_for(Behavior::Exploder));
        let players = [player(1, 1.0, 0.0)];
        let out = ai.update(&ctx(&players, 1.0, 0.0));
        assert!(matches!(out.action, Some(EnemyAction::Explode { radius, .. }) if radius == 3.0));
    }

    #[test]
    fn test_charger_bonus_damage_during_charge() {
        let mut ai = EnemyAI::new(profile_for(Behavior::Charger));

        // Within charge trigger range: charge starts, speed boosted
        let approaching = [player(1, 5.0, 0.0)];
        let out = ai.update(&ctx(&approaching, 1.0, 0.0));
        assert!(ai.is_charging(0.0));
        assert!((out.velocity.horizontal_length() - 3.5 * 2.5).abs() < 1e-4);

        // Contact inside the window: base + bonus
        let contact = [player(1, 1.0, 0.0)];
        let out = ai.update(&ctx(&contact, 1.0, 0.5));
        assert!(matches!(out.action, Some(EnemyAction::Melee { damage, .. }) if (damage - 18.0).abs() < 1e-5));
        assert!(!ai.is_charging(0.5));
    }

    #[test]
    fn test_support_buffs_on_cooldown() {
        let profile = Arc::new(EnemyProfile {
            behavior: Behavior::Support,
            attack_range: 9.0,
            ..EnemyProfile::default()
        });
        let mut ai = EnemyAI::new(profile);
        let players = [player(1, 6.0, 0.0)];

        let out = ai.update(&ctx(&players, 1.0, 0.0));
        assert_eq!(ai.state(), AiState::Support);
        assert!(matches!(out.action, Some(EnemyAction::Buff { .. })));

        let out = ai.update(&ctx(&players, 1.0, 1.0));
        assert!(out.action.is_none());

        // Too close: back away
        let close = [player(1, 2.0, 0.0)];
        let out = ai.update(&ctx(&close, 1.0, 2.0));
        assert!(out.velocity.x < 0.0);
    }

    #[test]
    fn test_summoner_respects_cap() {
        let profile = Arc::new(EnemyProfile {
            behavior: Behavior::Summoner,
            attack_range: 12.0,
            max_summons: 2,
            ..EnemyProfile::default()
        });
        let mut ai = EnemyAI::new(profile);
        let players = [player(1, 6.0, 0.0)];

        let mut c = ctx(&players, 1.0, 0.0);
        c.live_summons = 2;
        let out = ai.update(&c);
        assert_eq!(ai.state(), AiState::Support);
        assert!(out.action.is_none());
        assert!(out.velocity.x < 0.0);

        c.live_summons = 1;
        let out = ai.update(&c);
        assert!(matches!(out.action, Some(EnemyAction::Summon { ref enemy_type, .. }) if enemy_type == "skeleton"));

        // Own cooldown applies even below the cap
        c.live_summons = 0;
        c.now = 1.0;
        assert!(ai.update(&c).action.is_none());
    }

    proptest! {
        #[test]
        fn prop_rage_never_reverts(fractions in proptest::collection::vec(0.0f32..1.0, 1..50)) {
            let mut ai = EnemyAI::new(profile_for(Behavior::Melee));
            let threshold = ai.profile().rage_threshold;
            let players = [player(1, 1.0, 0.0)];
            let mut crossed = false;

            for (i, f) in fractions.iter().enumerate() {
                ai.update(&ctx(&players, *f, i as f64));
                if *f <= threshold {
                    crossed = true;
                }
                prop_assert_eq!(ai.is_enraged(), crossed);
            }
        }

        #[test]
        fn prop_stun_means_no_motion_or_action(
            x in -20.0f32..20.0,
            z in -20.0f32..20.0,
            hf in 0.01f32..1.0,
            behavior_idx in 0usize..7,
        ) {
            let behaviors = [
                Behavior::Idle, Behavior::Melee, Behavior::Ranged, Behavior::Charger,
                Behavior::Exploder, Behavior::Support, Behavior::Summoner,
            ];
            let mut ai = EnemyAI::new(profile_for(behaviors[behavior_idx]));
            let players = [player(1, x, z)];
            let mut c = ctx(&players, hf, 3.0);
            c.stunned = true;

            let out = ai.update(&c);
            prop_assert_eq!(out.velocity, Vec3::ZERO);
            prop_assert!(out.action.is_none());
        }
    }
}
