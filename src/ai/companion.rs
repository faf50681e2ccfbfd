//! Companion AI
//!
//! Heuristic combat controller attached to a player. A trust value
//! (0-100) set by the player's strategic calls drives the mood and gates
//! risky choices. Decisions happen on a fixed cadence of accumulated
//! game time, not every tick.
//!
//! When the LLM pipeline is enabled the companion hands its snapshot to
//! the pipeline and keeps the result receiver here; a fallback result
//! (`None`) means "run [`CharacterAI::decide`] instead".

use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::ai::action::{AIAction, Direction, EnemySighting, Mood, TargetSpec};
use crate::config::CompanionConfig;
use crate::core::rng::DeterministicRng;
use crate::core::vec3::Vec3;
use crate::game::ability::{AbilityManager, AbilityType};
use crate::game::enemy::EnemyId;

/// Trust bounds.
pub const MIN_TRUST: f32 = 0.0;
/// Trust bounds.
pub const MAX_TRUST: f32 = 100.0;

/// Bad calls cost this many times the trust a good call earns.
pub const BAD_CALL_PENALTY: f32 = 1.5;

/// Health fraction that always counts as high threat.
const CRITICAL_HEALTH: f32 = 0.3;

/// Line spoken when the companion refuses to fight.
const REFUSAL_LINE: &str = "I'm not dying for your bad calls.";

/// Everything the heuristic reads for one decision.
#[derive(Clone, Copy, Debug)]
pub struct CompanionView<'a> {
    /// Companion position
    pub position: Vec3,
    /// Health / max health
    pub health_fraction: f32,
    /// Cooldown state
    pub abilities: &'a AbilityManager,
    /// Live enemies, in id order
    pub enemies: &'a [EnemySighting],
    /// World clock
    pub now: f64,
}

/// Result of polling a pending LLM decision.
#[derive(Clone, Debug, PartialEq)]
pub enum PendingPoll {
    /// Nothing was requested
    Idle,
    /// Still generating
    Waiting,
    /// The pipeline produced an action
    Ready(AIAction),
    /// The pipeline gave up; run the heuristic
    Fallback,
}

/// Companion controller.
#[derive(Debug)]
pub struct CharacterAI {
    config: Arc<CompanionConfig>,
    trust: f32,
    aggression: f32,
    preferred_ability: Option<AbilityType>,
    priority_target: Option<EnemyId>,
    decision_timer: f64,
    pending: Option<oneshot::Receiver<Option<AIAction>>>,
    rng: DeterministicRng,
    last_action: Option<AIAction>,
}

impl CharacterAI {
    /// Create a companion with configured starting trust and aggression.
    pub fn new(config: Arc<CompanionConfig>, seed: u64) -> Self {
        Self {
            trust: config.initial_trust.clamp(MIN_TRUST, MAX_TRUST),
            aggression: config.aggression.clamp(0.0, 1.0),
            config,
            preferred_ability: None,
            priority_target: None,
            decision_timer: 0.0,
            pending: None,
            rng: DeterministicRng::new(seed),
            last_action: None,
        }
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Current trust.
    pub fn trust(&self) -> f32 {
        self.trust
    }

    /// Mood derived from trust.
    pub fn mood(&self) -> Mood {
        Mood::from_trust(self.trust)
    }

    /// Aggression in `[0, 1]`.
    pub fn aggression(&self) -> f32 {
        self.aggression
    }

    /// Set aggression (clamped).
    pub fn set_aggression(&mut self, aggression: f32) {
        self.aggression = aggression.clamp(0.0, 1.0);
    }

    /// Ability tried first.
    pub fn preferred_ability(&self) -> Option<AbilityType> {
        self.preferred_ability
    }

    /// Set the ability tried first.
    pub fn set_preferred_ability(&mut self, ability: Option<AbilityType>) {
        self.preferred_ability = ability;
    }

    /// Enemy the player asked to focus.
    pub fn priority_target(&self) -> Option<EnemyId> {
        self.priority_target
    }

    /// Set or clear the focus target.
    pub fn set_priority_target(&mut self, target: Option<EnemyId>) {
        self.priority_target = target;
    }

    /// Most recent action applied.
    pub fn last_action(&self) -> Option<&AIAction> {
        self.last_action.as_ref()
    }

    /// Remember the action that was applied.
    pub fn record_action(&mut self, action: AIAction) {
        self.last_action = Some(action);
    }

    /// Adjust trust after a player strategic call. Good calls add
    /// `trust_gain`, bad calls subtract `trust_gain * 1.5`.
    pub fn record_strategic_call(&mut self, good: bool) -> Mood {
        let delta = if good {
            self.config.trust_gain
        } else {
            -self.config.trust_gain * BAD_CALL_PENALTY
        };
        self.trust = (self.trust + delta).clamp(MIN_TRUST, MAX_TRUST);
        self.mood()
    }

    // =========================================================================
    // Cadence
    // =========================================================================

    /// Accumulate `dt`. Returns true (and resets) once a full decision
    /// interval has built up.
    pub fn tick(&mut self, dt: f64) -> bool {
        self.decision_timer += dt;
        if self.decision_timer >= self.config.decision_interval {
            self.decision_timer = 0.0;
            return true;
        }
        false
    }

    // =========================================================================
    // LLM hand-off
    // =========================================================================

    /// True while an LLM decision is outstanding.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Park the receiver of an LLM request.
    pub fn set_pending(&mut self, rx: oneshot::Receiver<Option<AIAction>>) {
        self.pending = Some(rx);
    }

    /// Non-blocking check on the outstanding LLM decision.
    pub fn poll_pending(&mut self) -> PendingPoll {
        let Some(rx) = self.pending.as_mut() else {
            return PendingPoll::Idle;
        };

        let result = match rx.try_recv() {
            Ok(Some(action)) => PendingPoll::Ready(action),
            Ok(None) => PendingPoll::Fallback,
            Err(TryRecvError::Empty) => return PendingPoll::Waiting,
            // Sender dropped without answering
            Err(TryRecvError::Closed) => PendingPoll::Fallback,
        };
        self.pending = None;
        result
    }

    // =========================================================================
    // Heuristic
    // =========================================================================

    /// Closeness in `[0, 1]`: 1 at zero distance, 0 at `max_engage_range`.
    fn closeness(&self, distance: f32) -> f32 {
        if self.config.max_engage_range <= 0.0 {
            return 0.0;
        }
        (1.0 - distance / self.config.max_engage_range).clamp(0.0, 1.0)
    }

    /// Target score: closeness, plus missing health, plus an
    /// aggression-scaled closeness bonus.
    pub fn score_target(&self, distance: f32, health_fraction: f32) -> f32 {
        let closeness = self.closeness(distance);
        closeness
            + (1.0 - health_fraction) * self.config.low_health_weight
            + self.aggression * closeness * self.config.closeness_bonus
    }

    /// Pick a target: the priority target while it lives, otherwise the
    /// best score (ties to the lower id). Clears a dead priority target.
    pub fn select_target(&mut self, origin: Vec3, enemies: &[EnemySighting]) -> Option<EnemySighting> {
        if let Some(id) = self.priority_target {
            match enemies.iter().find(|e| e.id == id) {
                Some(e) => return Some(*e),
                None => self.priority_target = None,
            }
        }

        let mut best: Option<(f32, EnemySighting)> = None;
        for e in enemies {
            let score = self.score_target(origin.distance_2d(e.position), e.health_fraction);
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, *e));
            }
        }
        best.map(|(_, e)| e)
    }

    /// Abilities in the order they are considered: preferred first, then
    /// the rest of the known set in catalog order.
    fn ability_order(&self, abilities: &AbilityManager) -> Vec<AbilityType> {
        let mut order = Vec::with_capacity(AbilityType::ALL.len());
        if let Some(p) = self.preferred_ability.filter(|p| abilities.knows(*p)) {
            order.push(p);
        }
        for t in AbilityType::ALL {
            if abilities.knows(t) && !order.contains(&t) {
                order.push(t);
            }
        }
        order
    }

    /// First ability that is ready, in tolerated range and allowed by trust.
    pub fn choose_ability(&self, abilities: &AbilityManager, distance: f32, now: f64) -> Option<AbilityType> {
        let low_trust = self.trust < self.config.melee_trust_threshold;

        self.ability_order(abilities).into_iter().find(|&t| {
            if !abilities.is_ready(t, now) {
                return false;
            }
            let def = abilities.definition(t);
            if low_trust && def.is_melee() {
                return false;
            }
            distance <= def.range * self.config.range_tolerance
        })
    }

    /// Run the heuristic once.
    pub fn decide(&mut self, view: &CompanionView<'_>) -> AIAction {
        let mood = self.mood();

        // Dead priority targets are cleared even when nothing else happens
        if let Some(id) = self.priority_target {
            if !view.enemies.iter().any(|e| e.id == id) {
                self.priority_target = None;
            }
        }

        if view.enemies.is_empty() {
            return AIAction::idle(mood);
        }

        // Refusal under threat at low trust
        let nearby = view
            .enemies
            .iter()
            .filter(|e| view.position.distance_2d(e.position) <= self.config.threat_radius)
            .count();
        let high_threat = nearby >= self.config.threat_count || view.health_fraction < CRITICAL_HEALTH;
        if self.trust < self.config.refuse_trust_threshold && high_threat {
            return AIAction::idle(Mood::Refusing).with_dialogue(REFUSAL_LINE);
        }

        let nearest_distance = view
            .enemies
            .iter()
            .map(|e| view.position.distance_2d(e.position))
            .fold(f32::INFINITY, f32::min);

        // Dodge roll
        if view.health_fraction < self.config.dodge_health_threshold
            && nearest_distance <= self.config.dodge_distance
            && self.rng.chance(self.config.dodge_chance)
        {
            let direction = if self.rng.next_int(2) == 0 { Direction::Left } else { Direction::Right };
            return AIAction::dodge(direction, mood);
        }

        if view.health_fraction < self.config.retreat_health_threshold {
            return AIAction::retreat(mood);
        }

        let Some(target) = self.select_target(view.position, view.enemies) else {
            return AIAction::idle(mood);
        };
        let distance = view.position.distance_2d(target.position);

        match self.choose_ability(view.abilities, distance, view.now) {
            Some(ability) => {
                let spec = if self.priority_target == Some(target.id) {
                    TargetSpec::Priority
                } else {
                    TargetSpec::Id(target.id)
                };
                AIAction::ability(ability, spec, mood)
            }
            None => AIAction::idle(mood),
        }
    }
}
