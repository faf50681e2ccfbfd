//! AI Action Contract
//!
//! [`AIAction`] is the normalized decision both the heuristic companion
//! and the LLM pipeline produce. Targets and directions are symbolic and
//! get resolved against the live enemy set when the action is applied,
//! not when it was generated.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::vec3::Vec3;
use crate::game::ability::AbilityType;
use crate::game::enemy::EnemyId;

// =============================================================================
// VOCABULARY
// =============================================================================

/// What the companion does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Use an ability
    Ability,
    /// Sidestep
    Dodge,
    /// Move away from threats
    Retreat,
    /// Do nothing
    Idle,
}

impl ActionType {
    /// All action types, in grammar order.
    pub const ALL: [ActionType; 4] = [ActionType::Ability, ActionType::Dodge, ActionType::Retreat, ActionType::Idle];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Ability => "ability",
            ActionType::Dodge => "dodge",
            ActionType::Retreat => "retreat",
            ActionType::Idle => "idle",
        }
    }

    /// Exact wire name lookup.
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

/// Companion mood, derived from trust.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    /// Default
    #[default]
    Neutral,
    /// High trust
    Confident,
    /// Low trust
    Anxious,
    /// Very low trust
    Frustrated,
    /// Trust exhausted; may refuse orders
    Refusing,
}

impl Mood {
    /// All moods, in grammar order.
    pub const ALL: [Mood; 5] = [Mood::Neutral, Mood::Confident, Mood::Anxious, Mood::Frustrated, Mood::Refusing];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Neutral => "neutral",
            Mood::Confident => "confident",
            Mood::Anxious => "anxious",
            Mood::Frustrated => "frustrated",
            Mood::Refusing => "refusing",
        }
    }

    /// Mood for a trust value in `[0, 100]`.
    pub fn from_trust(trust: f32) -> Self {
        if trust >= 75.0 {
            Mood::Confident
        } else if trust >= 40.0 {
            Mood::Neutral
        } else if trust >= 25.0 {
            Mood::Anxious
        } else if trust >= 10.0 {
            Mood::Frustrated
        } else {
            Mood::Refusing
        }
    }

    /// Lenient lookup: anything unrecognized is `Neutral`.
    pub fn parse_loose(s: &str) -> Self {
        Self::ALL.into_iter().find(|m| m.as_str() == s).unwrap_or_default()
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Movement direction for dodges, relative to the companion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Strafe left
    Left,
    /// Strafe right
    Right,
    /// Along facing
    Forward,
    /// Against facing
    Back,
    /// Directly away from the nearest enemy
    Away,
}

impl Direction {
    /// All directions, in grammar order.
    pub const ALL: [Direction; 5] = [Direction::Left, Direction::Right, Direction::Forward, Direction::Back, Direction::Away];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Forward => "forward",
            Direction::Back => "back",
            Direction::Away => "away",
        }
    }

    /// Exact wire name lookup.
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }
}

/// Symbolic target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetSpec {
    /// Closest live enemy
    Nearest,
    /// Live enemy with the lowest health fraction
    LowestHealth,
    /// The player's priority target
    Priority,
    /// A specific enemy
    Id(EnemyId),
}

impl TargetSpec {
    /// Parse `nearest`, `lowest_health`, `priority`, `enemy_<id>` or a bare id.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "nearest" => Some(TargetSpec::Nearest),
            "lowest_health" | "weakest" => Some(TargetSpec::LowestHealth),
            "priority" => Some(TargetSpec::Priority),
            other => other
                .strip_prefix("enemy_")
                .unwrap_or(other)
                .parse::<u32>()
                .ok()
                .map(|id| TargetSpec::Id(EnemyId(id))),
        }
    }
}

// =============================================================================
// ACTION
// =============================================================================

/// A normalized companion decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AIAction {
    /// Action kind
    pub action_type: ActionType,
    /// Ability to use (only for `Ability`)
    pub ability: Option<AbilityType>,
    /// Symbolic target
    pub target: Option<TargetSpec>,
    /// Movement direction (dodge)
    pub direction: Option<Direction>,
    /// Mood to display
    pub mood: Mood,
    /// Optional speech line
    pub dialogue: Option<String>,
}

impl AIAction {
    /// Do nothing.
    pub fn idle(mood: Mood) -> Self {
        Self {
            action_type: ActionType::Idle,
            ability: None,
            target: None,
            direction: None,
            mood,
            dialogue: None,
        }
    }

    /// Use an ability on a target.
    pub fn ability(ability: AbilityType, target: TargetSpec, mood: Mood) -> Self {
        Self {
            action_type: ActionType::Ability,
            ability: Some(ability),
            target: Some(target),
            ..Self::idle(mood)
        }
    }

    /// Dodge in a direction.
    pub fn dodge(direction: Direction, mood: Mood) -> Self {
        Self {
            action_type: ActionType::Dodge,
            direction: Some(direction),
            ..Self::idle(mood)
        }
    }

    /// Back away from threats.
    pub fn retreat(mood: Mood) -> Self {
        Self {
            action_type: ActionType::Retreat,
            direction: Some(Direction::Away),
            ..Self::idle(mood)
        }
    }

    /// Attach a speech line.
    pub fn with_dialogue(mut self, line: impl Into<String>) -> Self {
        self.dialogue = Some(line.into());
        self
    }
}

// =============================================================================
// CONSUMPTION-TIME RESOLUTION
// =============================================================================

/// A live enemy as seen when an action is applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnemySighting {
    /// Enemy id
    pub id: EnemyId,
    /// Position
    pub position: Vec3,
    /// Health / max health
    pub health_fraction: f32,
}

fn nearest(origin: Vec3, enemies: &[EnemySighting]) -> Option<&EnemySighting> {
    enemies.iter().min_by(|a, b| {
        origin
            .distance_2d(a.position)
            .total_cmp(&origin.distance_2d(b.position))
            .then(a.id.cmp(&b.id))
    })
}

/// Resolve a symbolic target against the enemies alive right now.
///
/// A priority or explicit target that is no longer alive falls back to
/// the nearest enemy. Returns `None` only when no enemy is alive.
pub fn resolve_target(
    spec: TargetSpec,
    origin: Vec3,
    enemies: &[EnemySighting],
    priority: Option<EnemyId>,
) -> Option<EnemySighting> {
    let by_id = |id: EnemyId| enemies.iter().find(|e| e.id == id).copied();

    match spec {
        TargetSpec::Nearest => nearest(origin, enemies).copied(),
        TargetSpec::LowestHealth => enemies
            .iter()
            .min_by(|a, b| a.health_fraction.total_cmp(&b.health_fraction).then(a.id.cmp(&b.id)))
            .copied(),
        TargetSpec::Priority => priority
            .and_then(by_id)
            .or_else(|| nearest(origin, enemies).copied()),
        TargetSpec::Id(id) => by_id(id).or_else(|| nearest(origin, enemies).copied()),
    }
}

/// Resolve a direction into a horizontal unit vector.
pub fn resolve_direction(direction: Direction, origin: Vec3, facing: Vec3, enemies: &[EnemySighting]) -> Vec3 {
    let facing = facing.normalize_2d();
    match direction {
        Direction::Forward => facing,
        Direction::Back => -facing,
        Direction::Right => facing.perpendicular_right(),
        Direction::Left => -facing.perpendicular_right(),
        Direction::Away => match nearest(origin, enemies) {
            Some(e) => {
                let away = (origin - e.position).normalize_2d();
                if away == Vec3::ZERO { -facing } else { away }
            }
            None => -facing,
        },
    }
}
