//! AI decision making.
//!
//! Enemy behavior state machines, the companion heuristic, the action
//! contract shared with the LLM pipeline, and the snapshot builder that
//! feeds it.

pub mod action;
pub mod enemy_ai;
pub mod companion;
pub mod snapshot;

pub use action::{AIAction, ActionType, Direction, Mood, TargetSpec};
pub use enemy_ai::{AiState, Behavior, EnemyAI, EnemyProfile};
pub use companion::CharacterAI;
pub use snapshot::{build_state_snapshot, StateSnapshot};
