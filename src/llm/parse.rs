//! Action Parsing
//!
//! Turns model output into an [`AIAction`].
//!
//! Validation is deliberately asymmetric:
//! - `action` is strict: missing or unknown is an error (the caller falls
//!   back to the heuristic).
//! - `mood` is loose: unknown values become `neutral`.
//! - `ability` must name a known ability when `action` is `ability`.
//! - `target` and `direction` are loose; unknown values are dropped and
//!   resolved to defaults when the action is applied.

use serde::Deserialize;

use crate::ai::action::{AIAction, ActionType, Direction, Mood, TargetSpec};
use crate::game::ability::AbilityType;
use crate::game::enemy::EnemyId;

/// Parse errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// No `{...}` object in the output
    #[error("No JSON object in model output")]
    NoJson,

    /// Object did not parse
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// `action` field absent
    #[error("Missing action field")]
    MissingAction,

    /// `action` not in the vocabulary
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// `action` is `ability` but no ability named
    #[error("Ability action without an ability")]
    MissingAbility,

    /// Ability name not in the vocabulary
    #[error("Unknown ability: {0}")]
    UnknownAbility(String),
}

#[derive(Deserialize)]
struct ActionWire {
    action: Option<String>,
    #[serde(default)]
    ability: Option<serde_json::Value>,
    #[serde(default)]
    target: Option<serde_json::Value>,
    #[serde(default)]
    direction: Option<serde_json::Value>,
    #[serde(default)]
    mood: Option<serde_json::Value>,
    #[serde(default)]
    dialogue: Option<serde_json::Value>,
}

/// String content of a loose field; any other JSON type reads as absent.
fn loose_str(value: &Option<serde_json::Value>) -> Option<&str> {
    value.as_ref().and_then(serde_json::Value::as_str)
}

/// Slice from the first `{` to the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

fn parse_target(value: &serde_json::Value) -> Option<TargetSpec> {
    match value {
        serde_json::Value::String(s) => TargetSpec::parse(s),
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|id| u32::try_from(id).ok())
            .map(|id| TargetSpec::Id(EnemyId(id))),
        _ => None,
    }
}

/// Parse model output into an action.
pub fn parse_llm_action(text: &str) -> Result<AIAction, ParseError> {
    let json = extract_json_object(text).ok_or(ParseError::NoJson)?;
    let wire: ActionWire = serde_json::from_str(json).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let raw_action = wire.action.ok_or(ParseError::MissingAction)?;
    let action_type =
        ActionType::from_wire(&normalize(&raw_action)).ok_or(ParseError::InvalidAction(raw_action))?;

    let mood = loose_str(&wire.mood).map(|m| Mood::parse_loose(&normalize(m))).unwrap_or_default();

    let ability = match action_type {
        ActionType::Ability => {
            let value = wire.ability.ok_or(ParseError::MissingAbility)?;
            let ability = match value.as_str() {
                Some(name) => normalize(name)
                    .parse::<AbilityType>()
                    .map_err(|_| ParseError::UnknownAbility(name.to_string()))?,
                None => return Err(ParseError::UnknownAbility(value.to_string())),
            };
            Some(ability)
        }
        _ => None,
    };

    let dialogue = loose_str(&wire.dialogue)
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    Ok(AIAction {
        action_type,
        ability,
        target: wire.target.as_ref().and_then(parse_target),
        direction: loose_str(&wire.direction).and_then(|d| Direction::from_wire(&normalize(d))),
        mood,
        dialogue,
    })
}
