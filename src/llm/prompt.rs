//! Prompt Builder
//!
//! Wraps a rendered [`StateSnapshot`] in the instructions and output
//! contract sent to the model.

use crate::ai::snapshot::StateSnapshot;

/// Standing instructions for the companion model.
pub const SYSTEM_PROMPT: &str = "You are the combat companion of a dungeon explorer. \
Pick exactly one action for the next half second. Prefer abilities that are ready \
and in range, focus the [PRIORITY] enemy when one is marked, and dodge or retreat \
when health is low.";

/// Output contract appended after the state.
pub const CONTRACT: &str = "Reply with one JSON object and nothing else: \
{\"action\": \"ability|dodge|retreat|idle\", \"ability\": \"...\", \"target\": \"nearest|lowest_health|priority|enemy_<id>\", \
\"direction\": \"left|right|forward|back|away\", \"mood\": \"neutral|confident|anxious|frustrated|refusing\", \"dialogue\": \"...\"}";

/// Full prompt for one decision.
pub fn build_prompt(snapshot: &StateSnapshot) -> String {
    format!(
        "{SYSTEM_PROMPT}\n\n[STATE]\n{}\n[CONTRACT]\n{CONTRACT}\n",
        snapshot.to_prompt()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::action::Mood;
    use crate::game::player::PlayerId;

    #[test]
    fn test_prompt_sections() {
        let snapshot = StateSnapshot {
            player_id: PlayerId::from_bytes([3; 16]),
            health_fraction: 0.5,
            light_radius: 10.0,
            in_dungeon: true,
            trust: 60.0,
            mood: Mood::Neutral,
            aggression: 0.5,
            abilities: Vec::new(),
            enemies: Vec::new(),
        };

        let prompt = build_prompt(&snapshot);
        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.contains("[STATE]\n[STATUS]\nhealth: 50%"));
        assert!(prompt.contains("none visible"));
        assert!(prompt.trim_end().ends_with(CONTRACT));
    }
}
