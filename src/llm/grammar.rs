//! Output Grammar
//!
//! GBNF grammar that restricts generation to one action object over the
//! fixed action/mood/ability/direction vocabularies. Built from the same
//! enums the parser accepts, so the two cannot drift apart.

use crate::ai::action::{ActionType, Direction, Mood};
use crate::game::ability::AbilityType;

fn alternatives<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names
        .into_iter()
        .map(|n| format!("\"\\\"{n}\\\"\""))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// GBNF grammar for one companion action.
///
/// ```text
/// {"action": "ability", "ability": "fireball", "target": "enemy_3", "mood": "confident"}
/// ```
pub fn action_grammar() -> String {
    let actions = alternatives(ActionType::ALL.iter().map(|a| a.as_str()));
    let moods = alternatives(Mood::ALL.iter().map(|m| m.as_str()));
    let abilities = alternatives(AbilityType::ALL.iter().map(|a| a.as_str()));
    let directions = alternatives(Direction::ALL.iter().map(|d| d.as_str()));

    format!(
        r#"root ::= "{{" ws "\"action\":" ws action ability-field? target-field? direction-field? "," ws "\"mood\":" ws mood dialogue-field? ws "}}"
ability-field ::= "," ws "\"ability\":" ws ability
target-field ::= "," ws "\"target\":" ws string
direction-field ::= "," ws "\"direction\":" ws direction
dialogue-field ::= "," ws "\"dialogue\":" ws string
action ::= {actions}
mood ::= {moods}
ability ::= {abilities}
direction ::= {directions}
string ::= "\"" [a-zA-Z0-9_ .,!?'-]* "\""
ws ::= [ \t\n]*
"#
    )
}
