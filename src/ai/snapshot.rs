//! State Snapshot Builder
//!
//! Projects world state into a small, perception-filtered description
//! for one player's companion. Snapshots are single-use: built for one
//! decision, rendered into a prompt, then dropped.

use serde::{Serialize, Deserialize};

use crate::ai::action::Mood;
use crate::config::PerceptionConfig;
use crate::core::geometry::relative_angle_deg;
use crate::game::ability::AbilityReadiness;
use crate::game::damage::Damageable;
use crate::game::enemy::{Enemy, EnemyId};
use crate::game::player::{Player, PlayerId};

/// Hard cap on listed enemies.
pub const MAX_SNAPSHOT_ENEMIES: usize = 8;

/// One visible enemy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemySnapshot {
    /// Enemy id
    pub id: EnemyId,
    /// Type name
    pub enemy_type: String,
    /// Horizontal distance from the player
    pub distance: f32,
    /// Health percentage (0-100)
    pub health_pct: f32,
    /// Bearing relative to the player's facing, degrees, positive right
    pub angle_deg: f32,
    /// Marked by the player as the focus target
    pub is_priority: bool,
}

/// Bounded description of the world from one player's point of view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Whose view this is
    pub player_id: PlayerId,
    /// Health / max health
    pub health_fraction: f32,
    /// Radius used for the perception filter
    pub light_radius: f32,
    /// True underground
    pub in_dungeon: bool,
    /// Companion trust
    pub trust: f32,
    /// Companion mood
    pub mood: Mood,
    /// Companion aggression
    pub aggression: f32,
    /// Every known ability's readiness
    pub abilities: Vec<AbilityReadiness>,
    /// Nearest visible live enemies, ascending by distance
    pub enemies: Vec<EnemySnapshot>,
}

/// Build a snapshot for `player`.
///
/// Underground only enemies within the player's light radius (or the
/// configured default) are visible; above ground a flat perception
/// distance applies. The visible list is sorted by `(distance, id)` and
/// truncated to the nearest [`MAX_SNAPSHOT_ENEMIES`] (or fewer if
/// configured).
pub fn build_state_snapshot<'a>(
    player: &Player,
    enemies: impl IntoIterator<Item = &'a Enemy>,
    now: f64,
    perception: &PerceptionConfig,
) -> StateSnapshot {
    let in_dungeon = player.is_underground();
    let light_radius = if in_dungeon {
        player.light_radius.unwrap_or(perception.default_light_radius)
    } else {
        perception.surface_perception_distance
    };

    let (trust, mood, aggression, priority) = match &player.companion {
        Some(c) => (c.trust(), c.mood(), c.aggression(), c.priority_target()),
        None => (50.0, Mood::Neutral, 0.5, None),
    };

    let mut visible: Vec<EnemySnapshot> = enemies
        .into_iter()
        .filter(|e| e.is_alive())
        .filter_map(|e| {
            let distance = player.position.distance_2d(e.position);
            if distance > light_radius {
                return None;
            }
            Some(EnemySnapshot {
                id: e.id,
                enemy_type: e.enemy_type.clone(),
                distance,
                health_pct: e.health_fraction() * 100.0,
                angle_deg: relative_angle_deg(player.position, player.rotation, e.position),
                is_priority: priority == Some(e.id),
            })
        })
        .collect();

    visible.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
    visible.truncate(perception.max_snapshot_enemies.min(MAX_SNAPSHOT_ENEMIES));

    StateSnapshot {
        player_id: player.id,
        health_fraction: player.health_fraction(),
        light_radius,
        in_dungeon,
        trust,
        mood,
        aggression,
        abilities: player.abilities.readiness(now),
        enemies: visible,
    }
}

impl StateSnapshot {
    /// Render the snapshot as a stable text block.
    pub fn to_prompt(&self) -> String {
        let location = if self.in_dungeon { "dungeon" } else { "surface" };
        let mut lines = vec![
            "[STATUS]".to_string(),
            format!("health: {:.0}%", self.health_fraction * 100.0),
            format!("location: {} (sight {:.1})", location, self.light_radius),
            format!("trust: {:.0} mood: {} aggression: {:.2}", self.trust, self.mood, self.aggression),
            "[ABILITIES]".to_string(),
        ];

        lines.extend(self.abilities.iter().map(|a| {
            if a.ready {
                format!("{}: ready", a.ability_type)
            } else {
                format!("{}: cooldown {:.1}s", a.ability_type, a.remaining)
            }
        }));

        lines.push("[ENEMIES]".to_string());
        if self.enemies.is_empty() {
            lines.push("none visible".to_string());
        }
        lines.extend(self.enemies.iter().map(|e| {
            let marker = if e.is_priority { " [PRIORITY]" } else { "" };
            format!(
                "{} {} dist={:.1} hp={:.0}% angle={:.0}{}",
                e.id, e.enemy_type, e.distance, e.health_pct, e.angle_deg, marker
            )
        }));

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::ai::companion::CharacterAI;
    use crate::ai::enemy_ai::EnemyProfile;
    use crate::config::CompanionConfig;
    use crate::core::vec3::Vec3;
    use crate::game::ability::{AbilityCatalog, AbilityManager, AbilityType};

    fn player() -> Player {
        let abilities = AbilityManager::new(Arc::new(AbilityCatalog::builtin()), &AbilityType::ALL);
        Player::new(PlayerId::from_bytes([9; 16]), "dana", Vec3::ZERO, 100.0, 5.0, abilities)
    }

    fn enemy(id: u32, x: f32, z: f32) -> Enemy {
        Enemy::new(EnemyId(id), "skeleton", Vec3::flat(x, z), Arc::new(EnemyProfile::default()))
    }

    #[test]
    fn test_dungeon_light_radius_filter() {
        let mut p = player();
        p.depth = -1;
        p.light_radius = Some(10.0);
        let enemies = [enemy(1, 5.0, 0.0), enemy(2, 15.0, 0.0)];

        let snap = build_state_snapshot(&p, &enemies, 0.0, &PerceptionConfig::default());
        assert!(snap.in_dungeon);
        assert_eq!(snap.enemies.len(), 1);
        assert_eq!(snap.enemies[0].id, EnemyId(1));
        assert!((snap.enemies[0].distance - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_dungeon_default_light_radius() {
        let mut p = player();
        p.depth = -2;
        let config = PerceptionConfig { default_light_radius: 4.0, ..PerceptionConfig::default() };
        let enemies = [enemy(1, 3.0, 0.0), enemy(2, 6.0, 0.0)];

        let snap = build_state_snapshot(&p, &enemies, 0.0, &config);
        assert_eq!(snap.light_radius, 4.0);
        assert_eq!(snap.enemies.len(), 1);
    }

    #[test]
    fn test_surface_uses_flat_perception() {
        let mut p = player();
        p.light_radius = Some(1.0);
        let enemies = [enemy(1, 25.0, 0.0), enemy(2, 35.0, 0.0)];

        let snap = build_state_snapshot(&p, &enemies, 0.0, &PerceptionConfig::default());
        assert!(!snap.in_dungeon);
        assert_eq!(snap.enemies.len(), 1);
        assert_eq!(snap.enemies[0].id, EnemyId(1));
    }

    #[test]
    fn test_sorted_truncated_and_live_only() {
        let p = player();
        let mut enemies: Vec<Enemy> = (0..12).map(|i| enemy(i, 20.0 - i as f32, 0.0)).collect();
        enemies[11].kill(0.0);
        // Same distance as enemy 10: tie broken by id
        enemies.push(enemy(50, 10.0, 0.0));

        let snap = build_state_snapshot(&p, &enemies, 0.0, &PerceptionConfig::default());
        assert_eq!(snap.enemies.len(), MAX_SNAPSHOT_ENEMIES);
        assert_eq!(snap.enemies[0].id, EnemyId(10));
        assert!(snap.enemies.iter().all(|e| e.id != EnemyId(11)));
        assert!(snap.enemies.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(snap.enemies[1].id, EnemyId(50));
        assert_eq!(snap.enemies[2].id, EnemyId(9));
    }

    #[test]
    fn test_companion_fields_and_priority_marker() {
        let mut p = player();
        let mut companion = CharacterAI::new(Arc::new(CompanionConfig::default()), 1);
        companion.set_priority_target(Some(EnemyId(2)));
        p.companion = Some(companion);
        p.abilities.use_ability(AbilityType::Fireball, 0.0).unwrap();
        let enemies = [enemy(1, 3.0, 0.0), enemy(2, 0.0, 4.0)];

        let snap = build_state_snapshot(&p, &enemies, 0.5, &PerceptionConfig::default());
        assert_eq!(snap.trust, 50.0);
        assert!(snap.enemies[1].is_priority);
        assert!(!snap.abilities[0].ready);

        let prompt = snap.to_prompt();
        assert!(prompt.contains("fireball: cooldown 1.5s"));
        assert!(prompt.contains("enemy_2 skeleton dist=4.0 hp=100% angle=0 [PRIORITY]"));
        assert!(prompt.contains("enemy_1 skeleton dist=3.0 hp=100% angle=90\n"));
        // Deterministic
        assert_eq!(prompt, snap.to_prompt());
    }

    #[test]
    fn test_prompt_layout() {
        let snap = StateSnapshot {
            player_id: PlayerId::from_bytes([1; 16]),
            health_fraction: 0.5,
            light_radius: 8.0,
            in_dungeon: true,
            trust: 60.0,
            mood: Mood::Neutral,
            aggression: 0.5,
            abilities: vec![
                AbilityReadiness { ability_type: AbilityType::Fireball, ready: true, remaining: 0.0 },
                AbilityReadiness { ability_type: AbilityType::BasicAttack, ready: false, remaining: 1.5 },
            ],
            enemies: vec![EnemySnapshot {
                id: EnemyId(4),
                enemy_type: "skeleton".to_string(),
                distance: 3.0,
                health_pct: 80.0,
                angle_deg: -45.0,
                is_priority: true,
            }],
        };

        let expected = "[STATUS]\n\
                        health: 50%\n\
                        location: dungeon (sight 8.0)\n\
                        trust: 60 mood: neutral aggression: 0.50\n\
                        [ABILITIES]\n\
                        fireball: ready\n\
                        basic_attack: cooldown 1.5s\n\
                        [ENEMIES]\n\
                        enemy_4 skeleton dist=3.0 hp=80% angle=-45 [PRIORITY]\n";
        assert_eq!(snap.to_prompt(), expected);

        let empty = StateSnapshot { enemies: Vec::new(), ..snap };
        assert!(empty.to_prompt().ends_with("[ENEMIES]\nnone visible\n"));
    }
}
