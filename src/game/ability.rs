//! Abilities
//!
//! Immutable ability definitions, the catalog they are looked up in, and
//! the per-player `AbilityManager` that enforces cooldowns.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::game::damage::DamageType;
use crate::game::status::{StatusKind, StatusPayload};

/// Every ability the game knows. The names double as the LLM grammar's
/// ability vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityType {
    /// Fire projectile
    Fireball,
    /// Slowing frost projectile
    Frostbolt,
    /// Instant beam
    Lightning,
    /// Melee swing
    BasicAttack,
}

impl AbilityType {
    /// All ability types in catalog order.
    pub const ALL: [AbilityType; 4] = [
        AbilityType::Fireball,
        AbilityType::Frostbolt,
        AbilityType::Lightning,
        AbilityType::BasicAttack,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            AbilityType::Fireball => "fireball",
            AbilityType::Frostbolt => "frostbolt",
            AbilityType::Lightning => "lightning",
            AbilityType::BasicAttack => "basic_attack",
        }
    }
}

impl fmt::Display for AbilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AbilityType {
    type Err = AbilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AbilityType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AbilityError::UnknownAbility(s.to_string()))
    }
}

/// How an ability reaches its targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityCategory {
    /// Cone hit test in front of the caster
    Melee,
    /// Line (beam) hit test, resolved immediately
    Instant,
    /// Spawns a projectile resolved by radius tests over time
    Projectile,
}

/// Immutable ability definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    /// Which ability this is
    pub ability_type: AbilityType,
    /// Delivery mechanism
    pub category: AbilityCategory,
    /// Base damage
    pub damage: f32,
    /// Damage school
    #[serde(default)]
    pub damage_type: DamageType,
    /// Cooldown in seconds
    pub cooldown: f64,
    /// Reach (cone radius, beam length, or projectile travel distance)
    pub range: f32,
    /// Full cone angle in degrees (melee)
    #[serde(default = "default_cone_angle")]
    pub cone_angle_deg: f32,
    /// Beam half-width (instant)
    #[serde(default = "default_line_width")]
    pub line_width: f32,
    /// Projectile speed in units/second (projectile)
    #[serde(default = "default_projectile_speed")]
    pub projectile_speed: f32,
    /// Projectile hit radius (projectile)
    #[serde(default = "default_projectile_radius")]
    pub projectile_radius: f32,
    /// Status effect applied on hit
    #[serde(default)]
    pub status_effect: Option<StatusPayload>,
}

fn default_cone_angle() -> f32 {
    90.0
}

fn default_line_width() -> f32 {
    1.0
}

fn default_projectile_speed() -> f32 {
    18.0
}

fn default_projectile_radius() -> f32 {
    0.5
}

impl Ability {
    /// Hardcoded definition used when the catalog has no entry.
    pub fn builtin(ability_type: AbilityType) -> Self {
        let base = Self {
            ability_type,
            category: AbilityCategory::Melee,
            damage: 0.0,
            damage_type: DamageType::Physical,
            cooldown: 1.0,
            range: 2.0,
            cone_angle_deg: default_cone_angle(),
            line_width: default_line_width(),
            projectile_speed: default_projectile_speed(),
            projectile_radius: default_projectile_radius(),
            status_effect: None,
        };

        match ability_type {
            AbilityType::Fireball => Self {
                category: AbilityCategory::Projectile,
                damage: 30.0,
                damage_type: DamageType::Fire,
                cooldown: 2.0,
                range: 20.0,
                projectile_speed: 18.0,
                projectile_radius: 0.6,
                ..base
            },
            AbilityType::Frostbolt => Self {
                category: AbilityCategory::Projectile,
                damage: 18.0,
                damage_type: DamageType::Frost,
                cooldown: 1.5,
                range: 18.0,
                projectile_speed: 16.0,
                status_effect: Some(StatusPayload {
                    kind: StatusKind::Slow,
                    magnitude: 0.4,
                    duration: 3.0,
                }),
                ..base
            },
            AbilityType::Lightning => Self {
                category: AbilityCategory::Instant,
                damage: 35.0,
                damage_type: DamageType::Lightning,
                cooldown: 4.0,
                range: 15.0,
                line_width: 1.0,
                ..base
            },
            AbilityType::BasicAttack => Self {
                category: AbilityCategory::Melee,
                damage: 12.0,
                cooldown: 0.8,
                range: 2.5,
                cone_angle_deg: 90.0,
                ..base
            },
        }
    }

    /// True for abilities the companion's low-trust gate excludes.
    pub fn is_melee(&self) -> bool {
        self.category == AbilityCategory::Melee
    }

    /// Projectile lifetime: time to travel the full range.
    pub fn projectile_lifetime(&self) -> f64 {
        if self.projectile_speed <= 0.0 {
            return 0.0;
        }
        (self.range / self.projectile_speed) as f64
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Read-only table of ability definitions, shared by every manager in a world.
#[derive(Clone, Debug, Default)]
pub struct AbilityCatalog {
    abilities: BTreeMap<AbilityType, Ability>,
}

impl AbilityCatalog {
    /// Build from a list of definitions. Later duplicates replace earlier ones.
    pub fn new(defs: impl IntoIterator<Item = Ability>) -> Self {
        let abilities = defs.into_iter().map(|a| (a.ability_type, a)).collect();
        Self { abilities }
    }

    /// Catalog holding every builtin definition.
    pub fn builtin() -> Self {
        Self::new(AbilityType::ALL.iter().map(|t| Ability::builtin(*t)))
    }

    /// Definition for `ability_type`, falling back to the builtin with a warning.
    pub fn get(&self, ability_type: AbilityType) -> Ability {
        match self.abilities.get(&ability_type) {
            Some(a) => a.clone(),
            None => {
                warn!("No ability definition for {}, using builtin defaults", ability_type);
                Ability::builtin(ability_type)
            }
        }
    }

    /// Definitions in ability order.
    pub fn iter(&self) -> impl Iterator<Item = &Ability> {
        self.abilities.values()
    }

    /// Number of configured definitions.
    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    /// True if no definitions are configured.
    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }
}

// =============================================================================
// ABILITY MANAGER
// =============================================================================

/// Ability errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AbilityError {
    /// Ability still cooling down.
    #[error("Ability {ability} on cooldown ({remaining:.2}s remaining)")]
    OnCooldown {
        /// Ability that was requested
        ability: AbilityType,
        /// Seconds until ready
        remaining: f64,
    },

    /// Name does not match any ability.
    #[error("Unknown ability: {0}")]
    UnknownAbility(String),

    /// The caster does not know this ability.
    #[error("Ability {0} not known by caster")]
    NotKnown(AbilityType),

    /// Caster not found in the world.
    #[error("Player not found")]
    PlayerNotFound,

    /// Caster is dead.
    #[error("Player is dead")]
    PlayerDead,
}

/// Readiness of one ability at a moment in time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AbilityReadiness {
    /// Ability
    pub ability_type: AbilityType,
    /// Ready to use now
    pub ready: bool,
    /// Seconds until ready (0 when ready)
    pub remaining: f64,
}

/// Per-player cooldown tracker.
#[derive(Clone, Debug)]
pub struct AbilityManager {
    catalog: Arc<AbilityCatalog>,
    known: Vec<AbilityType>,
    last_used: BTreeMap<AbilityType, f64>,
}

impl AbilityManager {
    /// Create a manager for a caster who knows `known` abilities.
    pub fn new(catalog: Arc<AbilityCatalog>, known: &[AbilityType]) -> Self {
        Self {
            catalog,
            known: known.to_vec(),
            last_used: BTreeMap::new(),
        }
    }

    /// Abilities this caster knows, in the order they were granted.
    pub fn known(&self) -> &[AbilityType] {
        &self.known
    }

    /// True if the caster knows `ability_type`.
    pub fn knows(&self, ability_type: AbilityType) -> bool {
        self.known.contains(&ability_type)
    }

    /// Definition of an ability.
    pub fn definition(&self, ability_type: AbilityType) -> Ability {
        self.catalog.get(ability_type)
    }

    /// Seconds until `ability_type` is ready. Never negative; exactly 0 once
    /// the cooldown has fully elapsed, and for never-used abilities.
    pub fn remaining_cooldown(&self, ability_type: AbilityType, now: f64) -> f64 {
        match self.last_used.get(&ability_type) {
            Some(&last) => {
                let cooldown = self.catalog.get(ability_type).cooldown;
                (cooldown - (now - last)).max(0.0)
            }
            None => 0.0,
        }
    }

    /// True if the ability is known and off cooldown.
    pub fn is_ready(&self, ability_type: AbilityType, now: f64) -> bool {
        self.knows(ability_type) && self.remaining_cooldown(ability_type, now) <= 0.0
    }

    /// Readiness of every known ability.
    pub fn readiness(&self, now: f64) -> Vec<AbilityReadiness> {
        self.known
            .iter()
            .map(|&t| {
                let remaining = self.remaining_cooldown(t, now);
                AbilityReadiness {
                    ability_type: t,
                    ready: remaining <= 0.0,
                    remaining,
                }
            })
            .collect()
    }

    /// Consume an ability: fails while on cooldown, otherwise records `now`
    /// as the last use and returns the definition.
    pub fn use_ability(&mut self, ability_type: AbilityType, now: f64) -> Result<Ability, AbilityError> {
        if !self.knows(ability_type) {
            return Err(AbilityError::NotKnown(ability_type));
        }

        let remaining = self.remaining_cooldown(ability_type, now);
        if remaining > 0.0 {
            return Err(AbilityError::OnCooldown { ability: ability_type, remaining });
        }

        self.last_used.insert(ability_type, now);
        Ok(self.catalog.get(ability_type))
    }

    /// Same as [`use_ability`](Self::use_ability), looked up by wire name.
    pub fn use_ability_by_name(&mut self, name: &str, now: f64) -> Result<Ability, AbilityError> {
        let ability_type = name.parse::<AbilityType>()?;
        self.use_ability(ability_type, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn manager() -> AbilityManager {
        AbilityManager::new(Arc::new(AbilityCatalog::builtin()), &AbilityType::ALL)
    }

    #[test]
    fn test_ability_names_round_trip() {
        for t in AbilityType::ALL {
            assert_eq!(t.as_str().parse::<AbilityType>().unwrap(), t);
        }
        assert!(matches!(
            "meteor".parse::<AbilityType>(),
            Err(AbilityError::UnknownAbility(_))
        ));
    }

    #[test]
    fn test_ability_cooldown() {
        let mut m = manager();

        // First use succeeds
        assert!(m.use_ability(AbilityType::Fireball, 10.0).is_ok());

        // Second use fails until 2.0s have elapsed
        let err = m.use_ability(AbilityType::Fireball, 11.0).unwrap_err();
        assert!(matches!(err, AbilityError::OnCooldown { remaining, .. } if (remaining - 1.0).abs() < 1e-9));

        assert!(m.use_ability(AbilityType::Fireball, 12.0).is_ok());
    }

    #[test]
    fn test_cooldowns_are_per_ability() {
        let mut m = manager();
        m.use_ability(AbilityType::Fireball, 0.0).unwrap();
        assert!(m.use_ability(AbilityType::Lightning, 0.0).is_ok());
        assert!(!m.is_ready(AbilityType::Fireball, 0.1));
        assert!(m.is_ready(AbilityType::BasicAttack, 0.1));
    }

    #[test]
    fn test_unknown_and_unlearned_abilities() {
        let mut m = AbilityManager::new(Arc::new(AbilityCatalog::builtin()), &[AbilityType::BasicAttack]);
        assert!(matches!(
            m.use_ability(AbilityType::Fireball, 0.0),
            Err(AbilityError::NotKnown(AbilityType::Fireball))
        ));
        assert!(matches!(
            m.use_ability_by_name("teleport", 0.0),
            Err(AbilityError::UnknownAbility(_))
        ));
        assert!(m.use_ability_by_name("basic_attack", 0.0).is_ok());
    }

    #[test]
    fn test_catalog_falls_back_to_builtin() {
        let catalog = AbilityCatalog::new(vec![Ability {
            damage: 99.0,
            ..Ability::builtin(AbilityType::Fireball)
        }]);
        assert_eq!(catalog.get(AbilityType::Fireball).damage, 99.0);
        assert_eq!(catalog.get(AbilityType::Lightning), Ability::builtin(AbilityType::Lightning));
    }

    #[test]
    fn test_readiness_report() {
        let mut m = manager();
        m.use_ability(AbilityType::Lightning, 0.0).unwrap();

        let readiness = m.readiness(1.0);
        assert_eq!(readiness.len(), 4);
        let lightning = readiness.iter().find(|r| r.ability_type == AbilityType::Lightning).unwrap();
        assert!(!lightning.ready);
        assert!((lightning.remaining - 3.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_remaining_cooldown_non_increasing(
            used_at in 0.0f64..100.0,
            offsets in proptest::collection::vec(0.0f64..10.0, 1..20),
        ) {
            let mut offsets = offsets;
            let mut m = manager();
            m.use_ability(AbilityType::Lightning, used_at).unwrap();
            let cooldown = Ability::builtin(AbilityType::Lightning).cooldown;

            offsets.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let mut previous = f64::INFINITY;
            for offset in offsets {
                let now = used_at + offset;
                let remaining = m.remaining_cooldown(AbilityType::Lightning, now);
                prop_assert!(remaining <= previous);
                prop_assert!(remaining >= 0.0);
                if now - used_at >= cooldown {
                    prop_assert_eq!(remaining, 0.0);
                } else {
                    prop_assert!(m.clone().use_ability(AbilityType::Lightning, now).is_err());
                }
                previous = remaining;
            }
        }
    }
}
