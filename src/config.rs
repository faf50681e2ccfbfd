//! Game Configuration
//!
//! One immutable [`GameConfig`] is loaded at startup, wrapped in an `Arc`
//! and handed to every constructor that needs tuning values. Nothing
//! reads configuration from global state.
//!
//! The file format is TOML. Every field has a default, so an empty file
//! (or no file at all) yields the built-in tables.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::sync::Arc;
use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::ai::enemy_ai::EnemyProfile;
use crate::game::ability::{Ability, AbilityCatalog};

/// Environment variable holding the config file path.
pub const CONFIG_ENV_VAR: &str = "DUNGEON_CORE_CONFIG";

// =============================================================================
// ERRORS
// =============================================================================

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("Failed to read config at {path}: {message}")]
    Io {
        /// Path that was read
        path: String,
        /// OS error text
        message: String,
    },

    /// TOML did not match the schema.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// Values parsed but are unusable.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

// =============================================================================
// SECTIONS
// =============================================================================

/// Tick scheduler settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// World updates per second
    pub tick_rate: u32,
    /// Seconds between persistence sweeps
    pub save_interval_secs: u64,
    /// Upper bound on a single tick's dt (seconds)
    pub max_tick_delta: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            save_interval_secs: 30,
            max_tick_delta: 0.25,
        }
    }
}

/// LLM provider and pipeline settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Route companion decisions through the LLM pipeline
    pub enabled: bool,
    /// Inference server base URL
    pub base_url: String,
    /// HTTP timeout per request (milliseconds)
    pub request_timeout_ms: u64,
    /// Bounded queue capacity
    pub queue_capacity: usize,
    /// Requests per batch
    pub max_batch_size: usize,
    /// Collection window after the first request of a batch (milliseconds)
    pub batch_timeout_ms: u64,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling
    pub top_p: f32,
    /// Top-k sampling
    pub top_k: u32,
    /// Max tokens to generate
    pub n_predict: u32,
    /// Stop sequences
    pub stop: Vec<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout_ms: 2_000,
            queue_capacity: 32,
            max_batch_size: 4,
            batch_timeout_ms: 50,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            n_predict: 128,
            stop: vec!["\n\n".to_string()],
        }
    }
}

/// Snapshot perception settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Light radius for underground players without their own
    pub default_light_radius: f32,
    /// Flat perception distance above ground
    pub surface_perception_distance: f32,
    /// Max enemies listed in a snapshot
    pub max_snapshot_enemies: usize,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            default_light_radius: 10.0,
            surface_perception_distance: 30.0,
            max_snapshot_enemies: 8,
        }
    }
}

/// Heuristic companion tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Starting trust (0-100)
    pub initial_trust: f32,
    /// Starting aggression (0-1)
    pub aggression: f32,
    /// Seconds of accumulated time between decisions
    pub decision_interval: f64,
    /// Distance at which closeness reaches zero
    pub max_engage_range: f32,
    /// Weight of missing health in target scoring
    pub low_health_weight: f32,
    /// Extra closeness weight scaled by aggression
    pub closeness_bonus: f32,
    /// Below this trust the companion may refuse under threat
    pub refuse_trust_threshold: f32,
    /// Radius used to count nearby threats
    pub threat_radius: f32,
    /// Enemy count inside `threat_radius` that counts as high threat
    pub threat_count: usize,
    /// Below this trust melee abilities are never chosen
    pub melee_trust_threshold: f32,
    /// Accepted overshoot of an ability's nominal range
    pub range_tolerance: f32,
    /// Health fraction below which dodging is considered
    pub dodge_health_threshold: f32,
    /// Nearest-enemy distance that triggers a dodge roll
    pub dodge_distance: f32,
    /// Dodge probability per decision
    pub dodge_chance: f32,
    /// Dodge burst speed (units/second)
    pub dodge_speed: f32,
    /// Dodge burst duration (seconds)
    pub dodge_duration: f64,
    /// Health fraction below which the companion retreats
    pub retreat_health_threshold: f32,
    /// Trust gained per good strategic call (bad calls cost 1.5x)
    pub trust_gain: f32,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            initial_trust: 50.0,
            aggression: 0.5,
            decision_interval: 0.5,
            max_engage_range: 20.0,
            low_health_weight: 0.5,
            closeness_bonus: 0.5,
            refuse_trust_threshold: 20.0,
            threat_radius: 6.0,
            threat_count: 3,
            melee_trust_threshold: 30.0,
            range_tolerance: 1.2,
            dodge_health_threshold: 0.4,
            dodge_distance: 3.0,
            dodge_chance: 0.5,
            dodge_speed: 12.0,
            dodge_duration: 0.2,
            retreat_health_threshold: 0.15,
            trust_gain: 2.0,
        }
    }
}

/// Player-owned minion defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinionConfig {
    /// Max health
    pub max_health: f32,
    /// Damage per strike
    pub damage: f32,
    /// Movement speed
    pub speed: f32,
    /// Strike reach
    pub attack_range: f32,
    /// Seconds between strikes
    pub attack_cooldown: f64,
    /// Seek radius for enemies
    pub aggro_range: f32,
    /// Seconds before the minion expires
    pub lifetime: f64,
}

impl Default for MinionConfig {
    fn default() -> Self {
        Self {
            max_health: 40.0,
            damage: 6.0,
            speed: 4.5,
            attack_range: 1.5,
            attack_cooldown: 1.0,
            aggro_range: 15.0,
            lifetime: 30.0,
        }
    }
}

/// World simulation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// New player max health
    pub player_max_health: f32,
    /// New player speed (units/second)
    pub player_speed: f32,
    /// Max horizontal distance for picking up a ground item
    pub pickup_radius: f32,
    /// Seconds a corpse stays in the world
    pub corpse_linger_secs: f64,
    /// Seconds an unclaimed ground item stays in the world
    pub item_lifetime_secs: f64,
    /// Minion defaults
    pub minion: MinionConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            player_max_health: 100.0,
            player_speed: 5.0,
            pickup_radius: 2.0,
            corpse_linger_secs: 5.0,
            item_lifetime_secs: 300.0,
            minion: MinionConfig::default(),
        }
    }
}

// =============================================================================
// GAME CONFIG
// =============================================================================

/// Complete configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Tick scheduler
    pub server: ServerConfig,
    /// LLM pipeline
    pub llm: LlmConfig,
    /// Snapshot perception
    pub perception: PerceptionConfig,
    /// Companion heuristic
    pub companion: CompanionConfig,
    /// World simulation
    pub world: WorldConfig,
    /// Ability overrides (missing entries use built-in values)
    pub abilities: Vec<Ability>,
    /// Enemy type table
    pub enemies: BTreeMap<String, EnemyProfile>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            perception: PerceptionConfig::default(),
            companion: CompanionConfig::default(),
            world: WorldConfig::default(),
            abilities: Vec::new(),
            enemies: EnemyProfile::builtin_types()
                .into_iter()
                .map(|(name, p)| (name.to_string(), p))
                .collect(),
        }
    }
}

impl GameConfig {
    /// Load from `DUNGEON_CORE_CONFIG` if set, otherwise defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => {
                info!("{} not set, using built-in configuration", CONFIG_ENV_VAR);
                Ok(Self::default())
            }
        }
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.tick_rate == 0 {
            return Err(ConfigError::Invalid("server.tick_rate must be > 0".into()));
        }
        if self.server.max_tick_delta <= 0.0 {
            return Err(ConfigError::Invalid("server.max_tick_delta must be > 0".into()));
        }
        if self.llm.queue_capacity == 0 || self.llm.max_batch_size == 0 {
            return Err(ConfigError::Invalid("llm.queue_capacity and llm.max_batch_size must be > 0".into()));
        }
        if self.companion.decision_interval <= 0.0 {
            return Err(ConfigError::Invalid("companion.decision_interval must be > 0".into()));
        }
        if !(0.0..=100.0).contains(&self.companion.initial_trust) {
            return Err(ConfigError::Invalid("companion.initial_trust must be within 0..=100".into()));
        }
        for (name, profile) in &self.enemies {
            if profile.max_health <= 0.0 {
                return Err(ConfigError::Invalid(format!("enemies.{name}.max_health must be > 0")));
            }
            if profile.attack_range > profile.aggro_range {
                return Err(ConfigError::Invalid(format!(
                    "enemies.{name}: attack_range exceeds aggro_range"
                )));
            }
        }
        Ok(())
    }

    /// Tick period in seconds.
    pub fn tick_period(&self) -> f64 {
        1.0 / self.server.tick_rate.max(1) as f64
    }

    /// Ability catalog: built-ins overridden by configured entries.
    pub fn ability_catalog(&self) -> AbilityCatalog {
        let mut defs: BTreeMap<_, _> = AbilityCatalog::builtin()
            .iter()
            .map(|a| (a.ability_type, a.clone()))
            .collect();
        for ability in &self.abilities {
            defs.insert(ability.ability_type, ability.clone());
        }
        AbilityCatalog::new(defs.into_values())
    }

    /// Shared enemy profile table.
    pub fn enemy_catalog(&self) -> EnemyCatalog {
        EnemyCatalog::new(self.enemies.clone())
    }
}

// =============================================================================
// ENEMY CATALOG
// =============================================================================

/// Enemy profiles shared by `Arc` across every enemy of a type.
#[derive(Clone, Debug)]
pub struct EnemyCatalog {
    profiles: BTreeMap<String, Arc<EnemyProfile>>,
    fallback: Arc<EnemyProfile>,
}

impl EnemyCatalog {
    /// Build from a name → profile table.
    pub fn new(profiles: BTreeMap<String, EnemyProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|(k, v)| (k, Arc::new(v))).collect(),
            fallback: Arc::new(EnemyProfile::default()),
        }
    }

    /// Profile for a type name. Unknown names get the default profile.
    pub fn get(&self, enemy_type: &str) -> Arc<EnemyProfile> {
        match self.profiles.get(enemy_type) {
            Some(p) => Arc::clone(p),
            None => {
                warn!("Unknown enemy type '{}', using default profile", enemy_type);
                Arc::clone(&self.fallback)
            }
        }
    }

    /// Known type names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::enemy_ai::Behavior;
    use crate::game::ability::AbilityType;

    #[test]
    fn test_empty_toml_is_default() {
        let config = GameConfig::from_toml_str("").unwrap();
        assert_eq!(config, GameConfig::default());
        assert_eq!(config.server.tick_rate, 20);
        assert!(config.enemies.contains_key("necromancer"));
    }

    #[test]
    fn test_partial_override() {
        let text = r#"
            [server]
            tick_rate = 30

            [companion]
            initial_trust = 80.0

            [enemies.ghoul]
            behavior = "charger"
            max_health = 90.0
        "#;
        let config = GameConfig::from_toml_str(text).unwrap();
        assert_eq!(config.server.tick_rate, 30);
        assert_eq!(config.server.save_interval_secs, 30);
        assert_eq!(config.companion.initial_trust, 80.0);

        // A configured table replaces the built-in one
        let ghoul = &config.enemies["ghoul"];
        assert_eq!(ghoul.behavior, Behavior::Charger);
        assert_eq!(ghoul.speed, EnemyProfile::default().speed);
        assert!(!config.enemies.contains_key("skeleton"));
    }

    #[test]
    fn test_validation_rejects_zero_tick_rate() {
        let err = GameConfig::from_toml_str("[server]\ntick_rate = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = GameConfig::from_toml_str("[server\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_ability_override_merges_with_builtins() {
        let mut config = GameConfig::default();
        let mut fireball = Ability::builtin(AbilityType::Fireball);
        fireball.damage = 99.0;
        config.abilities.push(fireball);

        let catalog = config.ability_catalog();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.get(AbilityType::Fireball).damage, 99.0);
        assert_eq!(catalog.get(AbilityType::Lightning), Ability::builtin(AbilityType::Lightning));
    }

    #[test]
    fn test_unknown_enemy_type_falls_back() {
        let catalog = GameConfig::default().enemy_catalog();
        let profile = catalog.get("dragon");
        assert_eq!(*profile, EnemyProfile::default());
        assert_eq!(catalog.get("archer").behavior, Behavior::Ranged);
    }
}
