//! # Dungeon Core
//!
//! Real-time simulation core for a multiplayer dungeon crawler with
//! AI companions.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       DUNGEON CORE                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Math primitives                           │
//! │  ├── vec3.rs     - 3D vector, ground-plane helpers           │
//! │  ├── geometry.rs - Radius, cone and line hit tests           │
//! │  └── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │                                                              │
//! │  game/           - World simulation                          │
//! │  ├── state.rs    - Entities of one world                     │
//! │  ├── combat.rs   - Hits, abilities, enemy actions            │
//! │  ├── tick.rs     - Per-tick update                           │
//! │  └── world.rs    - Locked world handle                       │
//! │                                                              │
//! │  ai/             - Enemy state machines, companion heuristic │
//! │  llm/            - Batched LLM decisions with fallback       │
//! │  persistence.rs  - Player store collaborator                 │
//! │  config.rs       - TOML configuration                        │
//! │                                                              │
//! │  server/         - World registry, tick loop, save sweep     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Threading
//!
//! One tick task drives every world serially. Each world sits behind its
//! own `RwLock`; readers get deep copies. LLM inference runs on its own
//! task and never blocks a tick: a companion whose answer is late keeps
//! its previous action, and a failed answer falls back to the heuristic.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod config;
pub mod game;
pub mod ai;
pub mod llm;
pub mod persistence;
pub mod server;

// Re-export commonly used types
pub use core::vec3::Vec3;
pub use core::rng::DeterministicRng;
pub use config::GameConfig;
pub use game::{World, WorldId, WorldError, WorldStateView, PlayerId, EnemyId};
pub use persistence::{PlayerStore, PlayerSaveRecord, InMemoryPlayerStore};
pub use server::GameServer;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
