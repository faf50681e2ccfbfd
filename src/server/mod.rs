//! Server Module
//!
//! Owns the world registry and drives it: one tick loop, a periodic save
//! sweep and a shutdown signal. Transport (WebSocket, HTTP) lives outside
//! the core and talks to [`GameServer`] and [`World`](crate::game::World).
//!
//! - `game_server`: World registry, tick scheduler, save sweep

pub mod game_server;

pub use game_server::{GameServer, GameServerError, SaveReport, TickBroadcast};
