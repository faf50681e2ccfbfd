//! Player Persistence
//!
//! The narrow interface the core uses to save player state. The real
//! store (a database) lives outside the core; [`InMemoryPlayerStore`]
//! backs tests and the demo binary.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use serde::{Serialize, Deserialize};
use tokio::sync::Mutex;

use crate::core::vec3::Vec3;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Player state written by the save sweep. Upserted by username.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerSaveRecord {
    /// Account name (upsert key)
    pub username: String,
    /// Last position
    pub position: Vec3,
    /// Facing yaw in radians
    pub rotation: f32,
    /// Current health
    pub health: f32,
    /// Equipped items, opaque JSON
    pub equipped_items_json: String,
    /// Bag contents, opaque JSON
    pub bag_items_json: String,
}

/// Persistence errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistenceError {
    /// Backend unreachable
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Record rejected by the backend
    #[error("Save rejected for {username}: {reason}")]
    Rejected {
        /// Account name
        username: String,
        /// Backend message
        reason: String,
    },
}

/// Player persistence collaborator.
pub trait PlayerStore: Send + Sync {
    /// Insert or replace the record for `record.username`.
    fn save_player<'a>(&'a self, record: &'a PlayerSaveRecord) -> StoreFuture<'a, Result<(), PersistenceError>>;
}

/// Store that keeps records in memory.
#[derive(Debug, Default)]
pub struct InMemoryPlayerStore {
    records: Mutex<BTreeMap<String, PlayerSaveRecord>>,
}

impl InMemoryPlayerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a saved record.
    pub async fn load(&self, username: &str) -> Option<PlayerSaveRecord> {
        self.records.lock().await.get(username).cloned()
    }

    /// Number of saved players.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// True if nothing has been saved.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

impl PlayerStore for InMemoryPlayerStore {
    fn save_player<'a>(&'a self, record: &'a PlayerSaveRecord) -> StoreFuture<'a, Result<(), PersistenceError>> {
        Box::pin(async move {
            self.records
                .lock()
                .await
                .insert(record.username.clone(), record.clone());
            Ok(())
        })
    }
}
