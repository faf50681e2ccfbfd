//! Game Server
//!
//! Holds every world, ticks them from a single `select!` loop and
//! periodically writes player state to the store.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::GameConfig;
use crate::game::events::WorldEvent;
use crate::game::state::WorldId;
use crate::game::world::World;
use crate::llm::manager::LlmManager;
use crate::persistence::PlayerStore;

/// Server errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameServerError {
    /// No world with this id
    #[error("World not found: {0}")]
    WorldNotFound(WorldId),
}

/// Outcome of a save sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Records written
    pub saved: usize,
    /// Records the store rejected
    pub failed: usize,
}

/// Events from one world's tick, published to subscribers.
#[derive(Debug, Clone)]
pub struct TickBroadcast {
    /// World that ticked
    pub world_id: WorldId,
    /// Tick number
    pub tick: u64,
    /// World clock after the tick
    pub clock: f64,
    /// Events in priority order
    pub events: Vec<WorldEvent>,
}

/// The game server.
pub struct GameServer {
    /// Shared configuration.
    config: Arc<GameConfig>,
    /// Worlds by id.
    worlds: RwLock<BTreeMap<WorldId, Arc<World>>>,
    /// Player persistence.
    store: Arc<dyn PlayerStore>,
    /// LLM pipeline handed to new worlds.
    llm: Option<LlmManager>,
    /// Tick events for transport layers.
    event_tx: broadcast::Sender<TickBroadcast>,
    /// Shutdown flag. Level-triggered, so a stop requested before
    /// `run` starts is still seen.
    shutdown_tx: watch::Sender<bool>,
}

impl GameServer {
    /// Create a server with no worlds.
    pub fn new(config: Arc<GameConfig>, store: Arc<dyn PlayerStore>, llm: Option<LlmManager>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (event_tx, _) = broadcast::channel(256);

        Self {
            config,
            worlds: RwLock::new(BTreeMap::new()),
            store,
            llm,
            event_tx,
            shutdown_tx,
        }
    }

    /// Create and register a world.
    pub async fn create_world(&self, name: &str) -> Arc<World> {
        let world = Arc::new(World::new(name, Arc::clone(&self.config), self.llm.clone()));
        self.worlds.write().await.insert(world.id(), Arc::clone(&world));
        info!("Created world {} ({})", name, world.id());
        world
    }

    /// Unregister a world. Its players are saved first.
    pub async fn destroy_world(&self, id: WorldId) -> Result<SaveReport, GameServerError> {
        let world = self
            .worlds
            .write()
            .await
            .remove(&id)
            .ok_or(GameServerError::WorldNotFound(id))?;

        let report = self.save_world(&world).await;
        info!("Destroyed world {} (saved {} players)", id, report.saved);
        Ok(report)
    }

    /// Look up a world.
    pub async fn world(&self, id: WorldId) -> Option<Arc<World>> {
        self.worlds.read().await.get(&id).cloned()
    }

    /// Registered world ids in order.
    pub async fn world_ids(&self) -> Vec<WorldId> {
        self.worlds.read().await.keys().copied().collect()
    }

    /// Subscribe to tick events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<TickBroadcast> {
        self.event_tx.subscribe()
    }

    /// Tick every world once, serially, in id order.
    ///
    /// The registry read lock is held for the whole sweep, so worlds cannot
    /// be created or destroyed mid-tick.
    pub async fn tick_all(&self, dt: f64) -> usize {
        let worlds = self.worlds.read().await;
        for (id, world) in worlds.iter() {
            let result = world.update(dt).await;
            if !result.events.is_empty() {
                debug!("World {} tick {}: {} events", id, result.tick, result.events.len());
                // No subscribers is fine
                let _ = self.event_tx.send(TickBroadcast {
                    world_id: *id,
                    tick: result.tick,
                    clock: result.clock,
                    events: result.events,
                });
            }
        }
        worlds.len()
    }

    /// Save every player in every world.
    pub async fn save_all(&self) -> SaveReport {
        let worlds: Vec<Arc<World>> = self.worlds.read().await.values().cloned().collect();

        let mut report = SaveReport::default();
        for world in &worlds {
            let r = self.save_world(world).await;
            report.saved += r.saved;
            report.failed += r.failed;
        }

        if report.failed > 0 {
            warn!("Save sweep: {} saved, {} failed", report.saved, report.failed);
        } else {
            debug!("Save sweep: {} saved", report.saved);
        }
        report
    }

    async fn save_world(&self, world: &World) -> SaveReport {
        let mut report = SaveReport::default();
        for record in world.save_records().await {
            match self.store.save_player(&record).await {
                Ok(()) => report.saved += 1,
                Err(e) => {
                    warn!("Failed to save {}: {}", record.username, e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Run the tick and save loop until [`shutdown`](Self::shutdown).
    ///
    /// `dt` is the measured time since the previous tick, capped at
    /// `server.max_tick_delta`. A slow save delays the next tick.
    #[instrument(skip(self))]
    pub async fn run(&self) {
        let tick_period = Duration::from_secs_f64(self.config.tick_period());
        let mut tick_interval = interval(tick_period);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let save_period = Duration::from_secs(self.config.server.save_interval_secs.max(1));
        let mut save_interval = interval_at(Instant::now() + save_period, save_period);
        save_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let max_dt = self.config.server.max_tick_delta;
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow_and_update() {
            info!("Shutdown requested before the tick loop started");
            return;
        }
        let mut last_tick = Instant::now();

        info!(
            "Tick loop running at {} Hz, saving every {}s",
            self.config.server.tick_rate,
            save_period.as_secs()
        );

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f64().min(max_dt);
                    last_tick = now;
                    self.tick_all(dt).await;
                }
                _ = save_interval.tick() => {
                    self.save_all().await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow_and_update() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }
    }

    /// Stop the loop. The caller runs [`save_all`](Self::save_all) afterwards.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Registered world count.
    pub async fn world_count(&self) -> usize {
        self.worlds.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec3::Vec3;
    use crate::game::events::WorldEventData;
    use crate::game::player::PlayerId;
    use crate::persistence::{InMemoryPlayerStore, PersistenceError, PlayerSaveRecord, StoreFuture};

    struct RejectingStore;

    impl PlayerStore for RejectingStore {
        fn save_player<'a>(&'a self, record: &'a PlayerSaveRecord) -> StoreFuture<'a, Result<(), PersistenceError>> {
            Box::pin(async move {
                Err(PersistenceError::Rejected { username: record.username.clone(), reason: "read only".into() })
            })
        }
    }

    fn server_with(store: Arc<dyn PlayerStore>) -> GameServer {
        GameServer::new(Arc::new(GameConfig::default()), store, None)
    }

    #[tokio::test]
    async fn test_world_registry() {
        let server = server_with(Arc::new(InMemoryPlayerStore::new()));
        assert_eq!(server.world_count().await, 0);

        let a = server.create_world("crypt").await;
        let b = server.create_world("catacombs").await;
        assert_eq!(server.world_count().await, 2);
        assert!(server.world(a.id()).await.is_some());

        let mut expected = vec![a.id(), b.id()];
        expected.sort();
        assert_eq!(server.world_ids().await, expected);

        server.destroy_world(a.id()).await.unwrap();
        assert!(server.world(a.id()).await.is_none());
        assert_eq!(
            server.destroy_world(a.id()).await,
            Err(GameServerError::WorldNotFound(a.id()))
        );
    }

    #[tokio::test]
    async fn test_tick_all_advances_every_world() {
        let server = server_with(Arc::new(InMemoryPlayerStore::new()));
        let a = server.create_world("a").await;
        let b = server.create_world("b").await;

        assert_eq!(server.tick_all(0.1).await, 2);
        assert_eq!(server.tick_all(0.1).await, 2);
        assert!((a.clock().await - 0.2).abs() < 1e-9);
        assert!((b.clock().await - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_tick_events_are_broadcast() {
        let server = server_with(Arc::new(InMemoryPlayerStore::new()));
        let world = server.create_world("crypt").await;
        let mut rx = server.subscribe_events();

        world.spawn_enemy("skeleton", Vec3::flat(20.0, 20.0)).await;
        server.tick_all(0.05).await;

        let broadcast = rx.try_recv().unwrap();
        assert_eq!(broadcast.world_id, world.id());
        assert!(broadcast
            .events
            .iter()
            .any(|e| matches!(e.data, WorldEventData::EnemySpawned { .. })));
    }

    #[tokio::test]
    async fn test_save_all_writes_every_player() {
        let store = Arc::new(InMemoryPlayerStore::new());
        let server = server_with(store.clone());
        let a = server.create_world("a").await;
        let b = server.create_world("b").await;
        a.add_player(PlayerId::from_bytes([1; 16]), "alice", Vec3::ZERO, false).await;
        a.add_player(PlayerId::from_bytes([2; 16]), "bob", Vec3::X, false).await;
        b.add_player(PlayerId::from_bytes([3; 16]), "carol", Vec3::Z, true).await;

        let report = server.save_all().await;
        assert_eq!(report, SaveReport { saved: 3, failed: 0 });
        assert_eq!(store.len().await, 3);
        assert_eq!(store.load("bob").await.unwrap().position, Vec3::X);
    }

    #[tokio::test]
    async fn test_save_failures_are_counted() {
        let server = server_with(Arc::new(RejectingStore));
        let world = server.create_world("a").await;
        world.add_player(PlayerId::from_bytes([1; 16]), "alice", Vec3::ZERO, false).await;

        assert_eq!(server.save_all().await, SaveReport { saved: 0, failed: 1 });
    }

    #[tokio::test]
    async fn test_destroy_world_saves_players() {
        let store = Arc::new(InMemoryPlayerStore::new());
        let server = server_with(store.clone());
        let world = server.create_world("a").await;
        world.add_player(PlayerId::from_bytes([1; 16]), "alice", Vec3::ZERO, false).await;

        let report = server.destroy_world(world.id()).await.unwrap();
        assert_eq!(report.saved, 1);
        assert!(store.load("alice").await.is_some());
    }

    #[tokio::test]
    async fn test_run_ticks_until_shutdown() {
        let server = Arc::new(server_with(Arc::new(InMemoryPlayerStore::new())));
        let world = server.create_world("crypt").await;

        let runner = Arc::clone(&server);
        let handle = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_millis(120)).await;
        server.shutdown();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop did not stop")
            .unwrap();

        let clock = world.clock().await;
        assert!(clock > 0.0);
        // Each dt is capped, so the clock cannot outrun the cap per tick
        assert!(clock <= 0.25 * 20.0);
    }

    #[tokio::test]
    async fn test_shutdown_before_loop_starts() {
        let server = Arc::new(server_with(Arc::new(InMemoryPlayerStore::new())));

        let runner = Arc::clone(&server);
        let handle = tokio::spawn(async move { runner.run().await });
        server.shutdown();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop did not stop")
            .unwrap();

        // A later run stops straight away too
        tokio::time::timeout(Duration::from_secs(2), server.run())
            .await
            .expect("second run did not stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_saves_periodically() {
        let mut config = GameConfig::default();
        config.server.save_interval_secs = 1;
        let store = Arc::new(InMemoryPlayerStore::new());
        let server = Arc::new(GameServer::new(Arc::new(config), store.clone(), None));

        let world = server.create_world("crypt").await;
        world.add_player(PlayerId::from_bytes([1; 16]), "alice", Vec3::ZERO, false).await;

        let runner = Arc::clone(&server);
        let handle = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(store.is_empty().await);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(store.len().await, 1);
        assert!(world.clock().await > 1.0);

        server.shutdown();
        handle.await.unwrap();
    }
}
