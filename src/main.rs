//! Dungeon Core Server
//!
//! Runs the simulation core with a demo world until Ctrl-C, then saves
//! every player and stops the LLM pipeline.

use std::sync::Arc;
use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use dungeon_core::{
    config::GameConfig,
    core::vec3::Vec3,
    game::player::PlayerId,
    llm::{HttpLlmProvider, LlmManager, ManagerSettings},
    persistence::InMemoryPlayerStore,
    server::GameServer,
    VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Dungeon Core v{}", VERSION);

    let config = Arc::new(GameConfig::load().context("Failed to load configuration")?);
    info!("Tick Rate: {} Hz", config.server.tick_rate);

    // LLM pipeline
    let mut llm_worker = None;
    let llm = if config.llm.enabled {
        let provider = HttpLlmProvider::new(&config.llm).context("Failed to build LLM provider")?;
        info!("LLM provider at {}", provider.completion_url());
        let (manager, handle) = LlmManager::start(Arc::new(provider), ManagerSettings::from(&config.llm));
        llm_worker = Some(handle);
        Some(manager)
    } else {
        info!("LLM disabled, companions use the heuristic only");
        None
    };

    let store = Arc::new(InMemoryPlayerStore::new());
    let server = Arc::new(GameServer::new(Arc::clone(&config), store.clone(), llm.clone()));

    demo_world(&server).await;

    let runner = Arc::clone(&server);
    let tick_loop = tokio::spawn(async move { runner.run().await });

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    info!("Ctrl-C received, shutting down");

    server.shutdown();
    if let Err(e) = tick_loop.await {
        warn!("Tick loop ended abnormally: {}", e);
    }

    let report = server.save_all().await;
    info!("Final save: {} saved, {} failed", report.saved, report.failed);

    if let Some(manager) = llm {
        let stats = manager.stats();
        info!(
            "LLM: {} requests, {} fallbacks",
            stats.total_requests, stats.fallback_count
        );
        manager.shutdown();
    }
    if let Some(handle) = llm_worker {
        if let Err(e) = handle.await {
            warn!("LLM worker ended abnormally: {}", e);
        }
    }

    Ok(())
}

/// One world with a player, a companion and a few enemies.
async fn demo_world(server: &GameServer) {
    let world = server.create_world("demo crypt").await;

    world
        .add_player(PlayerId::from_bytes([1; 16]), "adventurer", Vec3::ZERO, true)
        .await;

    for (enemy_type, x, z) in [
        ("skeleton", 8.0, 3.0),
        ("skeleton", -6.0, 7.0),
        ("archer", 12.0, -4.0),
        ("bomber", -10.0, -10.0),
        ("necromancer", 18.0, 12.0),
    ] {
        world.spawn_enemy(enemy_type, Vec3::flat(x, z)).await;
    }

    info!("Demo world {} ready", world.id());
}
