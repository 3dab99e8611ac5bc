use anyhow::{anyhow, Context};
use asteroids_server::config::ServerConfig;
use asteroids_server::game_loop::{run_game_loop, GameBroadcast, GameCommand};
use asteroids_server::ws::{router, AppState};
use tokio::sync::{broadcast, mpsc};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut config = ServerConfig::default();
    config.apply_env_overrides();

    // Validate configuration before starting
    config
        .validate()
        .map_err(|e| anyhow!("invalid server configuration: {}", e))?;

    let listen_addr = config.listen_addr.clone();

    let (game_tx, game_rx) = mpsc::channel::<GameCommand>(256);
    let (broadcast_tx, _) = broadcast::channel::<GameBroadcast>(64);
    let app_state = AppState::new(game_tx, broadcast_tx.clone(), &config);

    // Spawn game loop
    tokio::spawn(async move {
        run_game_loop(game_rx, broadcast_tx, config).await;
    });

    let app = router(app_state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", listen_addr))?;
    tracing::info!("Asteroids server listening on {}", listen_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
