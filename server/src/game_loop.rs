use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use asteroids_shared::protocol::{InputData, WelcomeMsg, PROTOCOL_VERSION};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use crate::config::ServerConfig;
use crate::entity::PlayerId;
use crate::error::{ConnectionId, GameError};
use crate::pacing::{sleep_budget, TickClock};
use crate::state::GameState;

/// Commands from client connections to the game loop
#[derive(Debug)]
pub enum GameCommand {
    Join {
        connection: ConnectionId,
        player_name: String,
        response: oneshot::Sender<Result<WelcomeMsg, GameError>>,
    },
    Input {
        connection: ConnectionId,
        input: InputData,
    },
    Leave {
        connection: ConnectionId,
    },
}

/// Broadcasts from game loop to all clients
#[derive(Debug, Clone)]
pub enum GameBroadcast {
    /// A `game_state` message, serialized once for every receiver
    State { tick: u64, json: Arc<str> },
    PlayerJoined {
        player_id: PlayerId,
        player_name: String,
    },
    PlayerLeft {
        player_id: PlayerId,
        player_name: String,
    },
}

fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Run the main game loop. Owns all game state.
///
/// Ticks at `tick_rate_hz`. Commands are applied as they arrive, and any
/// still queued when a tick is due are drained first, so every snapshot
/// reflects all input received before it. Returns once every command
/// sender has been dropped.
pub async fn run_game_loop(
    mut cmd_rx: mpsc::Receiver<GameCommand>,
    broadcast_tx: broadcast::Sender<GameBroadcast>,
    config: ServerConfig,
) {
    let mut state = GameState::new(&config);
    let period = config.tick_period();
    let start = Instant::now();
    let mut clock = TickClock::new(start, config.max_tick_dt);
    let mut next_tick = start + period;

    tracing::info!(
        "Game loop running at {} Hz with {} asteroids",
        config.tick_rate_hz,
        state.asteroids.len()
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(next_tick) => {
                let mut senders_gone = false;
                loop {
                    match cmd_rx.try_recv() {
                        Ok(cmd) => handle_command(&mut state, cmd, &broadcast_tx),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            senders_gone = true;
                            break;
                        }
                    }
                }
                if senders_gone {
                    break;
                }

                let started = Instant::now();
                let dt = clock.advance(started);
                state.tick(dt);
                broadcast_snapshot(&state, &broadcast_tx);
                next_tick = Instant::now() + sleep_budget(period, started.elapsed());
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => handle_command(&mut state, cmd, &broadcast_tx),
                    None => break,
                }
            }
        }
    }

    tracing::info!("Game loop ended after {} ticks", state.tick_count);
}

fn broadcast_snapshot(state: &GameState, broadcast_tx: &broadcast::Sender<GameBroadcast>) {
    match serde_json::to_string(&state.snapshot_msg(unix_timestamp())) {
        Ok(json) => {
            // No receivers just means nobody is connected
            let _ = broadcast_tx.send(GameBroadcast::State {
                tick: state.tick_count,
                json: json.into(),
            });
        }
        Err(e) => tracing::error!("Failed to serialize tick {}: {}", state.tick_count, e),
    }
}

fn handle_command(
    state: &mut GameState,
    cmd: GameCommand,
    broadcast_tx: &broadcast::Sender<GameBroadcast>,
) {
    match cmd {
        GameCommand::Join {
            connection,
            player_name,
            response,
        } => match state.join(connection, &player_name) {
            Ok(accepted) => {
                let welcome = WelcomeMsg {
                    protocol_version: PROTOCOL_VERSION,
                    player_id: accepted.player_id,
                    color_idx: accepted.color_idx,
                    config: state.world,
                };
                if response.send(Ok(welcome)).is_err() {
                    // Connection went away while waiting for the reply
                    state.leave(connection);
                    return;
                }
                let _ = broadcast_tx.send(GameBroadcast::PlayerJoined {
                    player_id: accepted.player_id,
                    player_name: accepted.player_name,
                });
            }
            Err(e) => {
                tracing::warn!("Join from connection {} rejected: {}", connection, e);
                let _ = response.send(Err(e));
            }
        },
        GameCommand::Input { connection, input } => {
            if let Err(e) = state.apply_input(connection, &input) {
                tracing::debug!("Dropped input: {}", e);
            }
        }
        GameCommand::Leave { connection } => {
            if let Some(session) = state.leave(connection) {
                let _ = broadcast_tx.send(GameBroadcast::PlayerLeft {
                    player_id: session.player_id,
                    player_name: session.player_name,
                });
            }
        }
    }
}
