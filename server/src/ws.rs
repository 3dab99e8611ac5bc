use std::future::pending;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use asteroids_shared::protocol::{ClientMsg, ServerMsg, WelcomeMsg};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::entity::PlayerId;
use crate::error::{ConnectionId, GameError};
use crate::game_loop::{GameBroadcast, GameCommand};

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub game_tx: mpsc::Sender<GameCommand>,
    pub broadcast_tx: broadcast::Sender<GameBroadcast>,
    pub next_connection_id: Arc<AtomicU64>,
    pub max_message_bytes: usize,
}

impl AppState {
    pub fn new(
        game_tx: mpsc::Sender<GameCommand>,
        broadcast_tx: broadcast::Sender<GameBroadcast>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            game_tx,
            broadcast_tx,
            next_connection_id: Arc::new(AtomicU64::new(1)),
            max_message_bytes: config.max_message_bytes,
        }
    }
}

/// `/ws` for game traffic, `/health` for liveness probes.
pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

async fn health() -> &'static str {
    "ok"
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    let connection = app_state.next_connection_id.fetch_add(1, Ordering::Relaxed);
    ws.max_message_size(app_state.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, app_state, connection))
}

type WsSink = SplitSink<WebSocket, Message>;

async fn send_msg(sink: &mut WsSink, msg: &ServerMsg) -> Result<(), GameError> {
    let json = serde_json::to_string(msg).map_err(|e| GameError::Protocol(e.to_string()))?;
    send_text(sink, json).await
}

async fn send_text(sink: &mut WsSink, text: impl Into<String>) -> Result<(), GameError> {
    let text: String = text.into();
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| GameError::Transport(e.to_string()))
}

/// Receive from the broadcast channel once subscribed; before that, never
/// resolve, so the `select!` only listens to the socket.
async fn recv_broadcast(
    rx: &mut Option<broadcast::Receiver<GameBroadcast>>,
) -> Result<GameBroadcast, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

/// Ask the game loop to admit this connection. `None` means the loop is gone.
async fn request_join(
    app_state: &AppState,
    connection: ConnectionId,
    player_name: String,
) -> Option<Result<WelcomeMsg, GameError>> {
    let (resp_tx, resp_rx) = oneshot::channel();
    let cmd = GameCommand::Join {
        connection,
        player_name,
        response: resp_tx,
    };
    if app_state.game_tx.send(cmd).await.is_err() {
        tracing::error!("Failed to send Join command");
        return None;
    }
    match resp_rx.await {
        Ok(result) => Some(result),
        Err(_) => {
            tracing::error!("Game loop dropped join reply");
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, app_state: AppState, connection: ConnectionId) {
    let (mut sink, mut stream) = socket.split();
    let mut broadcast_rx: Option<broadcast::Receiver<GameBroadcast>> = None;
    let mut player_id: Option<PlayerId> = None;
    // Snapshots are forwarded once our own player_joined has gone by; every
    // snapshot after it contains our ship
    let mut announced = false;

    tracing::info!("Connection {} opened", connection);

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!("Connection {} read error: {}", connection, e);
                        break;
                    }
                    _ => continue, // Ignore ping/pong/binary
                };

                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        let err = GameError::Protocol(e.to_string());
                        tracing::warn!("Connection {} dropped message: {}", connection, err);
                        continue;
                    }
                };

                match client_msg {
                    ClientMsg::Join { player_name } => {
                        // Subscribe first so our own player_joined is not missed
                        let fresh_rx = match broadcast_rx {
                            Some(_) => None,
                            None => Some(app_state.broadcast_tx.subscribe()),
                        };
                        let reply = match request_join(&app_state, connection, player_name).await {
                            Some(reply) => reply,
                            None => break,
                        };
                        let msg = match reply {
                            Ok(welcome) => {
                                player_id = Some(welcome.player_id);
                                if fresh_rx.is_some() {
                                    broadcast_rx = fresh_rx;
                                }
                                ServerMsg::Welcome(welcome)
                            }
                            Err(e) => ServerMsg::JoinRejected {
                                reason: e.to_string(),
                            },
                        };
                        if let Err(e) = send_msg(&mut sink, &msg).await {
                            tracing::debug!("Connection {}: {}", connection, e);
                            break;
                        }
                    }
                    ClientMsg::Input { data } => {
                        if player_id.is_none() {
                            tracing::debug!("{}", GameError::UnknownSession(connection));
                            continue;
                        }
                        let cmd = GameCommand::Input {
                            connection,
                            input: data,
                        };
                        if app_state.game_tx.send(cmd).await.is_err() {
                            break;
                        }
                    }
                }
            }

            // Server -> Client (broadcast)
            result = recv_broadcast(&mut broadcast_rx) => {
                let sent = match result {
                    Ok(GameBroadcast::State { json, .. }) => {
                        if !announced {
                            continue;
                        }
                        send_text(&mut sink, &*json).await
                    }
                    Ok(GameBroadcast::PlayerJoined {
                        player_id: joined,
                        player_name,
                    }) => {
                        if player_id == Some(joined) {
                            announced = true;
                        }
                        let msg = ServerMsg::PlayerJoined {
                            player_id: joined,
                            player_name,
                        };
                        send_msg(&mut sink, &msg).await
                    }
                    Ok(GameBroadcast::PlayerLeft {
                        player_id,
                        player_name,
                    }) => {
                        let msg = ServerMsg::PlayerLeft {
                            player_id,
                            player_name,
                        };
                        send_msg(&mut sink, &msg).await
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Snapshots are full state, the next one catches the client up
                        tracing::warn!("Connection {} lagged by {} messages", connection, n);
                        Ok(())
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if let Err(e) = sent {
                    tracing::debug!("Connection {}: {}", connection, e);
                    break;
                }
            }
        }
    }

    // Cleanup on disconnect; a connection that never joined is a no-op
    let _ = app_state
        .game_tx
        .send(GameCommand::Leave { connection })
        .await;
    tracing::info!("Connection {} closed", connection);
}
