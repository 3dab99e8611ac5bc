use thiserror::Error;

/// Transport-level connection identifier, assigned by the WebSocket handler.
pub type ConnectionId = u64;

/// Errors raised while handling a single connection's requests.
///
/// None of these are fatal to the game loop; the worst outcome is that the
/// offending connection is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("connection {0} has not joined")]
    UnknownSession(ConnectionId),
    #[error("server full ({max} players)")]
    CapacityExceeded { max: usize },
    #[error("connection {0} already joined")]
    AlreadyJoined(ConnectionId),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Invalid initial values for an entity.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntityError {
    #[error("position ({x}, {y}) is not finite")]
    NonFinitePosition { x: f64, y: f64 },
    #[error("asteroid level {0} outside 1..=3")]
    InvalidLevel(u8),
    #[error("asteroid speed {speed} below minimum {min}")]
    TooSlow { speed: f64, min: f64 },
}
