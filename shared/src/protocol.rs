use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::config::WorldConfig;

/// Protocol version - increment when making breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

// === Server -> Client ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "welcome")]
    Welcome(WelcomeMsg),
    #[serde(rename = "join_rejected")]
    JoinRejected { reason: String },
    #[serde(rename = "game_state")]
    GameState { data: GameStateData, timestamp: f64 },
    #[serde(rename = "player_joined")]
    PlayerJoined { player_id: u32, player_name: String },
    #[serde(rename = "player_left")]
    PlayerLeft { player_id: u32, player_name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
pub struct WelcomeMsg {
    pub protocol_version: u32,
    pub player_id: u32,
    pub color_idx: u8,
    pub config: WorldConfig,
}

/// Full world snapshot, sent every tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
pub struct GameStateData {
    #[serde(deserialize_with = "player_keys")]
    pub ships: BTreeMap<u32, ShipView>,
    pub asteroids: Vec<AsteroidView>,
    pub lasers: Vec<LaserView>,
    #[serde(deserialize_with = "player_keys")]
    pub scores: BTreeMap<u32, u32>,
    pub level: u32,
    #[serde(default)]
    pub tick: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
pub struct ShipView {
    pub player_id: u32,
    pub player_name: String,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub thrusting: bool,
    pub rotation_direction: i8,
    pub invulnerable: bool,
    pub visible: bool,
    pub score: u32,
    pub color_idx: u8,
    #[serde(default)]
    pub lives: u32,
    #[serde(default)]
    pub eliminated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
pub struct AsteroidView {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub level: u8,
    pub radius: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
pub struct LaserView {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub player_id: u32,
}

// === Client -> Server ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(tag = "type")]
pub enum ClientMsg {
    #[serde(rename = "join")]
    Join { player_name: String },
    #[serde(rename = "input")]
    Input { data: InputData },
}

/// Control intents. Absent fields leave the ship's current intent unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(default)]
pub struct InputData {
    pub rotation: Option<i8>,
    pub thrust: Option<bool>,
    pub fire: bool,
}

// === Conversion helpers ===

/// JSON object keys are always strings. Inside a tagged enum serde buffers
/// the map before the target type is known, so the ids are parsed here.
fn player_keys<'de, D, V>(deserializer: D) -> Result<BTreeMap<u32, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    use serde::de::Error;

    BTreeMap::<String, V>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, value)| {
            key.parse::<u32>()
                .map(|id| (id, value))
                .map_err(|_| D::Error::custom(format!("invalid player id key '{}'", key)))
        })
        .collect()
}

/// Round to 2 decimal places (sub-pixel precision is plenty for rendering)
#[inline]
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
