//! Session registry: which connection owns which player, ship and color.

use std::collections::{BTreeMap, HashMap, VecDeque};

use asteroids_shared::config::WorldConfig;
use asteroids_shared::protocol::InputData;
use asteroids_shared::vec2::Vec2;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{DeathMode, ServerConfig};
use crate::entity::{PlayerId, Ship};
use crate::error::{ConnectionId, GameError};
use crate::physics::central_spawn_point;

/// Number of distinct ship colors the client palette knows about.
pub const COLOR_SLOTS: u8 = 8;

/// Longest accepted display name, in characters.
pub const MAX_NAME_CHARS: usize = 24;

/// A joined connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub connection: ConnectionId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub color_idx: u8,
}

/// Shuffled pool of color slots. When every slot is taken the pool refills,
/// so colors repeat only once more than `COLOR_SLOTS` players are present.
#[derive(Debug)]
pub struct ColorPool {
    free: VecDeque<u8>,
}

impl ColorPool {
    pub fn new(rng: &mut impl Rng) -> Self {
        let mut pool = Self {
            free: VecDeque::new(),
        };
        pool.refill(rng);
        pool
    }

    fn refill(&mut self, rng: &mut impl Rng) {
        let mut slots: Vec<u8> = (0..COLOR_SLOTS).collect();
        slots.shuffle(rng);
        self.free = slots.into();
    }

    pub fn take(&mut self, rng: &mut impl Rng) -> u8 {
        if self.free.is_empty() {
            self.refill(rng);
        }
        self.free.pop_front().unwrap_or(0)
    }

    pub fn give_back(&mut self, color_idx: u8) {
        if color_idx < COLOR_SLOTS && !self.free.contains(&color_idx) {
            self.free.push_back(color_idx);
        }
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }
}

/// Result of a successful join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinAccepted {
    pub player_id: PlayerId,
    pub player_name: String,
    pub color_idx: u8,
}

/// A laser the game state should spawn on behalf of a player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotRequest {
    pub owner: PlayerId,
    pub origin: Vec2,
    pub angle: f64,
}

/// Trim, drop control characters and cap length. Empty names become "Player".
pub fn sanitize_name(raw: &str) -> String {
    let name: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_CHARS)
        .collect();
    let name = name.trim_end().to_string();
    if name.is_empty() {
        "Player".to_string()
    } else {
        name
    }
}

pub struct SessionRegistry {
    sessions: HashMap<ConnectionId, Session>,
    pub(crate) ships: BTreeMap<PlayerId, Ship>,
    colors: ColorPool,
    next_player_id: PlayerId,
    max_players: usize,
    starting_lives: Option<u32>,
    fire_cooldown: f64,
    world: WorldConfig,
}

impl SessionRegistry {
    pub fn new(config: &ServerConfig, rng: &mut impl Rng) -> Self {
        Self {
            sessions: HashMap::new(),
            ships: BTreeMap::new(),
            colors: ColorPool::new(rng),
            next_player_id: 1,
            max_players: config.max_players,
            starting_lives: match config.death_mode {
                DeathMode::Lives => Some(config.starting_lives),
                DeathMode::Penalty => None,
            },
            fire_cooldown: config.fire_cooldown,
            world: config.world,
        }
    }

    /// Register a connection as a player and spawn its ship, invulnerable,
    /// somewhere in the middle of the screen. In lives mode an eliminated
    /// player may join again on the same connection to start over.
    pub fn join(
        &mut self,
        connection: ConnectionId,
        raw_name: &str,
        now: f64,
        rng: &mut impl Rng,
    ) -> Result<JoinAccepted, GameError> {
        if let Some(player_id) = self.player_id(connection) {
            let eliminated = self.ships.get(&player_id).is_some_and(|ship| ship.eliminated);
            if !eliminated {
                return Err(GameError::AlreadyJoined(connection));
            }
            return self.restart(connection, raw_name, now);
        }
        if self.sessions.len() >= self.max_players {
            return Err(GameError::CapacityExceeded {
                max: self.max_players,
            });
        }

        let player_name = sanitize_name(raw_name);
        let spawn = central_spawn_point(&self.world, rng);
        let player_id = self.next_player_id;
        let color_idx = self.colors.take(rng);

        let radius = self.world.ship_radius;
        let mut ship = match Ship::new(player_id, player_name.clone(), color_idx, spawn, radius) {
            Ok(ship) => ship,
            Err(e) => {
                self.colors.give_back(color_idx);
                return Err(GameError::Protocol(e.to_string()));
            }
        };
        ship.arm_invulnerability(now, self.world.invulnerable_seconds);
        ship.lives = self.starting_lives.unwrap_or(0);

        self.next_player_id += 1;
        self.ships.insert(player_id, ship);
        self.sessions.insert(
            connection,
            Session {
                connection,
                player_id,
                player_name: player_name.clone(),
                color_idx,
            },
        );

        tracing::info!(
            "Player {} ({}) joined on connection {}",
            player_name,
            player_id,
            connection
        );
        Ok(JoinAccepted {
            player_id,
            player_name,
            color_idx,
        })
    }

    /// Bring an eliminated ship back with full lives and a zero score. The
    /// player keeps its id and color.
    fn restart(
        &mut self,
        connection: ConnectionId,
        raw_name: &str,
        now: f64,
    ) -> Result<JoinAccepted, GameError> {
        let session = self
            .sessions
            .get_mut(&connection)
            .ok_or(GameError::UnknownSession(connection))?;
        let ship = self
            .ships
            .get_mut(&session.player_id)
            .ok_or(GameError::UnknownSession(connection))?;

        let player_name = sanitize_name(raw_name);
        let (cx, cy) = self.world.center();
        session.player_name = player_name.clone();
        ship.player_name = player_name.clone();
        ship.score = 0;
        ship.lives = self.starting_lives.unwrap_or(0);
        ship.eliminated = false;
        ship.visible = true;
        ship.last_fire = None;
        ship.respawn(Vec2::new(cx, cy), now, &self.world);

        tracing::info!(
            "Player {} ({}) restarted after elimination",
            player_name,
            session.player_id
        );
        Ok(JoinAccepted {
            player_id: session.player_id,
            player_name,
            color_idx: session.color_idx,
        })
    }

    /// Remove a connection's player, ship and score. Returns the session if
    /// there was one; leaving twice is a no-op.
    pub fn leave(&mut self, connection: ConnectionId) -> Option<Session> {
        let session = self.sessions.remove(&connection)?;
        self.ships.remove(&session.player_id);
        self.colors.give_back(session.color_idx);
        tracing::info!("Player {} ({}) left", session.player_name, session.player_id);
        Some(session)
    }

    /// Route control intents to the connection's ship. A fire intent that
    /// passes the cooldown yields a `ShotRequest`.
    pub fn apply_input(
        &mut self,
        connection: ConnectionId,
        input: &InputData,
        now: f64,
    ) -> Result<Option<ShotRequest>, GameError> {
        let player_id = self
            .player_id(connection)
            .ok_or(GameError::UnknownSession(connection))?;
        let ship = self
            .ships
            .get_mut(&player_id)
            .ok_or(GameError::UnknownSession(connection))?;
        if ship.eliminated {
            return Ok(None);
        }

        if let Some(rotation) = input.rotation {
            ship.set_rotation(rotation);
        }
        if let Some(thrust) = input.thrust {
            ship.thrusting = thrust;
        }
        if !input.fire {
            return Ok(None);
        }

        if let Some(last) = ship.last_fire {
            if now - last < self.fire_cooldown {
                return Ok(None);
            }
        }
        ship.last_fire = Some(now);
        Ok(Some(ShotRequest {
            owner: player_id,
            origin: ship.nose(),
            angle: ship.angle,
        }))
    }

    pub fn player_id(&self, connection: ConnectionId) -> Option<PlayerId> {
        self.sessions.get(&connection).map(|s| s.player_id)
    }

    pub fn ships(&self) -> &BTreeMap<PlayerId, Ship> {
        &self.ships
    }

    pub fn ship_mut(&mut self, player_id: PlayerId) -> Option<&mut Ship> {
        self.ships.get_mut(&player_id)
    }

    pub fn scores(&self) -> BTreeMap<PlayerId, u32> {
        self.ships.iter().map(|(id, ship)| (*id, ship.score)).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn free_colors(&self) -> usize {
        self.colors.available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    fn setup(max_players: usize) -> (SessionRegistry, ChaCha8Rng) {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let config = ServerConfig {
            max_players,
            ..Default::default()
        };
        (SessionRegistry::new(&config, &mut rng), rng)
    }

    fn fire() -> InputData {
        InputData {
            fire: true,
            ..Default::default()
        }
    }

    #[test]
    fn join_spawns_invulnerable_ship_in_center_region() {
        let (mut reg, mut rng) = setup(8);
        let joined = reg.join(1, "Alice", 10.0, &mut rng).unwrap();

        assert_eq!(joined.player_id, 1);
        assert_eq!(joined.player_name, "Alice");
        let ship = &reg.ships()[&joined.player_id];
        assert!(ship.is_invulnerable(10.0));
        assert_eq!(ship.score, 0);
        assert!(ship.pos.x >= 256.0 && ship.pos.x <= 768.0);
        assert!(ship.pos.y >= 192.0 && ship.pos.y <= 576.0);
        assert_eq!(reg.scores().get(&1), Some(&0));
    }

    #[test]
    fn player_ids_are_unique_and_increasing() {
        let (mut reg, mut rng) = setup(8);
        let a = reg.join(1, "A", 0.0, &mut rng).unwrap();
        let b = reg.join(2, "B", 0.0, &mut rng).unwrap();
        reg.leave(1);
        let c = reg.join(3, "C", 0.0, &mut rng).unwrap();
        assert!(a.player_id < b.player_id && b.player_id < c.player_id);
    }

    #[test]
    fn join_beyond_capacity_is_rejected() {
        let (mut reg, mut rng) = setup(2);
        reg.join(1, "A", 0.0, &mut rng).unwrap();
        reg.join(2, "B", 0.0, &mut rng).unwrap();
        let err = reg.join(3, "C", 0.0, &mut rng).unwrap_err();
        assert_eq!(err, GameError::CapacityExceeded { max: 2 });
        assert_eq!(reg.len(), 2);

        reg.leave(1);
        assert!(reg.join(3, "C", 0.0, &mut rng).is_ok());
    }

    #[test]
    fn second_join_on_same_connection_is_rejected() {
        let (mut reg, mut rng) = setup(8);
        reg.join(1, "A", 0.0, &mut rng).unwrap();
        assert_eq!(
            reg.join(1, "A again", 0.0, &mut rng),
            Err(GameError::AlreadyJoined(1))
        );
        assert_eq!(reg.ships().len(), 1);
    }

    #[test]
    fn first_eight_players_get_distinct_colors() {
        let (mut reg, mut rng) = setup(16);
        let colors: HashSet<u8> = (0..8)
            .map(|i| reg.join(i, "P", 0.0, &mut rng).unwrap().color_idx)
            .collect();
        assert_eq!(colors.len(), 8);
        // Pool refills once exhausted
        let ninth = reg.join(8, "P", 0.0, &mut rng).unwrap();
        assert!(ninth.color_idx < COLOR_SLOTS);
    }

    #[test]
    fn leave_returns_color_and_is_idempotent() {
        let (mut reg, mut rng) = setup(8);
        let joined = reg.join(1, "A", 0.0, &mut rng).unwrap();
        assert_eq!(reg.free_colors(), 7);

        let session = reg.leave(1).unwrap();
        assert_eq!(session.player_id, joined.player_id);
        assert_eq!(reg.free_colors(), 8);
        assert!(reg.ships().is_empty());
        assert!(reg.scores().is_empty());

        assert!(reg.leave(1).is_none());
        assert_eq!(reg.free_colors(), 8);
    }

    #[test]
    fn input_from_unknown_connection_is_rejected() {
        let (mut reg, _) = setup(8);
        assert_eq!(
            reg.apply_input(99, &fire(), 0.0),
            Err(GameError::UnknownSession(99))
        );
    }

    #[test]
    fn input_sets_intents_and_keeps_absent_fields() {
        let (mut reg, mut rng) = setup(8);
        let id = reg.join(1, "A", 0.0, &mut rng).unwrap().player_id;

        let input = InputData {
            rotation: Some(-1),
            thrust: Some(true),
            fire: false,
        };
        assert_eq!(reg.apply_input(1, &input, 0.0), Ok(None));
        assert_eq!(reg.ships()[&id].rotation_direction, -1);
        assert!(reg.ships()[&id].thrusting);

        // Fire-only input leaves rotation and thrust alone
        reg.apply_input(1, &fire(), 0.1).unwrap();
        assert_eq!(reg.ships()[&id].rotation_direction, -1);
        assert!(reg.ships()[&id].thrusting);
    }

    #[test]
    fn fire_respects_cooldown() {
        let (mut reg, mut rng) = setup(8);
        let id = reg.join(1, "A", 0.0, &mut rng).unwrap().player_id;

        let shot = reg.apply_input(1, &fire(), 1.0).unwrap().expect("first shot");
        assert_eq!(shot.owner, id);
        assert_eq!(shot.angle, 90.0);
        assert!(reg.apply_input(1, &fire(), 1.05).unwrap().is_none());
        assert!(reg.apply_input(1, &fire(), 1.2).unwrap().is_some());
    }

    #[test]
    fn lives_mode_hands_out_starting_lives() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let config = ServerConfig {
            death_mode: DeathMode::Lives,
            starting_lives: 3,
            ..Default::default()
        };
        let mut reg = SessionRegistry::new(&config, &mut rng);
        let id = reg.join(1, "A", 0.0, &mut rng).unwrap().player_id;
        assert_eq!(reg.ships()[&id].lives, 3);
    }

    #[test]
    fn eliminated_ship_ignores_input() {
        let (mut reg, mut rng) = setup(8);
        let id = reg.join(1, "A", 0.0, &mut rng).unwrap().player_id;
        reg.ship_mut(id).unwrap().eliminated = true;
        assert_eq!(reg.apply_input(1, &fire(), 5.0), Ok(None));
        assert!(!reg.ships()[&id].thrusting);
    }

    #[test]
    fn eliminated_player_can_join_again() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let config = ServerConfig {
            death_mode: DeathMode::Lives,
            starting_lives: 3,
            ..Default::default()
        };
        let mut reg = SessionRegistry::new(&config, &mut rng);
        let first = reg.join(1, "A", 0.0, &mut rng).unwrap();
        {
            let ship = reg.ship_mut(first.player_id).unwrap();
            ship.lives = 0;
            ship.score = 700;
            ship.eliminated = true;
        }

        let again = reg.join(1, "A2", 30.0, &mut rng).unwrap();

        assert_eq!(again.player_id, first.player_id);
        assert_eq!(again.color_idx, first.color_idx);
        assert_eq!(again.player_name, "A2");
        assert_eq!(reg.len(), 1);
        let ship = &reg.ships()[&first.player_id];
        assert!(!ship.eliminated);
        assert_eq!(ship.lives, 3);
        assert_eq!(ship.score, 0);
        assert_eq!(ship.player_name, "A2");
        assert!(ship.is_invulnerable(30.0));
        assert!(reg.apply_input(1, &fire(), 31.0).unwrap().is_some());
    }

    #[test]
    fn live_player_cannot_restart_by_joining() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let config = ServerConfig {
            death_mode: DeathMode::Lives,
            ..Default::default()
        };
        let mut reg = SessionRegistry::new(&config, &mut rng);
        let id = reg.join(1, "A", 0.0, &mut rng).unwrap().player_id;
        reg.ship_mut(id).unwrap().score = 500;
        assert_eq!(
            reg.join(1, "A", 1.0, &mut rng),
            Err(GameError::AlreadyJoined(1))
        );
        assert_eq!(reg.ships()[&id].score, 500);
    }

    #[test]
    fn names_are_sanitized() {
        assert_eq!(sanitize_name("  Alice  "), "Alice");
        assert_eq!(sanitize_name(""), "Player");
        assert_eq!(sanitize_name("\n\t"), "Player");
        assert_eq!(sanitize_name("a\u{7}b"), "ab");
        assert_eq!(sanitize_name(&"x".repeat(100)).chars().count(), MAX_NAME_CHARS);
    }

    #[test]
    fn color_pool_rejects_duplicates_and_foreign_slots() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut pool = ColorPool::new(&mut rng);
        assert_eq!(pool.available(), 8);
        pool.give_back(3);
        pool.give_back(200);
        assert_eq!(pool.available(), 8);
    }
}
