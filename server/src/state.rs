use asteroids_shared::config::WorldConfig;
use asteroids_shared::protocol::{GameStateData, InputData, ServerMsg};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::collision::{self, CollisionReport, CollisionRules};
use crate::config::ServerConfig;
use crate::entity::{Asteroid, IdAllocator, Laser};
use crate::error::{ConnectionId, GameError};
use crate::physics;
use crate::session::{JoinAccepted, Session, SessionRegistry};

/// Central game state owned by the game loop task.
pub struct GameState {
    pub sessions: SessionRegistry,
    pub asteroids: Vec<Asteroid>,
    pub lasers: Vec<Laser>,
    pub level: u32,
    /// Simulation clock in seconds, advanced by each tick's dt
    pub time: f64,
    pub tick_count: u64,
    pub world: WorldConfig,
    rules: CollisionRules,
    ids: IdAllocator,
    rng: ChaCha8Rng,
}

impl GameState {
    pub fn new(config: &ServerConfig) -> Self {
        let mut rng = match config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let mut ids = IdAllocator::default();
        let asteroids =
            collision::spawn_wave(config.initial_asteroids, &config.world, &mut ids, &mut rng);
        let sessions = SessionRegistry::new(config, &mut rng);

        Self {
            sessions,
            asteroids,
            lasers: Vec::new(),
            level: 1,
            time: 0.0,
            tick_count: 0,
            world: config.world,
            rules: CollisionRules::from(config),
            ids,
            rng,
        }
    }

    pub fn join(
        &mut self,
        connection: ConnectionId,
        player_name: &str,
    ) -> Result<JoinAccepted, GameError> {
        self.sessions.join(connection, player_name, self.time, &mut self.rng)
    }

    pub fn leave(&mut self, connection: ConnectionId) -> Option<Session> {
        self.sessions.leave(connection)
    }

    /// Apply a connection's control input; a permitted fire spawns a laser.
    pub fn apply_input(
        &mut self,
        connection: ConnectionId,
        input: &InputData,
    ) -> Result<(), GameError> {
        let Some(shot) = self.sessions.apply_input(connection, input, self.time)? else {
            return Ok(());
        };
        let laser = Laser::new(
            self.ids.next_id(),
            shot.owner,
            shot.origin,
            shot.angle,
            self.world.laser_speed,
            self.time,
        )
        .map_err(|e| GameError::Protocol(e.to_string()))?;
        self.lasers.push(laser);
        Ok(())
    }

    /// Advance the simulation by `dt` seconds: move everything, resolve
    /// collisions, then start the next wave if the field is clear.
    pub fn tick(&mut self, dt: f64) -> CollisionReport {
        self.time += dt;
        self.tick_count += 1;
        let now = self.time;
        let world = self.world;

        for ship in self.sessions.ships.values_mut() {
            if physics::integrate_ship(ship, dt, now, &world) {
                tracing::debug!("Ship {} respawned after leaving the screen", ship.player_id);
            }
        }
        for asteroid in self.asteroids.iter_mut() {
            physics::integrate_asteroid(asteroid, dt, &world, &mut self.rng);
        }
        self.lasers
            .retain_mut(|laser| physics::integrate_laser(laser, dt, now, &world));

        let laser_hits = collision::resolve_laser_hits(
            &mut self.lasers,
            &mut self.asteroids,
            &mut self.sessions.ships,
            &world,
            &mut self.ids,
            &mut self.rng,
        );
        let crashes = collision::resolve_ship_crashes(
            &mut self.sessions.ships,
            &self.asteroids,
            now,
            &world,
            &self.rules,
            &mut self.rng,
        );
        let wave = collision::check_wave_complete(
            &mut self.asteroids,
            &mut self.sessions.ships,
            &mut self.level,
            &world,
            &self.rules,
            &mut self.ids,
            &mut self.rng,
        );

        for crash in &crashes {
            tracing::debug!(
                "Ship {} hit asteroid {}: {:?}",
                crash.player_id,
                crash.asteroid_id,
                crash.outcome
            );
        }
        if let Some(wave) = &wave {
            tracing::info!(
                "Level {} started with {} asteroids (bonus {})",
                wave.level,
                wave.spawned,
                wave.bonus
            );
        }

        CollisionReport {
            laser_hits,
            crashes,
            wave,
        }
    }

    /// Snapshot of everything clients render.
    pub fn snapshot(&self) -> GameStateData {
        GameStateData {
            ships: self
                .sessions
                .ships()
                .iter()
                .map(|(id, ship)| (*id, ship.to_view(self.time)))
                .collect(),
            asteroids: self.asteroids.iter().map(|a| a.to_view(&self.world)).collect(),
            lasers: self.lasers.iter().map(Laser::to_view).collect(),
            scores: self.sessions.scores(),
            level: self.level,
            tick: self.tick_count,
        }
    }

    pub fn snapshot_msg(&self, timestamp: f64) -> ServerMsg {
        ServerMsg::GameState {
            data: self.snapshot(),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeathMode;
    use asteroids_shared::vec2::vec2;

    const DT: f64 = 1.0 / 60.0;

    fn test_state() -> GameState {
        let config = ServerConfig {
            rng_seed: Some(12345),
            ..Default::default()
        };
        GameState::new(&config)
    }

    fn rock(state: &mut GameState, x: f64, y: f64, level: u8) -> u32 {
        let id = state.ids.next_id();
        // Slow enough that one tick barely moves it
        let asteroid = Asteroid::new(id, vec2(x, y), vec2(0.9, 0.9), level, 1.2).unwrap();
        state.asteroids.push(asteroid);
        id
    }

    fn fire() -> InputData {
        InputData {
            fire: true,
            ..Default::default()
        }
    }

    #[test]
    fn new_state_has_initial_wave_at_level_one() {
        let state = test_state();
        assert_eq!(state.asteroids.len(), 10);
        assert_eq!(state.level, 1);
        assert!(state.lasers.is_empty());
    }

    #[test]
    fn same_seed_gives_same_world() {
        let a = test_state();
        let b = test_state();
        assert_eq!(a.asteroids, b.asteroids);
    }

    #[test]
    fn fire_spawns_laser_at_ship_nose() {
        let mut state = test_state();
        let id = state.join(1, "Alice").unwrap().player_id;
        state.apply_input(1, &fire()).unwrap();

        assert_eq!(state.lasers.len(), 1);
        let laser = &state.lasers[0];
        assert_eq!(laser.owner, id);
        assert_eq!(laser.pos, state.sessions.ships()[&id].nose());
    }

    #[test]
    fn input_for_unknown_connection_is_an_error() {
        let mut state = test_state();
        assert_eq!(state.apply_input(5, &fire()), Err(GameError::UnknownSession(5)));
        assert!(state.lasers.is_empty());
    }

    #[test]
    fn join_then_overlap_at_spawn_costs_nothing() {
        let mut state = test_state();
        state.asteroids.clear();
        let id = state.join(1, "Alice").unwrap().player_id;
        let spawn = state.sessions.ships()[&id].pos;
        rock(&mut state, spawn.x, spawn.y, 1);
        // A second rock keeps the wave from completing
        rock(&mut state, 20.0, 20.0, 3);

        let report = state.tick(DT);

        assert!(report.crashes.is_empty());
        let ship = &state.sessions.ships()[&id];
        assert_eq!(ship.score, 0);
        assert!((ship.pos.x - spawn.x).abs() < 1e-9 && (ship.pos.y - spawn.y).abs() < 1e-9);
    }

    #[test]
    fn single_laser_splits_single_asteroid() {
        let mut state = test_state();
        state.asteroids.clear();
        let id = state.join(1, "P").unwrap().player_id;
        let nose = state.sessions.ships()[&id].nose();
        // Ship faces up, so the laser travels toward smaller y
        let target = rock(&mut state, nose.x, nose.y - 10.0, 1);
        state.apply_input(1, &fire()).unwrap();
        let laser_id = state.lasers[0].id;

        let report = state.tick(DT);

        assert_eq!(report.laser_hits.len(), 1);
        assert!(report.wave.is_none());
        assert_eq!(state.asteroids.len(), 2);
        assert!(state.asteroids.iter().all(|a| a.level == 2));
        assert_eq!(state.sessions.ships()[&id].score, 300);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.scores[&id], 300);
        assert!(snapshot.asteroids.iter().all(|a| a.id != target));
        assert!(snapshot.lasers.iter().all(|l| l.id != laser_id));
        assert_eq!(snapshot.asteroids.len(), 2);
    }

    #[test]
    fn last_asteroid_destroyed_starts_next_wave() {
        let mut state = test_state();
        state.asteroids.clear();
        let id = state.join(1, "P").unwrap().player_id;
        let nose = state.sessions.ships()[&id].nose();
        rock(&mut state, nose.x, nose.y - 10.0, 3);
        state.apply_input(1, &fire()).unwrap();
        assert_eq!(state.asteroids.len(), 1);

        let report = state.tick(DT);

        let wave = report.wave.expect("wave should advance");
        assert_eq!(state.level, 2);
        assert_eq!(wave.level, 2);
        assert_eq!(state.asteroids.len(), 10 + 2);
        assert_eq!(state.sessions.ships()[&id].score, 100 + 2000);
    }

    #[test]
    fn wave_does_not_advance_while_rocks_remain() {
        let mut state = test_state();
        for _ in 0..30 {
            let report = state.tick(DT);
            assert!(report.wave.is_none());
        }
        assert_eq!(state.level, 1);
    }

    #[test]
    fn leave_removes_ship_and_score_from_snapshot() {
        let mut state = test_state();
        let a = state.join(1, "A").unwrap().player_id;
        let b = state.join(2, "B").unwrap().player_id;
        state.leave(1);

        let snapshot = state.snapshot();
        assert!(!snapshot.ships.contains_key(&a));
        assert!(!snapshot.scores.contains_key(&a));
        assert!(snapshot.ships.contains_key(&b));
        assert!(state.leave(1).is_none());
    }

    #[test]
    fn snapshot_reports_tick_and_invulnerability() {
        let mut state = test_state();
        state.asteroids.clear();
        // One small rock drifting in a corner, far from the spawn region
        rock(&mut state, 20.0, 20.0, 3);
        let id = state.join(1, "A").unwrap().player_id;
        state.tick(DT);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.tick, 1);
        assert!(snapshot.ships[&id].invulnerable);

        for _ in 0..120 {
            state.tick(DT);
        }
        assert!(!state.snapshot().ships[&id].invulnerable);
    }

    #[test]
    fn lives_mode_eliminates_after_last_life() {
        let config = ServerConfig {
            rng_seed: Some(1),
            death_mode: DeathMode::Lives,
            starting_lives: 1,
            ..Default::default()
        };
        let mut state = GameState::new(&config);
        state.asteroids.clear();
        rock(&mut state, 20.0, 20.0, 3);
        let id = state.join(1, "A").unwrap().player_id;
        // Let the spawn protection lapse
        for _ in 0..120 {
            state.tick(DT);
        }
        let pos = state.sessions.ships()[&id].pos;
        state.asteroids.clear();
        rock(&mut state, pos.x, pos.y, 1);

        let report = state.tick(DT);

        assert_eq!(report.crashes.len(), 1);
        assert!(state.sessions.ships()[&id].eliminated);
        assert!(state.snapshot().ships[&id].eliminated);

        // Joining again on the same connection puts the player back in play
        state.asteroids.clear();
        rock(&mut state, 20.0, 20.0, 3);
        let again = state.join(1, "A").unwrap();
        assert_eq!(again.player_id, id);
        state.tick(DT);
        let ship = &state.snapshot().ships[&id];
        assert!(!ship.eliminated);
        assert_eq!(ship.lives, 1);
        assert!(ship.invulnerable);
    }
}
