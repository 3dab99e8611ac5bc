pub use asteroids_shared::config::WorldConfig;

/// What happens to a ship that collides with an asteroid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathMode {
    /// Lose a life; out of lives means the ship is eliminated.
    Lives,
    /// Lose points and respawn (multiplayer default).
    Penalty,
}

impl std::str::FromStr for DeathMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lives" => Ok(DeathMode::Lives),
            "penalty" => Ok(DeathMode::Penalty),
            other => Err(format!("unknown death mode '{}'", other)),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub tick_rate_hz: u32,
    pub max_players: usize,
    /// Seed for the game RNG. `None` seeds from entropy.
    pub rng_seed: Option<u64>,
    /// Maximum inbound WebSocket message size (bytes)
    pub max_message_bytes: usize,
    pub death_mode: DeathMode,
    pub starting_lives: u32,
    pub score_penalty: u32,
    pub initial_asteroids: usize,
    /// Wave size is `wave_base_count + level`
    pub wave_base_count: usize,
    /// Bonus per level reached, awarded to every active player
    pub level_bonus: u32,
    /// Minimum seconds between shots per ship (0 disables)
    pub fire_cooldown: f64,
    /// Upper bound on the simulated step after a stall (seconds)
    pub max_tick_dt: f64,
    pub world: WorldConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8081".to_string(),
            tick_rate_hz: 60,
            max_players: 8,
            rng_seed: None,
            max_message_bytes: 1024,
            death_mode: DeathMode::Penalty,
            starting_lives: 3,
            score_penalty: 50,
            initial_asteroids: 10,
            wave_base_count: 10,
            level_bonus: 1000,
            fire_cooldown: 0.15,
            max_tick_dt: 0.25,
            world: WorldConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Override fields from `ASTEROIDS_*` environment variables.
    /// Unparseable values are logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("ASTEROIDS_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Ok(rate) = std::env::var("ASTEROIDS_TICK_RATE") {
            match rate.parse() {
                Ok(rate) => self.tick_rate_hz = rate,
                Err(_) => tracing::warn!("Ignoring invalid ASTEROIDS_TICK_RATE={}", rate),
            }
        }
        if let Ok(max) = std::env::var("ASTEROIDS_MAX_PLAYERS") {
            match max.parse() {
                Ok(max) => self.max_players = max,
                Err(_) => tracing::warn!("Ignoring invalid ASTEROIDS_MAX_PLAYERS={}", max),
            }
        }
        if let Ok(mode) = std::env::var("ASTEROIDS_DEATH_MODE") {
            match mode.parse() {
                Ok(mode) => self.death_mode = mode,
                Err(e) => tracing::warn!("Ignoring ASTEROIDS_DEATH_MODE: {}", e),
            }
        }
        if let Ok(seed) = std::env::var("ASTEROIDS_RNG_SEED") {
            match seed.parse() {
                Ok(seed) => self.rng_seed = Some(seed),
                Err(_) => tracing::warn!("Ignoring invalid ASTEROIDS_RNG_SEED={}", seed),
            }
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("listen_addr '{}' is not a socket address", self.listen_addr));
        }
        if self.tick_rate_hz == 0 || self.tick_rate_hz > 1000 {
            return Err("tick_rate_hz must be in 1..=1000".to_string());
        }
        if self.max_players == 0 {
            return Err("max_players must be > 0".to_string());
        }
        if self.max_message_bytes < 64 {
            return Err("max_message_bytes must be >= 64".to_string());
        }
        if self.death_mode == DeathMode::Lives && self.starting_lives == 0 {
            return Err("starting_lives must be > 0 in lives mode".to_string());
        }
        if !self.fire_cooldown.is_finite() || self.fire_cooldown < 0.0 {
            return Err("fire_cooldown must be finite and >= 0".to_string());
        }
        if !self.max_tick_dt.is_finite() || self.max_tick_dt <= 0.0 {
            return Err("max_tick_dt must be finite and > 0".to_string());
        }
        self.world.validate()
    }

    pub fn tick_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.tick_rate_hz as f64)
    }
}
