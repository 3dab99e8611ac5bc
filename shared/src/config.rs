/// Reference frame rate the per-frame physics constants are tuned for.
pub const REFERENCE_FPS: f64 = 60.0;

/// World and physics configuration shared by server and clients.
///
/// Speeds and accelerations are in pixels per reference frame (1/60 s);
/// times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../bindings/")]
pub struct WorldConfig {
    pub width: f64,
    pub height: f64,
    pub ship_radius: f64,
    /// Degrees per frame
    pub ship_rotation_speed: f64,
    pub ship_acceleration: f64,
    /// Velocity multiplier applied every frame, must be < 1
    pub ship_friction: f64,
    pub ship_max_speed: f64,
    /// Below this speed the ship snaps to a full stop
    pub ship_stop_speed: f64,
    pub invulnerable_seconds: f64,
    pub blink_interval: f64,
    pub max_off_screen_seconds: f64,
    pub laser_speed: f64,
    pub laser_lifetime: f64,
    /// Asteroid radius is `(4 - level) * asteroid_radius_unit`
    pub asteroid_radius_unit: f64,
    pub asteroid_min_speed: f64,
    /// Minimum speed along each axis so asteroids never crawl along an edge
    pub asteroid_min_axis_speed: f64,
    pub asteroid_wrap_margin: f64,
    pub asteroid_outer_margin: f64,
    /// Distance outside the screen edge where new asteroids appear
    pub asteroid_spawn_offset: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 768.0,
            ship_radius: 15.0,
            ship_rotation_speed: 6.0,
            ship_acceleration: 0.3,
            ship_friction: 0.97,
            ship_max_speed: 8.5,
            ship_stop_speed: 0.1,
            invulnerable_seconds: 1.5,
            blink_interval: 0.1,
            max_off_screen_seconds: 3.0,
            laser_speed: 10.0,
            laser_lifetime: 1.5,
            asteroid_radius_unit: 15.0,
            asteroid_min_speed: 1.2,
            asteroid_min_axis_speed: 0.5,
            asteroid_wrap_margin: 120.0,
            asteroid_outer_margin: 250.0,
            asteroid_spawn_offset: 50.0,
        }
    }
}

impl WorldConfig {
    /// Collision radius for an asteroid of the given level (1 = largest).
    pub fn asteroid_radius(&self, level: u8) -> f64 {
        (4.0 - level as f64) * self.asteroid_radius_unit
    }

    /// Screen center point.
    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        (0.0..=self.width).contains(&x) && (0.0..=self.height).contains(&y)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.width.is_finite() || self.width <= 0.0 {
            return Err("width must be finite and > 0".to_string());
        }
        if !self.height.is_finite() || self.height <= 0.0 {
            return Err("height must be finite and > 0".to_string());
        }
        let friction = self.ship_friction;
        if !friction.is_finite() || friction <= 0.0 || friction >= 1.0 {
            return Err("ship_friction must be in (0, 1)".to_string());
        }
        if !self.ship_max_speed.is_finite() || self.ship_max_speed <= 0.0 {
            return Err("ship_max_speed must be finite and > 0".to_string());
        }
        if self.ship_stop_speed < 0.0 || self.ship_stop_speed >= self.ship_max_speed {
            return Err("ship_stop_speed must be >= 0 and < ship_max_speed".to_string());
        }
        if self.asteroid_min_speed <= 0.0 {
            return Err("asteroid_min_speed must be > 0".to_string());
        }
        if self.asteroid_outer_margin <= self.asteroid_wrap_margin {
            return Err("asteroid_outer_margin must be > asteroid_wrap_margin".to_string());
        }
        if self.laser_lifetime <= 0.0 || self.laser_speed <= 0.0 {
            return Err("laser_speed and laser_lifetime must be > 0".to_string());
        }
        if self.blink_interval <= 0.0 {
            return Err("blink_interval must be > 0".to_string());
        }
        Ok(())
    }
}
