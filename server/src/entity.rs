//! Ship, asteroid and laser records.
//!
//! Entities are plain data. Movement lives in `physics`, interactions in
//! `collision`; the only logic here is validated construction and conversion
//! to wire views.

use asteroids_shared::config::WorldConfig;
use asteroids_shared::protocol::{round2, AsteroidView, LaserView, ShipView};
use asteroids_shared::vec2::{self, Vec2};
use rand::Rng;

use crate::error::EntityError;

pub type PlayerId = u32;
pub type EntityId = u32;

/// Heading of a freshly spawned ship (facing up).
pub const SPAWN_ANGLE: f64 = 90.0;

fn check_finite(pos: Vec2) -> Result<(), EntityError> {
    if pos.is_finite() {
        Ok(())
    } else {
        Err(EntityError::NonFinitePosition { x: pos.x, y: pos.y })
    }
}

/// Monotonic id source for asteroids and lasers.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: EntityId,
}

impl IdAllocator {
    pub fn next_id(&mut self) -> EntityId {
        self.next = self.next.wrapping_add(1);
        self.next
    }
}

/// A player's ship
#[derive(Debug, Clone, PartialEq)]
pub struct Ship {
    pub player_id: PlayerId,
    pub player_name: String,
    pub color_idx: u8,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Degrees in [0, 360), counter-clockwise from +x
    pub angle: f64,
    /// -1, 0 or +1
    pub rotation_direction: i8,
    pub thrusting: bool,
    /// Game-clock time until which the ship ignores asteroid hits
    pub invulnerable_until: f64,
    /// Blink state while invulnerable
    pub visible: bool,
    pub score: u32,
    pub lives: u32,
    /// Out of lives (lives mode only). Eliminated ships are frozen.
    pub eliminated: bool,
    /// Seconds the ship center has spent continuously off screen
    pub off_screen_time: f64,
    pub last_fire: Option<f64>,
    pub radius: f64,
}

impl Ship {
    pub fn new(
        player_id: PlayerId,
        player_name: String,
        color_idx: u8,
        pos: Vec2,
        radius: f64,
    ) -> Result<Self, EntityError> {
        check_finite(pos)?;
        Ok(Self {
            player_id,
            player_name,
            color_idx,
            pos,
            vel: Vec2::ZERO,
            angle: SPAWN_ANGLE,
            rotation_direction: 0,
            thrusting: false,
            invulnerable_until: f64::NEG_INFINITY,
            visible: true,
            score: 0,
            lives: 0,
            eliminated: false,
            off_screen_time: 0.0,
            last_fire: None,
            radius,
        })
    }

    pub fn is_invulnerable(&self, now: f64) -> bool {
        now < self.invulnerable_until
    }

    pub fn arm_invulnerability(&mut self, now: f64, duration: f64) {
        self.invulnerable_until = now + duration;
    }

    /// Move to `pos` at rest and start a fresh invulnerability window.
    pub fn respawn(&mut self, pos: Vec2, now: f64, world: &WorldConfig) {
        self.pos = pos;
        self.vel = Vec2::ZERO;
        self.off_screen_time = 0.0;
        self.arm_invulnerability(now, world.invulnerable_seconds);
    }

    /// Set the rotation intent. Any positive value means +1, any negative -1.
    pub fn set_rotation(&mut self, direction: i8) {
        self.rotation_direction = direction.signum();
    }

    /// Point on the hull in the facing direction, where lasers leave the ship.
    pub fn nose(&self) -> Vec2 {
        vec2::add(self.pos, vec2::scale(vec2::from_heading_deg(self.angle), self.radius))
    }

    pub fn to_view(&self, now: f64) -> ShipView {
        ShipView {
            player_id: self.player_id,
            player_name: self.player_name.clone(),
            x: self.pos.x,
            y: self.pos.y,
            angle: self.angle,
            velocity_x: self.vel.x,
            velocity_y: self.vel.y,
            thrusting: self.thrusting,
            rotation_direction: self.rotation_direction,
            invulnerable: self.is_invulnerable(now),
            visible: self.visible,
            score: self.score,
            color_idx: self.color_idx,
            lives: self.lives,
            eliminated: self.eliminated,
        }
    }

    /// Rebuild a ship from its wire view.
    ///
    /// The view carries no timestamps, so the invulnerability window, the
    /// off-screen timer and fire cooldown start cleared.
    pub fn from_view(view: &ShipView, radius: f64) -> Result<Self, EntityError> {
        let mut ship = Ship::new(
            view.player_id,
            view.player_name.clone(),
            view.color_idx,
            vec2::vec2(view.x, view.y),
            radius,
        )?;
        ship.vel = vec2::vec2(view.velocity_x, view.velocity_y);
        ship.angle = view.angle;
        ship.rotation_direction = view.rotation_direction;
        ship.thrusting = view.thrusting;
        ship.visible = view.visible;
        ship.score = view.score;
        ship.lives = view.lives;
        ship.eliminated = view.eliminated;
        Ok(ship)
    }
}

/// An asteroid. Level 1 is the largest, 3 the smallest.
#[derive(Debug, Clone, PartialEq)]
pub struct Asteroid {
    pub id: EntityId,
    pub pos: Vec2,
    /// Pixels per frame, assigned at creation and kept across ticks
    pub vel: Vec2,
    pub level: u8,
}

impl Asteroid {
    pub const MAX_LEVEL: u8 = 3;

    pub fn new(
        id: EntityId,
        pos: Vec2,
        vel: Vec2,
        level: u8,
        min_speed: f64,
    ) -> Result<Self, EntityError> {
        check_finite(pos)?;
        if !(1..=Self::MAX_LEVEL).contains(&level) {
            return Err(EntityError::InvalidLevel(level));
        }
        let speed = vec2::length(vel);
        // Tolerate rounding from building the vector out of sin/cos
        if !speed.is_finite() || speed < min_speed - 1e-9 {
            return Err(EntityError::TooSlow {
                speed,
                min: min_speed,
            });
        }
        Ok(Self {
            id,
            pos,
            vel,
            level,
        })
    }

    /// Create an asteroid heading in a random direction. Smaller asteroids
    /// tend to be faster; each axis gets at least the configured minimum.
    pub fn with_random_velocity(
        id: EntityId,
        pos: Vec2,
        level: u8,
        world: &WorldConfig,
        rng: &mut impl Rng,
    ) -> Result<Self, EntityError> {
        let level_divisor = level.max(1) as f64;
        let speed = world
            .asteroid_min_speed
            .max((rng.gen::<f64>() * 3.5 + 0.8) / level_divisor);
        let heading = rng.gen::<f64>() * std::f64::consts::TAU;
        let mut vel = vec2::vec2(heading.cos() * speed, heading.sin() * speed);

        let min_axis = world.asteroid_min_axis_speed;
        if vel.x.abs() < min_axis {
            vel.x = if vel.x >= 0.0 { min_axis } else { -min_axis };
        }
        if vel.y.abs() < min_axis {
            vel.y = if vel.y >= 0.0 { min_axis } else { -min_axis };
        }

        Self::new(id, pos, vel, level, world.asteroid_min_speed)
    }

    pub fn radius(&self, world: &WorldConfig) -> f64 {
        world.asteroid_radius(self.level)
    }

    pub fn can_fragment(&self) -> bool {
        self.level < Self::MAX_LEVEL
    }

    /// Points for destroying this asteroid: smaller is worth more.
    pub fn points(&self) -> u32 {
        (4 - self.level as u32) * 100
    }

    pub fn to_view(&self, world: &WorldConfig) -> AsteroidView {
        AsteroidView {
            id: self.id,
            x: round2(self.pos.x),
            y: round2(self.pos.y),
            level: self.level,
            radius: self.radius(world),
            velocity_x: round2(self.vel.x),
            velocity_y: round2(self.vel.y),
        }
    }
}

/// A laser shot. Speed and lifetime come from `WorldConfig`.
#[derive(Debug, Clone, PartialEq)]
pub struct Laser {
    pub id: EntityId,
    pub owner: PlayerId,
    pub pos: Vec2,
    pub angle: f64,
    pub vel: Vec2,
    pub created_at: f64,
}

impl Laser {
    pub fn new(
        id: EntityId,
        owner: PlayerId,
        pos: Vec2,
        angle: f64,
        speed: f64,
        now: f64,
    ) -> Result<Self, EntityError> {
        check_finite(pos)?;
        Ok(Self {
            id,
            owner,
            pos,
            angle,
            vel: vec2::scale(vec2::from_heading_deg(angle), speed),
            created_at: now,
        })
    }

    pub fn age(&self, now: f64) -> f64 {
        now - self.created_at
    }

    pub fn to_view(&self) -> LaserView {
        LaserView {
            id: self.id,
            x: round2(self.pos.x),
            y: round2(self.pos.y),
            angle: self.angle,
            player_id: self.owner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn world() -> WorldConfig {
        WorldConfig::default()
    }

    #[test]
    fn id_allocator_is_monotonic() {
        let mut ids = IdAllocator::default();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.next_id(), 3);
    }

    #[test]
    fn ship_rejects_nan_position() {
        let result = Ship::new(1, "A".into(), 0, vec2::vec2(f64::NAN, 1.0), 15.0);
        assert!(matches!(result, Err(EntityError::NonFinitePosition { .. })));
    }

    #[test]
    fn new_ship_faces_up_at_rest() {
        let ship = Ship::new(1, "A".into(), 0, vec2::vec2(10.0, 20.0), 15.0).unwrap();
        assert_eq!(ship.angle, 90.0);
        assert_eq!(ship.vel, Vec2::ZERO);
        assert!(!ship.is_invulnerable(0.0));
    }

    #[test]
    fn invulnerability_expires() {
        let mut ship = Ship::new(1, "A".into(), 0, vec2::vec2(0.0, 0.0), 15.0).unwrap();
        ship.arm_invulnerability(10.0, 1.5);
        assert!(ship.is_invulnerable(10.0));
        assert!(ship.is_invulnerable(11.49));
        assert!(!ship.is_invulnerable(11.5));
    }

    #[test]
    fn set_rotation_clamps_by_sign() {
        let mut ship = Ship::new(1, "A".into(), 0, vec2::vec2(0.0, 0.0), 15.0).unwrap();
        ship.set_rotation(5);
        assert_eq!(ship.rotation_direction, 1);
        ship.set_rotation(-100);
        assert_eq!(ship.rotation_direction, -1);
        ship.set_rotation(0);
        assert_eq!(ship.rotation_direction, 0);
    }

    #[test]
    fn nose_is_one_radius_ahead() {
        let ship = Ship::new(1, "A".into(), 0, vec2::vec2(100.0, 100.0), 15.0).unwrap();
        let nose = ship.nose();
        assert!((nose.x - 100.0).abs() < 1e-9);
        assert!((nose.y - 85.0).abs() < 1e-9);
    }

    #[test]
    fn ship_view_roundtrip_is_exact() {
        let mut ship = Ship::new(4, "Alice".into(), 6, vec2::vec2(0.1 + 0.2, 700.3), 15.0).unwrap();
        ship.vel = vec2::vec2(1.0 / 3.0, -std::f64::consts::PI);
        ship.angle = 359.99999999;
        ship.score = 1234;
        ship.thrusting = true;
        ship.rotation_direction = -1;

        let json = serde_json::to_string(&ship.to_view(0.0)).unwrap();
        let view: ShipView = serde_json::from_str(&json).unwrap();
        let rebuilt = Ship::from_view(&view, 15.0).unwrap();

        assert_eq!(rebuilt.pos.x.to_bits(), ship.pos.x.to_bits());
        assert_eq!(rebuilt.pos.y.to_bits(), ship.pos.y.to_bits());
        assert_eq!(rebuilt.vel.x.to_bits(), ship.vel.x.to_bits());
        assert_eq!(rebuilt.vel.y.to_bits(), ship.vel.y.to_bits());
        assert_eq!(rebuilt.angle.to_bits(), ship.angle.to_bits());
        assert_eq!(rebuilt.score, ship.score);
        assert_eq!(rebuilt.player_name, "Alice");
        assert_eq!(rebuilt.color_idx, 6);
    }

    #[test]
    fn asteroid_rejects_bad_level() {
        let vel = vec2::vec2(2.0, 2.0);
        for level in [0u8, 4, 200] {
            let result = Asteroid::new(1, vec2::vec2(0.0, 0.0), vel, level, 1.2);
            assert_eq!(result, Err(EntityError::InvalidLevel(level)));
        }
    }

    #[test]
    fn asteroid_rejects_motionless() {
        let result = Asteroid::new(1, vec2::vec2(0.0, 0.0), Vec2::ZERO, 1, 1.2);
        assert!(matches!(result, Err(EntityError::TooSlow { .. })));
    }

    #[test]
    fn random_asteroids_always_move() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let world = world();
        for i in 0..500 {
            let level = (i % 3) as u8 + 1;
            let a = Asteroid::with_random_velocity(i, vec2::vec2(0.0, 0.0), level, &world, &mut rng)
                .unwrap();
            assert!(vec2::length(a.vel) >= world.asteroid_min_speed - 1e-9);
            assert!(a.vel.x.abs() >= world.asteroid_min_axis_speed);
            assert!(a.vel.y.abs() >= world.asteroid_min_axis_speed);
        }
    }

    #[test]
    fn asteroid_points_and_radius_by_level() {
        let world = world();
        let vel = vec2::vec2(2.0, 2.0);
        let big = Asteroid::new(1, vec2::vec2(0.0, 0.0), vel, 1, 1.2).unwrap();
        let small = Asteroid::new(2, vec2::vec2(0.0, 0.0), vel, 3, 1.2).unwrap();
        assert_eq!(big.points(), 300);
        assert_eq!(small.points(), 100);
        assert_eq!(big.radius(&world), 45.0);
        assert!(big.can_fragment());
        assert!(!small.can_fragment());
    }

    #[test]
    fn laser_velocity_follows_heading() {
        let laser = Laser::new(1, 9, vec2::vec2(0.0, 0.0), 0.0, 10.0, 2.0).unwrap();
        assert!((laser.vel.x - 10.0).abs() < 1e-9);
        assert!(laser.vel.y.abs() < 1e-9);
        assert!((laser.age(3.5) - 1.5).abs() < 1e-12);
        assert_eq!(laser.to_view().player_id, 9);
    }
}
