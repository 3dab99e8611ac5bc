//! Per-tick movement integration.
//!
//! Tuning constants are per reference frame (1/60 s), so every integrator
//! converts `dt` seconds into a frame count first. At exactly 60 Hz one tick
//! is one frame.

use asteroids_shared::config::{WorldConfig, REFERENCE_FPS};
use asteroids_shared::vec2::{self, Vec2};
use rand::Rng;

use crate::entity::{Asteroid, Laser, Ship};

#[inline]
fn frames(dt: f64) -> f64 {
    dt * REFERENCE_FPS
}

/// Advance a ship by `dt` seconds. Returns true if the ship was respawned at
/// the screen center after staying off screen too long.
pub fn integrate_ship(ship: &mut Ship, dt: f64, now: f64, world: &WorldConfig) -> bool {
    if ship.eliminated {
        return false;
    }
    let frames = frames(dt);

    if ship.rotation_direction != 0 {
        let step = world.ship_rotation_speed * ship.rotation_direction as f64 * frames;
        let turned = ship.angle + step;
        ship.angle = turned.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negative inputs
        if ship.angle >= 360.0 {
            ship.angle = 0.0;
        }
    }

    if ship.thrusting {
        let heading = vec2::from_heading_deg(ship.angle);
        let accel = vec2::scale(heading, world.ship_acceleration * frames);
        ship.vel = vec2::clamp_length(vec2::add(ship.vel, accel), world.ship_max_speed);
    }

    ship.vel = vec2::scale(ship.vel, world.ship_friction.powf(frames));
    if vec2::length(ship.vel) < world.ship_stop_speed {
        ship.vel = Vec2::ZERO;
    }
    ship.pos = vec2::add(ship.pos, vec2::scale(ship.vel, frames));

    update_blink(ship, now, world);

    if world.contains(ship.pos.x, ship.pos.y) {
        ship.off_screen_time = 0.0;
        return false;
    }

    ship.off_screen_time += dt;
    if ship.off_screen_time >= world.max_off_screen_seconds {
        let (cx, cy) = world.center();
        ship.respawn(vec2::vec2(cx, cy), now, world);
        update_blink(ship, now, world);
        return true;
    }
    false
}

/// Toggle visibility every `blink_interval` while invulnerable.
fn update_blink(ship: &mut Ship, now: f64, world: &WorldConfig) {
    if ship.is_invulnerable(now) {
        let armed_at = ship.invulnerable_until - world.invulnerable_seconds;
        let phase = ((now - armed_at) / world.blink_interval).floor() as i64;
        ship.visible = phase.rem_euclid(2) == 0;
    } else {
        ship.visible = true;
    }
}

/// Advance an asteroid along its stored velocity. Returns true if the
/// asteroid drifted past the outer margin and was re-aimed from a screen edge.
pub fn integrate_asteroid(
    asteroid: &mut Asteroid,
    dt: f64,
    world: &WorldConfig,
    rng: &mut impl Rng,
) -> bool {
    asteroid.pos = vec2::add(asteroid.pos, vec2::scale(asteroid.vel, frames(dt)));

    let r = asteroid.radius(world);
    let outer = world.asteroid_outer_margin;
    let pos = asteroid.pos;
    if pos.x - r > world.width + outer
        || pos.x + r < -outer
        || pos.y - r > world.height + outer
        || pos.y + r < -outer
    {
        reaim_from_edge(asteroid, world, rng);
        return true;
    }

    let wrap = world.asteroid_wrap_margin;
    if pos.x - r > world.width + wrap {
        asteroid.pos.x = -r;
    } else if pos.x + r < -wrap {
        asteroid.pos.x = world.width + r;
    }
    if pos.y - r > world.height + wrap {
        asteroid.pos.y = -r;
    } else if pos.y + r < -wrap {
        asteroid.pos.y = world.height + r;
    }
    false
}

fn reaim_from_edge(asteroid: &mut Asteroid, world: &WorldConfig, rng: &mut impl Rng) {
    asteroid.pos = edge_spawn_point(world, rng);
    let (cx, cy) = world.center();
    let toward_center = vec2::normalize(vec2::sub(vec2::vec2(cx, cy), asteroid.pos));
    let speed = world.asteroid_min_speed.max(rng.gen::<f64>() * 3.0);
    asteroid.vel = vec2::scale(toward_center, speed);
}

/// Advance a laser. Returns false once it has expired or left the screen.
pub fn integrate_laser(laser: &mut Laser, dt: f64, now: f64, world: &WorldConfig) -> bool {
    laser.pos = vec2::add(laser.pos, vec2::scale(laser.vel, frames(dt)));
    laser.age(now) < world.laser_lifetime && world.contains(laser.pos.x, laser.pos.y)
}

/// Random point just outside one of the four screen edges.
pub fn edge_spawn_point(world: &WorldConfig, rng: &mut impl Rng) -> Vec2 {
    let offset = world.asteroid_spawn_offset;
    match rng.gen_range(0..4) {
        0 => vec2::vec2(rng.gen_range(0.0..=world.width), -offset),
        1 => vec2::vec2(world.width + offset, rng.gen_range(0.0..=world.height)),
        2 => vec2::vec2(rng.gen_range(0.0..=world.width), world.height + offset),
        _ => vec2::vec2(-offset, rng.gen_range(0.0..=world.height)),
    }
}

/// Random point inside the central half of the screen.
pub fn central_spawn_point(world: &WorldConfig, rng: &mut impl Rng) -> Vec2 {
    vec2::vec2(
        rng.gen_range(world.width / 4.0..=world.width * 3.0 / 4.0),
        rng.gen_range(world.height / 4.0..=world.height * 3.0 / 4.0),
    )
}
