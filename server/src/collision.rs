//! Collision resolution: laser/asteroid hits, ship/asteroid crashes and wave
//! completion.
//!
//! Every pass first decides what dies, then mutates the live collections, so
//! an asteroid can be destroyed at most once per tick and a laser can hit at
//! most one asteroid.

use std::collections::{BTreeMap, HashSet};

use asteroids_shared::config::WorldConfig;
use asteroids_shared::vec2;
use rand::Rng;

use crate::config::{DeathMode, ServerConfig};
use crate::entity::{Asteroid, EntityId, IdAllocator, Laser, PlayerId, Ship};
use crate::physics::{central_spawn_point, edge_spawn_point};

/// Scoring and death rules, taken from `ServerConfig`.
#[derive(Debug, Clone, Copy)]
pub struct CollisionRules {
    pub death_mode: DeathMode,
    pub score_penalty: u32,
    pub level_bonus: u32,
    pub wave_base_count: usize,
}

impl From<&ServerConfig> for CollisionRules {
    fn from(config: &ServerConfig) -> Self {
        Self {
            death_mode: config.death_mode,
            score_penalty: config.score_penalty,
            level_bonus: config.level_bonus,
            wave_base_count: config.wave_base_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaserHit {
    pub laser_id: EntityId,
    pub asteroid_id: EntityId,
    pub owner: PlayerId,
    pub level: u8,
    /// Zero if the owner left before the hit
    pub points: u32,
    pub children: Vec<EntityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashOutcome {
    Penalized { score: u32 },
    LifeLost { lives_left: u32 },
    Eliminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipCrash {
    pub player_id: PlayerId,
    pub asteroid_id: EntityId,
    pub outcome: CrashOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveAdvance {
    pub level: u32,
    pub bonus: u32,
    pub spawned: usize,
}

/// Everything that happened during one collision pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionReport {
    pub laser_hits: Vec<LaserHit>,
    pub crashes: Vec<ShipCrash>,
    pub wave: Option<WaveAdvance>,
}

/// Destroy asteroids hit by lasers, spawn fragments and credit the shooters.
pub fn resolve_laser_hits(
    lasers: &mut Vec<Laser>,
    asteroids: &mut Vec<Asteroid>,
    ships: &mut BTreeMap<PlayerId, Ship>,
    world: &WorldConfig,
    ids: &mut IdAllocator,
    rng: &mut impl Rng,
) -> Vec<LaserHit> {
    let mut dead_lasers = HashSet::new();
    let mut dead_asteroids = HashSet::new();
    let mut fragments = Vec::new();
    let mut hits = Vec::new();

    for laser in lasers.iter() {
        let target = asteroids.iter().find(|a| {
            !dead_asteroids.contains(&a.id) && vec2::distance(laser.pos, a.pos) < a.radius(world)
        });
        let Some(asteroid) = target else {
            continue;
        };
        dead_lasers.insert(laser.id);
        dead_asteroids.insert(asteroid.id);

        let mut children = Vec::new();
        if asteroid.can_fragment() {
            for _ in 0..2 {
                let id = ids.next_id();
                let level = asteroid.level + 1;
                match Asteroid::with_random_velocity(id, asteroid.pos, level, world, rng) {
                    Ok(child) => {
                        children.push(child.id);
                        fragments.push(child);
                    }
                    Err(e) => tracing::warn!("Dropped fragment of asteroid {}: {}", asteroid.id, e),
                }
            }
        }

        let points = match ships.get_mut(&laser.owner) {
            Some(ship) => {
                ship.score = ship.score.saturating_add(asteroid.points());
                asteroid.points()
            }
            None => 0,
        };

        hits.push(LaserHit {
            laser_id: laser.id,
            asteroid_id: asteroid.id,
            owner: laser.owner,
            level: asteroid.level,
            points,
            children,
        });
    }

    if !hits.is_empty() {
        lasers.retain(|l| !dead_lasers.contains(&l.id));
        asteroids.retain(|a| !dead_asteroids.contains(&a.id));
        asteroids.extend(fragments);
    }
    hits
}

/// Handle ships flying into asteroids. Invulnerable and eliminated ships are
/// skipped; asteroids survive crashes.
pub fn resolve_ship_crashes(
    ships: &mut BTreeMap<PlayerId, Ship>,
    asteroids: &[Asteroid],
    now: f64,
    world: &WorldConfig,
    rules: &CollisionRules,
    rng: &mut impl Rng,
) -> Vec<ShipCrash> {
    let mut crashes = Vec::new();

    for ship in ships.values_mut() {
        if ship.eliminated || ship.is_invulnerable(now) {
            continue;
        }
        let hit = asteroids
            .iter()
            .find(|a| vec2::distance(ship.pos, a.pos) < ship.radius + a.radius(world));
        let Some(asteroid) = hit else {
            continue;
        };

        let outcome = match rules.death_mode {
            DeathMode::Penalty => {
                ship.score = ship.score.saturating_sub(rules.score_penalty);
                ship.respawn(central_spawn_point(world, rng), now, world);
                CrashOutcome::Penalized { score: ship.score }
            }
            DeathMode::Lives => {
                ship.lives = ship.lives.saturating_sub(1);
                if ship.lives == 0 {
                    ship.eliminated = true;
                    ship.vel = vec2::Vec2::ZERO;
                    ship.thrusting = false;
                    ship.rotation_direction = 0;
                    CrashOutcome::Eliminated
                } else {
                    let (cx, cy) = world.center();
                    ship.respawn(vec2::vec2(cx, cy), now, world);
                    CrashOutcome::LifeLost {
                        lives_left: ship.lives,
                    }
                }
            }
        };

        crashes.push(ShipCrash {
            player_id: ship.player_id,
            asteroid_id: asteroid.id,
            outcome,
        });
    }
    crashes
}

/// When the field is clear, advance the level, pay the level bonus to every
/// active ship and spawn the next wave.
pub fn check_wave_complete(
    asteroids: &mut Vec<Asteroid>,
    ships: &mut BTreeMap<PlayerId, Ship>,
    level: &mut u32,
    world: &WorldConfig,
    rules: &CollisionRules,
    ids: &mut IdAllocator,
    rng: &mut impl Rng,
) -> Option<WaveAdvance> {
    if !asteroids.is_empty() {
        return None;
    }

    *level += 1;
    let bonus = rules.level_bonus.saturating_mul(*level);
    for ship in ships.values_mut().filter(|s| !s.eliminated) {
        ship.score = ship.score.saturating_add(bonus);
    }

    let count = rules.wave_base_count + *level as usize;
    asteroids.extend(spawn_wave(count, world, ids, rng));

    Some(WaveAdvance {
        level: *level,
        bonus,
        spawned: asteroids.len(),
    })
}

/// Create `count` asteroids of random size just outside the screen edges.
pub fn spawn_wave(
    count: usize,
    world: &WorldConfig,
    ids: &mut IdAllocator,
    rng: &mut impl Rng,
) -> Vec<Asteroid> {
    let mut wave = Vec::with_capacity(count);
    for _ in 0..count {
        let pos = edge_spawn_point(world, rng);
        let level = rng.gen_range(1..=Asteroid::MAX_LEVEL);
        match Asteroid::with_random_velocity(ids.next_id(), pos, level, world, rng) {
            Ok(asteroid) => wave.push(asteroid),
            Err(e) => tracing::warn!("Skipped wave asteroid: {}", e),
        }
    }
    wave
}
