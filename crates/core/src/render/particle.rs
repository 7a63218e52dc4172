use std::f32::consts::TAU;

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::input::Velocity;

const GRAVITY: f32 = 0.1;
const FRICTION: f32 = 0.98;
const SHRINK: f32 = 0.96;
const MIN_SIZE: f32 = 0.5;
const SPAWN_JITTER: f32 = 10.0;
/// Pixels per frame contributed by one normalised unit per second of hand
/// velocity.
const VELOCITY_GAIN: f32 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub life: f32,
    pub decay: f32,
    pub size: f32,
    pub color: u32,
}

impl Particle {
    fn alive(&self) -> bool {
        self.life > 0.0 && self.size >= MIN_SIZE
    }
}

/// Bounded particle pool. Spawns beyond `max_particles` are dropped.
#[derive(Debug)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    max_particles: usize,
    rng: SmallRng,
}

impl ParticleSystem {
    pub fn new(max_particles: usize, seed: u64) -> Self {
        Self {
            particles: Vec::with_capacity(max_particles),
            max_particles,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Particle count for a hand moving at `magnitude`.
    pub fn spawn_count(magnitude: f32) -> usize {
        ((magnitude * 10.0).floor() as usize).max(1)
    }

    pub fn remaining_capacity(&self) -> usize {
        self.max_particles.saturating_sub(self.particles.len())
    }

    /// Emits particles trailing a hand at pixel position `(x, y)`.
    pub fn spawn_trailing(
        &mut self,
        (x, y): (f32, f32),
        velocity: Velocity,
        brush_size: f32,
        color: u32,
    ) -> usize {
        let count = Self::spawn_count(velocity.magnitude).min(self.remaining_capacity());
        for _ in 0..count {
            let particle = Particle {
                x: x + self.rng.gen_range(-SPAWN_JITTER..SPAWN_JITTER),
                y: y + self.rng.gen_range(-SPAWN_JITTER..SPAWN_JITTER),
                vx: velocity.x * VELOCITY_GAIN + self.rng.gen_range(-2.0..2.0),
                vy: velocity.y * VELOCITY_GAIN + self.rng.gen_range(-2.0..2.0),
                life: 1.0,
                decay: self.rng.gen_range(0.01..0.03),
                size: self.rng.gen_range(2.0..2.0 + (brush_size * 0.5).max(0.1)),
                color,
            };
            self.particles.push(particle);
        }
        count
    }

    /// Radial burst used for celebrations.
    pub fn burst(&mut self, (x, y): (f32, f32), count: usize, color: u32) -> usize {
        let count = count.min(self.remaining_capacity());
        for _ in 0..count {
            let angle = self.rng.gen_range(0.0..TAU);
            let speed = self.rng.gen_range(2.0..8.0);
            self.particles.push(Particle {
                x,
                y,
                vx: angle.cos() * speed,
                vy: angle.sin() * speed,
                life: 1.0,
                decay: self.rng.gen_range(0.01..0.02),
                size: self.rng.gen_range(3.0..8.0),
                color,
            });
        }
        count
    }

    /// Advances every particle by one tick and evicts the dead ones.
    pub fn update(&mut self) {
        for particle in &mut self.particles {
            particle.x += particle.vx;
            particle.y += particle.vy;
            particle.vy += GRAVITY;
            particle.vx *= FRICTION;
            particle.vy *= FRICTION;
            particle.life -= particle.decay;
            particle.size *= SHRINK;
        }
        self.particles.retain(Particle::alive);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}
