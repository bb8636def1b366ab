//! Particle data structures and scenario spawning.
//!
//! The [`ParticleStore`] is the single owner of particle state. Everything else
//! (the grid, the solver scratch buffers, the renderer) refers to particles by
//! index into it.

use std::f64::consts::TAU;

use bevy::math::DVec2;
use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::ConfigurationError;
use super::params::WorldBounds;

/// Collision shape of a particle.
///
/// Boundary and pair collision code match on this to get the extent they need;
/// shapes without a circular extent are skipped by those passes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Circle { radius: f64 },
}

impl Shape {
    /// Radius for shapes that have a circular extent.
    pub fn circular_extent(&self) -> Option<f64> {
        match *self {
            Shape::Circle { radius } => Some(radius),
        }
    }
}

impl Default for Shape {
    fn default() -> Self {
        Shape::Circle { radius: 4.0 }
    }
}

/// State of one particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub position: DVec2,
    pub velocity: DVec2,
    /// Accumulated acceleration from [`Particle::apply_force`], consumed and
    /// zeroed by the next integration.
    pub acceleration: DVec2,
    pub mass: f64,
    pub shape: Shape,
    pub color: Color,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: DVec2::ZERO,
            velocity: DVec2::ZERO,
            acceleration: DVec2::ZERO,
            mass: 1.0,
            shape: Shape::default(),
            color: Color::srgb(0.2, 0.5, 0.9),
        }
    }
}

impl Particle {
    /// Create a circular particle at a given position.
    pub fn new(position: DVec2, radius: f64) -> Self {
        Self {
            position,
            shape: Shape::Circle { radius },
            ..default()
        }
    }

    pub fn with_velocity(mut self, velocity: DVec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Radius for drawing. Zero for shapes without a circular extent.
    pub fn radius(&self) -> f64 {
        self.shape.circular_extent().unwrap_or(0.0)
    }

    /// Accumulate `force / mass` into the acceleration. No-op for zero mass.
    pub fn apply_force(&mut self, force: DVec2) {
        if self.mass != 0.0 {
            self.acceleration += force / self.mass;
        }
    }

    pub fn speed(&self) -> f64 {
        self.velocity.length()
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }
}

/// Blue at rest, red at or above `max_speed`.
pub fn color_from_speed(speed: f64, max_speed: f64) -> Color {
    let t = if max_speed > 0.0 {
        (speed / max_speed).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let t = t as f32;
    Color::srgb(t, 0.0, 1.0 - t)
}

/// Flat collection of all particles in the scenario.
#[derive(Clone, Debug, Default)]
pub struct ParticleStore {
    particles: Vec<Particle>,
}

impl ParticleStore {
    pub fn new(particles: Vec<Particle>) -> Self {
        Self { particles }
    }

    /// Replace every particle at once.
    pub fn replace(&mut self, particles: Vec<Particle>) {
        self.particles = particles;
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }

    pub fn as_mut_slice(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn get(&self, index: usize) -> Option<&Particle> {
        self.particles.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Particle> {
        self.particles.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn positions(&self) -> impl Iterator<Item = DVec2> + '_ {
        self.particles.iter().map(|p| p.position)
    }

    /// Recolour every particle by its speed.
    pub fn color_by_speed(&mut self, max_speed: f64) {
        for particle in &mut self.particles {
            particle.color = color_from_speed(particle.speed(), max_speed);
        }
    }

    /// Snapshot for the renderer.
    pub fn instances(&self) -> Vec<ParticleInstance> {
        self.particles.iter().map(ParticleInstance::from).collect()
    }
}

/// Parameters of a scenario reset.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioConfig {
    pub count: usize,
    pub radius: f64,
    pub bounds_width: f64,
    pub bounds_height: f64,
    pub speed_min: f64,
    pub speed_max: f64,
    /// Fixed seed for reproducible resets; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            count: 800,
            radius: 4.0,
            bounds_width: 1024.0,
            bounds_height: 768.0,
            speed_min: 0.0,
            speed_max: 100.0,
            seed: None,
        }
    }
}

impl ScenarioConfig {
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_speed_range(mut self, speed_min: f64, speed_max: f64) -> Self {
        self.speed_min = speed_min;
        self.speed_max = speed_max;
        self
    }

    /// Spawn area sized to the world rectangle.
    pub fn fitted_to(mut self, bounds: &WorldBounds) -> Self {
        self.bounds_width = bounds.width();
        self.bounds_height = bounds.height();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.radius.is_finite() && self.radius >= 0.0) {
            return Err(ConfigurationError::Scenario(format!(
                "radius must be non-negative, got {}",
                self.radius
            )));
        }
        if 2.0 * self.radius > self.bounds_width || 2.0 * self.radius > self.bounds_height {
            return Err(ConfigurationError::Scenario(format!(
                "radius {} does not fit in {}x{}",
                self.radius, self.bounds_width, self.bounds_height
            )));
        }
        if !(self.speed_min >= 0.0
            && self.speed_min <= self.speed_max
            && self.speed_max.is_finite())
        {
            return Err(ConfigurationError::Scenario(format!(
                "speed range [{}, {}] is invalid",
                self.speed_min, self.speed_max
            )));
        }
        Ok(())
    }

    /// Generate a fresh particle set with the given mass.
    pub fn spawn(&self, mass: f64) -> Result<Vec<Particle>, ConfigurationError> {
        self.validate()?;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(self.spawn_with(&mut rng, mass))
    }

    /// Generate particles from an existing RNG. Assumes a validated config.
    pub fn spawn_with<R: Rng>(&self, rng: &mut R, mass: f64) -> Vec<Particle> {
        let r = self.radius;

        (0..self.count)
            .map(|_| {
                let x = sample(rng, r, self.bounds_width - r);
                let y = sample(rng, r, self.bounds_height - r);

                let angle = rng.gen_range(0.0..TAU);
                let speed = sample(rng, self.speed_min, self.speed_max);
                let velocity = DVec2::from_angle(angle) * speed;

                let color = Color::srgb(rng.gen(), rng.gen(), rng.gen());

                Particle::new(DVec2::new(x, y), r)
                    .with_velocity(velocity)
                    .with_mass(mass)
                    .with_color(color)
            })
            .collect()
    }
}

/// Uniform in `[lo, hi]`; degenerate ranges return `lo`.
fn sample<R: Rng>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        rng.gen_range(lo..=hi)
    } else {
        lo
    }
}

/// Render-facing particle layout.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParticleInstance {
    /// Position (xy).
    pub position: [f32; 2],
    /// Radius.
    pub radius: f32,
    /// Padding for 16 byte alignment of the colour.
    pub _padding: f32,
    /// Colour (rgba, sRGB).
    pub color: [f32; 4],
}

impl From<&Particle> for ParticleInstance {
    fn from(p: &Particle) -> Self {
        let c = p.color.to_srgba();
        Self {
            position: [p.position.x as f32, p.position.y as f32],
            radius: p.radius() as f32,
            _padding: 0.0,
            color: [c.red, c.green, c.blue, c.alpha],
        }
    }
}
