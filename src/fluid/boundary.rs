//! Boundary handling and collision response.
//!
//! This module provides:
//! - World-bounds reflection with restitution, plus floor friction
//! - Pairwise overlap resolution with an elastic impulse
//! - A per-cell pairwise pass driven by the spatial grid
//! - Point forces (mouse attract/repel)

use bevy::math::DVec2;
use bevy::prelude::*;

use super::params::WorldBounds;
use super::particle::Particle;
use super::spatial::SpatialGrid;

/// Points closer than this to a point force's center are left alone.
const POINT_FORCE_MIN_DISTANCE: f64 = 1e-4;

/// Keep a particle inside the world bounds.
///
/// Each wall is checked independently in the order floor, ceiling, left, right.
/// On contact the particle is clamped to `bound ± radius` and the normal velocity
/// is reflected and scaled by `restitution`. Only the floor also scales the
/// horizontal velocity by `friction`, modelling ground contact.
pub fn handle_boundary_collisions(
    particle: &mut Particle,
    bounds: &WorldBounds,
    restitution: f64,
    friction: f64,
) {
    let Some(radius) = particle.shape.circular_extent() else {
        return;
    };
    let position = &mut particle.position;
    let velocity = &mut particle.velocity;

    // Floor
    if position.y - radius < bounds.min_y {
        position.y = bounds.min_y + radius;
        velocity.y = -velocity.y * restitution;
        velocity.x *= friction;
    }

    // Ceiling
    if position.y + radius > bounds.max_y {
        position.y = bounds.max_y - radius;
        velocity.y = -velocity.y * restitution;
    }

    // Left wall
    if position.x - radius < bounds.min_x {
        position.x = bounds.min_x + radius;
        velocity.x = -velocity.x * restitution;
    }

    // Right wall
    if position.x + radius > bounds.max_x {
        position.x = bounds.max_x - radius;
        velocity.x = -velocity.x * restitution;
    }
}

/// Apply [`handle_boundary_collisions`] to every particle.
pub fn handle_all_boundary_collisions(
    particles: &mut [Particle],
    bounds: &WorldBounds,
    restitution: f64,
    friction: f64,
) {
    for particle in particles {
        handle_boundary_collisions(particle, bounds, restitution, friction);
    }
}

/// Separate two overlapping circles and bounce them elastically.
///
/// Returns whether the pair was overlapping. Positions move by half the overlap
/// each along the center line; the impulse is only applied when the particles
/// are approaching, and conserves momentum.
pub fn resolve_pairwise_collision(a: &mut Particle, b: &mut Particle) -> bool {
    let (Some(radius_a), Some(radius_b)) = (a.shape.circular_extent(), b.shape.circular_extent())
    else {
        return false;
    };

    let delta = b.position - a.position;
    let dist = delta.length();
    let min_dist = radius_a + radius_b;

    if !(dist > 0.0 && dist < min_dist) {
        return false;
    }

    let overlap = min_dist - dist;
    let normal = delta / dist;

    a.position -= normal * (overlap / 2.0);
    b.position += normal * (overlap / 2.0);

    let separating_velocity = (b.velocity - a.velocity).dot(normal);
    let total_mass = a.mass + b.mass;

    if separating_velocity < 0.0 && total_mass > 0.0 {
        let impulse = normal * (-2.0 * separating_velocity / total_mass);
        a.velocity -= impulse * b.mass;
        b.velocity += impulse * a.mass;
    }

    true
}

/// Resolve overlaps between every pair sharing a grid cell.
///
/// Cells are visited in sorted order so results are reproducible. Pairs that
/// straddle a cell border are not checked. Returns the number of contacts.
pub fn resolve_collisions_in_cells(particles: &mut [Particle], grid: &SpatialGrid) -> usize {
    let mut contacts = 0;

    for (_, bucket) in grid.occupied_cells() {
        for (k, &i) in bucket.iter().enumerate() {
            for &j in &bucket[k + 1..] {
                let Some((a, b)) = pair_mut(particles, i, j) else {
                    continue;
                };
                if resolve_pairwise_collision(a, b) {
                    contacts += 1;
                }
            }
        }
    }

    contacts
}

/// Two distinct mutable elements of a slice.
fn pair_mut(
    particles: &mut [Particle],
    i: usize,
    j: usize,
) -> Option<(&mut Particle, &mut Particle)> {
    if i == j || i.max(j) >= particles.len() {
        return None;
    }
    if i < j {
        let (lo, hi) = particles.split_at_mut(j);
        Some((&mut lo[i], &mut hi[0]))
    } else {
        let (lo, hi) = particles.split_at_mut(i);
        Some((&mut hi[0], &mut lo[j]))
    }
}

/// Push particles within `radius` of `center` towards it (`attract`) or away.
///
/// The velocity receives a one-shot impulse of `strength * (1 - d / radius) * dt`
/// along the unit direction. Particles at the center are skipped.
pub fn apply_point_force(
    attract: bool,
    particles: &mut [Particle],
    center: DVec2,
    radius: f64,
    strength: f64,
    dt: f64,
) {
    let radius_sq = radius * radius;

    for particle in particles {
        let to_center = center - particle.position;
        let dist_sq = to_center.length_squared();
        if dist_sq > radius_sq {
            continue;
        }

        let dist = dist_sq.sqrt();
        if dist < POINT_FORCE_MIN_DISTANCE {
            continue;
        }

        let direction = if attract {
            to_center / dist
        } else {
            -to_center / dist
        };
        let falloff = 1.0 - dist / radius;
        particle.velocity += direction * (strength * falloff * dt);
    }
}

/// Point force requested by the input layer (e.g. a held mouse button).
#[derive(Resource, Clone, Copy, Debug, PartialEq)]
pub struct PointForce {
    pub active: bool,
    pub attract: bool,
    pub center: DVec2,
    pub radius: f64,
    pub strength: f64,
}

impl Default for PointForce {
    fn default() -> Self {
        Self {
            active: false,
            attract: true,
            center: DVec2::ZERO,
            radius: 120.0,
            strength: 3000.0,
        }
    }
}

impl PointForce {
    /// An active attracting force.
    pub fn attract(center: DVec2, radius: f64, strength: f64) -> Self {
        Self {
            active: true,
            attract: true,
            center,
            radius,
            strength,
        }
    }

    /// An active repelling force.
    pub fn repel(center: DVec2, radius: f64, strength: f64) -> Self {
        Self {
            attract: false,
            ..Self::attract(center, radius, strength)
        }
    }

    /// Apply to all particles if active.
    pub fn apply(&self, particles: &mut [Particle], dt: f64) {
        if self.active {
            apply_point_force(
                self.attract,
                particles,
                self.center,
                self.radius,
                self.strength,
                dt,
            );
        }
    }
}
