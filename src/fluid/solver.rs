//! SPH (Smoothed Particle Hydrodynamics) force model.
//!
//! Each substep estimates density with the Poly6 kernel, derives pressure from an
//! equation of state, sums symmetrized pressure (Spiky gradient) and viscosity
//! (Laplacian) forces over neighbor pairs, and integrates with explicit Euler.
//!
//! The scheme is conditionally stable: run several small substeps per frame.

use bevy::math::DVec2;

use super::error::SimulationError;
use super::params::{KernelCoefficients, SphParams};
use super::particle::Particle;
use super::spatial::SpatialGrid;

/// Raw density sums below this are replaced by the rest density.
pub const MIN_DENSITY: f64 = 1e-6;

/// Pairs closer than this (squared) are skipped in force evaluation.
pub const MIN_PAIR_DISTANCE_SQ: f64 = 1e-10;

/// 2D SPH kernel functions.
///
/// All kernels are zero outside `0 ≤ r ≤ h`, and everywhere when `h` is not
/// positive.
pub struct SphKernels;

impl SphKernels {
    /// Poly6 kernel for density estimation.
    /// W(r, h) = (4 / πh⁸) * (h² - r²)³ for 0 ≤ r ≤ h
    #[inline]
    pub fn poly6(r: f64, h: f64) -> f64 {
        Self::poly6_with_coeff(r, &KernelCoefficients::new(h))
    }

    #[inline]
    pub fn poly6_with_coeff(r: f64, coeffs: &KernelCoefficients) -> f64 {
        if !(coeffs.h > 0.0 && (0.0..=coeffs.h).contains(&r)) {
            return 0.0;
        }
        let diff = coeffs.h_sq - r * r;
        coeffs.poly6 * diff * diff * diff
    }

    /// Magnitude of the Spiky kernel gradient, used for pressure.
    /// |∇W(r, h)| = (30 / πh⁵) * (h - r)² for 0 ≤ r ≤ h
    #[inline]
    pub fn spiky_derivative(r: f64, h: f64) -> f64 {
        Self::spiky_derivative_with_coeff(r, &KernelCoefficients::new(h))
    }

    #[inline]
    pub fn spiky_derivative_with_coeff(r: f64, coeffs: &KernelCoefficients) -> f64 {
        if !(coeffs.h > 0.0 && (0.0..=coeffs.h).contains(&r)) {
            return 0.0;
        }
        let diff = coeffs.h - r;
        coeffs.spiky_derivative * diff * diff
    }

    /// Laplacian of the viscosity kernel.
    /// ∇²W(r, h) = (20 / 3πh⁵) * (h - r) for 0 ≤ r ≤ h
    #[inline]
    pub fn viscosity_laplacian(r: f64, h: f64) -> f64 {
        Self::viscosity_laplacian_with_coeff(r, &KernelCoefficients::new(h))
    }

    #[inline]
    pub fn viscosity_laplacian_with_coeff(r: f64, coeffs: &KernelCoefficients) -> f64 {
        if !(coeffs.h > 0.0 && (0.0..=coeffs.h).contains(&r)) {
            return 0.0;
        }
        coeffs.viscosity_laplacian * (coeffs.h - r)
    }
}

/// Per-particle scratch state for the SPH passes.
///
/// Buffers are resized to the particle count on every substep and are only
/// meaningful for the particle set passed to the last [`SphSolver::substep`].
#[derive(Debug, Default, Clone)]
pub struct SphSolver {
    densities: Vec<f64>,
    pressures: Vec<f64>,
    forces: Vec<DVec2>,
    positions: Vec<DVec2>,
    neighbors: Vec<usize>,
    rest_density: f64,
}

impl SphSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Densities from the last substep.
    pub fn densities(&self) -> &[f64] {
        &self.densities
    }

    /// Pressures from the last substep.
    pub fn pressures(&self) -> &[f64] {
        &self.pressures
    }

    /// Internal (pressure + viscosity) forces from the last substep.
    pub fn forces(&self) -> &[DVec2] {
        &self.forces
    }

    /// Run one substep: rebuild the grid, compute density, pressure and forces,
    /// then integrate every particle.
    ///
    /// `external` is added to every particle's acceleration (gravity). A
    /// particle left with a non-finite position or velocity is reported as
    /// [`SimulationError::Divergence`] with `substep` and `frame` left at zero
    /// for the caller to fill in.
    pub fn substep(
        &mut self,
        particles: &mut [Particle],
        grid: &mut SpatialGrid,
        params: &SphParams,
        external: DVec2,
        dt: f64,
    ) -> Result<(), SimulationError> {
        let n = particles.len();
        if n == 0 {
            return Ok(());
        }

        self.positions.clear();
        self.positions.extend(particles.iter().map(|p| p.position));
        grid.rebuild(self.positions.iter().copied());

        let coeffs = params.kernel_coefficients();
        self.compute_densities(particles, grid, params, &coeffs);
        self.compute_pressures(params);
        self.compute_forces(particles, grid, params, &coeffs);
        Self::integrate(particles, &self.forces, external, dt);

        match particles.iter().position(|p| !p.is_finite()) {
            Some(index) => Err(SimulationError::Divergence {
                index,
                substep: 0,
                frame: 0,
            }),
            None => Ok(()),
        }
    }

    fn compute_densities(
        &mut self,
        particles: &[Particle],
        grid: &SpatialGrid,
        params: &SphParams,
        coeffs: &KernelCoefficients,
    ) {
        let h_sq = coeffs.h_sq;
        self.densities.clear();

        for i in 0..particles.len() {
            let pos_i = self.positions[i];
            grid.neighbors_into(pos_i, coeffs.h, &mut self.neighbors);

            let mut density = 0.0;
            for &j in &self.neighbors {
                let r_sq = self.positions[j].distance_squared(pos_i);
                if r_sq > h_sq {
                    continue;
                }
                density += particles[j].mass * SphKernels::poly6_with_coeff(r_sq.sqrt(), coeffs);
            }

            if density < MIN_DENSITY {
                density = params.rest_density;
            }
            self.densities.push(density);
        }
    }

    fn compute_pressures(&mut self, params: &SphParams) {
        self.rest_density = params.rest_density;
        self.pressures.clear();
        self.pressures.extend(
            self.densities
                .iter()
                .map(|&rho| params.stiffness * (rho - params.rest_density)),
        );
    }

    fn compute_forces(
        &mut self,
        particles: &[Particle],
        grid: &SpatialGrid,
        params: &SphParams,
        coeffs: &KernelCoefficients,
    ) {
        let h_sq = coeffs.h_sq;
        self.forces.clear();

        for i in 0..particles.len() {
            let pos_i = self.positions[i];
            let vel_i = particles[i].velocity;
            let pressure_i = self.pressures[i];
            grid.neighbors_into(pos_i, coeffs.h, &mut self.neighbors);

            let mut pressure_force = DVec2::ZERO;
            let mut viscosity_force = DVec2::ZERO;

            for &j in &self.neighbors {
                if i == j {
                    continue;
                }
                let delta = self.positions[j] - pos_i;
                let r_sq = delta.length_squared();
                if r_sq > h_sq || r_sq < MIN_PAIR_DISTANCE_SQ {
                    continue;
                }

                let r = r_sq.sqrt();
                let dir = delta / r;
                let mass_j = particles[j].mass;
                let density_j = self.densities[j];

                // Symmetrized pressure term; positive pressure pushes i away from j.
                let magnitude = -mass_j * (pressure_i + self.pressures[j]) / (2.0 * density_j)
                    * SphKernels::spiky_derivative_with_coeff(r, coeffs);
                pressure_force += dir * magnitude;

                viscosity_force += (particles[j].velocity - vel_i)
                    * (params.viscosity * mass_j / density_j
                        * SphKernels::viscosity_laplacian_with_coeff(r, coeffs));
            }

            self.forces.push(pressure_force + viscosity_force);
        }
    }

    /// Semi-implicit Euler: v += a dt, then x += v dt.
    ///
    /// Internal forces, accumulated per-particle acceleration and the external
    /// acceleration are summed before the single update.
    fn integrate(particles: &mut [Particle], forces: &[DVec2], external: DVec2, dt: f64) {
        for (particle, &force) in particles.iter_mut().zip(forces) {
            let internal = if particle.mass != 0.0 {
                force / particle.mass
            } else {
                DVec2::ZERO
            };
            let acceleration = internal + particle.acceleration + external;

            particle.velocity += acceleration * dt;
            particle.position += particle.velocity * dt;
            particle.acceleration = DVec2::ZERO;
        }
    }

    /// Mean relative deviation from the rest density (for debugging).
    pub fn average_density_error(&self) -> f64 {
        if self.densities.is_empty() || self.rest_density <= 0.0 {
            return 0.0;
        }
        let rho0 = self.rest_density;
        let sum: f64 = self
            .densities
            .iter()
            .map(|&d| (d - rho0).abs() / rho0)
            .sum();
        sum / self.densities.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SphParams {
        SphParams {
            rest_density: 0.02,
            stiffness: 1000.0,
            viscosity: 1.0,
            smoothing_radius: 10.0,
            particle_mass: 1.0,
        }
    }

    #[test]
    fn test_kernels_non_negative_and_bounded() {
        let h = 2.0;
        for k in 0..=100 {
            let r = h * k as f64 / 100.0;
            assert!(SphKernels::poly6(r, h) >= 0.0);
            assert!(SphKernels::spiky_derivative(r, h) >= 0.0);
            assert!(SphKernels::viscosity_laplacian(r, h) >= 0.0);
        }
        for r in [-0.1, 2.0001, 5.0] {
            assert_eq!(SphKernels::poly6(r, h), 0.0);
            assert_eq!(SphKernels::spiky_derivative(r, h), 0.0);
            assert_eq!(SphKernels::viscosity_laplacian(r, h), 0.0);
        }
    }

    #[test]
    fn test_kernels_vanish_for_degenerate_radius() {
        for h in [0.0, -4.0, f64::NAN] {
            assert_eq!(SphKernels::poly6(0.0, h), 0.0);
            assert_eq!(SphKernels::spiky_derivative(0.0, h), 0.0);
            assert_eq!(SphKernels::viscosity_laplacian(0.0, h), 0.0);
        }
    }

    #[test]
    fn test_poly6_kernel() {
        let h = 1.0;

        // At r=0, kernel should be maximum
        let w_0 = SphKernels::poly6(0.0, h);
        assert!((w_0 - 4.0 / std::f64::consts::PI).abs() < 1e-12);

        // At r=h, kernel should be 0
        assert!(SphKernels::poly6(h, h).abs() < 1e-12);

        // Kernel should decrease with distance
        let w_half = SphKernels::poly6(0.5, h);
        assert!(w_half < w_0);
        assert!(w_half > 0.0);
    }

    #[test]
    fn test_isolated_particle_density() {
        let sph = params();
        let mut grid = SpatialGrid::new(sph.smoothing_radius).unwrap();
        let mut solver = SphSolver::new();
        let mut particles = vec![Particle::new(DVec2::new(50.0, 50.0), 1.0)];

        solver
            .substep(&mut particles, &mut grid, &sph, DVec2::ZERO, 0.01)
            .unwrap();

        // Only the self contribution.
        let expected = SphKernels::poly6(0.0, sph.smoothing_radius);
        assert!((solver.densities()[0] - expected).abs() < 1e-15);
        assert_eq!(solver.forces()[0], DVec2::ZERO);
    }

    #[test]
    fn test_density_floor_for_negligible_sum() {
        let sph = params();
        let mut grid = SpatialGrid::new(sph.smoothing_radius).unwrap();
        let mut solver = SphSolver::new();
        // Zero mass contributes nothing, so the raw sum is 0.
        let mut particles = vec![Particle::new(DVec2::ZERO, 1.0).with_mass(0.0)];

        solver
            .substep(&mut particles, &mut grid, &sph, DVec2::ZERO, 0.01)
            .unwrap();

        assert_eq!(solver.densities()[0], 0.02);
        assert_eq!(solver.pressures()[0], 0.0);
    }

    #[test]
    fn test_compressed_pair_repels_symmetrically() {
        let sph = params();
        let mut grid = SpatialGrid::new(sph.smoothing_radius).unwrap();
        let mut solver = SphSolver::new();
        let mut particles = vec![
            Particle::new(DVec2::new(0.0, 0.0), 1.0),
            Particle::new(DVec2::new(2.0, 0.0), 1.0),
        ];

        solver
            .substep(&mut particles, &mut grid, &sph, DVec2::ZERO, 0.001)
            .unwrap();

        let f = solver.forces();
        assert!(solver.pressures()[0] > 0.0);
        assert!(f[0].x < 0.0, "left particle pushed left: {:?}", f[0]);
        assert!(f[1].x > 0.0, "right particle pushed right: {:?}", f[1]);
        assert!((f[0] + f[1]).length() < 1e-9);
        assert!(particles[0].velocity.x < 0.0);
    }

    #[test]
    fn test_viscosity_damps_relative_velocity() {
        let sph = SphParams {
            stiffness: 0.0,
            ..params()
        };
        let mut grid = SpatialGrid::new(sph.smoothing_radius).unwrap();
        let mut solver = SphSolver::new();
        let mut particles = vec![
            Particle::new(DVec2::new(0.0, 0.0), 1.0).with_velocity(DVec2::new(0.0, 10.0)),
            Particle::new(DVec2::new(3.0, 0.0), 1.0),
        ];

        let before = (particles[0].velocity - particles[1].velocity).length();
        solver
            .substep(&mut particles, &mut grid, &sph, DVec2::ZERO, 0.01)
            .unwrap();
        let after = (particles[0].velocity - particles[1].velocity).length();

        assert!(after < before);
    }

    #[test]
    fn test_coincident_particles_are_skipped() {
        let sph = params();
        let mut grid = SpatialGrid::new(sph.smoothing_radius).unwrap();
        let mut solver = SphSolver::new();
        let mut particles = vec![
            Particle::new(DVec2::new(1.0, 1.0), 1.0),
            Particle::new(DVec2::new(1.0, 1.0), 1.0),
        ];

        solver
            .substep(&mut particles, &mut grid, &sph, DVec2::ZERO, 0.01)
            .unwrap();

        assert_eq!(solver.forces()[0], DVec2::ZERO);
        assert!(particles.iter().all(Particle::is_finite));
    }

    #[test]
    fn test_zero_mass_particle_ignores_internal_forces() {
        let sph = params();
        let mut grid = SpatialGrid::new(sph.smoothing_radius).unwrap();
        let mut solver = SphSolver::new();
        let mut particles = vec![
            Particle::new(DVec2::new(0.0, 0.0), 1.0).with_mass(0.0),
            Particle::new(DVec2::new(2.0, 0.0), 1.0),
        ];

        solver
            .substep(&mut particles, &mut grid, &sph, DVec2::new(0.0, -10.0), 0.1)
            .unwrap();

        // Only gravity moves the massless particle.
        assert_eq!(particles[0].velocity, DVec2::new(0.0, -1.0));
    }

    #[test]
    fn test_divergence_is_reported() {
        let sph = params();
        let mut grid = SpatialGrid::new(sph.smoothing_radius).unwrap();
        let mut solver = SphSolver::new();
        let mut particles = vec![
            Particle::new(DVec2::new(0.0, 0.0), 1.0),
            Particle::new(DVec2::new(500.0, 0.0), 1.0)
                .with_velocity(DVec2::new(f64::INFINITY, 0.0)),
        ];

        let err = solver
            .substep(&mut particles, &mut grid, &sph, DVec2::ZERO, 0.01)
            .unwrap_err();
        assert!(matches!(err, SimulationError::Divergence { index: 1, .. }));
    }
}
