//! Fluid simulation stepper.
//!
//! [`FluidSimulation`] owns every piece of simulation state: the particle store,
//! the neighbor grid, the solver scratch buffers, the parameters and the
//! currently active point force. A call to [`FluidSimulation::step`] runs to
//! completion before returning.

use bevy::log::{debug, info, warn};
use bevy::math::DVec2;
use bevy::prelude::*;

use super::boundary::{handle_all_boundary_collisions, resolve_collisions_in_cells, PointForce};
use super::error::{ConfigurationError, FluidResult, SimulationError};
use super::params::FluidParams;
use super::particle::{Particle, ParticleInstance, ParticleStore, ScenarioConfig};
use super::solver::SphSolver;
use super::spatial::SpatialGrid;

/// Summary of one completed step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepStats {
    /// Substeps actually run.
    pub substeps: u32,
    /// Duration of each substep.
    pub substep_dt: f64,
    /// Contacts resolved by the pairwise pass (0 when disabled).
    pub contacts: usize,
    /// Mean relative density error after the last substep.
    pub density_error: f64,
}

/// Main fluid simulation resource.
#[derive(Resource, Debug, Clone)]
pub struct FluidSimulation {
    store: ParticleStore,
    grid: SpatialGrid,
    solver: SphSolver,
    params: FluidParams,
    point_force: PointForce,
    frame: u64,
    time: f64,
}

impl FluidSimulation {
    /// Creates an empty simulation, validating the parameters.
    pub fn new(params: FluidParams) -> Result<Self, ConfigurationError> {
        params.validate()?;
        let grid = SpatialGrid::new(params.effective_cell_size())?;

        Ok(Self {
            store: ParticleStore::default(),
            grid,
            solver: SphSolver::new(),
            params,
            point_force: PointForce::default(),
            frame: 0,
            time: 0.0,
        })
    }

    /// Creates a simulation with an explicit initial particle set.
    pub fn with_particles(
        params: FluidParams,
        particles: Vec<Particle>,
    ) -> Result<Self, ConfigurationError> {
        let mut sim = Self::new(params)?;
        sim.store.replace(particles);
        Ok(sim)
    }

    pub fn params(&self) -> &FluidParams {
        &self.params
    }

    /// Swap in new parameters between steps. The grid is recreated if the cell
    /// size changed.
    pub fn set_params(&mut self, params: FluidParams) -> Result<(), ConfigurationError> {
        params.validate()?;
        let cell_size = params.effective_cell_size();
        if cell_size != self.grid.cell_size() {
            self.grid = SpatialGrid::new(cell_size)?;
        }
        self.params = params;
        Ok(())
    }

    pub fn point_force(&self) -> &PointForce {
        &self.point_force
    }

    pub fn set_point_force(&mut self, force: PointForce) {
        self.point_force = force;
    }

    pub fn clear_point_force(&mut self) {
        self.point_force.active = false;
    }

    /// Replace the whole particle store with a freshly randomised scenario.
    ///
    /// Spawned particles take their mass from the SPH parameters. On error the
    /// existing particles are kept.
    pub fn reset(&mut self, config: &ScenarioConfig) -> Result<(), ConfigurationError> {
        let particles = config.spawn(self.params.sph.particle_mass)?;
        let outside = particles
            .iter()
            .filter(|p| !self.params.bounds.contains(p.position))
            .count();
        if outside > 0 {
            warn!("{outside} spawned particles start outside the world bounds");
        }
        info!(
            "resetting fluid scenario with {} particles ({}x{})",
            particles.len(),
            config.bounds_width,
            config.bounds_height
        );
        self.store.replace(particles);
        self.frame = 0;
        self.time = 0.0;
        Ok(())
    }

    /// Read-only view of the particles for drawing.
    pub fn particles(&self) -> &[Particle] {
        self.store.as_slice()
    }

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    /// GPU/renderer friendly snapshot.
    pub fn instances(&self) -> Vec<ParticleInstance> {
        self.store.instances()
    }

    pub fn num_particles(&self) -> usize {
        self.store.len()
    }

    /// Accumulate a force on one particle, folded into the next integration.
    /// Returns false for an out-of-range index.
    pub fn apply_force(&mut self, index: usize, force: DVec2) -> bool {
        match self.store.get_mut(index) {
            Some(particle) => {
                particle.apply_force(force);
                true
            }
            None => false,
        }
    }

    /// Number of completed steps since the last reset.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Simulated time since the last reset.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn average_density_error(&self) -> f64 {
        self.solver.average_density_error()
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// `dt` is split into `params.substeps` equal substeps. Each substep applies
    /// the active point force as a velocity impulse, then runs the SPH model with
    /// gravity as external acceleration. Afterwards the optional pairwise pass,
    /// boundary collisions and speed colouring run once.
    ///
    /// Non-positive or non-finite `dt` does nothing. A diverged particle aborts
    /// the step with [`SimulationError::Divergence`].
    pub fn step(&mut self, dt: f64) -> FluidResult<StepStats> {
        if !(dt.is_finite() && dt > 0.0) || self.store.is_empty() {
            return Ok(StepStats::default());
        }

        let substeps = self.params.substeps;
        let substep_dt = dt / substeps as f64;
        let frame = self.frame;

        for substep in 0..substeps {
            let particles = self.store.as_mut_slice();
            self.point_force.apply(particles, substep_dt);

            self.solver
                .substep(
                    particles,
                    &mut self.grid,
                    &self.params.sph,
                    self.params.gravity,
                    substep_dt,
                )
                .map_err(|err| match err {
                    SimulationError::Divergence { index, .. } => SimulationError::Divergence {
                        index,
                        substep,
                        frame,
                    },
                    other => other,
                })?;
        }

        let contacts = if self.params.pairwise_collisions {
            self.grid.rebuild(self.store.positions());
            resolve_collisions_in_cells(self.store.as_mut_slice(), &self.grid)
        } else {
            0
        };

        handle_all_boundary_collisions(
            self.store.as_mut_slice(),
            &self.params.bounds,
            self.params.restitution,
            self.params.friction,
        );
        self.store.color_by_speed(self.params.max_color_speed);

        self.frame += 1;
        self.time += dt;

        let stats = StepStats {
            substeps,
            substep_dt,
            contacts,
            density_error: self.solver.average_density_error(),
        };
        debug!(
            "fluid frame {}: dt={:.5} contacts={} density error={:.3}",
            self.frame, dt, stats.contacts, stats.density_error
        );
        Ok(stats)
    }
}
