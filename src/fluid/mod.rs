//! 2D SPH (Smoothed Particle Hydrodynamics) fluid simulation.
//!
//! # Architecture
//!
//! The simulation is structured in the following components:
//!
//! - [`params`]: Simulation parameters (density, stiffness, bounds, etc.)
//! - [`particle`]: Particle data, the particle store and scenario spawning
//! - [`spatial`]: Uniform hash grid for neighbor search
//! - [`solver`]: SPH kernels, density/pressure/force passes and integration
//! - [`boundary`]: Wall collisions, pairwise collisions and point forces
//! - [`simulation`]: The stepper that ties the passes together
//! - [`error`]: Configuration and divergence errors
//! - [`plugin`]: Bevy plugin for easy integration
//!
//! # Example
//!
//! ```rust,no_run
//! use bevy::math::DVec2;
//! use puddle::fluid::prelude::*;
//!
//! let mut sim = FluidSimulation::new(FluidParams::water()).unwrap();
//! sim.reset(&ScenarioConfig::default().with_seed(1)).unwrap();
//! sim.set_point_force(PointForce::attract(DVec2::new(512.0, 384.0), 150.0, 3000.0));
//!
//! for _ in 0..60 {
//!     sim.step(1.0 / 60.0).unwrap();
//! }
//! let instances = sim.instances();
//! ```

pub mod boundary;
pub mod error;
pub mod params;
pub mod particle;
pub mod plugin;
pub mod simulation;
pub mod solver;
pub mod spatial;

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::boundary::*;
    pub use super::error::*;
    pub use super::params::*;
    pub use super::particle::*;
    pub use super::plugin::*;
    pub use super::simulation::*;
    pub use super::solver::*;
    pub use super::spatial::*;
}
