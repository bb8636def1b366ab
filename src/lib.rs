//! Puddle - a 2D particle fluid sandbox for Bevy
//!
//! This library provides a smoothed-particle-hydrodynamics (SPH) simulation with
//! a uniform-grid neighbor search, wall and pairwise collisions, and point
//! forces, meant to drive a real-time interactive sandbox.
//!
//! # Features
//!
//! - **SPH Forces**: Poly6 density, Spiky pressure and viscosity Laplacian kernels
//! - **Substepping**: Fixed number of explicit Euler substeps per frame
//! - **Neighbor Search**: Hash grid rebuilt every substep
//! - **Collisions**: World bounds with restitution and floor friction, optional
//!   elastic pair resolution
//! - **Interaction**: Attract/repel point forces and randomised scenario resets
//! - **Easy Integration**: Simple Bevy plugin interface; rendering stays in the host
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use bevy::prelude::*;
//! use puddle::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(MinimalPlugins)
//!         .add_plugins(
//!             FluidPlugin::with_params(FluidParams::water())
//!                 .with_scenario(ScenarioConfig::default().with_count(1500)),
//!         )
//!         .add_systems(Update, draw_particles)
//!         .run();
//! }
//!
//! fn draw_particles(simulation: Res<FluidSimulation>) {
//!     for instance in simulation.instances() {
//!         // hand `instance` to the renderer
//!         let _ = instance;
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`fluid`]: Core fluid simulation module
//!   - [`fluid::params`]: Simulation parameters
//!   - [`fluid::particle`]: Particle data structures
//!   - [`fluid::spatial`]: Uniform grid for neighbor search
//!   - [`fluid::solver`]: SPH force model
//!   - [`fluid::boundary`]: Boundary handling and collisions
//!   - [`fluid::simulation`]: Stepper
//!   - [`fluid::plugin`]: Bevy plugin

pub mod fluid;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::fluid::prelude::*;
}
