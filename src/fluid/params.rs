//! Fluid simulation parameters.
//!
//! These parameters control the behavior of the fluid and the world it lives in.
//! They are read-only while a step runs; the plugin exposes them as a Bevy
//! resource so the host can tweak them between frames.

use std::f64::consts::PI;

use bevy::math::DVec2;
use bevy::prelude::*;

use super::error::ConfigurationError;

/// Material parameters of the SPH force model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphParams {
    /// Density the fluid relaxes towards.
    pub rest_density: f64,

    /// Pressure stiffness (k in p = k(ρ - ρ0)).
    /// Higher values = less compressible but needs smaller timesteps.
    pub stiffness: f64,

    /// Viscosity coefficient (μ).
    /// Higher values = more viscous fluid (honey-like).
    pub viscosity: f64,

    /// Smoothing kernel radius (h).
    /// Particles farther apart than this never interact.
    pub smoothing_radius: f64,

    /// Mass given to particles spawned by a scenario reset.
    pub particle_mass: f64,
}

impl Default for SphParams {
    fn default() -> Self {
        Self {
            rest_density: 0.02,
            stiffness: 1_000_000.0,
            viscosity: 2.0,
            smoothing_radius: 16.0,
            particle_mass: 1.0,
        }
    }
}

impl SphParams {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.smoothing_radius.is_finite() && self.smoothing_radius > 0.0) {
            return Err(ConfigurationError::SmoothingRadius(self.smoothing_radius));
        }
        if !(self.rest_density.is_finite() && self.rest_density > 0.0) {
            return Err(ConfigurationError::RestDensity(self.rest_density));
        }
        if !(self.particle_mass.is_finite() && self.particle_mass > 0.0) {
            return Err(ConfigurationError::ParticleMass(self.particle_mass));
        }
        Ok(())
    }

    /// Kernel normalisation constants for the current smoothing radius.
    pub fn kernel_coefficients(&self) -> KernelCoefficients {
        KernelCoefficients::new(self.smoothing_radius)
    }
}

/// Precomputed 2D kernel constants for a smoothing radius `h`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelCoefficients {
    pub h: f64,
    pub h_sq: f64,
    /// 4 / (π h⁸)
    pub poly6: f64,
    /// 30 / (π h⁵)
    pub spiky_derivative: f64,
    /// 20 / (3π h⁵)
    pub viscosity_laplacian: f64,
}

impl KernelCoefficients {
    pub fn new(h: f64) -> Self {
        let h2 = h * h;
        let h4 = h2 * h2;
        let h5 = h4 * h;
        let h8 = h4 * h4;

        Self {
            h,
            h_sq: h2,
            poly6: 4.0 / (PI * h8),
            spiky_derivative: 30.0 / (PI * h5),
            viscosity_laplacian: 20.0 / (3.0 * PI * h5),
        }
    }
}

/// Axis-aligned world rectangle particles are kept inside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self::from_size(1024.0, 768.0)
    }
}

impl WorldBounds {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Bounds anchored at the origin, the way window coordinates are.
    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, width, 0.0, height)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, point: DVec2) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let finite = [self.min_x, self.max_x, self.min_y, self.max_y]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.min_x >= self.max_x || self.min_y >= self.max_y {
            return Err(ConfigurationError::Bounds {
                min_x: self.min_x,
                max_x: self.max_x,
                min_y: self.min_y,
                max_y: self.max_y,
            });
        }
        Ok(())
    }
}

/// Everything the stepper needs besides the particles themselves.
#[derive(Resource, Clone, Debug)]
pub struct FluidParams {
    /// SPH material parameters.
    pub sph: SphParams,

    /// World rectangle.
    pub bounds: WorldBounds,

    /// Gravity acceleration vector.
    pub gravity: DVec2,

    /// Number of substeps per frame.
    /// The explicit scheme is only conditionally stable, so one large step per
    /// frame diverges. Typical range: 4 - 8
    pub substeps: u32,

    /// Grid cell size. `None` uses the smoothing radius.
    pub cell_size: Option<f64>,

    /// Coefficient of restitution for wall collisions.
    /// 0.0 = fully inelastic, 1.0 = fully elastic.
    pub restitution: f64,

    /// Horizontal velocity factor applied on floor contact.
    /// 1.0 = frictionless, 0.0 = full stop.
    pub friction: f64,

    /// Speed mapped to full red by the colour annotation.
    pub max_color_speed: f64,

    /// Run the per-cell pairwise overlap pass after the substeps.
    pub pairwise_collisions: bool,

    /// Timestep used by the plugin instead of the frame delta.
    pub fixed_timestep: Option<f64>,

    /// Upper clamp on the frame delta the plugin feeds into a step.
    pub max_timestep: f64,
}

impl Default for FluidParams {
    fn default() -> Self {
        Self {
            sph: SphParams::default(),
            bounds: WorldBounds::default(),
            gravity: DVec2::new(0.0, -500.0),
            substeps: 5,
            cell_size: None,
            restitution: 0.5,
            friction: 0.98,
            max_color_speed: 400.0,
            pairwise_collisions: false,
            fixed_timestep: None,
            max_timestep: 1.0 / 30.0,
        }
    }
}

impl FluidParams {
    /// Creates parameters for a water-like fluid.
    pub fn water() -> Self {
        Self::default()
    }

    /// Creates parameters for honey-like viscous fluid.
    pub fn honey() -> Self {
        Self {
            sph: SphParams {
                viscosity: 40.0,
                stiffness: 500_000.0,
                ..SphParams::default()
            },
            restitution: 0.1,
            friction: 0.8,
            ..Self::default()
        }
    }

    /// Creates parameters for bouncy, splashy particles with pair collisions on.
    pub fn splashy() -> Self {
        Self {
            sph: SphParams {
                viscosity: 0.5,
                ..SphParams::default()
            },
            restitution: 0.8,
            friction: 1.0,
            substeps: 6,
            pairwise_collisions: true,
            ..Self::default()
        }
    }

    pub fn with_bounds(mut self, bounds: WorldBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_gravity(mut self, gravity: DVec2) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_substeps(mut self, substeps: u32) -> Self {
        self.substeps = substeps;
        self
    }

    pub fn with_cell_size(mut self, cell_size: f64) -> Self {
        self.cell_size = Some(cell_size);
        self
    }

    pub fn with_sph(mut self, sph: SphParams) -> Self {
        self.sph = sph;
        self
    }

    pub fn with_pairwise_collisions(mut self, enabled: bool) -> Self {
        self.pairwise_collisions = enabled;
        self
    }

    /// Grid cell size actually used for neighbor search.
    /// Approximating the smoothing radius keeps buckets small.
    pub fn effective_cell_size(&self) -> f64 {
        self.cell_size.unwrap_or(self.sph.smoothing_radius)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.sph.validate()?;
        self.bounds.validate()?;

        let cell_size = self.effective_cell_size();
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(ConfigurationError::CellSize(cell_size));
        }
        if self.substeps == 0 {
            return Err(ConfigurationError::ZeroSubsteps);
        }
        Ok(())
    }
}
