//! Error types for configuration and stepping.
//!
//! Numeric edge cases inside a step (empty neighborhoods, coincident particles,
//! zero mass) are absorbed by guards in the solver and never show up here. What
//! remains are invalid parameters, caught at construction, and a state that went
//! non-finite during a step.

/// Invalid simulation parameters, rejected before any state is touched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("smoothing radius must be positive and finite, got {0}")]
    SmoothingRadius(f64),
    #[error("grid cell size must be positive and finite, got {0}")]
    CellSize(f64),
    #[error("rest density must be positive and finite, got {0}")]
    RestDensity(f64),
    #[error("particle mass must be positive and finite, got {0}")]
    ParticleMass(f64),
    #[error("substep count must be at least 1")]
    ZeroSubsteps,
    #[error("world bounds are empty or inverted: x [{min_x}, {max_x}], y [{min_y}, {max_y}]")]
    Bounds {
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
    },
    #[error("invalid scenario: {0}")]
    Scenario(String),
}

/// Failures surfaced by [`FluidSimulation::step`](super::simulation::FluidSimulation::step).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// A particle's position or velocity became NaN or infinite.
    #[error("particle {index} diverged in substep {substep} of frame {frame}")]
    Divergence {
        index: usize,
        substep: u32,
        frame: u64,
    },
}

pub type FluidResult<T> = Result<T, SimulationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_converts() {
        let err: SimulationError = ConfigurationError::CellSize(0.0).into();
        assert!(matches!(
            err,
            SimulationError::Configuration(ConfigurationError::CellSize(_))
        ));
        assert_eq!(
            err.to_string(),
            "grid cell size must be positive and finite, got 0"
        );
    }
}
