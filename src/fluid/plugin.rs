//! Bevy plugin for fluid simulation.
//!
//! The host app owns the window, rendering and input. It talks to the
//! simulation through resources:
//! - [`FluidParams`]: tunables, applied between frames when changed
//! - [`PointForce`]: written by input handling (e.g. mouse drag)
//! - [`ResetRequest`]: a pending scenario reset
//! - [`FluidState`]: pause/step control and per-frame statistics
//!
//! and reads particles back from [`FluidSimulation`] for drawing.

use bevy::log::{error, warn};
use bevy::prelude::*;

use super::boundary::PointForce;
use super::params::FluidParams;
use super::particle::ScenarioConfig;
use super::simulation::FluidSimulation;

/// Plugin that adds the SPH simulation to a Bevy app.
///
/// # Example
///
/// ```rust,ignore
/// use bevy::prelude::*;
/// use puddle::prelude::*;
///
/// fn main() {
///     App::new()
///         .add_plugins(DefaultPlugins)
///         .add_plugins(
///             FluidPlugin::with_params(FluidParams::water())
///                 .with_scenario(ScenarioConfig::default()),
///         )
///         .run();
/// }
/// ```
#[derive(Default)]
pub struct FluidPlugin {
    params: FluidParams,
    scenario: Option<ScenarioConfig>,
}

impl FluidPlugin {
    pub fn with_params(params: FluidParams) -> Self {
        Self {
            params,
            scenario: None,
        }
    }

    /// Spawn this scenario on the first frame.
    pub fn with_scenario(mut self, scenario: ScenarioConfig) -> Self {
        self.scenario = Some(scenario);
        self
    }
}

impl Plugin for FluidPlugin {
    fn build(&self, app: &mut App) {
        // Invalid parameters are a programming error in the host; refuse to start.
        let simulation = FluidSimulation::new(self.params.clone())
            .unwrap_or_else(|err| panic!("invalid fluid parameters: {err}"));

        app.insert_resource(self.params.clone())
            .insert_resource(simulation)
            .insert_resource(ResetRequest(self.scenario.clone()))
            .init_resource::<PointForce>()
            .init_resource::<FluidState>();

        app.add_systems(
            Update,
            (sync_params, apply_reset_request, run_simulation).chain(),
        );
    }
}

/// Pending scenario reset, consumed on the next update.
#[derive(Resource, Clone, Debug, Default)]
pub struct ResetRequest(pub Option<ScenarioConfig>);

impl ResetRequest {
    pub fn request(&mut self, config: ScenarioConfig) {
        self.0 = Some(config);
    }
}

/// Control flags and statistics for the running simulation.
#[derive(Resource, Clone, Debug, Default)]
pub struct FluidState {
    /// Skip stepping while set.
    pub paused: bool,
    /// Run exactly one step on the next update even if paused.
    pub step_requested: bool,
    /// Set when a step diverged. Stepping stops until the next reset clears it;
    /// `paused` is left untouched.
    pub diverged: bool,
    pub particle_count: usize,
    pub frame: u64,
    pub time: f64,
    pub avg_density_error: f64,
    pub contacts: usize,
}

impl FluidState {
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    pub fn request_step(&mut self) {
        self.step_requested = true;
    }
}

/// Push edited parameters into the simulation.
fn sync_params(params: Res<FluidParams>, mut simulation: ResMut<FluidSimulation>) {
    if !params.is_changed() || params.is_added() {
        return;
    }
    if let Err(err) = simulation.set_params(params.clone()) {
        warn!("ignoring invalid fluid parameters: {err}");
    }
}

/// Replace the particle store if a reset was requested.
fn apply_reset_request(
    mut request: ResMut<ResetRequest>,
    mut simulation: ResMut<FluidSimulation>,
    mut state: ResMut<FluidState>,
) {
    let Some(config) = request.0.take() else {
        return;
    };

    match simulation.reset(&config) {
        Ok(()) => {
            state.diverged = false;
            state.particle_count = simulation.num_particles();
            state.frame = 0;
            state.time = 0.0;
        }
        Err(err) => warn!("scenario reset rejected: {err}"),
    }
}

/// Advance the simulation by the frame time.
fn run_simulation(
    time: Res<Time>,
    params: Res<FluidParams>,
    point_force: Res<PointForce>,
    mut simulation: ResMut<FluidSimulation>,
    mut state: ResMut<FluidState>,
) {
    if state.diverged || (state.paused && !state.step_requested) {
        return;
    }
    state.step_requested = false;

    let dt = params
        .fixed_timestep
        .unwrap_or(time.delta_secs_f64())
        .min(params.max_timestep);

    simulation.set_point_force(*point_force);

    match simulation.step(dt) {
        Ok(stats) => {
            state.particle_count = simulation.num_particles();
            state.frame = simulation.frame();
            state.time = simulation.time();
            state.avg_density_error = stats.density_error;
            state.contacts = stats.contacts;
        }
        Err(err) => {
            error!("fluid simulation halted: {err}");
            state.diverged = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::particle::Particle;
    use bevy::math::DVec2;

    fn test_app(scenario: Option<ScenarioConfig>) -> App {
        let params = FluidParams {
            fixed_timestep: Some(1.0 / 60.0),
            ..FluidParams::default()
        };
        let mut plugin = FluidPlugin::with_params(params);
        if let Some(scenario) = scenario {
            plugin = plugin.with_scenario(scenario);
        }

        let mut app = App::new();
        app.init_resource::<Time>().add_plugins(plugin);
        app
    }

    #[test]
    fn test_initial_scenario_spawns_and_steps() {
        let mut app = test_app(Some(ScenarioConfig::default().with_count(32).with_seed(9)));
        app.update();

        let state = app.world().resource::<FluidState>();
        assert_eq!(state.particle_count, 32);
        assert_eq!(state.frame, 1);
        assert_eq!(app.world().resource::<FluidSimulation>().num_particles(), 32);
        assert!(app.world().resource::<ResetRequest>().0.is_none());
    }

    #[test]
    fn test_pause_and_single_step() {
        let mut app = test_app(Some(ScenarioConfig::default().with_count(8).with_seed(2)));
        app.update();

        app.world_mut().resource_mut::<FluidState>().toggle_pause();
        app.update();
        assert_eq!(app.world().resource::<FluidState>().frame, 1);

        app.world_mut().resource_mut::<FluidState>().request_step();
        app.update();
        let state = app.world().resource::<FluidState>();
        assert_eq!(state.frame, 2);
        assert!(!state.step_requested);
    }

    #[test]
    fn test_reset_request_replaces_particles() {
        let mut app = test_app(None);
        app.update();
        assert_eq!(app.world().resource::<FluidState>().particle_count, 0);

        app.world_mut()
            .resource_mut::<ResetRequest>()
            .request(ScenarioConfig::default().with_count(5).with_seed(4));
        app.update();
        assert_eq!(app.world().resource::<FluidSimulation>().num_particles(), 5);
    }

    #[test]
    fn test_invalid_reset_keeps_particles() {
        let mut app = test_app(Some(ScenarioConfig::default().with_count(5).with_seed(4)));
        app.update();

        app.world_mut()
            .resource_mut::<ResetRequest>()
            .request(ScenarioConfig::default().with_speed_range(10.0, 1.0));
        app.update();
        assert_eq!(app.world().resource::<FluidSimulation>().num_particles(), 5);
    }

    #[test]
    fn test_param_edits_reach_simulation() {
        let mut app = test_app(None);
        app.update();

        app.world_mut().resource_mut::<FluidParams>().substeps = 3;
        app.update();
        assert_eq!(app.world().resource::<FluidSimulation>().params().substeps, 3);
    }

    #[test]
    fn test_reset_resumes_after_divergence() {
        let mut app = test_app(None);
        let particle = Particle::new(DVec2::new(100.0, 100.0), 2.0)
            .with_velocity(DVec2::new(f64::NAN, 0.0));
        let params = app.world().resource::<FluidParams>().clone();
        let simulation = FluidSimulation::with_particles(params, vec![particle]).unwrap();
        app.insert_resource(simulation);
        app.update();

        let state = app.world().resource::<FluidState>();
        assert!(state.diverged);
        assert!(!state.paused);

        app.world_mut()
            .resource_mut::<ResetRequest>()
            .request(ScenarioConfig::default().with_count(6).with_seed(3));
        app.update();
        app.update();

        let state = app.world().resource::<FluidState>();
        assert!(!state.diverged);
        assert_eq!(state.frame, 2);
        assert_eq!(state.particle_count, 6);
    }
}
