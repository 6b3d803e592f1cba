//! Bevy driver: spreads floor generation over frames.
//!
//! Send a [`GenerateFloorRequest`]; the generator then places
//! `rooms_per_step` rooms per frame and emits [`FloorGenerationFinished`]
//! once the floor is sealed. A new request while one is running cancels it.

use std::sync::Arc;

use bevy::prelude::*;

use crate::geometry::Aabb;
use crate::library::TemplateLibrary;

use super::config::GeneratorConfig;
use super::orchestrator::{FloorGenerator, GenerationStats, GenerationStatus};

pub struct FloorGenerationPlugin {
    pub library: Arc<TemplateLibrary>,
    pub config: GeneratorConfig,
}

impl FloorGenerationPlugin {
    pub fn new(library: Arc<TemplateLibrary>, config: GeneratorConfig) -> Self {
        Self { library, config }
    }
}

impl Plugin for FloorGenerationPlugin {
    fn build(&self, app: &mut App) {
        let generator = FloorGenerator::new(Arc::clone(&self.library), self.config.clone());
        app.insert_resource(FloorGeneratorResource(generator))
            .insert_resource(FloorGenerationState::default())
            .add_event::<GenerateFloorRequest>()
            .add_event::<FloorGenerationStarted>()
            .add_event::<FloorGenerationFinished>()
            .add_systems(
                Update,
                (start_floor_generation, advance_floor_generation).chain(),
            );
    }
}

#[derive(Resource)]
pub struct FloorGeneratorResource(pub FloorGenerator);

/// What the driver is doing, readable by UI and tests
#[derive(Resource, Debug, Default)]
pub struct FloorGenerationState {
    pub generating: bool,
    pub seed: Option<u64>,
    pub frames_spent: u32,
    pub last_stats: Option<GenerationStats>,
    pub last_bounds: Option<Aabb>,
    pub last_error: Option<String>,
}

/// Event: build a new floor from `seed`
#[derive(Event, Debug, Clone)]
pub struct GenerateFloorRequest {
    pub seed: u64,
}

/// Event: generation accepted and the entry room is placed
#[derive(Event, Debug, Clone)]
pub struct FloorGenerationStarted {
    pub seed: u64,
}

/// Event: floor sealed and ready to spawn
#[derive(Event, Debug, Clone)]
pub struct FloorGenerationFinished {
    pub seed: u64,
    pub stats: GenerationStats,
    pub bounds: Option<Aabb>,
}

/// System: accept the latest request, cancelling any floor still in progress
pub fn start_floor_generation(
    mut requests: EventReader<GenerateFloorRequest>,
    mut generator: ResMut<FloorGeneratorResource>,
    mut state: ResMut<FloorGenerationState>,
    mut started: EventWriter<FloorGenerationStarted>,
) {
    let Some(request) = requests.read().last().cloned() else {
        return;
    };
    if generator.0.is_generating() {
        generator.0.cancel();
    }
    match generator.0.begin(request.seed) {
        Ok(()) => {
            state.generating = true;
            state.seed = Some(request.seed);
            state.frames_spent = 0;
            state.last_error = None;
            started.send(FloorGenerationStarted { seed: request.seed });
        }
        Err(e) => {
            error!("floor generation refused for seed {}: {}", request.seed, e);
            state.generating = false;
            state.last_error = Some(e.to_string());
        }
    }
}

/// System: place one chunk of rooms per frame and publish the finished floor
pub fn advance_floor_generation(
    mut generator: ResMut<FloorGeneratorResource>,
    mut state: ResMut<FloorGenerationState>,
    mut finished: EventWriter<FloorGenerationFinished>,
) {
    if !generator.0.is_generating() {
        return;
    }
    state.frames_spent += 1;
    let per_frame = generator.0.config().rooms_per_step;

    let outcome = generator.0.step(per_frame).and_then(|status| match status {
        GenerationStatus::InProgress => Ok(None),
        GenerationStatus::Complete => generator
            .0
            .finish()
            .map(|layout| Some((layout.seed, layout.combined_bounds()))),
    });
    match outcome {
        Ok(None) => {}
        Ok(Some((seed, bounds))) => {
            let stats = generator.0.stats().clone();
            state.generating = false;
            state.last_stats = Some(stats.clone());
            state.last_bounds = bounds;
            finished.send(FloorGenerationFinished {
                seed,
                stats,
                bounds,
            });
        }
        Err(e) => {
            error!("floor generation failed: {}", e);
            state.generating = false;
            state.last_error = Some(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::starter_library;

    fn app(rooms_per_step: u32) -> App {
        let config = GeneratorConfig {
            rooms_per_step,
            ..GeneratorConfig::default().with_credits(12)
        };
        let mut app = App::new();
        app.add_plugins(FloorGenerationPlugin::new(Arc::new(starter_library()), config));
        app
    }

    fn run_until_idle(app: &mut App) -> u32 {
        for frame in 1..=500 {
            app.update();
            if !app.world().resource::<FloorGenerationState>().generating {
                return frame;
            }
        }
        panic!("generation never finished");
    }

    #[test]
    fn test_request_generates_over_several_frames() {
        let mut app = app(1);
        app.world_mut().send_event(GenerateFloorRequest { seed: 42 });
        run_until_idle(&mut app);

        let state = app.world().resource::<FloorGenerationState>();
        assert_eq!(state.seed, Some(42));
        assert!(state.frames_spent > 1);
        let stats = state.last_stats.as_ref().unwrap();
        assert!(stats.connections_made <= 12);
        assert!(state.last_bounds.is_some());

        let generator = &app.world().resource::<FloorGeneratorResource>().0;
        assert_eq!(generator.layout().unwrap().seed, 42);
    }

    #[test]
    fn test_chunked_driver_matches_direct_generation() {
        let mut app = app(3);
        app.world_mut().send_event(GenerateFloorRequest { seed: 8 });
        run_until_idle(&mut app);
        let driven = app
            .world()
            .resource::<FloorGeneratorResource>()
            .0
            .layout()
            .unwrap()
            .placements();

        let mut direct = FloorGenerator::new(
            Arc::new(starter_library()),
            GeneratorConfig::default().with_credits(12),
        );
        assert_eq!(direct.generate_floor(8).unwrap().placements(), driven);
    }

    #[test]
    fn test_invalid_library_reports_error() {
        let mut app = App::new();
        app.add_plugins(FloorGenerationPlugin::new(
            Arc::new(TemplateLibrary::new()),
            GeneratorConfig::default(),
        ));
        app.world_mut().send_event(GenerateFloorRequest { seed: 1 });
        app.update();
        let state = app.world().resource::<FloorGenerationState>();
        assert!(!state.generating);
        assert!(state.last_error.is_some());
    }
}
