pub mod broad_phase;
pub mod config;
pub mod layout;
pub mod orchestrator;
pub mod plugin;

use std::collections::BTreeMap;
use std::sync::Arc;

use bevy::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::library::TemplateLibrary;

pub use config::{ConfigError, FrontierOrder, GeneratorConfig};
pub use layout::{FloorLayout, PlacedRoom, RoomId, RoomPlacement};
pub use orchestrator::{
    FloorGenerator, FloorRng, GenerationError, GenerationStats, GenerationStatus,
};
pub use plugin::{
    FloorGenerationFinished, FloorGenerationPlugin, FloorGenerationStarted,
    FloorGenerationState, FloorGeneratorResource, GenerateFloorRequest,
};

/// Global tower seed - the root of every floor's seed.
#[derive(Resource, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerSeed {
    pub seed: u64,
}

impl Default for TowerSeed {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

impl TowerSeed {
    /// Deterministic floor seed from tower seed and floor number
    pub fn floor_seed(&self, floor: u32) -> u64 {
        let mut hasher = Sha3_256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(floor.to_le_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }
}

/// Seeds of floors already generated, so a floor can be rebuilt exactly
#[derive(Resource, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorSeedRegistry {
    pub tower: TowerSeed,
    seeds: BTreeMap<u32, u64>,
}

impl FloorSeedRegistry {
    pub fn new(tower: TowerSeed) -> Self {
        Self {
            tower,
            seeds: BTreeMap::new(),
        }
    }

    /// Recorded seed for `floor`, deriving (and recording) it on first use
    pub fn seed_for(&mut self, floor: u32) -> u64 {
        let tower = self.tower;
        *self
            .seeds
            .entry(floor)
            .or_insert_with(|| tower.floor_seed(floor))
    }

    pub fn get(&self, floor: u32) -> Option<u64> {
        self.seeds.get(&floor).copied()
    }

    /// Pin a floor to an explicit seed (e.g. a re-rolled floor)
    pub fn record(&mut self, floor: u32, seed: u64) {
        self.seeds.insert(floor, seed);
    }

    pub fn floors(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.seeds.iter().map(|(f, s)| (*f, *s))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

/// Generate several floors in parallel, one generator per floor.
///
/// Results come back in `floors` order; each floor is identical to what a
/// sequential [`FloorGenerator::generate_floor`] with the same seed produces.
pub fn pregenerate_floors(
    library: &Arc<TemplateLibrary>,
    config: &GeneratorConfig,
    tower: TowerSeed,
    floors: &[u32],
) -> Vec<(u32, Result<FloorLayout, GenerationError>)> {
    floors
        .par_iter()
        .map(|&floor| {
            let mut generator = FloorGenerator::new(Arc::clone(library), config.clone());
            let result = generator.generate_floor(tower.floor_seed(floor)).map(|_| ());
            let layout = result
                .and_then(|()| generator.take_layout().ok_or(GenerationError::NotStarted));
            (floor, layout)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::starter_library;

    #[test]
    fn test_floor_seed_deterministic() {
        let tower = TowerSeed { seed: 12345 };
        assert_eq!(tower.floor_seed(1), tower.floor_seed(1));
        assert_ne!(
            tower.floor_seed(1),
            tower.floor_seed(2),
            "Different floors must produce different seeds"
        );
        assert_ne!(tower.floor_seed(1), TowerSeed { seed: 1 }.floor_seed(1));
    }

    #[test]
    fn test_registry_remembers_and_pins() {
        let mut registry = FloorSeedRegistry::new(TowerSeed { seed: 7 });
        assert_eq!(registry.get(3), None);
        let derived = registry.seed_for(3);
        assert_eq!(derived, TowerSeed { seed: 7 }.floor_seed(3));
        assert_eq!(registry.get(3), Some(derived));

        registry.record(3, 99);
        assert_eq!(registry.seed_for(3), 99);

        let restored = FloorSeedRegistry::from_json(&registry.to_json()).unwrap();
        assert_eq!(restored, registry);
    }

    #[test]
    fn test_pregenerate_matches_sequential() {
        let library = Arc::new(starter_library());
        let config = GeneratorConfig::default().with_credits(10);
        let tower = TowerSeed { seed: 5 };

        let parallel = pregenerate_floors(&library, &config, tower, &[1, 2, 3]);
        assert_eq!(parallel.len(), 3);
        for (floor, result) in parallel {
            let layout = result.unwrap();
            let mut sequential = FloorGenerator::new(Arc::clone(&library), config.clone());
            let expected = sequential
                .generate_floor(tower.floor_seed(floor))
                .unwrap()
                .placements();
            assert_eq!(layout.placements(), expected);
        }
    }
}
