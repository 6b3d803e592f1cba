//! Generator configuration.
//!
//! Loaded from a RON file (see `config/generator.ron`) or built in code.
//! Every field has a default so partial files are fine.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_BROAD_PHASE_CELL, DEFAULT_CREDITS, DEFAULT_MAX_ATTEMPTS_PER_SOCKET,
    DEFAULT_REQUEUE_PASSES, DEFAULT_ROOMS_PER_STEP,
};
use crate::geometry::Aabb;
use crate::library::RoomCategory;
use crate::solver::CollisionSettings;

/// Order in which open sockets are expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrontierOrder {
    /// Oldest socket first; floors grow outward evenly
    #[default]
    BreadthFirst,
    /// Newest socket first; floors grow long winding branches
    DepthFirst,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid generator config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Room budget; every successful connection spends one credit
    pub credits: u32,
    /// Candidate placements tried per open socket before it is given up on
    pub max_attempts_per_socket: u32,
    /// How many times given-up sockets are re-queued once the frontier drains
    pub requeue_passes: u32,
    pub frontier_order: FrontierOrder,
    pub collision: CollisionSettings,
    pub broad_phase_cell_size: f32,
    /// Rooms must stay fully inside this box when set
    pub world_limit: Option<Aabb>,
    /// Restrict random pools to one sector
    pub sector: Option<u8>,
    /// Restrict random pools to these room categories
    pub categories: Option<Vec<RoomCategory>>,
    /// Prefer candidates whose extra sockets fit the remaining credits
    pub budget_aware_selection: bool,
    pub blockades_enabled: bool,
    /// Door blueprint for every connection instead of the library default
    pub door_override: Option<String>,
    /// Rooms placed per frame by the chunked bevy driver
    pub rooms_per_step: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            credits: DEFAULT_CREDITS,
            max_attempts_per_socket: DEFAULT_MAX_ATTEMPTS_PER_SOCKET,
            requeue_passes: DEFAULT_REQUEUE_PASSES,
            frontier_order: FrontierOrder::default(),
            collision: CollisionSettings::default(),
            broad_phase_cell_size: DEFAULT_BROAD_PHASE_CELL,
            world_limit: None,
            sector: None,
            categories: None,
            budget_aware_selection: true,
            blockades_enabled: true,
            door_override: None,
            rooms_per_step: DEFAULT_ROOMS_PER_STEP,
        }
    }
}

impl GeneratorConfig {
    pub fn with_credits(mut self, credits: u32) -> Self {
        self.credits = credits;
        self
    }

    pub fn from_ron_str(src: &str) -> Result<Self, ConfigError> {
        let config: GeneratorConfig = ron::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path)?;
        Self::from_ron_str(&src)
    }

    pub fn to_ron_string(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts_per_socket == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts_per_socket must be at least 1".into(),
            ));
        }
        if !(self.broad_phase_cell_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "broad_phase_cell_size must be positive, got {}",
                self.broad_phase_cell_size
            )));
        }
        let c = &self.collision;
        if c.seam_volume_threshold < 0.0 || c.seam_proximity_radius < 0.0 || c.seam_epsilon < 0.0 {
            return Err(ConfigError::Invalid(
                "collision tolerances must be non-negative".into(),
            ));
        }
        if self.categories.as_ref().map_or(false, |c| c.is_empty()) {
            return Err(ConfigError::Invalid(
                "categories must name at least one category when set".into(),
            ));
        }
        if self.rooms_per_step == 0 {
            return Err(ConfigError::Invalid("rooms_per_step must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        GeneratorConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_ron_fills_defaults() {
        let config = GeneratorConfig::from_ron_str(
            "(credits: 3, frontier_order: DepthFirst, collision: (seam_epsilon: 0.0))",
        )
        .unwrap();
        assert_eq!(config.credits, 3);
        assert_eq!(config.frontier_order, FrontierOrder::DepthFirst);
        assert_eq!(config.collision.seam_epsilon, 0.0);
        assert_eq!(
            config.max_attempts_per_socket,
            DEFAULT_MAX_ATTEMPTS_PER_SOCKET
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = GeneratorConfig {
            max_attempts_per_socket: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = GeneratorConfig {
            broad_phase_cell_size: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = GeneratorConfig {
            categories: Some(Vec::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(GeneratorConfig::from_ron_str("(credits: -1)").is_err());
    }

    #[test]
    fn test_ron_roundtrip() {
        let config = GeneratorConfig {
            sector: Some(2),
            categories: Some(vec![RoomCategory::Corridor, RoomCategory::Hub]),
            door_override: Some("door_heavy".into()),
            ..Default::default()
        };
        let restored = GeneratorConfig::from_ron_str(&config.to_ron_string().unwrap()).unwrap();
        assert_eq!(restored, config);
    }
}
