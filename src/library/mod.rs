//! Room Template Library
//!
//! Holds every room blueprint with its metadata and answers the filtered and
//! weighted-random queries the generator needs. The library is authored
//! offline (RON/JSON asset), re-scanned with [`TemplateLibrary::refresh`] and
//! read-only while a floor is being generated.

mod starter;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use bevy::math::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::bounds::{compute_bounds, BoundsError, GeometryPiece, RoomBounds};
use crate::sockets::{SocketDef, SocketType};

pub use starter::starter_library;

/// Room classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoomCategory {
    Corridor,
    Hub,
    Intersection,
    Terminus,
    Chamber,
    Stairwell,
}

impl RoomCategory {
    pub fn display_name(&self) -> &str {
        match self {
            Self::Corridor => "Corridor",
            Self::Hub => "Hub",
            Self::Intersection => "Intersection",
            Self::Terminus => "Terminus",
            Self::Chamber => "Chamber",
            Self::Stairwell => "Stairwell",
        }
    }
}

/// Rooms with a role are placed deliberately, never drawn from random pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpecialRole {
    Entry,
    Exit,
    SafeRoom,
}

impl SpecialRole {
    pub const ALL: [SpecialRole; 3] = [SpecialRole::Entry, SpecialRole::Exit, SpecialRole::SafeRoom];

    pub fn display_name(&self) -> &str {
        match self {
            Self::Entry => "Entry",
            Self::Exit => "Exit",
            Self::SafeRoom => "Safe Room",
        }
    }
}

fn default_sector() -> u8 {
    1
}

fn default_weight() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

/// A room blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomTemplate {
    pub id: String,
    pub display_name: String,
    pub category: RoomCategory,
    #[serde(default = "default_sector")]
    pub sector: u8,
    #[serde(default = "default_weight")]
    pub spawn_weight: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub special_role: Option<SpecialRole>,
    #[serde(default)]
    pub geometry: Vec<GeometryPiece>,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    /// Margin between tight and padded bounds; negative allows overlap at seams
    #[serde(default)]
    pub padding: f32,
    /// Author-declared tight size, checked against the geometry by diagnostics
    #[serde(default)]
    pub declared_size: Option<Vec3>,
    #[serde(default)]
    pub sockets: Vec<SocketDef>,

    // Re-scanned by `refresh`
    #[serde(skip)]
    pub socket_count: usize,
    #[serde(skip)]
    pub socket_types: Vec<SocketType>,
    #[serde(skip)]
    pub bounds: Option<RoomBounds>,
}

impl RoomTemplate {
    pub fn new(id: &str, display_name: &str, category: RoomCategory) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            category,
            sector: default_sector(),
            spawn_weight: default_weight(),
            enabled: true,
            special_role: None,
            geometry: Vec::new(),
            scale: Vec3::ONE,
            padding: 0.0,
            declared_size: None,
            sockets: Vec::new(),
            socket_count: 0,
            socket_types: Vec::new(),
            bounds: None,
        }
    }

    pub fn with_mesh(self, min: Vec3, max: Vec3) -> Self {
        self.with_piece(GeometryPiece::mesh(min, max))
    }

    pub fn with_piece(mut self, piece: GeometryPiece) -> Self {
        self.geometry.push(piece);
        self
    }

    pub fn with_socket(mut self, socket: SocketDef) -> Self {
        self.sockets.push(socket);
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.spawn_weight = weight;
        self
    }

    pub fn with_sector(mut self, sector: u8) -> Self {
        self.sector = sector;
        self
    }

    pub fn with_padding(mut self, padding: f32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_role(mut self, role: SpecialRole) -> Self {
        self.special_role = Some(role);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Re-scan sockets and recompute bounds from the current geometry
    pub fn refresh(&mut self) -> Result<(), BoundsError> {
        self.socket_count = self.sockets.len();
        self.socket_types = self
            .sockets
            .iter()
            .map(|s| s.socket_type)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        match compute_bounds(self) {
            Ok(bounds) => {
                self.bounds = Some(bounds);
                Ok(())
            }
            Err(e) => {
                self.bounds = None;
                Err(e)
            }
        }
    }

    pub fn has_socket_type(&self, socket_type: SocketType) -> bool {
        self.socket_types.contains(&socket_type)
    }

    /// Indices of sockets that could mate with `socket_type`
    pub fn compatible_sockets(&self, socket_type: SocketType) -> Vec<usize> {
        self.sockets
            .iter()
            .enumerate()
            .filter(|(_, s)| s.socket_type.is_compatible_with(socket_type))
            .map(|(i, _)| i)
            .collect()
    }

    /// Eligible for random pools: enabled, has sockets and bounds, no special role
    pub fn is_selectable(&self) -> bool {
        self.enabled && self.socket_count > 0 && self.bounds.is_some() && self.special_role.is_none()
    }
}

/// Counts refreshed after every library mutation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryStats {
    pub total: usize,
    pub enabled: usize,
    pub per_category: BTreeMap<RoomCategory, usize>,
    pub per_sector: BTreeMap<u8, usize>,
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("library has no enabled rooms")]
    NoEnabledRooms,
    #[error("no template assigned to the {0:?} role")]
    MissingSpecialRole(SpecialRole),
    #[error("{role:?} role points at unknown template '{id}'")]
    DanglingSpecialRole { role: SpecialRole, id: String },
    #[error("enabled template '{0}' has no sockets")]
    ZeroSockets(String),
    #[error("duplicate template id '{0}'")]
    DuplicateId(String),
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
    #[error(transparent)]
    Bounds(#[from] BoundsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

fn default_door() -> String {
    "door_standard".to_string()
}

/// All room blueprints plus the special-role assignments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateLibrary {
    #[serde(default)]
    pub templates: Vec<RoomTemplate>,
    #[serde(default)]
    pub entry_room: Option<String>,
    #[serde(default)]
    pub exit_room: Option<String>,
    #[serde(default)]
    pub safe_room: Option<String>,
    /// Door blueprint spawned on every connection unless overridden
    #[serde(default = "default_door")]
    pub door_blueprint: String,
    #[serde(skip)]
    stats: LibraryStats,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self {
            door_blueprint: default_door(),
            ..Default::default()
        }
    }

    pub fn from_templates(templates: Vec<RoomTemplate>) -> Result<Self, LibraryError> {
        let mut library = Self::new();
        for t in templates {
            library.add_template(t)?;
        }
        library.assign_roles_from_tags();
        Ok(library)
    }

    pub fn from_ron_str(src: &str) -> Result<Self, LibraryError> {
        let mut library: TemplateLibrary = ron::from_str(src)?;
        library.assign_roles_from_tags();
        library.refresh()?;
        Ok(library)
    }

    pub fn from_json_str(src: &str) -> Result<Self, LibraryError> {
        let mut library: TemplateLibrary = serde_json::from_str(src)?;
        library.assign_roles_from_tags();
        library.refresh()?;
        Ok(library)
    }

    /// Load a `.ron` or `.json` library asset
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, LibraryError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path)?;
        let library = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&src)?,
            _ => Self::from_ron_str(&src)?,
        };
        info!(
            path = %path.display(),
            templates = library.templates.len(),
            "room library loaded"
        );
        Ok(library)
    }

    pub fn to_ron_string(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    // =====================================================
    // Mutation
    // =====================================================

    pub fn add_template(&mut self, mut template: RoomTemplate) -> Result<(), LibraryError> {
        if self.template(&template.id).is_some() {
            return Err(LibraryError::DuplicateId(template.id));
        }
        template.refresh()?;
        self.templates.push(template);
        self.refresh_stats();
        Ok(())
    }

    pub fn remove_template(&mut self, id: &str) -> Option<RoomTemplate> {
        let index = self.templates.iter().position(|t| t.id == id)?;
        let removed = self.templates.remove(index);
        self.refresh_stats();
        Some(removed)
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<(), LibraryError> {
        let template = self
            .templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| LibraryError::UnknownTemplate(id.to_string()))?;
        template.enabled = enabled;
        self.refresh_stats();
        Ok(())
    }

    pub fn assign_special_role(&mut self, role: SpecialRole, id: &str) -> Result<(), LibraryError> {
        if self.template(id).is_none() {
            return Err(LibraryError::UnknownTemplate(id.to_string()));
        }
        *self.role_slot(role) = Some(id.to_string());
        Ok(())
    }

    /// Fill unassigned role slots from templates tagged with that role
    fn assign_roles_from_tags(&mut self) {
        for role in SpecialRole::ALL {
            if self.role_assignment(role).is_some() {
                continue;
            }
            let tagged = self
                .templates
                .iter()
                .find(|t| t.special_role == Some(role))
                .map(|t| t.id.clone());
            *self.role_slot(role) = tagged;
        }
    }

    fn role_slot(&mut self, role: SpecialRole) -> &mut Option<String> {
        match role {
            SpecialRole::Entry => &mut self.entry_room,
            SpecialRole::Exit => &mut self.exit_room,
            SpecialRole::SafeRoom => &mut self.safe_room,
        }
    }

    pub fn role_assignment(&self, role: SpecialRole) -> Option<&str> {
        match role {
            SpecialRole::Entry => self.entry_room.as_deref(),
            SpecialRole::Exit => self.exit_room.as_deref(),
            SpecialRole::SafeRoom => self.safe_room.as_deref(),
        }
    }

    /// Re-scan every template (sockets + bounds) and refresh statistics.
    ///
    /// All templates are refreshed; the first bounds failure is returned.
    pub fn refresh(&mut self) -> Result<(), LibraryError> {
        let mut first_error = None;
        for template in &mut self.templates {
            if let Err(e) = template.refresh() {
                debug!(template = %template.id, "bounds refresh failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        self.refresh_stats();
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn refresh_stats(&mut self) {
        let mut stats = LibraryStats {
            total: self.templates.len(),
            ..Default::default()
        };
        for t in self.templates.iter().filter(|t| t.enabled) {
            stats.enabled += 1;
            *stats.per_category.entry(t.category).or_default() += 1;
            *stats.per_sector.entry(t.sector).or_default() += 1;
        }
        self.stats = stats;
    }

    // =====================================================
    // Queries
    // =====================================================

    pub fn stats(&self) -> &LibraryStats {
        &self.stats
    }

    pub fn template(&self, id: &str) -> Option<&RoomTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Template assigned to `role`, if the assignment resolves
    pub fn special_template(&self, role: SpecialRole) -> Option<&RoomTemplate> {
        self.role_assignment(role).and_then(|id| self.template(id))
    }

    pub fn enabled_count(&self) -> usize {
        self.templates.iter().filter(|t| t.enabled).count()
    }

    pub fn rooms_with_socket_type(
        &self,
        socket_type: SocketType,
        include_disabled: bool,
    ) -> Vec<&RoomTemplate> {
        self.templates
            .iter()
            .filter(|t| include_disabled || t.enabled)
            .filter(|t| t.has_socket_type(socket_type))
            .collect()
    }

    pub fn rooms_by_category(&self, category: RoomCategory) -> Vec<&RoomTemplate> {
        self.templates
            .iter()
            .filter(|t| t.category == category)
            .collect()
    }

    pub fn rooms_by_sector(&self, sector: u8) -> Vec<&RoomTemplate> {
        self.templates.iter().filter(|t| t.sector == sector).collect()
    }

    /// Random pool for a socket: selectable templates able to mate with `socket_type`
    pub fn candidate_pool(&self, socket_type: SocketType, sector: Option<u8>) -> Vec<&RoomTemplate> {
        self.rooms_with_socket_type(socket_type, false)
            .into_iter()
            .filter(|t| t.is_selectable())
            .filter(|t| sector.map_or(true, |s| t.sector == s))
            .collect()
    }

    // =====================================================
    // Validation
    // =====================================================

    /// At least one enabled room and all three special roles resolving to a template
    pub fn is_valid(&self) -> bool {
        self.enabled_count() > 0
            && SpecialRole::ALL
                .iter()
                .all(|role| self.special_template(*role).is_some())
    }

    /// Like [`is_valid`](Self::is_valid) but reports why, and also rejects enabled
    /// templates without sockets or bounds.
    pub fn validate(&self) -> Result<(), LibraryError> {
        if self.enabled_count() == 0 {
            return Err(LibraryError::NoEnabledRooms);
        }
        for role in SpecialRole::ALL {
            let id = self
                .role_assignment(role)
                .ok_or(LibraryError::MissingSpecialRole(role))?;
            if self.template(id).is_none() {
                return Err(LibraryError::DanglingSpecialRole {
                    role,
                    id: id.to_string(),
                });
            }
        }
        let mut seen = BTreeSet::new();
        for t in &self.templates {
            if !seen.insert(t.id.as_str()) {
                return Err(LibraryError::DuplicateId(t.id.clone()));
            }
            if !t.enabled && t.special_role.is_none() {
                continue;
            }
            if t.sockets.is_empty() {
                return Err(LibraryError::ZeroSockets(t.id.clone()));
            }
            compute_bounds(t)?;
        }
        Ok(())
    }
}

/// Draw one candidate with probability proportional to its spawn weight.
///
/// Falls back to a uniform pick when every weight is zero; `None` for an empty list.
pub fn weighted_random_room<'a, R: Rng + ?Sized>(
    candidates: &[&'a RoomTemplate],
    rng: &mut R,
) -> Option<&'a RoomTemplate> {
    if candidates.is_empty() {
        return None;
    }
    let total: u64 = candidates.iter().map(|t| t.spawn_weight as u64).sum();
    if total == 0 {
        return Some(candidates[rng.gen_range(0..candidates.len())]);
    }
    let draw = rng.gen_range(0..total);
    let mut running = 0u64;
    for candidate in candidates {
        running += candidate.spawn_weight as u64;
        if running > draw {
            return Some(*candidate);
        }
    }
    candidates.last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn socketed(id: &str, category: RoomCategory, socket_type: SocketType) -> RoomTemplate {
        RoomTemplate::new(id, id, category)
            .with_mesh(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(2.0, 3.0, 4.0))
            .with_socket(SocketDef::new(socket_type, Vec3::ZERO, Vec3::NEG_Z))
    }

    #[test]
    fn test_starter_library_is_valid() {
        let library = starter_library();
        assert!(library.is_valid());
        library.validate().unwrap();
        assert!(library.stats().enabled > 0);
    }

    #[test]
    fn test_refresh_rescans_sockets() {
        let mut t = socketed("a", RoomCategory::Corridor, SocketType::Standard)
            .with_socket(SocketDef::new(SocketType::Wide, Vec3::new(0.0, 0.0, 4.0), Vec3::Z))
            .with_socket(SocketDef::new(SocketType::Standard, Vec3::new(2.0, 0.0, 2.0), Vec3::X));
        t.refresh().unwrap();
        assert_eq!(t.socket_count, 3);
        assert_eq!(t.socket_types, vec![SocketType::Standard, SocketType::Wide]);
        assert_eq!(t.compatible_sockets(SocketType::Standard), vec![0, 2]);
    }

    #[test]
    fn test_queries() {
        let library = TemplateLibrary::from_templates(vec![
            socketed("c1", RoomCategory::Corridor, SocketType::Standard),
            socketed("c2", RoomCategory::Corridor, SocketType::Wide).with_sector(2),
            socketed("h1", RoomCategory::Hub, SocketType::Standard).disabled(),
        ])
        .unwrap();

        assert_eq!(library.rooms_with_socket_type(SocketType::Standard, false).len(), 1);
        assert_eq!(library.rooms_with_socket_type(SocketType::Standard, true).len(), 2);
        assert_eq!(library.rooms_by_category(RoomCategory::Corridor).len(), 2);
        assert_eq!(library.rooms_by_sector(2).len(), 1);
        assert_eq!(library.stats().per_category[&RoomCategory::Corridor], 2);
        assert_eq!(library.stats().per_sector[&1], 1);
        assert_eq!(library.stats().enabled, 2);
    }

    #[test]
    fn test_special_rooms_excluded_from_pool() {
        let library = TemplateLibrary::from_templates(vec![
            socketed("c1", RoomCategory::Corridor, SocketType::Standard),
            socketed("entry", RoomCategory::Terminus, SocketType::Standard)
                .with_role(SpecialRole::Entry),
        ])
        .unwrap();
        let pool = library.candidate_pool(SocketType::Standard, None);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].id, "c1");
        assert_eq!(library.role_assignment(SpecialRole::Entry), Some("entry"));
    }

    #[test]
    fn test_zero_socket_template_never_selectable() {
        let mut t = RoomTemplate::new("bare", "Bare", RoomCategory::Chamber)
            .with_mesh(Vec3::ZERO, Vec3::ONE);
        t.refresh().unwrap();
        assert!(!t.is_selectable());
    }

    #[test]
    fn test_validity_requires_roles() {
        let mut library = TemplateLibrary::from_templates(vec![
            socketed("c1", RoomCategory::Corridor, SocketType::Standard),
            socketed("entry", RoomCategory::Terminus, SocketType::Standard),
            socketed("exit", RoomCategory::Stairwell, SocketType::Standard),
        ])
        .unwrap();
        assert!(!library.is_valid());

        library.assign_special_role(SpecialRole::Entry, "entry").unwrap();
        library.assign_special_role(SpecialRole::Exit, "exit").unwrap();
        assert!(matches!(
            library.validate(),
            Err(LibraryError::MissingSpecialRole(SpecialRole::SafeRoom))
        ));
        library.assign_special_role(SpecialRole::SafeRoom, "c1").unwrap();
        assert!(library.is_valid());

        assert!(library.assign_special_role(SpecialRole::Exit, "nope").is_err());
        library.safe_room = Some("gone".into());
        assert!(!library.is_valid());
        assert!(matches!(
            library.validate(),
            Err(LibraryError::DanglingSpecialRole { .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut library = TemplateLibrary::new();
        library
            .add_template(socketed("a", RoomCategory::Corridor, SocketType::Standard))
            .unwrap();
        assert!(matches!(
            library.add_template(socketed("a", RoomCategory::Hub, SocketType::Standard)),
            Err(LibraryError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_weighted_random_empty_and_zero_weights() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        assert!(weighted_random_room(&[], &mut rng).is_none());

        let a = socketed("a", RoomCategory::Corridor, SocketType::Standard).with_weight(0);
        let b = socketed("b", RoomCategory::Corridor, SocketType::Standard).with_weight(0);
        let candidates = vec![&a, &b];
        let mut seen = BTreeSet::new();
        for _ in 0..200 {
            seen.insert(weighted_random_room(&candidates, &mut rng).unwrap().id.clone());
        }
        assert_eq!(seen.len(), 2, "zero total weight falls back to uniform");
    }

    #[test]
    fn test_weighted_random_never_picks_zero_weight_when_others_positive() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
        let a = socketed("a", RoomCategory::Corridor, SocketType::Standard).with_weight(0);
        let b = socketed("b", RoomCategory::Corridor, SocketType::Standard).with_weight(3);
        let candidates = vec![&a, &b];
        for _ in 0..500 {
            assert_eq!(weighted_random_room(&candidates, &mut rng).unwrap().id, "b");
        }
    }

    #[test]
    fn test_ron_roundtrip_keeps_roles() {
        let library = starter_library();
        let ron = library.to_ron_string().unwrap();
        let restored = TemplateLibrary::from_ron_str(&ron).unwrap();
        assert_eq!(restored.templates.len(), library.templates.len());
        assert_eq!(restored.entry_room, library.entry_room);
        assert!(restored.is_valid());
    }
}
