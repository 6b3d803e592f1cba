//! Authoring checks and generation reports.
//!
//! [`check_library`] flags templates that would generate badly (stale declared
//! sizes, sockets floating outside the room, non-uniform scale...).
//! [`FloorReport`] summarises one generated floor for logs and the CLI.

use std::fmt;

use bevy::math::Vec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bounds::{check_declared_size, compute_bounds};
use crate::constants::SOCKET_OUTSIDE_TOLERANCE;
use crate::generation::{FloorLayout, GenerationStats};
use crate::geometry::Aabb;
use crate::library::{RoomTemplate, SpecialRole, TemplateLibrary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IssueKind {
    BoundsMismatch { declared: Vec3, derived: Vec3 },
    SocketOutsideBounds { socket: usize, distance: f32 },
    NonUniformScale(Vec3),
    NoSockets,
    ZeroWeight,
    NoBounds(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateIssue {
    pub template: String,
    pub severity: Severity,
    pub kind: IssueKind,
}

impl fmt::Display for TemplateIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {}: ", level, self.template)?;
        match &self.kind {
            IssueKind::BoundsMismatch { declared, derived } => write!(
                f,
                "declared size {:?} does not match geometry {:?}",
                declared, derived
            ),
            IssueKind::SocketOutsideBounds { socket, distance } => write!(
                f,
                "socket #{} sits {:.2} outside the room bounds",
                socket, distance
            ),
            IssueKind::NonUniformScale(scale) => {
                write!(f, "non-uniform scale {:?} skews socket directions", scale)
            }
            IssueKind::NoSockets => write!(f, "enabled template has no sockets"),
            IssueKind::ZeroWeight => write!(f, "spawn weight 0, only drawn when every weight is 0"),
            IssueKind::NoBounds(reason) => write!(f, "{}", reason),
        }
    }
}

fn distance_outside(aabb: &Aabb, p: Vec3) -> f32 {
    (p.clamp(aabb.min, aabb.max) - p).length()
}

/// Authoring problems with one template
pub fn check_template(template: &RoomTemplate) -> Vec<TemplateIssue> {
    let mut kinds = Vec::new();

    let bounds = match compute_bounds(template) {
        Ok(bounds) => Some(bounds),
        Err(e) => {
            kinds.push((Severity::Error, IssueKind::NoBounds(e.to_string())));
            None
        }
    };
    if let Some(mismatch) = check_declared_size(template) {
        kinds.push((
            Severity::Warning,
            IssueKind::BoundsMismatch {
                declared: mismatch.declared,
                derived: mismatch.derived,
            },
        ));
    }
    if let Some(bounds) = bounds {
        for (index, socket) in template.sockets.iter().enumerate() {
            let distance = distance_outside(&bounds.tight, socket.scaled_position(template.scale));
            if distance > SOCKET_OUTSIDE_TOLERANCE {
                kinds.push((
                    Severity::Warning,
                    IssueKind::SocketOutsideBounds {
                        socket: index,
                        distance,
                    },
                ));
            }
        }
    }
    let s = template.scale;
    if (s.x - s.y).abs() > f32::EPSILON || (s.x - s.z).abs() > f32::EPSILON {
        kinds.push((Severity::Warning, IssueKind::NonUniformScale(s)));
    }
    if template.enabled && template.sockets.is_empty() {
        kinds.push((Severity::Error, IssueKind::NoSockets));
    }
    if template.enabled && template.spawn_weight == 0 && template.special_role.is_none() {
        kinds.push((Severity::Warning, IssueKind::ZeroWeight));
    }

    kinds
        .into_iter()
        .map(|(severity, kind)| TemplateIssue {
            template: template.id.clone(),
            severity,
            kind,
        })
        .collect()
}

/// Check every template in parallel; issues come back in library order
pub fn check_library(library: &TemplateLibrary) -> Vec<TemplateIssue> {
    library
        .templates
        .par_iter()
        .flat_map_iter(check_template)
        .collect()
}

/// Summary of one generated floor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorReport {
    pub seed: u64,
    pub rooms: usize,
    pub doors: usize,
    pub blockades: usize,
    pub open_sockets: usize,
    pub max_depth: u32,
    pub connected: bool,
    pub bounds: Option<Aabb>,
    pub stats: GenerationStats,
}

impl FloorReport {
    pub fn new(layout: &FloorLayout, stats: &GenerationStats) -> Self {
        Self {
            seed: layout.seed,
            rooms: layout.room_count(),
            doors: layout.sockets().door_count(),
            blockades: layout.sockets().blockade_count(),
            open_sockets: layout.open_sockets().len(),
            max_depth: layout.rooms().iter().map(|r| r.depth).max().unwrap_or(0),
            connected: layout.is_connected(),
            bounds: layout.combined_bounds(),
            stats: stats.clone(),
        }
    }
}

impl fmt::Display for FloorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        writeln!(f, "floor seed {}", self.seed)?;
        writeln!(
            f,
            "  rooms {} (max depth {}), doors {}, blockades {}, open sockets {}",
            self.rooms, self.max_depth, self.doors, self.blockades, self.open_sockets
        )?;
        writeln!(
            f,
            "  credits {}/{} spent, connected: {}",
            s.initial_credits - s.credits_remaining.min(s.initial_credits),
            s.initial_credits,
            self.connected
        )?;
        writeln!(
            f,
            "  attempts {} (broad rejects {}, narrow rejects {}), abandoned sockets {}",
            s.placement_attempts, s.broad_phase_rejects, s.narrow_phase_rejects, s.abandoned_sockets
        )?;
        writeln!(
            f,
            "  tolerated overlaps: {} seam, {} padding",
            s.seam_overlaps_accepted, s.padding_overlaps_accepted
        )?;
        if let Some(bounds) = &self.bounds {
            writeln!(f, "  extent {:?}", bounds.size())?;
        }
        if !s.missing_special_rooms.is_empty() {
            let missing: Vec<&str> = s
                .missing_special_rooms
                .iter()
                .map(SpecialRole::display_name)
                .collect();
            writeln!(f, "  missing: {}", missing.join(", "))?;
        }
        if s.cancelled {
            writeln!(f, "  cancelled before completion")?;
        }
        write!(f, "  {:.2} ms", s.elapsed_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{FloorGenerator, GeneratorConfig};
    use crate::library::{starter_library, RoomCategory};
    use crate::sockets::{SocketDef, SocketType};
    use std::sync::Arc;

    fn room() -> RoomTemplate {
        RoomTemplate::new("room", "Room", RoomCategory::Chamber)
            .with_mesh(Vec3::ZERO, Vec3::new(4.0, 3.0, 4.0))
            .with_socket(SocketDef::new(SocketType::Standard, Vec3::new(2.0, 0.0, 0.0), Vec3::NEG_Z))
    }

    #[test]
    fn test_clean_template_has_no_issues() {
        assert!(check_template(&room()).is_empty());
    }

    #[test]
    fn test_starter_library_is_clean() {
        let issues = check_library(&starter_library());
        assert!(issues.is_empty(), "{:?}", issues);
    }

    #[test]
    fn test_floating_socket_and_bad_scale() {
        let mut t = room().with_socket(SocketDef::new(
            SocketType::Standard,
            Vec3::new(2.0, 0.0, 9.0),
            Vec3::Z,
        ));
        t.scale = Vec3::new(1.0, 2.0, 1.0);
        let issues = check_template(&t);
        assert!(issues.iter().any(|i| matches!(
            i.kind,
            IssueKind::SocketOutsideBounds { socket: 1, .. }
        )));
        assert!(issues.iter().any(|i| matches!(i.kind, IssueKind::NonUniformScale(_))));
    }

    #[test]
    fn test_missing_geometry_sockets_and_weight() {
        let t = RoomTemplate::new("bare", "Bare", RoomCategory::Corridor).with_weight(0);
        let issues = check_template(&t);
        let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
        assert_eq!(errors, 2);
        assert!(issues.iter().any(|i| i.kind == IssueKind::ZeroWeight));
        assert!(issues[0].to_string().starts_with("error: bare:"));
    }

    #[test]
    fn test_stale_declared_size() {
        let mut t = room();
        t.declared_size = Some(Vec3::new(4.0, 3.0, 6.0));
        let issues = check_template(&t);
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0].kind, IssueKind::BoundsMismatch { .. }));
    }

    #[test]
    fn test_floor_report() {
        let mut generator = FloorGenerator::new(
            Arc::new(starter_library()),
            GeneratorConfig::default().with_credits(8),
        );
        let layout = generator.generate_floor(21).unwrap().clone();
        let report = FloorReport::new(&layout, generator.stats());
        assert_eq!(report.rooms, layout.room_count());
        assert!(report.connected);
        assert_eq!(report.open_sockets, 0);
        let text = report.to_string();
        assert!(text.starts_with("floor seed 21"));
        assert!(text.contains("credits"));
    }
}
