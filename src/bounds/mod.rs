//! Bounds Calculator
//!
//! Derives the tight and padded bounding volumes of a room template from its
//! authored geometry. Tight bounds wrap every mesh piece but ignore socket
//! marker volumes; padded bounds grow (or, with a negative margin, shrink) the
//! tight box so authors can declare how much overlap at their boundary is
//! intentional.

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::BOUNDS_MISMATCH_EPSILON;
use crate::geometry::{Aabb, Pose};
use crate::library::RoomTemplate;

/// What a geometry piece represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PieceKind {
    #[default]
    Mesh,
    /// Editor-only volume marking a socket; never part of the room's bounds
    SocketMarker,
}

/// One authored box of room geometry (template-local, unscaled)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryPiece {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: PieceKind,
    pub bounds: Aabb,
}

impl GeometryPiece {
    pub fn mesh(min: Vec3, max: Vec3) -> Self {
        Self {
            name: String::new(),
            kind: PieceKind::Mesh,
            bounds: Aabb::new(min, max),
        }
    }

    pub fn socket_marker(center: Vec3, size: Vec3) -> Self {
        Self {
            name: String::new(),
            kind: PieceKind::SocketMarker,
            bounds: Aabb::from_center_size(center, size),
        }
    }
}

/// Tight + padded bounds of one room
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomBounds {
    pub tight: Aabb,
    pub padded: Aabb,
}

impl RoomBounds {
    pub fn from_tight(tight: Aabb, margin: f32) -> Self {
        Self {
            tight,
            padded: tight.expand(margin),
        }
    }

    /// Bounds of the room placed at `pose`
    pub fn at_pose(&self, pose: &Pose) -> RoomBounds {
        RoomBounds {
            tight: self.tight.transformed(pose),
            padded: self.padded.transformed(pose),
        }
    }

    /// Union of both boxes; everything the room could ever touch
    pub fn envelope(&self) -> Aabb {
        self.tight.union(&self.padded)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundsError {
    #[error("template '{0}' has no mesh geometry to derive bounds from")]
    NoMeshGeometry(String),
    #[error("template '{0}' has degenerate (zero-volume) geometry")]
    Degenerate(String),
}

/// Tight bounds of the mesh pieces (markers excluded) with `scale` applied
pub fn tight_bounds(pieces: &[GeometryPiece], scale: Vec3) -> Option<Aabb> {
    pieces
        .iter()
        .filter(|p| p.kind == PieceKind::Mesh)
        .map(|p| p.bounds.scaled(scale))
        .reduce(|acc, b| acc.union(&b))
}

/// Compute `(tight, padded)` for a template from its geometry
pub fn compute_bounds(template: &RoomTemplate) -> Result<RoomBounds, BoundsError> {
    let tight = tight_bounds(&template.geometry, template.scale)
        .ok_or_else(|| BoundsError::NoMeshGeometry(template.id.clone()))?;
    if tight.volume() <= f32::EPSILON {
        return Err(BoundsError::Degenerate(template.id.clone()));
    }
    Ok(RoomBounds::from_tight(tight, template.padding))
}

/// Declared size that no longer matches the geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundsMismatch {
    pub template: String,
    pub declared: Vec3,
    pub derived: Vec3,
}

/// Compare a template's declared tight size with the size derived from its geometry.
///
/// A mismatch is an authoring defect to report, never something generation corrects.
pub fn check_declared_size(template: &RoomTemplate) -> Option<BoundsMismatch> {
    let declared = template.declared_size?;
    let derived = tight_bounds(&template.geometry, template.scale)?.size();
    let drift = (declared - derived).abs().max_element();
    (drift > BOUNDS_MISMATCH_EPSILON).then(|| BoundsMismatch {
        template: template.id.clone(),
        declared,
        derived,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{RoomCategory, RoomTemplate};

    fn template() -> RoomTemplate {
        RoomTemplate::new("box", "Box", RoomCategory::Hub)
            .with_mesh(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(2.0, 3.0, 4.0))
            .with_piece(GeometryPiece::socket_marker(
                Vec3::new(0.0, 1.0, 4.5),
                Vec3::splat(2.0),
            ))
    }

    #[test]
    fn test_tight_bounds_ignore_socket_markers() {
        let bounds = compute_bounds(&template()).unwrap();
        assert_eq!(bounds.tight.min, Vec3::new(-2.0, 0.0, 0.0));
        assert_eq!(bounds.tight.max, Vec3::new(2.0, 3.0, 4.0));
        assert_eq!(bounds.padded, bounds.tight);
    }

    #[test]
    fn test_negative_padding_shrinks_padded_bounds() {
        let bounds = compute_bounds(&template().with_padding(-0.25)).unwrap();
        assert_eq!(bounds.padded.min, Vec3::new(-1.75, 0.25, 0.25));
        assert_eq!(bounds.padded.max, Vec3::new(1.75, 2.75, 3.75));
    }

    #[test]
    fn test_scale_applies_to_geometry() {
        let mut t = template();
        t.scale = Vec3::new(2.0, 1.0, 1.0);
        let bounds = compute_bounds(&t).unwrap();
        assert_eq!(bounds.tight.size(), Vec3::new(8.0, 3.0, 4.0));
    }

    #[test]
    fn test_no_mesh_is_an_error() {
        let t = RoomTemplate::new("empty", "Empty", RoomCategory::Corridor);
        assert_eq!(
            compute_bounds(&t),
            Err(BoundsError::NoMeshGeometry("empty".into()))
        );
    }

    #[test]
    fn test_flat_geometry_is_degenerate() {
        let t = RoomTemplate::new("flat", "Flat", RoomCategory::Corridor)
            .with_mesh(Vec3::ZERO, Vec3::new(4.0, 0.0, 4.0));
        assert_eq!(
            compute_bounds(&t),
            Err(BoundsError::Degenerate("flat".into()))
        );
    }

    #[test]
    fn test_declared_size_mismatch() {
        let mut t = template();
        t.declared_size = Some(Vec3::new(4.0, 3.0, 4.0));
        assert!(check_declared_size(&t).is_none());

        t.declared_size = Some(Vec3::new(4.0, 3.0, 5.0));
        let mismatch = check_declared_size(&t).unwrap();
        assert_eq!(mismatch.derived, Vec3::new(4.0, 3.0, 4.0));
    }
}
