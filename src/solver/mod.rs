//! Spatial Alignment & Collision Solver
//!
//! Alignment mates a candidate room's socket with an open socket face to
//! face. Rotation is solved first because the position solve depends on it.
//!
//! The narrow phase then compares tight bounds, tolerating two kinds of overlap:
//! - a tiny sliver centred on the mated sockets (doorway seam artifact)
//! - tight boxes overlapping while padded boxes do not (negative padding on
//!   a template, i.e. overlap the author declared intentional)

use bevy::math::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::bounds::RoomBounds;
use crate::constants::{SEAM_EPSILON, SEAM_PROXIMITY_RADIUS, SEAM_VOLUME_THRESHOLD};
use crate::geometry::{shortest_rotation, Pose};
use crate::sockets::SocketDef;

/// Orientation that turns the target socket to face exactly opposite the source socket
pub fn solve_rotation(
    source_forward: Vec3,
    target_socket_forward: Vec3,
    target_rotation: Quat,
) -> Quat {
    let current = target_rotation * target_socket_forward;
    (shortest_rotation(current, -source_forward) * target_rotation).normalize()
}

/// Room origin that puts the target socket exactly on the source socket, given the solved rotation
pub fn solve_position(source_position: Vec3, target_socket_local: Vec3, rotation: Quat) -> Vec3 {
    source_position - rotation * target_socket_local
}

/// Full pose for a template whose socket `target` must mate with an open
/// socket at `source_position` facing `source_forward`.
pub fn solve_alignment(
    source_position: Vec3,
    source_forward: Vec3,
    target: &SocketDef,
    template_scale: Vec3,
    current_rotation: Quat,
) -> Pose {
    let rotation = solve_rotation(
        source_forward,
        target.scaled_forward(template_scale),
        current_rotation,
    );
    let position = solve_position(
        source_position,
        target.scaled_position(template_scale),
        rotation,
    );
    Pose::new(position, rotation)
}

/// Narrow-phase tolerances
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSettings {
    pub seam_volume_threshold: f32,
    pub seam_proximity_radius: f32,
    /// Tight bounds shrink by this much per face so touching faces never count
    pub seam_epsilon: f32,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            seam_volume_threshold: SEAM_VOLUME_THRESHOLD,
            seam_proximity_radius: SEAM_PROXIMITY_RADIUS,
            seam_epsilon: SEAM_EPSILON,
        }
    }
}

/// How two rooms' bounds relate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlapKind {
    /// Tight bounds do not intersect
    Clear,
    /// Small overlap centred on the mated sockets
    SeamArtifact,
    /// Tight bounds overlap but padded bounds do not
    IntentionalPadding,
    Collision,
}

impl OverlapKind {
    pub fn is_collision(&self) -> bool {
        *self == OverlapKind::Collision
    }
}

/// Classify the overlap between two placed rooms (world-space bounds).
///
/// `seam` is the midpoint between the two mated sockets, when the rooms share one.
pub fn classify_overlap(
    a: &RoomBounds,
    b: &RoomBounds,
    seam: Option<Vec3>,
    settings: &CollisionSettings,
) -> OverlapKind {
    // socket overlap allowed: faces flush against each other are not an intersection
    let tight_a = a.tight.expand(-settings.seam_epsilon);
    let tight_b = b.tight.expand(-settings.seam_epsilon);
    let Some(overlap) = tight_a.intersection(&tight_b) else {
        return OverlapKind::Clear;
    };

    if let Some(midpoint) = seam {
        if overlap.volume() < settings.seam_volume_threshold
            && overlap.center().distance(midpoint) <= settings.seam_proximity_radius
        {
            return OverlapKind::SeamArtifact;
        }
    }
    if !a.padded.intersects(&b.padded) {
        return OverlapKind::IntentionalPadding;
    }
    OverlapKind::Collision
}

/// Would a target room placed at `pose` genuinely collide with an already placed room?
///
/// `source_world` are the placed room's world bounds, `target_local` the
/// candidate's template-local bounds. When the two rooms are the ones being
/// mated, pass both socket world positions so seam slivers are tolerated.
pub fn would_collide(
    source_world: &RoomBounds,
    target_local: &RoomBounds,
    pose: &Pose,
    mated_sockets: Option<(Vec3, Vec3)>,
    settings: &CollisionSettings,
) -> bool {
    let target_world = target_local.at_pose(pose);
    let seam = mated_sockets.map(|(s, t)| (s + t) * 0.5);
    classify_overlap(source_world, &target_world, seam, settings).is_collision()
}
