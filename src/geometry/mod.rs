//! Rigid poses and axis-aligned bounding boxes.
//!
//! Rooms, sockets, doors and blockades are all positioned with a plain
//! [`Pose`] instead of a live scene transform, so the generator never needs a
//! renderer or scene graph to run.

use bevy::math::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position + orientation in world (or parent-local) space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Local point -> parent space
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    /// Local direction -> parent space (no translation)
    pub fn transform_direction(&self, local: Vec3) -> Vec3 {
        self.rotation * local
    }

    /// `self * child`: a pose authored relative to `self`, expressed in `self`'s parent space
    pub fn compose(&self, child: &Pose) -> Pose {
        Pose {
            position: self.transform_point(child.position),
            rotation: (self.rotation * child.rotation).normalize(),
        }
    }

    /// True if both poses agree within `epsilon` (position distance and rotation angle)
    pub fn approx_eq(&self, other: &Pose, epsilon: f32) -> bool {
        self.position.distance(other.position) <= epsilon
            && self.rotation.angle_between(other.rotation) <= epsilon
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size.abs() * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Smallest box containing every point; `None` for an empty iterator
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Self { min, max })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn volume(&self) -> f32 {
        let s = self.size().max(Vec3::ZERO);
        s.x * s.y * s.z
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grow every face by `margin`. A negative margin shrinks the box; an axis
    /// that would invert collapses onto the centre instead.
    pub fn expand(&self, margin: f32) -> Aabb {
        let center = self.center();
        let min = (self.min - Vec3::splat(margin)).min(center);
        let max = (self.max + Vec3::splat(margin)).max(center);
        Aabb { min, max }
    }

    /// Strict overlap test: boxes that only share a face do not intersect
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
            && self.min.z < other.max.z
            && other.min.z < self.max.z
    }

    /// Overlapping region, or `None` if the boxes do not intersect
    pub fn intersection(&self, other: &Aabb) -> Option<Aabb> {
        if !self.intersects(other) {
            return None;
        }
        Some(Aabb {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        })
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// World-space AABB of this local box placed at `pose` (8-corner transform)
    pub fn transformed(&self, pose: &Pose) -> Aabb {
        let corners = self.corners().map(|c| pose.transform_point(c));
        let mut min = corners[0];
        let mut max = corners[0];
        for c in &corners[1..] {
            min = min.min(*c);
            max = max.max(*c);
        }
        Aabb { min, max }
    }

    /// Component-wise scale about the local origin
    pub fn scaled(&self, scale: Vec3) -> Aabb {
        Aabb::new(self.min * scale, self.max * scale)
    }
}

/// Shortest-arc rotation taking `from` onto `to`.
///
/// For opposite vectors the half turn is taken about world up whenever `from`
/// is horizontal, so rooms stay upright when their doorways face the same way.
pub fn shortest_rotation(from: Vec3, to: Vec3) -> Quat {
    let from = from.normalize_or_zero();
    let to = to.normalize_or_zero();
    if from == Vec3::ZERO || to == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    if from.dot(to) < -1.0 + 1e-5 {
        let axis = if from.dot(Vec3::Y).abs() < 1e-3 {
            Vec3::Y
        } else {
            from.any_orthonormal_vector()
        };
        return Quat::from_axis_angle(axis, std::f32::consts::PI);
    }
    Quat::from_rotation_arc(from, to)
}
