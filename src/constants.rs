//! Centralized generation constants.
//!
//! Defaults for [`GeneratorConfig`](crate::generation::GeneratorConfig) and the
//! collision solver. Per-template values (padding, weights) live on the
//! templates themselves.

// =====================================================
// Budget & retries
// =====================================================

/// Default number of credits (budgeted placements) per floor
pub const DEFAULT_CREDITS: u32 = 24;

/// Placement attempts per frontier socket before it is abandoned
pub const DEFAULT_MAX_ATTEMPTS_PER_SOCKET: u32 = 8;

/// Times abandoned frontier sockets are re-queued once the frontier drains
pub const DEFAULT_REQUEUE_PASSES: u32 = 1;

/// Rooms committed per `step` when generation is chunked across frames
pub const DEFAULT_ROOMS_PER_STEP: u32 = 4;

// =====================================================
// Collision tolerances
// =====================================================

/// Intersection volume below which an overlap may be a doorway seam artifact
pub const SEAM_VOLUME_THRESHOLD: f32 = 0.25;

/// Max distance between the overlap centroid and the mated socket midpoint
pub const SEAM_PROXIMITY_RADIUS: f32 = 0.5;

/// Shrink applied to tight world bounds so faces that merely touch never intersect
pub const SEAM_EPSILON: f32 = 0.01;

/// Allowed drift between cached and derived bounds sizes before a template is flagged
pub const BOUNDS_MISMATCH_EPSILON: f32 = 0.05;

/// Distance a socket may sit outside its room's tight bounds before it is flagged
pub const SOCKET_OUTSIDE_TOLERANCE: f32 = 0.1;

// =====================================================
// Broad phase
// =====================================================

/// Edge length of one broad-phase grid cell (world units)
pub const DEFAULT_BROAD_PHASE_CELL: f32 = 16.0;

/// Upper bound on cells touched by a single query; larger boxes fall back to a full scan
pub const MAX_BROAD_PHASE_CELLS: usize = 4096;
