//! Uniform grid over placed rooms' envelopes.
//!
//! Only answers "which rooms could possibly touch this box"; the exact
//! answer is the solver's job.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use bevy::math::Vec3;

use crate::constants::MAX_BROAD_PHASE_CELLS;
use crate::geometry::Aabb;

use super::RoomId;

type Cell = (i32, i32, i32);

#[derive(Debug, Clone)]
pub struct BroadPhaseGrid {
    cell_size: f32,
    cells: HashMap<Cell, Vec<RoomId>>,
    entries: BTreeMap<RoomId, Aabb>,
    /// Rooms too large to register cell by cell
    oversized: Vec<RoomId>,
}

impl BroadPhaseGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(f32::EPSILON),
            cells: HashMap::new(),
            entries: BTreeMap::new(),
            oversized: Vec::new(),
        }
    }

    fn cell_of(&self, p: Vec3) -> Cell {
        let c = (p / self.cell_size).floor();
        (c.x as i32, c.y as i32, c.z as i32)
    }

    /// Inclusive cell range covered by `aabb`, or `None` when it spans too many cells
    fn cell_range(&self, aabb: &Aabb) -> Option<(Cell, Cell)> {
        let lo = self.cell_of(aabb.min);
        let hi = self.cell_of(aabb.max);
        let span = |a: i32, b: i32| (b as i64 - a as i64 + 1).max(1);
        let count = span(lo.0, hi.0) * span(lo.1, hi.1) * span(lo.2, hi.2);
        (count <= MAX_BROAD_PHASE_CELLS as i64).then_some((lo, hi))
    }

    pub fn insert(&mut self, room: RoomId, envelope: Aabb) {
        self.entries.insert(room, envelope);
        let Some((lo, hi)) = self.cell_range(&envelope) else {
            self.oversized.push(room);
            return;
        };
        for x in lo.0..=hi.0 {
            for y in lo.1..=hi.1 {
                for z in lo.2..=hi.2 {
                    self.cells.entry((x, y, z)).or_default().push(room);
                }
            }
        }
    }

    /// Rooms whose envelope overlaps `query`, in ascending id order
    pub fn query(&self, query: &Aabb) -> Vec<RoomId> {
        let mut hits = BTreeSet::new();
        match self.cell_range(query) {
            Some((lo, hi)) => {
                for x in lo.0..=hi.0 {
                    for y in lo.1..=hi.1 {
                        for z in lo.2..=hi.2 {
                            if let Some(rooms) = self.cells.get(&(x, y, z)) {
                                hits.extend(rooms.iter().copied());
                            }
                        }
                    }
                }
                hits.extend(self.oversized.iter().copied());
            }
            None => hits.extend(self.entries.keys().copied()),
        }

        hits.into_iter()
            .filter(|id| {
                self.entries
                    .get(id)
                    .map_or(false, |aabb| aabb.intersects(query))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
