//! Generated floor: placed rooms plus the socket arena that links them.

use bevy::math::Vec3;
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};

use crate::bounds::RoomBounds;
use crate::geometry::{Aabb, Pose};
use crate::library::{RoomCategory, RoomTemplate, SpecialRole};
use crate::sockets::{DoorId, SocketArena, SocketError, SocketId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoomId(pub u32);

/// A template instantiated at a world pose
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedRoom {
    pub id: RoomId,
    pub template_id: String,
    pub category: RoomCategory,
    pub special_role: Option<SpecialRole>,
    pub pose: Pose,
    /// World-space bounds at `pose`
    pub bounds: RoomBounds,
    /// Template socket order
    pub sockets: Vec<SocketId>,
    /// Connections between this room and the entry
    pub depth: u32,
    pub parent: Option<RoomId>,
}

/// Template id and pose of one room, the part of a layout that must be reproducible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomPlacement {
    pub room: RoomId,
    pub template_id: String,
    pub pose: Pose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorLayout {
    pub seed: u64,
    pub initial_credits: u32,
    pub credits_remaining: u32,
    pub connections_made: u32,
    pub blockades_spawned: u32,
    rooms: Vec<PlacedRoom>,
    sockets: SocketArena,
}

impl FloorLayout {
    pub fn new(seed: u64, credits: u32, default_door: &str) -> Self {
        Self {
            seed,
            initial_credits: credits,
            credits_remaining: credits,
            connections_made: 0,
            blockades_spawned: 0,
            rooms: Vec::new(),
            sockets: SocketArena::new(default_door),
        }
    }

    /// Instantiate `template` at `pose` with all of its sockets open.
    ///
    /// The template must have bounds (see [`RoomTemplate::refresh`]).
    pub(crate) fn add_room(
        &mut self,
        template: &RoomTemplate,
        pose: Pose,
        local_bounds: &RoomBounds,
        parent: Option<RoomId>,
        blockades_enabled: bool,
    ) -> RoomId {
        let id = RoomId(self.rooms.len() as u32);
        let sockets = template
            .sockets
            .iter()
            .enumerate()
            .map(|(index, def)| {
                self.sockets
                    .add_socket(id, index, def, &pose, template.scale, blockades_enabled)
            })
            .collect();
        let depth = parent
            .and_then(|p| self.room(p))
            .map_or(0, |p| p.depth + 1);
        self.rooms.push(PlacedRoom {
            id,
            template_id: template.id.clone(),
            category: template.category,
            special_role: template.special_role,
            pose,
            bounds: local_bounds.at_pose(&pose),
            sockets,
            depth,
            parent,
        });
        id
    }

    /// Place a room whose socket `target_index` mates with the open socket `source`.
    ///
    /// Either the room is added and connected, or nothing changes.
    pub(crate) fn place_connected(
        &mut self,
        template: &RoomTemplate,
        target_index: usize,
        pose: Pose,
        local_bounds: &RoomBounds,
        source: SocketId,
        door_override: Option<&str>,
        blockades_enabled: bool,
    ) -> Result<(RoomId, DoorId), SocketError> {
        let src = self
            .sockets
            .get(source)
            .ok_or(SocketError::UnknownSocket(source))?;
        if src.is_connected() {
            return Err(SocketError::AlreadyConnected(source));
        }
        if !src.is_open() {
            return Err(SocketError::AlreadySealed(source));
        }
        let target_type = template
            .sockets
            .get(target_index)
            .map(|s| s.socket_type)
            .ok_or_else(|| SocketError::UnknownTemplateSocket {
                template: template.id.clone(),
                index: target_index,
            })?;
        if !src.is_compatible_with(target_type) {
            return Err(SocketError::TypeMismatch {
                from: src.socket_type,
                to: target_type,
            });
        }
        let parent = src.room;

        let room = self.add_room(template, pose, local_bounds, Some(parent), blockades_enabled);
        let target = self.rooms[room.0 as usize].sockets[target_index];
        let door = self.sockets.connect(source, target, door_override)?;
        self.connections_made += 1;
        self.credits_remaining = self.credits_remaining.saturating_sub(1);
        Ok((room, door))
    }

    // =====================================================
    // Queries
    // =====================================================

    pub fn room(&self, id: RoomId) -> Option<&PlacedRoom> {
        self.rooms.get(id.0 as usize)
    }

    pub fn rooms(&self) -> &[PlacedRoom] {
        &self.rooms
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn sockets(&self) -> &SocketArena {
        &self.sockets
    }

    pub fn sockets_mut(&mut self) -> &mut SocketArena {
        &mut self.sockets
    }

    pub fn entry_room(&self) -> Option<&PlacedRoom> {
        self.rooms.first()
    }

    pub fn rooms_with_role(&self, role: SpecialRole) -> impl Iterator<Item = &PlacedRoom> {
        self.rooms
            .iter()
            .filter(move |r| r.special_role == Some(role))
    }

    /// Sockets neither connected nor sealed, in creation order
    pub fn open_sockets(&self) -> Vec<SocketId> {
        self.sockets
            .iter()
            .filter(|s| s.is_open())
            .map(|s| s.id)
            .collect()
    }

    /// Union of every room's tight bounds
    pub fn combined_bounds(&self) -> Option<Aabb> {
        self.rooms
            .iter()
            .map(|r| r.bounds.tight)
            .reduce(|acc, b| acc.union(&b))
    }

    pub fn placements(&self) -> Vec<RoomPlacement> {
        self.rooms
            .iter()
            .map(|r| RoomPlacement {
                room: r.id,
                template_id: r.template_id.clone(),
                pose: r.pose,
            })
            .collect()
    }

    /// Rooms as nodes (index == room id), doors as edges
    pub fn connection_graph(&self) -> UnGraph<RoomId, DoorId> {
        let mut graph = UnGraph::with_capacity(self.rooms.len(), self.sockets.door_count());
        for room in &self.rooms {
            graph.add_node(room.id);
        }
        for door in self.sockets.doors() {
            let (Some(a), Some(b)) = (self.sockets.get(door.socket), self.sockets.get(door.peer))
            else {
                continue;
            };
            graph.add_edge(
                NodeIndex::new(a.room.0 as usize),
                NodeIndex::new(b.room.0 as usize),
                door.id,
            );
        }
        graph
    }

    /// Every room reachable from the entry through doors
    pub fn is_connected(&self) -> bool {
        !self.rooms.is_empty() && connected_components(&self.connection_graph()) == 1
    }

    /// World position of every door, in door id order
    pub fn door_positions(&self) -> Vec<Vec3> {
        self.sockets.doors().map(|d| d.pose.position).collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sockets::{SocketDef, SocketType};

    fn corridor() -> RoomTemplate {
        let mut t = RoomTemplate::new("corridor", "Corridor", RoomCategory::Corridor)
            .with_mesh(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 3.0, 10.0))
            .with_socket(SocketDef::new(SocketType::Standard, Vec3::ZERO, Vec3::NEG_Z))
            .with_socket(SocketDef::new(
                SocketType::Standard,
                Vec3::new(0.0, 0.0, 10.0),
                Vec3::Z,
            ));
        t.refresh().unwrap();
        t
    }

    #[test]
    fn test_place_connected_links_rooms_and_spends_credit() {
        let t = corridor();
        let bounds = t.bounds.unwrap();
        let mut layout = FloorLayout::new(1, 5, "door");
        let first = layout.add_room(&t, Pose::IDENTITY, &bounds, None, true);
        let source = layout.room(first).unwrap().sockets[1];

        let pose = Pose::from_position(Vec3::new(0.0, 0.0, 10.0));
        let (second, _) = layout
            .place_connected(&t, 0, pose, &bounds, source, None, true)
            .unwrap();

        assert_eq!(layout.connections_made, 1);
        assert_eq!(layout.credits_remaining, 4);
        assert_eq!(layout.room(second).unwrap().depth, 1);
        assert_eq!(layout.room(second).unwrap().parent, Some(first));
        assert!(layout.is_connected());
        assert_eq!(layout.open_sockets().len(), 2);

        let combined = layout.combined_bounds().unwrap();
        assert_eq!(combined.max.z, 20.0);
    }

    #[test]
    fn test_place_connected_is_atomic_on_failure() {
        let t = corridor();
        let bounds = t.bounds.unwrap();
        let mut layout = FloorLayout::new(1, 5, "door");
        let first = layout.add_room(&t, Pose::IDENTITY, &bounds, None, true);
        let source = layout.room(first).unwrap().sockets[1];
        layout
            .place_connected(&t, 0, Pose::IDENTITY, &bounds, source, None, true)
            .unwrap();

        let err = layout.place_connected(&t, 0, Pose::IDENTITY, &bounds, source, None, true);
        assert_eq!(err.unwrap_err(), SocketError::AlreadyConnected(source));
        assert_eq!(layout.room_count(), 2);
        assert_eq!(layout.credits_remaining, 4);
    }

    #[test]
    fn test_disconnected_rooms_detected() {
        let t = corridor();
        let bounds = t.bounds.unwrap();
        let mut layout = FloorLayout::new(1, 5, "door");
        assert!(!layout.is_connected());
        layout.add_room(&t, Pose::IDENTITY, &bounds, None, true);
        assert!(layout.is_connected());
        layout.add_room(&t, Pose::from_position(Vec3::X * 50.0), &bounds, None, true);
        assert!(!layout.is_connected());
        assert_eq!(layout.connection_graph().edge_count(), 0);
    }

    #[test]
    fn test_json_export() {
        let t = corridor();
        let bounds = t.bounds.unwrap();
        let mut layout = FloorLayout::new(7, 0, "door");
        layout.add_room(&t, Pose::IDENTITY, &bounds, None, true);
        let json = layout.to_json().unwrap();
        assert!(json.contains("\"template_id\": \"corridor\""));
        assert!(json.contains("\"seed\": 7"));
    }
}
