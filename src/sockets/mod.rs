//! Connection Sockets
//!
//! A socket is a typed, oriented attachment point on a room. Two sockets of
//! the same type mate face to face and get a door; a socket that never finds
//! a partner is sealed with a blockade at the end of generation.
//!
//! Socket states: Unconnected -> Connected, or Unconnected -> Sealed.
//! Both are terminal for a finished floor. `disconnect` walks either one back
//! to Unconnected and destroys the door/blockade (editing and tests only).
//!
//! Sockets, doors and blockades live in a [`SocketArena`] owned by the floor
//! layout and reference each other by id.

use std::collections::BTreeMap;

use bevy::math::{Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::generation::RoomId;
use crate::geometry::{shortest_rotation, Pose};

/// Socket tier - both ends of a connection must carry the same type
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum SocketType {
    Narrow,
    #[default]
    Standard,
    Wide,
    Vertical,
}

impl SocketType {
    pub fn display_name(&self) -> &str {
        match self {
            Self::Narrow => "Narrow",
            Self::Standard => "Standard",
            Self::Wide => "Wide",
            Self::Vertical => "Vertical",
        }
    }

    /// Exact match. Tiered compatibility (e.g. Wide accepting Standard) would go here.
    pub fn is_compatible_with(&self, other: SocketType) -> bool {
        *self == other
    }
}

/// Fallback geometry that seals an unused socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockadeBlueprint {
    pub name: String,
    /// Authored offset relative to the socket (socket +Z faces outward)
    #[serde(default)]
    pub local_pose: Pose,
}

impl BlockadeBlueprint {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            local_pose: Pose::IDENTITY,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_forward() -> Vec3 {
    Vec3::Z
}

/// Socket as authored on a room template (template-local space)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketDef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub socket_type: SocketType,
    pub position: Vec3,
    /// Outward-facing direction
    #[serde(default = "default_forward")]
    pub forward: Vec3,
    #[serde(default)]
    pub blockades: Vec<BlockadeBlueprint>,
    #[serde(default = "default_true")]
    pub spawn_blockades: bool,
}

impl SocketDef {
    pub fn new(socket_type: SocketType, position: Vec3, forward: Vec3) -> Self {
        Self {
            name: String::new(),
            socket_type,
            position,
            forward,
            blockades: Vec::new(),
            spawn_blockades: true,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_blockades(mut self, blockades: Vec<BlockadeBlueprint>) -> Self {
        self.blockades = blockades;
        self
    }

    /// Position relative to the room origin after the template scale is applied
    pub fn scaled_position(&self, scale: Vec3) -> Vec3 {
        self.position * scale
    }

    /// Outward direction after the template scale (normals use the inverse scale)
    pub fn scaled_forward(&self, scale: Vec3) -> Vec3 {
        // mirrored axes flip the normal
        let inv = scale.signum() / scale.abs().max(Vec3::splat(f32::EPSILON));
        (self.forward * inv).normalize_or(Vec3::Z)
    }

    /// World position and outward direction for a room placed at `room_pose`
    pub fn world_frame(&self, room_pose: &Pose, scale: Vec3) -> (Vec3, Vec3) {
        let position = room_pose.transform_point(self.scaled_position(scale));
        let forward = room_pose
            .transform_direction(self.scaled_forward(scale))
            .normalize_or(Vec3::Z);
        (position, forward)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SocketId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DoorId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockadeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketState {
    Unconnected,
    Connected,
    Sealed,
}

/// Node a blockade is attached under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockadeParent {
    Socket(SocketId),
    Room(RoomId),
}

/// Live socket on a placed room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Socket {
    pub id: SocketId,
    pub room: RoomId,
    /// Index into the template's socket list
    pub index: usize,
    pub name: String,
    pub socket_type: SocketType,
    pub position: Vec3,
    pub forward: Vec3,
    pub blockades_enabled: bool,
    pub blockade_blueprints: Vec<BlockadeBlueprint>,
    state: SocketState,
    peer: Option<SocketId>,
    door: Option<DoorId>,
    blockade: Option<BlockadeId>,
}

impl Socket {
    pub fn state(&self) -> SocketState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SocketState::Connected
    }

    pub fn is_open(&self) -> bool {
        self.state == SocketState::Unconnected
    }

    pub fn peer(&self) -> Option<SocketId> {
        self.peer
    }

    pub fn door(&self) -> Option<DoorId> {
        self.door
    }

    pub fn blockade(&self) -> Option<BlockadeId> {
        self.blockade
    }

    pub fn is_compatible_with(&self, other: SocketType) -> bool {
        self.socket_type.is_compatible_with(other)
    }

    /// True when a blockade would be spawned for this socket if it stays open
    pub fn has_blockade_configured(&self) -> bool {
        self.blockades_enabled && !self.blockade_blueprints.is_empty()
    }

    /// Socket frame: +Z along the outward direction, room up preserved where possible
    pub fn rotation(&self) -> Quat {
        shortest_rotation(Vec3::Z, self.forward)
    }

    /// Pose a door renders at: the socket's own position and orientation, not the room origin
    pub fn door_spawn_pose(&self) -> Pose {
        Pose::new(self.position, self.rotation())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorInstance {
    pub id: DoorId,
    pub socket: SocketId,
    pub peer: SocketId,
    pub blueprint: String,
    pub pose: Pose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockadeInstance {
    pub id: BlockadeId,
    pub socket: SocketId,
    pub blueprint: String,
    pub pose: Pose,
    pub parent: BlockadeParent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocketError {
    #[error("socket {0:?} does not exist")]
    UnknownSocket(SocketId),
    #[error("socket {0:?} cannot connect to itself")]
    SelfConnection(SocketId),
    #[error("socket {0:?} is already connected")]
    AlreadyConnected(SocketId),
    #[error("socket {0:?} is sealed with a blockade")]
    AlreadySealed(SocketId),
    #[error("socket type mismatch: {from:?} cannot mate with {to:?}")]
    TypeMismatch { from: SocketType, to: SocketType },
    #[error("socket {0:?} has nothing to disconnect")]
    NotConnected(SocketId),
    #[error("template '{template}' has no socket #{index}")]
    UnknownTemplateSocket { template: String, index: usize },
}

/// Owns every socket, door and blockade of one floor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocketArena {
    sockets: Vec<Socket>,
    doors: BTreeMap<DoorId, DoorInstance>,
    blockades: BTreeMap<BlockadeId, BlockadeInstance>,
    next_door: u32,
    next_blockade: u32,
    default_door: String,
}

impl SocketArena {
    pub fn new(default_door: &str) -> Self {
        Self {
            default_door: default_door.to_string(),
            ..Default::default()
        }
    }

    /// Instantiate a socket for a room placed at `room_pose`
    pub fn add_socket(
        &mut self,
        room: RoomId,
        index: usize,
        def: &SocketDef,
        room_pose: &Pose,
        scale: Vec3,
        blockades_enabled: bool,
    ) -> SocketId {
        let id = SocketId(self.sockets.len() as u32);
        let (position, forward) = def.world_frame(room_pose, scale);
        self.sockets.push(Socket {
            id,
            room,
            index,
            name: def.name.clone(),
            socket_type: def.socket_type,
            position,
            forward,
            blockades_enabled: blockades_enabled && def.spawn_blockades,
            blockade_blueprints: def.blockades.clone(),
            state: SocketState::Unconnected,
            peer: None,
            door: None,
            blockade: None,
        });
        id
    }

    pub fn get(&self, id: SocketId) -> Option<&Socket> {
        self.sockets.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Socket> {
        self.sockets.iter()
    }

    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    pub fn doors(&self) -> impl Iterator<Item = &DoorInstance> {
        self.doors.values()
    }

    pub fn door(&self, id: DoorId) -> Option<&DoorInstance> {
        self.doors.get(&id)
    }

    pub fn blockades(&self) -> impl Iterator<Item = &BlockadeInstance> {
        self.blockades.values()
    }

    pub fn blockade(&self, id: BlockadeId) -> Option<&BlockadeInstance> {
        self.blockades.get(&id)
    }

    pub fn door_count(&self) -> usize {
        self.doors.len()
    }

    pub fn blockade_count(&self) -> usize {
        self.blockades.len()
    }

    /// Mate `from` with `to` and spawn a door at `from`'s socket pose.
    ///
    /// On failure nothing changes; the caller should try another candidate.
    pub fn connect(
        &mut self,
        from: SocketId,
        to: SocketId,
        door_override: Option<&str>,
    ) -> Result<DoorId, SocketError> {
        let result = self.try_connect(from, to, door_override);
        if let Err(e) = &result {
            warn!(from = from.0, to = to.0, "socket connection rejected: {}", e);
        }
        result
    }

    fn try_connect(
        &mut self,
        from: SocketId,
        to: SocketId,
        door_override: Option<&str>,
    ) -> Result<DoorId, SocketError> {
        if from == to {
            return Err(SocketError::SelfConnection(from));
        }
        let a = self.get(from).ok_or(SocketError::UnknownSocket(from))?;
        let b = self.get(to).ok_or(SocketError::UnknownSocket(to))?;
        for s in [a, b] {
            match s.state {
                SocketState::Connected => return Err(SocketError::AlreadyConnected(s.id)),
                SocketState::Sealed => return Err(SocketError::AlreadySealed(s.id)),
                SocketState::Unconnected => {}
            }
        }
        if !a.is_compatible_with(b.socket_type) {
            return Err(SocketError::TypeMismatch {
                from: a.socket_type,
                to: b.socket_type,
            });
        }

        let pose = a.door_spawn_pose();
        let door_id = DoorId(self.next_door);
        self.next_door += 1;
        let door = DoorInstance {
            id: door_id,
            socket: from,
            peer: to,
            blueprint: door_override.unwrap_or(&self.default_door).to_string(),
            pose,
        };
        self.doors.insert(door_id, door);

        for (id, peer) in [(from, to), (to, from)] {
            let s = &mut self.sockets[id.0 as usize];
            s.state = SocketState::Connected;
            s.peer = Some(peer);
            s.door = Some(door_id);
        }
        Ok(door_id)
    }

    /// Undo a connection or a seal. Destroys the door/blockade involved.
    pub fn disconnect(&mut self, id: SocketId) -> Result<(), SocketError> {
        let socket = self.get(id).ok_or(SocketError::UnknownSocket(id))?;
        match socket.state {
            SocketState::Connected => {
                let peer = socket.peer;
                if let Some(door) = socket.door {
                    self.doors.remove(&door);
                }
                for sid in std::iter::once(id).chain(peer) {
                    let s = &mut self.sockets[sid.0 as usize];
                    s.state = SocketState::Unconnected;
                    s.peer = None;
                    s.door = None;
                }
                Ok(())
            }
            SocketState::Sealed => {
                if let Some(blockade) = socket.blockade {
                    self.blockades.remove(&blockade);
                }
                let s = &mut self.sockets[id.0 as usize];
                s.state = SocketState::Unconnected;
                s.blockade = None;
                Ok(())
            }
            SocketState::Unconnected => Err(SocketError::NotConnected(id)),
        }
    }

    /// Seal an open socket with one of its blockade blueprints (picked uniformly).
    ///
    /// Returns the existing blockade on repeated calls, and `None` when the socket
    /// is connected or has no blockade configured. A socket only holds a door
    /// while connected, so the connected check also covers an existing door.
    pub fn spawn_blockade<R: Rng + ?Sized>(
        &mut self,
        id: SocketId,
        parent: Option<BlockadeParent>,
        rng: &mut R,
    ) -> Option<BlockadeId> {
        let socket = self.get(id)?;
        if socket.is_connected() {
            return None;
        }
        if let Some(existing) = socket.blockade {
            return Some(existing);
        }
        if !socket.has_blockade_configured() {
            return None;
        }

        let pick = rng.gen_range(0..socket.blockade_blueprints.len());
        let blueprint = &socket.blockade_blueprints[pick];
        let pose = socket.door_spawn_pose().compose(&blueprint.local_pose);
        let name = blueprint.name.clone();
        let blockade_id = BlockadeId(self.next_blockade);
        self.next_blockade += 1;
        self.blockades.insert(
            blockade_id,
            BlockadeInstance {
                id: blockade_id,
                socket: id,
                blueprint: name,
                pose,
                parent: parent.unwrap_or(BlockadeParent::Socket(id)),
            },
        );

        let s = &mut self.sockets[id.0 as usize];
        s.state = SocketState::Sealed;
        s.blockade = Some(blockade_id);
        Some(blockade_id)
    }
}
