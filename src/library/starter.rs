//! Built-in room set used by the CLI, tests and benchmarks.

use bevy::math::Vec3;

use super::{RoomCategory, RoomTemplate, SpecialRole, TemplateLibrary};
use crate::bounds::GeometryPiece;
use crate::geometry::Pose;
use crate::sockets::{BlockadeBlueprint, SocketDef, SocketType};

fn standard_blockades() -> Vec<BlockadeBlueprint> {
    vec![
        BlockadeBlueprint {
            name: "rubble_pile".into(),
            local_pose: Pose::from_position(Vec3::new(0.0, 0.0, -0.25)),
        },
        BlockadeBlueprint {
            name: "plank_barricade".into(),
            local_pose: Pose::from_position(Vec3::new(0.0, 0.0, -0.5)),
        },
    ]
}

fn socket(name: &str, position: Vec3, forward: Vec3) -> SocketDef {
    SocketDef::new(SocketType::Standard, position, forward)
        .with_name(name)
        .with_blockades(standard_blockades())
}

/// Door-sized marker volume straddling a socket
fn marker(position: Vec3) -> GeometryPiece {
    GeometryPiece::socket_marker(position + Vec3::Y, Vec3::new(2.0, 2.0, 1.0))
}

/// Starter room set: two corridor shapes, a T junction, a hub, a dead end and the special rooms
pub fn starter_library() -> TemplateLibrary {
    let templates = vec![
        RoomTemplate::new("entry_hall", "Entry Hall", RoomCategory::Chamber)
            .with_role(SpecialRole::Entry)
            .with_mesh(Vec3::new(-5.0, 0.0, -5.0), Vec3::new(5.0, 4.0, 5.0))
            .with_socket(socket("north", Vec3::new(0.0, 0.0, 5.0), Vec3::Z))
            .with_socket(socket("east", Vec3::new(5.0, 0.0, 0.0), Vec3::X))
            .with_socket(socket("west", Vec3::new(-5.0, 0.0, 0.0), Vec3::NEG_X)),
        RoomTemplate::new("corridor_straight", "Straight Corridor", RoomCategory::Corridor)
            .with_weight(5)
            .with_mesh(Vec3::new(-1.5, 0.0, 0.0), Vec3::new(1.5, 3.0, 10.0))
            .with_piece(marker(Vec3::ZERO))
            .with_piece(marker(Vec3::new(0.0, 0.0, 10.0)))
            .with_socket(socket("in", Vec3::ZERO, Vec3::NEG_Z))
            .with_socket(socket("out", Vec3::new(0.0, 0.0, 10.0), Vec3::Z)),
        RoomTemplate::new("corridor_corner", "Corner Corridor", RoomCategory::Corridor)
            .with_weight(3)
            .with_mesh(Vec3::new(-1.5, 0.0, 0.0), Vec3::new(1.5, 3.0, 6.0))
            .with_mesh(Vec3::new(1.5, 0.0, 3.0), Vec3::new(7.0, 3.0, 6.0))
            .with_socket(socket("in", Vec3::ZERO, Vec3::NEG_Z))
            .with_socket(socket("out", Vec3::new(7.0, 0.0, 4.5), Vec3::X)),
        RoomTemplate::new("junction_t", "T Junction", RoomCategory::Intersection)
            .with_weight(2)
            .with_mesh(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(5.0, 3.0, 6.0))
            .with_socket(socket("in", Vec3::ZERO, Vec3::NEG_Z))
            .with_socket(socket("left", Vec3::new(-5.0, 0.0, 3.0), Vec3::NEG_X))
            .with_socket(socket("right", Vec3::new(5.0, 0.0, 3.0), Vec3::X)),
        RoomTemplate {
            declared_size: Some(Vec3::new(12.0, 5.0, 12.0)),
            ..RoomTemplate::new("hub_square", "Square Hub", RoomCategory::Hub)
                .with_padding(-0.25)
                .with_mesh(Vec3::new(-6.0, 0.0, 0.0), Vec3::new(6.0, 5.0, 12.0))
                .with_socket(socket("south", Vec3::ZERO, Vec3::NEG_Z))
                .with_socket(socket("north", Vec3::new(0.0, 0.0, 12.0), Vec3::Z))
                .with_socket(socket("west", Vec3::new(-6.0, 0.0, 6.0), Vec3::NEG_X))
                .with_socket(socket("east", Vec3::new(6.0, 0.0, 6.0), Vec3::X))
        },
        RoomTemplate::new("storage_dead_end", "Storage Room", RoomCategory::Terminus)
            .with_weight(2)
            .with_mesh(Vec3::new(-3.0, 0.0, 0.0), Vec3::new(3.0, 3.0, 6.0))
            .with_socket(socket("in", Vec3::ZERO, Vec3::NEG_Z)),
        RoomTemplate::new("collapsed_tunnel", "Collapsed Tunnel", RoomCategory::Corridor)
            .with_weight(4)
            .disabled()
            .with_mesh(Vec3::new(-1.5, 0.0, 0.0), Vec3::new(1.5, 3.0, 8.0))
            .with_socket(socket("in", Vec3::ZERO, Vec3::NEG_Z))
            .with_socket(socket("out", Vec3::new(0.0, 0.0, 8.0), Vec3::Z)),
        RoomTemplate::new("safe_room", "Safe Room", RoomCategory::Chamber)
            .with_role(SpecialRole::SafeRoom)
            .with_mesh(Vec3::new(-4.0, 0.0, 0.0), Vec3::new(4.0, 3.0, 8.0))
            .with_socket(socket("in", Vec3::ZERO, Vec3::NEG_Z)),
        RoomTemplate::new("exit_stairwell", "Exit Stairwell", RoomCategory::Stairwell)
            .with_role(SpecialRole::Exit)
            .with_mesh(Vec3::new(-3.0, 0.0, 0.0), Vec3::new(3.0, 8.0, 6.0))
            .with_socket(socket("in", Vec3::ZERO, Vec3::NEG_Z)),
    ];

    // Every starter template has mesh geometry and unique ids.
    TemplateLibrary::from_templates(templates).unwrap_or_else(|e| {
        tracing::error!("starter library rejected: {}", e);
        TemplateLibrary::new()
    })
}
