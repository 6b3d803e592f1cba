//! Property-based tests using proptest
//!
//! Invariants that must hold for every seed and budget:
//! - Determinism: same library + config + seed → identical placements
//! - No real collisions between any two placed rooms
//! - Socket connections are symmetric and doors sit on their sockets
//! - Every socket ends connected or sealed
//! - The credit budget is never exceeded

use std::sync::Arc;

use proptest::prelude::*;

use tower_floorgen::generation::{FloorGenerator, FloorLayout, FrontierOrder, GeneratorConfig};
use tower_floorgen::library::{starter_library, weighted_random_room};
use tower_floorgen::solver::{classify_overlap, OverlapKind};
use tower_floorgen::sockets::SocketState;

fn generate(seed: u64, credits: u32, order: FrontierOrder) -> (FloorLayout, FloorGenerator) {
    let config = GeneratorConfig {
        frontier_order: order,
        ..GeneratorConfig::default().with_credits(credits)
    };
    let mut generator = FloorGenerator::new(Arc::new(starter_library()), config);
    let layout = generator
        .generate_floor(seed)
        .expect("starter library always generates")
        .clone();
    (layout, generator)
}

fn frontier_order() -> impl Strategy<Value = FrontierOrder> {
    prop_oneof![
        Just(FrontierOrder::BreadthFirst),
        Just(FrontierOrder::DepthFirst)
    ]
}

// ============================================================
// Floor Generation Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_generation_is_deterministic(seed in any::<u64>(), credits in 0u32..24, order in frontier_order()) {
        let (a, _) = generate(seed, credits, order);
        let (b, _) = generate(seed, credits, order);
        prop_assert_eq!(a.placements(), b.placements());
        prop_assert_eq!(a.door_positions(), b.door_positions());
        prop_assert_eq!(a.blockades_spawned, b.blockades_spawned);
    }

    #[test]
    fn prop_no_real_collisions(seed in any::<u64>(), credits in 1u32..24, order in frontier_order()) {
        let (layout, generator) = generate(seed, credits, order);
        let settings = generator.config().collision;
        let rooms = layout.rooms();
        for (i, a) in rooms.iter().enumerate() {
            for b in &rooms[i + 1..] {
                // rooms sharing a door may overlap at that doorway
                let seam = layout.sockets().doors().find_map(|door| {
                    let s = layout.sockets().get(door.socket)?;
                    let p = layout.sockets().get(door.peer)?;
                    let pair = (s.room, p.room);
                    (pair == (a.id, b.id) || pair == (b.id, a.id)).then_some(door.pose.position)
                });
                let kind = classify_overlap(&a.bounds, &b.bounds, seam, &settings);
                prop_assert_ne!(
                    kind,
                    OverlapKind::Collision,
                    "rooms {:?} ({}) and {:?} ({}) collide",
                    a.id, a.template_id, b.id, b.template_id
                );
            }
        }
    }

    #[test]
    fn prop_connections_are_symmetric(seed in any::<u64>(), credits in 0u32..24) {
        let (layout, _) = generate(seed, credits, FrontierOrder::BreadthFirst);
        let sockets = layout.sockets();
        for socket in sockets.iter().filter(|s| s.is_connected()) {
            let peer = sockets.get(socket.peer().unwrap()).unwrap();
            prop_assert_eq!(peer.peer(), Some(socket.id));
            prop_assert_eq!(peer.door(), socket.door());
            prop_assert!((peer.position - socket.position).length() < 1e-3);
            prop_assert!((peer.forward + socket.forward).length() < 1e-3);

            let door = sockets.door(socket.door().unwrap()).unwrap();
            prop_assert!((door.pose.position - socket.position).length() < 1e-3);
        }
        prop_assert_eq!(sockets.iter().filter(|s| s.is_connected()).count(), sockets.door_count() * 2);
    }

    #[test]
    fn prop_every_socket_is_finalized(seed in any::<u64>(), credits in 0u32..24, order in frontier_order()) {
        let (layout, generator) = generate(seed, credits, order);
        for socket in layout.sockets().iter() {
            prop_assert_ne!(socket.state(), SocketState::Unconnected);
            if socket.state() == SocketState::Sealed {
                prop_assert!(socket.blockade().is_some());
                prop_assert!(socket.door().is_none());
            }
        }
        prop_assert_eq!(generator.stats().unsealed_sockets, 0);
        prop_assert!(layout.open_sockets().is_empty());
    }

    #[test]
    fn prop_budget_respected(seed in any::<u64>(), credits in 0u32..32) {
        let (layout, generator) = generate(seed, credits, FrontierOrder::BreadthFirst);
        prop_assert!(layout.connections_made <= credits);
        prop_assert_eq!(layout.room_count() as u32, layout.connections_made + 1);
        prop_assert_eq!(layout.credits_remaining, credits - layout.connections_made);
        prop_assert!(layout.is_connected());
        prop_assert_eq!(generator.stats().connections_made, layout.connections_made);
    }

    #[test]
    fn prop_weighted_selection_only_returns_candidates(seed in any::<u64>(), weights in prop::collection::vec(0u32..10, 1..6)) {
        use rand::SeedableRng;
        use tower_floorgen::library::{RoomCategory, RoomTemplate};

        let templates: Vec<RoomTemplate> = weights
            .iter()
            .enumerate()
            .map(|(i, w)| RoomTemplate::new(&format!("t{i}"), "t", RoomCategory::Corridor).with_weight(*w))
            .collect();
        let candidates: Vec<&RoomTemplate> = templates.iter().collect();
        let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(seed);
        let any_positive = weights.iter().any(|w| *w > 0);
        for _ in 0..50 {
            let pick = weighted_random_room(&candidates, &mut rng).unwrap();
            if any_positive {
                prop_assert!(pick.spawn_weight > 0);
            }
        }
    }
}
