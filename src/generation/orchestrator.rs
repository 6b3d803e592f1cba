//! Generation Orchestrator
//!
//! Grows a floor outward from the entry room. Each open socket on the
//! frontier draws weighted candidates from the library, the solver aligns
//! and collision-checks them, and the first valid one is committed. When the
//! room budget is spent (or nothing fits anywhere) the exit and safe rooms
//! are attached and every socket still open is sealed.
//!
//! Runs in one call ([`FloorGenerator::generate_floor`]) or incrementally
//! ([`begin`](FloorGenerator::begin) / [`step`](FloorGenerator::step) /
//! [`finish`](FloorGenerator::finish)) so a frame loop can spread the work.

use std::collections::VecDeque;
use std::sync::Arc;

use bevy::math::Quat;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::geometry::Pose;
use crate::library::{weighted_random_room, LibraryError, RoomTemplate, SpecialRole, TemplateLibrary};
use crate::logging::TimingSpan;
use crate::solver::{classify_overlap, solve_alignment, OverlapKind};
use crate::sockets::{BlockadeParent, SocketId, SocketType};

use super::broad_phase::BroadPhaseGrid;
use super::config::{ConfigError, FrontierOrder, GeneratorConfig};
use super::layout::FloorLayout;

/// Every random draw of a floor comes from this generator, seeded once per floor
pub type FloorRng = Xoshiro256PlusPlus;

/// Placed after the regular budget, each spending one reserved credit
const LATE_SPECIAL_ROLES: [SpecialRole; 2] = [SpecialRole::Exit, SpecialRole::SafeRoom];

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("entry template '{0}' has no bounds")]
    EntryWithoutBounds(String),
    #[error("no floor generation in progress")]
    NotStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationStatus {
    /// Open sockets and credits remain
    InProgress,
    /// Regular rooms are done; call `finish`
    Complete,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub seed: u64,
    pub initial_credits: u32,
    pub credits_remaining: u32,
    pub rooms_placed: u32,
    pub connections_made: u32,
    pub blockades_spawned: u32,
    /// Sockets left open without a configured blockade
    pub unsealed_sockets: u32,
    pub placement_attempts: u32,
    pub broad_phase_rejects: u32,
    pub narrow_phase_rejects: u32,
    pub seam_overlaps_accepted: u32,
    pub padding_overlaps_accepted: u32,
    /// Sockets that exhausted their attempts
    pub abandoned_sockets: u32,
    pub requeued_sockets: u32,
    pub missing_special_rooms: Vec<SpecialRole>,
    pub cancelled: bool,
    pub elapsed_ms: f64,
}

/// Accepted placement plus the overlaps it was allowed to have
struct Candidate {
    pose: Pose,
    seams: u32,
    paddings: u32,
}

/// Working state between `begin` and `finish`
struct GenerationRun {
    layout: FloorLayout,
    rng: FloorRng,
    frontier: VecDeque<SocketId>,
    abandoned: Vec<SocketId>,
    passes_used: u32,
    reserved: u32,
    broad_phase: BroadPhaseGrid,
    stats: GenerationStats,
    timer: TimingSpan,
}

impl GenerationRun {
    fn next_socket(&mut self, order: FrontierOrder) -> Option<SocketId> {
        match order {
            FrontierOrder::BreadthFirst => self.frontier.pop_front(),
            FrontierOrder::DepthFirst => self.frontier.pop_back(),
        }
    }

    /// Place up to `max_rooms` regular rooms
    fn step(
        &mut self,
        library: &TemplateLibrary,
        config: &GeneratorConfig,
        max_rooms: u32,
    ) -> GenerationStatus {
        let mut placed = 0;
        while placed < max_rooms {
            if self.layout.credits_remaining <= self.reserved {
                return GenerationStatus::Complete;
            }
            let Some(socket) = self.next_socket(config.frontier_order) else {
                if !self.abandoned.is_empty() && self.passes_used < config.requeue_passes {
                    self.passes_used += 1;
                    self.stats.requeued_sockets += self.abandoned.len() as u32;
                    debug!(
                        pass = self.passes_used,
                        sockets = self.abandoned.len(),
                        "re-queueing abandoned sockets"
                    );
                    self.frontier.extend(self.abandoned.drain(..));
                    continue;
                }
                return GenerationStatus::Complete;
            };
            let open = self.layout.sockets().get(socket).map_or(false, |s| s.is_open());
            if !open {
                continue;
            }
            if self.fill_socket(library, config, socket) {
                placed += 1;
            } else {
                self.stats.abandoned_sockets += 1;
                self.abandoned.push(socket);
            }
        }
        GenerationStatus::InProgress
    }

    /// Try weighted candidates for one open socket until one fits or attempts run out
    fn fill_socket(
        &mut self,
        library: &TemplateLibrary,
        config: &GeneratorConfig,
        source: SocketId,
    ) -> bool {
        let Some(socket_type) = self.layout.sockets().get(source).map(|s| s.socket_type) else {
            return false;
        };
        let pool = self.candidate_pool(library, config, socket_type);
        if pool.is_empty() {
            debug!(socket = source.0, ?socket_type, "no template can mate with socket");
            return false;
        }

        let mut attempts = 0;
        while attempts < config.max_attempts_per_socket {
            let Some(template) = weighted_random_room(&pool, &mut self.rng) else {
                break;
            };
            let mut indices = template.compatible_sockets(socket_type);
            if indices.is_empty() {
                attempts += 1;
                continue;
            }
            indices.shuffle(&mut self.rng);
            for index in indices {
                if attempts >= config.max_attempts_per_socket {
                    break;
                }
                attempts += 1;
                if self.try_place(config, template, index, source) {
                    return true;
                }
            }
        }
        false
    }

    /// Random pool for a socket, narrowed to rooms whose extra sockets fit the budget
    fn candidate_pool<'a>(
        &self,
        library: &'a TemplateLibrary,
        config: &GeneratorConfig,
        socket_type: SocketType,
    ) -> Vec<&'a RoomTemplate> {
        let mut pool = library.candidate_pool(socket_type, config.sector);
        if let Some(categories) = &config.categories {
            pool.retain(|t| categories.contains(&t.category));
        }
        if !config.budget_aware_selection {
            return pool;
        }
        let spare = self
            .layout
            .credits_remaining
            .saturating_sub(self.reserved)
            .saturating_sub(1) as usize;
        let fitting: Vec<_> = pool
            .iter()
            .copied()
            .filter(|t| t.socket_count.saturating_sub(1) <= spare)
            .collect();
        if fitting.is_empty() {
            pool
        } else {
            fitting
        }
    }

    /// Align, collision-check and (on success) commit one candidate
    fn try_place(
        &mut self,
        config: &GeneratorConfig,
        template: &RoomTemplate,
        index: usize,
        source: SocketId,
    ) -> bool {
        self.stats.placement_attempts += 1;
        let Some(candidate) = self.evaluate(config, template, index, source) else {
            return false;
        };
        self.commit(config, template, index, source, candidate)
    }

    fn evaluate(
        &mut self,
        config: &GeneratorConfig,
        template: &RoomTemplate,
        index: usize,
        source: SocketId,
    ) -> Option<Candidate> {
        let local_bounds = template.bounds?;
        let target = template.sockets.get(index)?;
        let src = self.layout.sockets().get(source)?;
        let (source_position, source_forward, source_room) = (src.position, src.forward, src.room);

        let pose = solve_alignment(
            source_position,
            source_forward,
            target,
            template.scale,
            Quat::IDENTITY,
        );
        let world = local_bounds.at_pose(&pose);

        if let Some(limit) = &config.world_limit {
            if !limit.contains(&world.tight) {
                self.stats.broad_phase_rejects += 1;
                return None;
            }
        }

        let neighbours = self.broad_phase.query(&world.envelope());
        for &other in &neighbours {
            let Some(room) = self.layout.room(other) else {
                continue;
            };
            // a neighbour's centre inside the candidate (or vice versa) can never be a seam
            if other != source_room
                && (world.tight.contains_point(room.bounds.tight.center())
                    || room.bounds.tight.contains_point(world.tight.center()))
                && room.bounds.padded.intersects(&world.padded)
            {
                self.stats.broad_phase_rejects += 1;
                return None;
            }
        }

        let (target_position, _) = target.world_frame(&pose, template.scale);
        let seam_midpoint = (source_position + target_position) * 0.5;
        let mut candidate = Candidate {
            pose,
            seams: 0,
            paddings: 0,
        };
        for other in neighbours {
            let Some(room) = self.layout.room(other) else {
                continue;
            };
            let seam = (other == source_room).then_some(seam_midpoint);
            match classify_overlap(&room.bounds, &world, seam, &config.collision) {
                OverlapKind::Clear => {}
                OverlapKind::SeamArtifact => candidate.seams += 1,
                OverlapKind::IntentionalPadding => candidate.paddings += 1,
                OverlapKind::Collision => {
                    self.stats.narrow_phase_rejects += 1;
                    return None;
                }
            }
        }
        Some(candidate)
    }

    fn commit(
        &mut self,
        config: &GeneratorConfig,
        template: &RoomTemplate,
        index: usize,
        source: SocketId,
        candidate: Candidate,
    ) -> bool {
        let Some(local_bounds) = template.bounds else {
            return false;
        };
        let placed = self.layout.place_connected(
            template,
            index,
            candidate.pose,
            &local_bounds,
            source,
            config.door_override.as_deref(),
            config.blockades_enabled,
        );
        let room = match placed {
            Ok((room, _)) => room,
            Err(e) => {
                warn!(template = %template.id, "placement discarded: {}", e);
                return false;
            }
        };

        self.stats.seam_overlaps_accepted += candidate.seams;
        self.stats.padding_overlaps_accepted += candidate.paddings;
        let Some(placed_room) = self.layout.room(room) else {
            return false;
        };
        self.broad_phase.insert(room, placed_room.bounds.envelope());
        let new_sockets: Vec<SocketId> = placed_room
            .sockets
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, id)| *id)
            .collect();
        debug!(
            room = room.0,
            template = %template.id,
            depth = placed_room.depth,
            open = new_sockets.len(),
            "room placed"
        );
        self.frontier.extend(new_sockets);
        true
    }

    /// Attach a special room to the best open socket that accepts it
    fn place_special(
        &mut self,
        library: &TemplateLibrary,
        config: &GeneratorConfig,
        role: SpecialRole,
    ) -> bool {
        let Some(template) = library.special_template(role) else {
            return false;
        };
        let mut sockets: Vec<(u32, SocketId)> = self
            .layout
            .open_sockets()
            .into_iter()
            .filter_map(|id| {
                let socket = self.layout.sockets().get(id)?;
                if !template.has_socket_type(socket.socket_type) {
                    return None;
                }
                let depth = self.layout.room(socket.room)?.depth;
                Some((depth, id))
            })
            .collect();
        match role {
            // exit as far from the entry as the floor allows
            SpecialRole::Exit => sockets.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1))),
            _ => sockets.sort(),
        }

        for (_, source) in sockets {
            let Some(socket_type) = self.layout.sockets().get(source).map(|s| s.socket_type) else {
                continue;
            };
            for index in template.compatible_sockets(socket_type) {
                if self.try_place(config, template, index, source) {
                    info!(role = role.display_name(), template = %template.id, "special room placed");
                    return true;
                }
            }
        }
        false
    }

    /// Seal every socket still open
    fn seal_open_sockets(&mut self) {
        for id in self.layout.open_sockets() {
            let parent = self
                .layout
                .sockets()
                .get(id)
                .map(|s| BlockadeParent::Room(s.room));
            match self.layout.sockets_mut().spawn_blockade(id, parent, &mut self.rng) {
                Some(_) => self.layout.blockades_spawned += 1,
                None => {
                    warn!(socket = id.0, "no blockade configured, socket left open");
                    self.stats.unsealed_sockets += 1;
                }
            }
        }
    }

    fn into_layout(mut self, cancelled: bool) -> (FloorLayout, GenerationStats) {
        let layout = self.layout;
        self.stats.cancelled = cancelled;
        self.stats.rooms_placed = layout.room_count() as u32;
        self.stats.connections_made = layout.connections_made;
        self.stats.blockades_spawned = layout.blockades_spawned;
        self.stats.credits_remaining = layout.credits_remaining;
        self.stats.elapsed_ms = self.timer.elapsed_ms();
        (layout, self.stats)
    }
}

/// Builds floors from a shared, read-only template library
pub struct FloorGenerator {
    library: Arc<TemplateLibrary>,
    config: GeneratorConfig,
    run: Option<GenerationRun>,
    layout: Option<FloorLayout>,
    stats: GenerationStats,
}

impl FloorGenerator {
    pub fn new(library: Arc<TemplateLibrary>, config: GeneratorConfig) -> Self {
        Self {
            library,
            config,
            run: None,
            layout: None,
            stats: GenerationStats::default(),
        }
    }

    pub fn library(&self) -> &Arc<TemplateLibrary> {
        &self.library
    }

    /// Swap the library. Ignored while a floor is being generated.
    pub fn set_library(&mut self, library: Arc<TemplateLibrary>) -> bool {
        if self.is_generating() {
            warn!("library swap refused while a floor is generating");
            return false;
        }
        self.library = library;
        true
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Swap the config. Ignored while a floor is being generated.
    pub fn set_config(&mut self, config: GeneratorConfig) -> bool {
        if self.is_generating() {
            warn!("config swap refused while a floor is generating");
            return false;
        }
        self.config = config;
        true
    }

    pub fn is_generating(&self) -> bool {
        self.run.is_some()
    }

    /// Last finished (or cancelled) floor
    pub fn layout(&self) -> Option<&FloorLayout> {
        self.layout.as_ref()
    }

    pub fn take_layout(&mut self) -> Option<FloorLayout> {
        self.layout.take()
    }

    pub fn stats(&self) -> &GenerationStats {
        &self.stats
    }

    /// Generate a complete floor in one call
    pub fn generate_floor(&mut self, seed: u64) -> Result<&FloorLayout, GenerationError> {
        self.begin(seed)?;
        while self.step(u32::MAX)? == GenerationStatus::InProgress {}
        self.finish()
    }

    /// Validate inputs, discard any previous floor and place the entry room
    pub fn begin(&mut self, seed: u64) -> Result<(), GenerationError> {
        self.config.validate()?;
        self.library.validate()?;
        self.clear_floor();

        let entry = self
            .library
            .special_template(SpecialRole::Entry)
            .ok_or(LibraryError::MissingSpecialRole(SpecialRole::Entry))?;
        let entry_bounds = entry
            .bounds
            .ok_or_else(|| GenerationError::EntryWithoutBounds(entry.id.clone()))?;

        let credits = self.config.credits;
        let mut layout = FloorLayout::new(seed, credits, &self.library.door_blueprint);
        let entry_room = layout.add_room(
            entry,
            Pose::IDENTITY,
            &entry_bounds,
            None,
            self.config.blockades_enabled,
        );

        let mut broad_phase = BroadPhaseGrid::new(self.config.broad_phase_cell_size);
        let mut frontier = VecDeque::new();
        if let Some(room) = layout.room(entry_room) {
            broad_phase.insert(entry_room, room.bounds.envelope());
            frontier.extend(room.sockets.iter().copied());
        }

        info!(seed, credits, entry = %entry.id, "floor generation started");
        self.run = Some(GenerationRun {
            layout,
            rng: FloorRng::seed_from_u64(seed),
            frontier,
            abandoned: Vec::new(),
            passes_used: 0,
            reserved: credits.min(LATE_SPECIAL_ROLES.len() as u32),
            broad_phase,
            stats: GenerationStats {
                seed,
                initial_credits: credits,
                ..Default::default()
            },
            timer: TimingSpan::new("floor_generation"),
        });
        Ok(())
    }

    /// Place up to `max_rooms` regular rooms
    pub fn step(&mut self, max_rooms: u32) -> Result<GenerationStatus, GenerationError> {
        let run = self.run.as_mut().ok_or(GenerationError::NotStarted)?;
        Ok(run.step(&self.library, &self.config, max_rooms))
    }

    /// Attach the exit and safe rooms, seal leftover sockets and publish the floor
    pub fn finish(&mut self) -> Result<&FloorLayout, GenerationError> {
        let mut run = self.run.take().ok_or(GenerationError::NotStarted)?;

        for role in LATE_SPECIAL_ROLES {
            if run.layout.credits_remaining == 0 || !run.place_special(&self.library, &self.config, role) {
                warn!(role = role.display_name(), "special room could not be placed");
                run.stats.missing_special_rooms.push(role);
            }
        }
        run.seal_open_sockets();
        Ok(self.publish(run, false))
    }

    /// Stop early, sealing whatever has been built so far
    pub fn cancel(&mut self) -> Option<&FloorLayout> {
        let mut run = self.run.take()?;
        run.seal_open_sockets();
        info!("floor generation cancelled");
        Some(self.publish(run, true))
    }

    /// Forget the current floor and any generation in progress
    pub fn clear_floor(&mut self) {
        self.run = None;
        self.layout = None;
        self.stats = GenerationStats::default();
    }

    fn publish(&mut self, run: GenerationRun, cancelled: bool) -> &FloorLayout {
        let (layout, stats) = run.into_layout(cancelled);
        info!(
            seed = stats.seed,
            rooms = stats.rooms_placed,
            connections = stats.connections_made,
            blockades = stats.blockades_spawned,
            credits_left = stats.credits_remaining,
            elapsed_ms = stats.elapsed_ms,
            "floor generation finished"
        );
        self.stats = stats;
        self.layout.insert(layout)
    }
}
