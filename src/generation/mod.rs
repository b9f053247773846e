//! Deterministic arena generation.
//!
//! Builds a sealed wall/floor grid plus a parallel traversal-cost grid from a
//! seed and tunable parameters. Pipeline, in order:
//! 1. Noise seeding (Bernoulli wall fill, sealed border)
//! 2. Cellular-automata smoothing
//! 3. Lattice room placement (best effort - rectangles that don't fit are
//!    skipped)
//! 4. L-shaped corridor carving between room centers sorted by X
//! 5. Largest-region pruning (isolated pockets become walls)
//! 6. Cost derivation from local wall density
//!
//! Same parameters always produce a bit-identical arena; non-determinism is
//! opt-in by passing an entropy-derived seed.

use std::collections::VecDeque;

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use thiserror::Error;

use crate::constants::{
    COST_ENCLOSED, COST_OPEN, MIN_ARENA_DIMENSION, MIN_ROOM_EDGE, RANDOM_FLOOR_ATTEMPTS,
};
use crate::grid::{ArenaGrid, CellKind, CostGrid, GridPos};

/// Error type for arena generation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    /// Parameters rejected before generation begins
    #[error("invalid configuration: {detail}")]
    InvalidConfiguration { detail: String },
    /// Generation produced no usable floor region; retry with other parameters
    #[error("degenerate arena: no usable floor region (seed {seed})")]
    DegenerateArena { seed: u64 },
}

/// Tunable generation parameters.
///
/// Defaults give a playable 60x60 arena: 45% fill, four smoothing passes,
/// eight room attempts of size 6..14.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaParams {
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    /// Probability (percent) that an interior cell starts as wall
    pub fill_percent: u32,
    pub smooth_iterations: u32,
    /// Lattice room attempts; carved count may be lower
    pub room_count: u32,
    pub min_room_size: u32,
    pub max_room_size: u32,
    /// World units per cell
    pub tile_size: f32,
}

impl Default for ArenaParams {
    fn default() -> Self {
        Self {
            width: 60,
            height: 60,
            seed: 12345,
            fill_percent: 45,
            smooth_iterations: 4,
            room_count: 8,
            min_room_size: 6,
            max_room_size: 14,
            tile_size: 1.0,
        }
    }
}

impl ArenaParams {
    /// Reject unusable parameter combinations before generation begins
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.width < MIN_ARENA_DIMENSION || self.height < MIN_ARENA_DIMENSION {
            return Err(GenerationError::InvalidConfiguration {
                detail: format!(
                    "arena must be at least {MIN_ARENA_DIMENSION}x{MIN_ARENA_DIMENSION}, got {}x{}",
                    self.width, self.height
                ),
            });
        }
        if self.fill_percent > 100 {
            return Err(GenerationError::InvalidConfiguration {
                detail: format!("fill_percent must be 0..=100, got {}", self.fill_percent),
            });
        }
        if self.min_room_size < MIN_ROOM_EDGE {
            return Err(GenerationError::InvalidConfiguration {
                detail: format!(
                    "min_room_size must be at least {MIN_ROOM_EDGE}, got {}",
                    self.min_room_size
                ),
            });
        }
        if self.min_room_size > self.max_room_size {
            return Err(GenerationError::InvalidConfiguration {
                detail: format!(
                    "min_room_size {} exceeds max_room_size {}",
                    self.min_room_size, self.max_room_size
                ),
            });
        }
        if self.tile_size <= 0.0 {
            return Err(GenerationError::InvalidConfiguration {
                detail: format!("tile_size must be positive, got {}", self.tile_size),
            });
        }
        Ok(())
    }
}

/// Master seed with deterministic per-subsystem stream derivation.
///
/// Subsystems (per-agent AI draws, patrol streams) must not share the
/// generation PRNG, so their seeds are hashed out of the master seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaSeed {
    pub master: u64,
}

impl ArenaSeed {
    pub fn new(master: u64) -> Self {
        Self { master }
    }

    /// Deterministic stream seed from the master seed and a label
    pub fn stream_hash(&self, label: &str) -> u64 {
        let mut hasher = Sha3_256::new();
        hasher.update(self.master.to_le_bytes());
        hasher.update(label.as_bytes());
        let result = hasher.finalize();
        u64::from_le_bytes(result[0..8].try_into().unwrap_or([0; 8]))
    }

    /// Seed for the nth spawned agent's private RNG
    pub fn agent_seed(&self, index: u32) -> u64 {
        let mut hasher = Sha3_256::new();
        hasher.update(self.master.to_le_bytes());
        hasher.update(b"agent");
        hasher.update(index.to_le_bytes());
        let result = hasher.finalize();
        u64::from_le_bytes(result[0..8].try_into().unwrap_or([0; 8]))
    }
}

/// Axis-aligned room rectangle, used only while carving
#[derive(Debug, Clone, Copy)]
struct Room {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl Room {
    fn center(&self) -> GridPos {
        GridPos::new(self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// A generated arena: sealed grid, traversal costs and survey helpers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaLayout {
    pub grid: ArenaGrid,
    pub costs: CostGrid,
    pub tile_size: f32,
    /// Cell count of the surviving floor region
    pub region_size: usize,
    /// Rooms actually carved (lattice attempts may be skipped)
    pub rooms_carved: u32,
    pub seed: u64,
}

impl ArenaLayout {
    /// Nearest floor cell to the arena center, searching outward ring by
    /// ring. `None` cannot happen for a layout that passed generation, but
    /// the query stays total.
    pub fn spawn_cell(&self) -> Option<GridPos> {
        let cx = self.grid.width() as i32 / 2;
        let cy = self.grid.height() as i32 / 2;
        let max_radius = self.grid.width().max(self.grid.height()) as i32;

        for r in 0..=max_radius {
            for dx in -r..=r {
                for dy in -r..=r {
                    // only the outer ring of this radius
                    if dx.abs() != r && dy.abs() != r {
                        continue;
                    }
                    let pos = GridPos::new(cx + dx, cy + dy);
                    if self.grid.is_floor(pos) {
                        return Some(pos);
                    }
                }
            }
        }
        None
    }

    /// Random interior floor cell, or `None` after a bounded number of draws
    pub fn random_floor_cell<R: Rng>(&self, rng: &mut R) -> Option<GridPos> {
        let w = self.grid.width() as i32;
        let h = self.grid.height() as i32;
        for _ in 0..RANDOM_FLOOR_ATTEMPTS {
            let pos = GridPos::new(rng.gen_range(1..w - 1), rng.gen_range(1..h - 1));
            if self.grid.is_floor(pos) {
                return Some(pos);
            }
        }
        None
    }

    /// Tight bounding rectangle (min, max inclusive) of the floor region
    pub fn region_bounds(&self) -> Option<(GridPos, GridPos)> {
        let mut min = GridPos::new(i32::MAX, i32::MAX);
        let mut max = GridPos::new(i32::MIN, i32::MIN);
        let mut any = false;
        for pos in self.grid.positions() {
            if self.grid.is_floor(pos) {
                any = true;
                min.x = min.x.min(pos.x);
                min.y = min.y.min(pos.y);
                max.x = max.x.max(pos.x);
                max.y = max.y.max(pos.y);
            }
        }
        any.then_some((min, max))
    }
}

/// Shared arena resource with a revision counter.
///
/// Regeneration replaces the layout wholesale and bumps the revision;
/// consumers holding cached paths compare revisions and drop stale state.
#[derive(Resource, Debug)]
pub struct ArenaMap {
    pub layout: ArenaLayout,
    pub revision: u64,
}

impl ArenaMap {
    pub fn new(layout: ArenaLayout) -> Self {
        Self {
            layout,
            revision: 1,
        }
    }

    pub fn replace(&mut self, layout: ArenaLayout) {
        self.layout = layout;
        self.revision += 1;
    }
}

/// Generate an arena from validated parameters.
///
/// Deterministic: the same parameters produce a bit-identical grid and cost
/// grid. One PRNG stream drives all phases in a fixed draw order.
pub fn generate(params: &ArenaParams) -> Result<ArenaLayout, GenerationError> {
    params.validate()?;

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(params.seed);
    let mut grid = ArenaGrid::filled(params.width, params.height, CellKind::Wall);

    seed_noise(&mut grid, params, &mut rng);

    for _ in 0..params.smooth_iterations {
        grid = smooth(&grid);
    }

    let rooms = place_rooms(&mut grid, params, &mut rng);
    connect_rooms(&mut grid, &rooms);

    let region_size = keep_largest_region(&mut grid);
    if region_size == 0 {
        return Err(GenerationError::DegenerateArena { seed: params.seed });
    }

    let costs = derive_costs(&grid);

    tracing::info!(
        target: "arena_core::generation",
        width = params.width,
        height = params.height,
        seed = params.seed,
        rooms = rooms.len(),
        region_size,
        "arena generated"
    );

    Ok(ArenaLayout {
        grid,
        costs,
        tile_size: params.tile_size,
        region_size,
        rooms_carved: rooms.len() as u32,
        seed: params.seed,
    })
}

/// Phase 1: border stays wall, interior cells roll against the fill percent
fn seed_noise(grid: &mut ArenaGrid, params: &ArenaParams, rng: &mut Xoshiro256PlusPlus) {
    let w = grid.width() as i32;
    let h = grid.height() as i32;
    for x in 0..w {
        for y in 0..h {
            let pos = GridPos::new(x, y);
            if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
                grid.set(pos, CellKind::Wall);
            } else {
                let roll = rng.gen_range(0..100);
                let kind = if roll < params.fill_percent as i32 {
                    CellKind::Wall
                } else {
                    CellKind::Floor
                };
                grid.set(pos, kind);
            }
        }
    }
}

/// Phase 2: one cellular-automata pass. More than four wall neighbors turns
/// a cell to wall, fewer than four to floor, exactly four leaves it alone.
/// The border is forced back to wall every pass.
fn smooth(grid: &ArenaGrid) -> ArenaGrid {
    let w = grid.width() as i32;
    let h = grid.height() as i32;
    let mut next = ArenaGrid::filled(grid.width(), grid.height(), CellKind::Wall);
    for x in 0..w {
        for y in 0..h {
            let pos = GridPos::new(x, y);
            if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
                continue; // stays wall
            }
            let walls = grid.wall_count_around(pos);
            let kind = if walls > 4 {
                CellKind::Wall
            } else if walls < 4 {
                CellKind::Floor
            } else {
                grid.get(pos).unwrap_or(CellKind::Wall)
            };
            next.set(pos, kind);
        }
    }
    next
}

/// Phase 3: partition the arena into a coarse lattice and attempt one room
/// per lattice cell. Rectangles that cannot fit their cell are skipped
/// without error - coverage is best effort.
fn place_rooms(
    grid: &mut ArenaGrid,
    params: &ArenaParams,
    rng: &mut Xoshiro256PlusPlus,
) -> Vec<Room> {
    let mut rooms = Vec::new();
    if params.room_count == 0 {
        return rooms;
    }

    let w = params.width as i32;
    let h = params.height as i32;
    let attempts = params.room_count as i32;
    let cols = (attempts / 2).clamp(2, attempts.max(2));
    let rows = (attempts / cols).clamp(2, attempts.max(2));
    let cell_w = w / cols;
    let cell_h = h / rows;

    for cx in 0..cols {
        for cy in 0..rows {
            let rw = rng.gen_range(params.min_room_size..=params.max_room_size) as i32;
            let rh = rng.gen_range(params.min_room_size..=params.max_room_size) as i32;

            // random jitter inside the lattice cell, kept off the border
            let min_x = cx * cell_w + 1;
            let min_y = cy * cell_h + 1;
            let max_x = (min_x + cell_w - rw - 2).min(w - rw - 2);
            let max_y = (min_y + cell_h - rh - 2).min(h - rh - 2);

            if max_x <= min_x || max_y <= min_y {
                continue;
            }

            let rx = rng.gen_range(min_x..=max_x);
            let ry = rng.gen_range(min_y..=max_y);
            let room = Room {
                x: rx,
                y: ry,
                width: rw,
                height: rh,
            };
            carve_room(grid, &room);
            rooms.push(room);
        }
    }

    rooms
}

fn carve_room(grid: &mut ArenaGrid, room: &Room) {
    for x in room.x..room.x + room.width {
        for y in room.y..room.y + room.height {
            grid.set(GridPos::new(x, y), CellKind::Floor);
        }
    }
}

/// Phase 4: sort room centers by X and join consecutive centers with
/// L-shaped corridors, guaranteeing a connected backbone
fn connect_rooms(grid: &mut ArenaGrid, rooms: &[Room]) {
    let mut centers: Vec<GridPos> = rooms.iter().map(Room::center).collect();
    centers.sort_by_key(|c| c.x);

    for pair in centers.windows(2) {
        carve_corridor(grid, pair[0], pair[1]);
    }
}

/// Horizontal leg first, then vertical
fn carve_corridor(grid: &mut ArenaGrid, a: GridPos, b: GridPos) {
    let mut current = a;
    while current.x != b.x {
        grid.set(current, CellKind::Floor);
        current.x += if b.x > current.x { 1 } else { -1 };
    }
    while current.y != b.y {
        grid.set(current, CellKind::Floor);
        current.y += if b.y > current.y { 1 } else { -1 };
    }
    grid.set(current, CellKind::Floor);
}

/// Phase 5: 4-connected flood fill labels every floor region; only the
/// largest survives. Returns its size (0 when the arena has no floor).
fn keep_largest_region(grid: &mut ArenaGrid) -> usize {
    let w = grid.width() as i32;
    let h = grid.height() as i32;
    let mut labels = vec![0u32; (w * h) as usize];
    let mut sizes: Vec<usize> = Vec::new();
    let mut next_label = 0u32;

    for x in 0..w {
        for y in 0..h {
            let pos = GridPos::new(x, y);
            let idx = (y * w + x) as usize;
            if !grid.is_floor(pos) || labels[idx] != 0 {
                continue;
            }
            next_label += 1;
            sizes.push(flood_fill(grid, pos, next_label, &mut labels));
        }
    }

    if sizes.is_empty() {
        return 0;
    }

    // first-labeled wins ties, matching the scan order
    let mut largest_label = 1u32;
    let mut largest_size = sizes[0];
    for (i, size) in sizes.iter().enumerate().skip(1) {
        if *size > largest_size {
            largest_size = *size;
            largest_label = i as u32 + 1;
        }
    }

    for x in 0..w {
        for y in 0..h {
            let pos = GridPos::new(x, y);
            let idx = (y * w + x) as usize;
            if grid.is_floor(pos) && labels[idx] != largest_label {
                grid.set(pos, CellKind::Wall);
            }
        }
    }

    largest_size
}

fn flood_fill(grid: &ArenaGrid, start: GridPos, label: u32, labels: &mut [u32]) -> usize {
    let w = grid.width() as i32;
    let mut size = 0;
    let mut queue = VecDeque::new();
    labels[(start.y * w + start.x) as usize] = label;
    queue.push_back(start);

    while let Some(pos) = queue.pop_front() {
        size += 1;
        for (dx, dy) in crate::grid::CARDINAL_DIRS {
            let next = GridPos::new(pos.x + dx, pos.y + dy);
            if !grid.is_floor(next) {
                continue;
            }
            let idx = (next.y * w + next.x) as usize;
            if labels[idx] != 0 {
                continue;
            }
            labels[idx] = label;
            queue.push_back(next);
        }
    }

    size
}

/// Phase 6: floor cost scales linearly with the 8-neighborhood wall count,
/// walls are impassable
fn derive_costs(grid: &ArenaGrid) -> CostGrid {
    let w = grid.width();
    let h = grid.height();
    let mut costs = Vec::with_capacity((w * h) as usize);
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let pos = GridPos::new(x, y);
            let cost = if grid.is_floor(pos) {
                let walls = grid.wall_count_around(pos) as f32;
                COST_OPEN + (COST_ENCLOSED - COST_OPEN) * (walls / 8.0)
            } else {
                f32::INFINITY
            };
            costs.push(cost);
        }
    }
    CostGrid::from_costs(w, h, costs)
}
