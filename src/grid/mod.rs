//! Tile grid model for generated arenas.
//!
//! Cells are either `Wall` or `Floor`. The grid is immutable after
//! generation; everything downstream (pathfinding, influence scoring,
//! line of sight) reads it through this module. A fixed tile size maps
//! cell coordinates onto the world XZ plane and back.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Binary tile classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    Wall,
    Floor,
}

/// Integer cell coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another cell
    pub fn manhattan(&self, other: GridPos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// 4-connected neighbor offsets, in deterministic expansion order
pub const CARDINAL_DIRS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Immutable wall/floor grid produced by arena generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaGrid {
    width: u32,
    height: u32,
    cells: Vec<CellKind>,
}

impl ArenaGrid {
    /// Build a grid filled entirely with the given cell kind
    pub fn filled(width: u32, height: u32, kind: CellKind) -> Self {
        Self {
            width,
            height,
            cells: vec![kind; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn index(&self, pos: GridPos) -> usize {
        (pos.y as u32 * self.width + pos.x as u32) as usize
    }

    /// Cell kind at `pos`, or `None` out of bounds
    pub fn get(&self, pos: GridPos) -> Option<CellKind> {
        if self.in_bounds(pos) {
            Some(self.cells[self.index(pos)])
        } else {
            None
        }
    }

    /// Out-of-bounds counts as wall (the arena is sealed)
    pub fn is_wall(&self, pos: GridPos) -> bool {
        self.get(pos) != Some(CellKind::Floor)
    }

    pub fn is_floor(&self, pos: GridPos) -> bool {
        self.get(pos) == Some(CellKind::Floor)
    }

    pub(crate) fn set(&mut self, pos: GridPos, kind: CellKind) {
        if self.in_bounds(pos) {
            let idx = self.index(pos);
            self.cells[idx] = kind;
        }
    }

    /// Number of wall cells in the 8-neighborhood; off-grid neighbors count
    /// as wall
    pub fn wall_count_around(&self, pos: GridPos) -> u32 {
        let mut count = 0;
        for dx in -1..=1 {
            for dy in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                if self.is_wall(GridPos::new(pos.x + dx, pos.y + dy)) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Iterate all cell positions in row-major order
    pub fn positions(&self) -> impl Iterator<Item = GridPos> + '_ {
        let width = self.width as i32;
        let height = self.height as i32;
        (0..height).flat_map(move |y| (0..width).map(move |x| GridPos::new(x, y)))
    }

    /// Count of floor cells in the whole grid
    pub fn floor_count(&self) -> usize {
        self.cells.iter().filter(|c| **c == CellKind::Floor).count()
    }
}

/// Per-cell traversal cost parallel to an [`ArenaGrid`].
///
/// Walls carry `+inf` (impassable); floor cells carry a cost in
/// `[COST_OPEN, COST_ENCLOSED]` derived from local wall density.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostGrid {
    width: u32,
    height: u32,
    costs: Vec<f32>,
}

impl CostGrid {
    pub(crate) fn from_costs(width: u32, height: u32, costs: Vec<f32>) -> Self {
        Self {
            width,
            height,
            costs,
        }
    }

    /// Cost to enter `pos`; out-of-bounds is `+inf`
    pub fn get(&self, pos: GridPos) -> f32 {
        if pos.x < 0 || pos.y < 0 || pos.x as u32 >= self.width || pos.y as u32 >= self.height {
            return f32::INFINITY;
        }
        self.costs[(pos.y as u32 * self.width + pos.x as u32) as usize]
    }
}

/// Cell center in world space (arena lives on the XZ plane, like the
/// presentation layer expects)
pub fn cell_to_world(pos: GridPos, tile_size: f32) -> Vec3 {
    Vec3::new(pos.x as f32 * tile_size, 0.0, pos.y as f32 * tile_size)
}

/// Nearest cell for a world position, clamped into grid bounds
pub fn world_to_cell(world: Vec3, tile_size: f32, grid: &ArenaGrid) -> GridPos {
    let cx = (world.x / tile_size).round() as i32;
    let cy = (world.z / tile_size).round() as i32;
    GridPos::new(
        cx.clamp(0, grid.width() as i32 - 1),
        cy.clamp(0, grid.height() as i32 - 1),
    )
}

/// Straight-ray visibility between two cells.
///
/// Walks the integer line from `from` to `to` (Bresenham); any wall cell on
/// the way, including the endpoints, blocks sight. This is the grid-backed
/// implementation of the line-of-sight query the FSM consumes; a physics
/// raycast can replace it at the `SightQuery` seam.
pub fn line_of_sight(grid: &ArenaGrid, from: GridPos, to: GridPos) -> bool {
    let mut x = from.x;
    let mut y = from.y;
    let dx = (to.x - from.x).abs();
    let dy = (to.y - from.y).abs();
    let sx = if to.x > from.x { 1 } else { -1 };
    let sy = if to.y > from.y { 1 } else { -1 };
    let mut err = dx - dy;

    loop {
        if grid.is_wall(GridPos::new(x, y)) {
            return false;
        }
        if x == to.x && y == to.y {
            return true;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid(w: u32, h: u32) -> ArenaGrid {
        let mut grid = ArenaGrid::filled(w, h, CellKind::Floor);
        for pos in grid.positions().collect::<Vec<_>>() {
            if pos.x == 0 || pos.y == 0 || pos.x == w as i32 - 1 || pos.y == h as i32 - 1 {
                grid.set(pos, CellKind::Wall);
            }
        }
        grid
    }

    #[test]
    fn test_out_of_bounds_is_wall() {
        let grid = open_grid(10, 10);
        assert!(grid.is_wall(GridPos::new(-1, 5)));
        assert!(grid.is_wall(GridPos::new(10, 5)));
        assert!(grid.is_floor(GridPos::new(5, 5)));
    }

    #[test]
    fn test_wall_count_in_corner() {
        let grid = open_grid(10, 10);
        // (1,1) touches the two border edges: 5 of 8 neighbors are wall
        assert_eq!(grid.wall_count_around(GridPos::new(1, 1)), 5);
        // deep interior cell of an open grid has no wall neighbors
        assert_eq!(grid.wall_count_around(GridPos::new(5, 5)), 0);
    }

    #[test]
    fn test_world_cell_roundtrip() {
        let grid = open_grid(20, 20);
        let pos = GridPos::new(7, 13);
        let world = cell_to_world(pos, 1.0);
        assert_eq!(world_to_cell(world, 1.0, &grid), pos);
    }

    #[test]
    fn test_world_to_cell_clamps() {
        let grid = open_grid(10, 10);
        let far = Vec3::new(500.0, 0.0, -500.0);
        let cell = world_to_cell(far, 1.0, &grid);
        assert_eq!(cell, GridPos::new(9, 0));
    }

    #[test]
    fn test_line_of_sight_open_and_blocked() {
        let mut grid = open_grid(20, 20);
        let a = GridPos::new(2, 10);
        let b = GridPos::new(17, 10);
        assert!(line_of_sight(&grid, a, b), "open row should be visible");

        grid.set(GridPos::new(9, 10), CellKind::Wall);
        assert!(!line_of_sight(&grid, a, b), "wall in the row blocks sight");
    }

    #[test]
    fn test_line_of_sight_diagonal() {
        let grid = open_grid(20, 20);
        assert!(line_of_sight(
            &grid,
            GridPos::new(2, 2),
            GridPos::new(17, 17)
        ));
    }
}
