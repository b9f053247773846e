//! Weighted A* over the arena floor.
//!
//! Stateless search on the 4-connected floor graph. Step cost is the cost of
//! the cell being entered, so routes bend away from enclosed terrain even
//! when the detour is longer in cells. Expansion order is fully
//! deterministic: ties on priority go to the node enqueued first.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use thiserror::Error;

use crate::grid::{ArenaGrid, CostGrid, GridPos, CARDINAL_DIRS};

/// Error type for path queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    /// No floor route exists between the endpoints
    #[error("no path from ({},{}) to ({},{})", from.x, from.y, to.x, to.y)]
    NotFound { from: GridPos, to: GridPos },
}

/// Heap entry ordered by f-score, then by insertion sequence.
///
/// `BinaryHeap` is a max-heap, so the ordering is inverted: the entry with
/// the lowest f-score (and on ties the lowest sequence number) compares
/// greatest.
#[derive(Debug, Clone, Copy)]
struct OpenNode {
    f: f32,
    seq: u64,
    pos: GridPos,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Find the cheapest route from `start` to `goal`, inclusive of both.
///
/// Movement is 4-connected over floor cells only. Returns
/// [`PathError::NotFound`] when either endpoint is a wall or the endpoints
/// lie in disconnected regions. `start == goal` yields a single-cell path.
pub fn find_path(
    grid: &ArenaGrid,
    costs: &CostGrid,
    start: GridPos,
    goal: GridPos,
) -> Result<Vec<GridPos>, PathError> {
    let not_found = PathError::NotFound {
        from: start,
        to: goal,
    };

    if !grid.is_floor(start) || !grid.is_floor(goal) {
        return Err(not_found);
    }
    if start == goal {
        return Ok(vec![start]);
    }

    let mut open = BinaryHeap::new();
    let mut came_from: HashMap<GridPos, GridPos> = HashMap::new();
    let mut g_score: HashMap<GridPos, f32> = HashMap::new();
    let mut seq = 0u64;

    g_score.insert(start, 0.0);
    open.push(OpenNode {
        f: heuristic(start, goal),
        seq,
        pos: start,
    });

    while let Some(node) = open.pop() {
        let current = node.pos;
        if current == goal {
            return Ok(reconstruct(&came_from, current));
        }

        let current_g = g_score.get(&current).copied().unwrap_or(f32::INFINITY);
        // stale heap entry for a node already improved
        if node.f > current_g + heuristic(current, goal) {
            continue;
        }

        for (dx, dy) in CARDINAL_DIRS {
            let next = GridPos::new(current.x + dx, current.y + dy);
            if !grid.is_floor(next) {
                continue;
            }

            let tentative = current_g + costs.get(next);
            let known = g_score.get(&next).copied().unwrap_or(f32::INFINITY);
            if tentative < known {
                came_from.insert(next, current);
                g_score.insert(next, tentative);
                seq += 1;
                open.push(OpenNode {
                    f: tentative + heuristic(next, goal),
                    seq,
                    pos: next,
                });
            }
        }
    }

    Err(not_found)
}

/// Manhattan distance; admissible because every step costs at least 1
fn heuristic(from: GridPos, to: GridPos) -> f32 {
    from.manhattan(to) as f32
}

fn reconstruct(came_from: &HashMap<GridPos, GridPos>, goal: GridPos) -> Vec<GridPos> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(prev) = came_from.get(&current) {
        current = *prev;
        path.push(current);
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{COST_ENCLOSED, COST_OPEN};
    use crate::grid::CellKind;

    fn grid_from_rows(rows: &[&str]) -> (ArenaGrid, CostGrid) {
        let h = rows.len() as u32;
        let w = rows[0].len() as u32;
        let mut grid = ArenaGrid::filled(w, h, CellKind::Wall);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                if ch == '.' {
                    grid.set(GridPos::new(x as i32, y as i32), CellKind::Floor);
                }
            }
        }
        let mut costs = Vec::new();
        for y in 0..h as i32 {
            for x in 0..w as i32 {
                let pos = GridPos::new(x, y);
                let cost = if grid.is_floor(pos) {
                    COST_OPEN + (COST_ENCLOSED - COST_OPEN) * (grid.wall_count_around(pos) as f32 / 8.0)
                } else {
                    f32::INFINITY
                };
                costs.push(cost);
            }
        }
        (grid, CostGrid::from_costs(w, h, costs))
    }

    fn assert_valid_path(grid: &ArenaGrid, path: &[GridPos], start: GridPos, goal: GridPos) {
        assert_eq!(path.first(), Some(&start), "path must begin at start");
        assert_eq!(path.last(), Some(&goal), "path must end at goal");
        for pair in path.windows(2) {
            assert_eq!(
                pair[0].manhattan(pair[1]),
                1,
                "consecutive cells must be cardinal neighbors"
            );
        }
        for pos in path {
            assert!(grid.is_floor(*pos), "path crosses a wall at {pos:?}");
        }
    }

    #[test]
    fn test_straight_corridor() {
        let (grid, costs) = grid_from_rows(&[
            "#######",
            "#.....#",
            "#######",
        ]);
        let start = GridPos::new(1, 1);
        let goal = GridPos::new(5, 1);
        let path = find_path(&grid, &costs, start, goal).expect("path");
        assert_eq!(path.len(), 5);
        assert_valid_path(&grid, &path, start, goal);
    }

    #[test]
    fn test_routes_around_obstacle() {
        let (grid, costs) = grid_from_rows(&[
            "#######",
            "#.....#",
            "#.###.#",
            "#.....#",
            "#######",
        ]);
        let start = GridPos::new(1, 2);
        let goal = GridPos::new(5, 2);
        let path = find_path(&grid, &costs, start, goal).expect("path");
        assert_valid_path(&grid, &path, start, goal);
        assert!(path.len() > 5, "must detour around the wall block");
    }

    #[test]
    fn test_no_path_between_regions() {
        let (grid, costs) = grid_from_rows(&[
            "#######",
            "#..#..#",
            "#..#..#",
            "#######",
        ]);
        let result = find_path(&grid, &costs, GridPos::new(1, 1), GridPos::new(5, 1));
        assert_eq!(
            result,
            Err(PathError::NotFound {
                from: GridPos::new(1, 1),
                to: GridPos::new(5, 1),
            })
        );
    }

    #[test]
    fn test_wall_endpoint_is_not_found() {
        let (grid, costs) = grid_from_rows(&[
            "#####",
            "#...#",
            "#####",
        ]);
        assert!(find_path(&grid, &costs, GridPos::new(0, 0), GridPos::new(3, 1)).is_err());
        assert!(find_path(&grid, &costs, GridPos::new(1, 1), GridPos::new(4, 1)).is_err());
    }

    #[test]
    fn test_start_equals_goal() {
        let (grid, costs) = grid_from_rows(&[
            "#####",
            "#...#",
            "#####",
        ]);
        let pos = GridPos::new(2, 1);
        assert_eq!(find_path(&grid, &costs, pos, pos), Ok(vec![pos]));
    }

    #[test]
    fn test_prefers_open_terrain() {
        // Two routes of equal length: the top row hugs walls on both sides,
        // the middle area is open. Weighted search must pick the open route.
        let (grid, costs) = grid_from_rows(&[
            "#########",
            "#.......#",
            "#.#####.#",
            "#.......#",
            "#.......#",
            "#.......#",
            "#########",
        ]);
        let start = GridPos::new(1, 3);
        let goal = GridPos::new(7, 3);
        let path = find_path(&grid, &costs, start, goal).expect("path");
        assert_valid_path(&grid, &path, start, goal);
        assert!(
            path.iter().all(|p| p.y >= 3),
            "route should stay in the open lower half, got {path:?}"
        );
    }

    #[test]
    fn test_deterministic_result() {
        let (grid, costs) = grid_from_rows(&[
            "########",
            "#......#",
            "#......#",
            "#......#",
            "########",
        ]);
        let start = GridPos::new(1, 1);
        let goal = GridPos::new(6, 3);
        let a = find_path(&grid, &costs, start, goal).expect("path");
        let b = find_path(&grid, &costs, start, goal).expect("path");
        assert_eq!(a, b, "repeat queries must return the identical path");
    }
}
