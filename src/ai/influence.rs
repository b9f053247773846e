//! Per-agent influence map.
//!
//! A scalar score per arena cell combining three contributions: danger
//! falloff around the target, a cover bonus near the arena border, and a
//! band at the agent's preferred attack range. Refreshed on its own timer,
//! coarser than the FSM evaluation cadence. Best-cell queries scan a bounded
//! window and return the argmax, first-found winning ties.

use serde::{Deserialize, Serialize};

use crate::constants::{COVER_EDGE_BAND, DANGER_RADIUS, INFLUENCE_REFRESH_SECS, RANGE_BAND_FRACTION};
use crate::grid::{ArenaGrid, GridPos};

/// Per-agent weighting of the three influence contributions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InfluenceWeights {
    pub danger: f32,
    pub cover: f32,
    pub range: f32,
}

impl Default for InfluenceWeights {
    fn default() -> Self {
        Self {
            danger: 1.0,
            cover: 0.5,
            range: 0.8,
        }
    }
}

/// Scalar tactical-desirability grid, same dimensions as the arena.
///
/// Wall cells score negative infinity so they can never win a best-cell
/// query. Recomputed in place; never persisted.
#[derive(Debug, Clone)]
pub struct InfluenceMap {
    width: u32,
    height: u32,
    scores: Vec<f32>,
    weights: InfluenceWeights,
    refresh_timer: f32,
}

impl InfluenceMap {
    pub fn new(width: u32, height: u32, weights: InfluenceWeights) -> Self {
        Self {
            width,
            height,
            scores: vec![f32::NEG_INFINITY; (width * height) as usize],
            weights,
            // first tick refreshes immediately
            refresh_timer: 0.0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Advance the refresh timer; recompute scores when it expires.
    /// `attack_range_cells` is the agent's preferred range in cell units.
    pub fn tick(
        &mut self,
        dt: f32,
        grid: &ArenaGrid,
        target_cell: GridPos,
        attack_range_cells: f32,
    ) {
        self.refresh_timer -= dt;
        if self.refresh_timer > 0.0 {
            return;
        }
        self.refresh_timer = INFLUENCE_REFRESH_SECS;
        self.refresh(grid, target_cell, attack_range_cells);
    }

    /// Recompute every cell score from the current target position
    pub fn refresh(&mut self, grid: &ArenaGrid, target_cell: GridPos, attack_range_cells: f32) {
        let w = self.width as i32;
        let h = self.height as i32;
        let band = attack_range_cells * RANGE_BAND_FRACTION;

        for y in 0..h {
            for x in 0..w {
                let pos = GridPos::new(x, y);
                let idx = (y * w + x) as usize;
                if !grid.is_floor(pos) {
                    self.scores[idx] = f32::NEG_INFINITY;
                    continue;
                }

                let dx = (x - target_cell.x) as f32;
                let dy = (y - target_cell.y) as f32;
                let dist = (dx * dx + dy * dy).sqrt();

                let mut score = 0.0;

                // danger falls off linearly with distance from the target
                if dist < DANGER_RADIUS {
                    score -= self.weights.danger * (1.0 - dist / DANGER_RADIUS);
                }

                // border band as a cover proxy
                let edge_dist = x.min(y).min(w - 1 - x).min(h - 1 - y);
                if edge_dist <= COVER_EDGE_BAND {
                    score += self.weights.cover;
                }

                // sweet spot at the preferred attack range
                if (dist - attack_range_cells).abs() <= band {
                    score += self.weights.range;
                }

                self.scores[idx] = score;
            }
        }
    }

    /// Score at `pos`, negative infinity for walls and out of bounds
    pub fn score(&self, pos: GridPos) -> f32 {
        if pos.x < 0 || pos.y < 0 || pos.x as u32 >= self.width || pos.y as u32 >= self.height {
            return f32::NEG_INFINITY;
        }
        self.scores[(pos.y as u32 * self.width + pos.x as u32) as usize]
    }

    /// Best-scoring floor cell within a square window around `center`.
    ///
    /// Scans row-major; the first cell seen at the top score wins, keeping
    /// the query deterministic. `None` when the window holds no floor cell.
    pub fn best_cell_near(
        &self,
        grid: &ArenaGrid,
        center: GridPos,
        window: i32,
    ) -> Option<GridPos> {
        let mut best: Option<(GridPos, f32)> = None;
        for dy in -window..=window {
            for dx in -window..=window {
                let pos = GridPos::new(center.x + dx, center.y + dy);
                if !grid.is_floor(pos) {
                    continue;
                }
                let score = self.score(pos);
                match best {
                    Some((_, top)) if score <= top => {}
                    _ => best = Some((pos, score)),
                }
            }
        }
        best.map(|(pos, _)| pos)
    }
}
