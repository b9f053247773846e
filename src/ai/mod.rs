//! Tactical enemy AI.
//!
//! A probabilistic hierarchical FSM picks one of ten behavioral states on a
//! fixed evaluation cadence; individual states turn the decision into a
//! movement destination and a fire intent. Position scoring goes through a
//! per-agent influence map. The engine is movement-agnostic: it emits
//! destinations, an external executor moves the body.

pub mod fsm;
pub mod influence;

pub use fsm::{Directive, FsmConfig, TacticalFsm, TacticalTraits, TickContext};
pub use influence::{InfluenceMap, InfluenceWeights};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::grid::{self, ArenaGrid};

/// Behavioral states of the tactical FSM.
///
/// `Dead` is absorbing: it is entered unconditionally when health reaches
/// zero and has no outgoing transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TacticalState {
    #[default]
    Idle,
    Patrol,
    Seek,
    Chase,
    Strafe,
    Retreat,
    TakeCover,
    Ambush,
    Flank,
    Dead,
}

impl TacticalState {
    pub const COUNT: usize = 10;

    /// All states in enum order; the weighted draw walks this sequence
    pub const ALL: [TacticalState; Self::COUNT] = [
        TacticalState::Idle,
        TacticalState::Patrol,
        TacticalState::Seek,
        TacticalState::Chase,
        TacticalState::Strafe,
        TacticalState::Retreat,
        TacticalState::TakeCover,
        TacticalState::Ambush,
        TacticalState::Flank,
        TacticalState::Dead,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Line-of-sight test between two world positions.
///
/// The FSM only consumes the boolean; the default implementation walks the
/// arena grid, and a physics raycast can be substituted at spawn time.
pub trait SightQuery {
    fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool;
}

/// Grid-backed sight test using an integer ray over wall cells
pub struct GridSight<'a> {
    grid: &'a ArenaGrid,
    tile_size: f32,
}

impl<'a> GridSight<'a> {
    pub fn new(grid: &'a ArenaGrid, tile_size: f32) -> Self {
        Self { grid, tile_size }
    }
}

impl SightQuery for GridSight<'_> {
    fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
        let a = grid::world_to_cell(from, self.tile_size, self.grid);
        let b = grid::world_to_cell(to, self.tile_size, self.grid);
        grid::line_of_sight(self.grid, a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellKind, GridPos};

    #[test]
    fn test_state_order_matches_indices() {
        for (i, state) in TacticalState::ALL.iter().enumerate() {
            assert_eq!(state.index(), i);
        }
        assert_eq!(TacticalState::Dead.index(), TacticalState::COUNT - 1);
    }

    #[test]
    fn test_grid_sight_blocked_by_wall() {
        let mut grid = ArenaGrid::filled(10, 10, CellKind::Floor);
        let sight = GridSight::new(&grid, 1.0);
        let a = Vec3::new(1.0, 0.0, 5.0);
        let b = Vec3::new(8.0, 0.0, 5.0);
        assert!(sight.line_of_sight(a, b));

        grid.set(GridPos::new(4, 5), CellKind::Wall);
        let sight = GridSight::new(&grid, 1.0);
        assert!(!sight.line_of_sight(a, b));
    }
}
