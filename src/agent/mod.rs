//! Agent composition.
//!
//! A tactical agent is assembled from capabilities instead of a controller
//! hierarchy: health, fire control, the FSM, and a pluggable movement
//! strategy. The strategy turns an FSM destination into the next waypoint;
//! `GridMover` paths over the arena grid, `NavDelegate` hands the
//! destination to an external navigation system unchanged.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ai::{Directive, FsmConfig, SightQuery, TacticalFsm, TacticalState, TickContext};
use crate::generation::{ArenaLayout, ArenaMap};
use crate::grid::{cell_to_world, world_to_cell, GridPos};
use crate::pathfinding::find_path;

/// Hit points
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            return 0.0;
        }
        (self.current / self.max).clamp(0.0, 1.0)
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0.0
    }

    pub fn apply_damage(&mut self, amount: f32) {
        self.current -= amount;
    }
}

/// Static tuning for one agent archetype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    pub max_health: f32,
    pub attack_range: f32,
    pub fire_cooldown: f32,
    pub move_speed: f32,
    pub projectile_speed: f32,
    pub projectile_damage: f32,
    pub re_path_interval: f32,
    pub reach_threshold: f32,
}

impl Default for AgentStats {
    fn default() -> Self {
        Self {
            max_health: 50.0,
            attack_range: 8.0,
            fire_cooldown: 1.25,
            move_speed: 2.5,
            projectile_speed: 12.0,
            projectile_damage: 10.0,
            re_path_interval: 0.5,
            reach_threshold: 0.1,
        }
    }
}

/// A fired projectile intent, consumed by the external combat layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shot {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// Cooldown-gated firing. Firing is a capability layered on top of the
/// state machine, gated by range, cooldown and line of sight.
#[derive(Debug, Clone)]
pub struct FireControl {
    cooldown: f32,
    timer: f32,
}

impl FireControl {
    pub fn new(cooldown: f32) -> Self {
        Self {
            cooldown,
            timer: 0.0,
        }
    }

    /// Runs every tick regardless of FSM state
    pub fn tick(&mut self, dt: f32) {
        self.timer -= dt;
    }

    pub fn ready(&self) -> bool {
        self.timer <= 0.0
    }

    /// Fire at the target if the cooldown has elapsed, the target is in
    /// range and sighted. Resets the cooldown on success.
    pub fn try_fire(
        &mut self,
        origin: Vec3,
        target: Vec3,
        attack_range: f32,
        sighted: bool,
    ) -> Option<Shot> {
        if !self.ready() || !sighted {
            return None;
        }
        let to_target = target - origin;
        if to_target.length_squared() > attack_range * attack_range {
            return None;
        }
        self.timer = self.cooldown;
        Some(Shot {
            origin,
            direction: to_target.normalize_or_zero(),
        })
    }
}

/// Turns an FSM destination into the next waypoint to steer at
pub trait MovementStrategy: Send + Sync {
    /// `revision` is the arena revision the caller observed; strategies
    /// drop cached routes when it changes.
    fn steer(
        &mut self,
        current: Vec3,
        destination: Vec3,
        dt: f32,
        layout: &ArenaLayout,
        revision: u64,
    ) -> Option<Vec3>;
}

/// Grid-pathfinding movement: periodically re-paths to the destination and
/// walks the cached path waypoint by waypoint
pub struct GridMover {
    re_path_interval: f32,
    reach_threshold: f32,
    path: Vec<GridPos>,
    path_index: usize,
    path_timer: f32,
    arena_revision: u64,
}

impl GridMover {
    pub fn new(re_path_interval: f32, reach_threshold: f32) -> Self {
        Self {
            re_path_interval,
            reach_threshold,
            path: Vec::new(),
            path_index: 0,
            // first steer re-paths immediately
            path_timer: 0.0,
            arena_revision: 0,
        }
    }

    pub fn current_path(&self) -> &[GridPos] {
        &self.path
    }
}

impl MovementStrategy for GridMover {
    fn steer(
        &mut self,
        current: Vec3,
        destination: Vec3,
        dt: f32,
        layout: &ArenaLayout,
        revision: u64,
    ) -> Option<Vec3> {
        if revision != self.arena_revision {
            self.arena_revision = revision;
            self.path.clear();
            self.path_index = 0;
            self.path_timer = 0.0;
        }

        self.path_timer -= dt;
        if self.path_timer <= 0.0 {
            let start = world_to_cell(current, layout.tile_size, &layout.grid);
            let goal = world_to_cell(destination, layout.tile_size, &layout.grid);
            if let Ok(path) = find_path(&layout.grid, &layout.costs, start, goal) {
                // skip the cell we are standing on
                self.path_index = 1.min(path.len() - 1);
                self.path = path;
            }
            // on failure the previous path is kept and the query retried
            // next interval
            self.path_timer = self.re_path_interval;
        }

        while let Some(cell) = self.path.get(self.path_index) {
            let waypoint = cell_to_world(*cell, layout.tile_size);
            if flat_distance(current, waypoint) <= self.reach_threshold {
                self.path_index += 1;
                continue;
            }
            return Some(waypoint);
        }
        None
    }
}

/// External-navigation movement: the destination is handed off unchanged
/// for a navigation-mesh agent to resolve
#[derive(Default)]
pub struct NavDelegate {
    last_destination: Option<Vec3>,
}

impl NavDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_destination(&self) -> Option<Vec3> {
        self.last_destination
    }
}

impl MovementStrategy for NavDelegate {
    fn steer(
        &mut self,
        _current: Vec3,
        destination: Vec3,
        _dt: f32,
        _layout: &ArenaLayout,
        _revision: u64,
    ) -> Option<Vec3> {
        self.last_destination = Some(destination);
        Some(destination)
    }
}

/// One autonomous combatant: stats, health, fire control, the FSM and a
/// movement strategy composed together
#[derive(Component)]
pub struct TacticalAgent {
    stats: AgentStats,
    health: Health,
    fire: FireControl,
    fsm: TacticalFsm,
    movement: Box<dyn MovementStrategy>,
    destination: Option<Vec3>,
    arena_revision: u64,
}

impl TacticalAgent {
    pub fn new(
        stats: AgentStats,
        fsm_config: FsmConfig,
        fsm_seed: u64,
        movement: Box<dyn MovementStrategy>,
        map: &ArenaMap,
    ) -> Self {
        let grid = &map.layout.grid;
        Self {
            health: Health::new(stats.max_health),
            fire: FireControl::new(stats.fire_cooldown),
            fsm: TacticalFsm::new(fsm_config, fsm_seed, grid.width(), grid.height()),
            movement,
            destination: None,
            arena_revision: map.revision,
            stats,
        }
    }

    /// Advance the agent by one tick. Returns a shot when the FSM wants to
    /// fire and the fire gates pass.
    pub fn tick(
        &mut self,
        position: Vec3,
        target: Option<Vec3>,
        sight: &dyn SightQuery,
        dt: f32,
        map: &ArenaMap,
    ) -> Option<Shot> {
        if map.revision != self.arena_revision {
            self.arena_revision = map.revision;
            let grid = &map.layout.grid;
            self.fsm.rebuild_for_arena(grid.width(), grid.height());
            self.destination = None;
        }

        self.fire.tick(dt);

        let has_line_of_sight = target
            .map(|t| sight.line_of_sight(position, t))
            .unwrap_or(false);

        let ctx = TickContext {
            agent_pos: position,
            target_pos: target,
            has_line_of_sight,
            attack_range: self.stats.attack_range,
            health_fraction: self.health.fraction(),
            dt,
        };
        let directive: Directive = self.fsm.tick(&ctx, &map.layout);

        self.destination = directive.destination.and_then(|dest| {
            self.movement
                .steer(position, dest, dt, &map.layout, map.revision)
        });

        if directive.fire {
            if let Some(target_pos) = target {
                return self.fire.try_fire(
                    position,
                    target_pos,
                    self.stats.attack_range,
                    has_line_of_sight,
                );
            }
        }
        None
    }

    /// External combat systems report damage here
    pub fn take_damage(&mut self, amount: f32) {
        self.health.apply_damage(amount);
    }

    pub fn state(&self) -> TacticalState {
        self.fsm.state()
    }

    pub fn health_fraction(&self) -> f32 {
        self.health.fraction()
    }

    pub fn is_dead(&self) -> bool {
        self.health.is_dead()
    }

    pub fn stats(&self) -> &AgentStats {
        &self.stats
    }

    /// Waypoint for the external movement executor, `None` to hold
    pub fn destination(&self) -> Option<Vec3> {
        self.destination
    }
}

fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    let d = a - b;
    Vec2::new(d.x, d.z).length()
}
