//! Probabilistic hierarchical state machine for one tactical agent.
//!
//! Every tick executes the current state's behavior (destination selection
//! and fire intent). Which state to be in is re-scored only on the
//! evaluation cadence, and only after the current state has been held for a
//! minimum time. Scoring builds a probability mass over all states from the
//! agent's health band and personality traits, applies distance and
//! line-of-sight modifiers, normalizes, and makes a weighted-random draw.
//! The draw is then filtered through a per-source whitelist before it can
//! take effect.
//!
//! The PRNG is injected and seedable, so tests can fix the draw sequence.

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::{InfluenceMap, InfluenceWeights, TacticalState};
use crate::constants::{
    AMBUSH_SPRING_FRACTION, ARRIVE_RADIUS, COVER_LOCK_SECS, FLANK_OFFSET_FRACTION,
    IDLE_DWELL_SECS, INFLUENCE_WINDOW, PATROL_REROLL_SECS, PEEK_FIRE_CHANCE, RETREAT_DISTANCE,
    STRAFE_OFFSET_FRACTION, STRAFE_SWITCH_SECS,
};
use crate::generation::ArenaLayout;
use crate::grid::{cell_to_world, world_to_cell};

/// Personality weights scaling the state probability tables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TacticalTraits {
    pub aggressiveness: f32,
    pub cautiousness: f32,
    pub teamwork: f32,
}

impl Default for TacticalTraits {
    fn default() -> Self {
        Self {
            aggressiveness: 0.7,
            cautiousness: 0.5,
            teamwork: 0.3,
        }
    }
}

/// FSM tuning knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsmConfig {
    pub traits: TacticalTraits,
    /// Below this health fraction the defensive profile applies
    pub retreat_health_percent: f32,
    /// Above this health fraction the aggressive profile applies
    pub aggressive_health_percent: f32,
    /// Seconds between state re-evaluations
    pub state_evaluation_interval: f32,
    /// A state must be held at least this long before any transition
    pub min_state_time: f32,
    pub influence: InfluenceWeights,
}

impl Default for FsmConfig {
    fn default() -> Self {
        Self {
            traits: TacticalTraits::default(),
            retreat_health_percent: 0.3,
            aggressive_health_percent: 0.7,
            state_evaluation_interval: 0.5,
            min_state_time: 1.0,
            influence: InfluenceWeights::default(),
        }
    }
}

/// Situational inputs for one tick, assembled by the owning agent
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub agent_pos: Vec3,
    /// Current target position, `None` when the target is unavailable
    pub target_pos: Option<Vec3>,
    pub has_line_of_sight: bool,
    pub attack_range: f32,
    /// Current health over max health
    pub health_fraction: f32,
    pub dt: f32,
}

/// What the FSM wants this tick: where to move and whether to fire.
/// `destination: None` means hold position.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Directive {
    pub destination: Option<Vec3>,
    pub fire: bool,
}

/// The per-agent state machine. Owns its influence map and PRNG stream.
pub struct TacticalFsm {
    config: FsmConfig,
    rng: Xoshiro256PlusPlus,
    current: TacticalState,
    previous: TacticalState,
    state_timer: f32,
    evaluation_timer: f32,
    probabilities: [f32; TacticalState::COUNT],
    last_known_target: Option<Vec3>,
    influence: InfluenceMap,
    /// Pre-computed point for cover/ambush/flank, set by enter hooks
    planned_point: Option<Vec3>,
    patrol_goal: Option<Vec3>,
    patrol_timer: f32,
    strafe_timer: f32,
    strafe_side: f32,
}

impl TacticalFsm {
    pub fn new(config: FsmConfig, seed: u64, arena_width: u32, arena_height: u32) -> Self {
        let influence = InfluenceMap::new(arena_width, arena_height, config.influence);
        Self {
            config,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            current: TacticalState::Idle,
            previous: TacticalState::Idle,
            state_timer: 0.0,
            evaluation_timer: 0.0,
            probabilities: [0.0; TacticalState::COUNT],
            last_known_target: None,
            influence,
            planned_point: None,
            patrol_goal: None,
            patrol_timer: 0.0,
            strafe_timer: 0.0,
            strafe_side: 1.0,
        }
    }

    pub fn state(&self) -> TacticalState {
        self.current
    }

    pub fn previous_state(&self) -> TacticalState {
        self.previous
    }

    pub fn probabilities(&self) -> &[f32; TacticalState::COUNT] {
        &self.probabilities
    }

    pub fn last_known_target(&self) -> Option<Vec3> {
        self.last_known_target
    }

    /// Drop arena-shaped caches after a regeneration
    pub fn rebuild_for_arena(&mut self, arena_width: u32, arena_height: u32) {
        self.influence = InfluenceMap::new(arena_width, arena_height, self.config.influence);
        self.planned_point = None;
        self.patrol_goal = None;
        self.last_known_target = None;
    }

    /// Advance the machine by one tick.
    ///
    /// Health at or below zero forces `Dead` immediately, overriding
    /// everything else; `Dead` has no outgoing transitions.
    pub fn tick(&mut self, ctx: &TickContext, layout: &ArenaLayout) -> Directive {
        if ctx.health_fraction <= 0.0 {
            if self.current != TacticalState::Dead {
                self.apply_transition(TacticalState::Dead, ctx, layout);
            }
            return Directive::default();
        }
        if self.current == TacticalState::Dead {
            return Directive::default();
        }

        self.state_timer += ctx.dt;
        self.evaluation_timer += ctx.dt;

        if self.has_sighted_target(ctx) {
            self.last_known_target = ctx.target_pos;
        }

        if let Some(target) = ctx.target_pos {
            let target_cell = world_to_cell(target, layout.tile_size, &layout.grid);
            self.influence.tick(
                ctx.dt,
                &layout.grid,
                target_cell,
                ctx.attack_range / layout.tile_size,
            );
        }

        if self.evaluation_timer >= self.config.state_evaluation_interval {
            self.evaluation_timer = 0.0;
            self.evaluate(ctx, layout);
        }

        self.execute(ctx, layout)
    }

    fn has_sighted_target(&self, ctx: &TickContext) -> bool {
        ctx.has_line_of_sight && ctx.target_pos.is_some()
    }

    /// One evaluation cycle: score, draw, filter, transition
    fn evaluate(&mut self, ctx: &TickContext, layout: &ArenaLayout) {
        if self.state_timer < self.config.min_state_time {
            return;
        }

        self.compute_probabilities(ctx);
        let candidate = self.select_state();
        if candidate != self.current && self.can_transition(self.current, candidate) {
            self.apply_transition(candidate, ctx, layout);
        }
    }

    /// Build the probability mass over all states for this cycle.
    ///
    /// Health band picks one of three weighting profiles; distance and
    /// line-of-sight apply multiplicative adjustments on top; the result is
    /// normalized to sum to 1 (or left all-zero).
    fn compute_probabilities(&mut self, ctx: &TickContext) {
        self.probabilities = [0.0; TacticalState::COUNT];

        let Some(target) = ctx.target_pos else {
            // no target, wander
            self.set_probability(TacticalState::Idle, 0.3);
            self.set_probability(TacticalState::Patrol, 0.7);
            return;
        };

        let traits = self.config.traits;
        let health = ctx.health_fraction;
        let distance = flat_distance(ctx.agent_pos, target);

        if health < self.config.retreat_health_percent {
            // defensive profile
            self.set_probability(TacticalState::Retreat, 0.4 * traits.cautiousness);
            self.set_probability(TacticalState::TakeCover, 0.3 * traits.cautiousness);
            self.set_probability(TacticalState::Strafe, 0.2);
            self.set_probability(TacticalState::Chase, 0.1 * (1.0 - traits.cautiousness));
        } else if health > self.config.aggressive_health_percent {
            // aggressive profile
            self.set_probability(TacticalState::Chase, 0.4 * traits.aggressiveness);
            self.set_probability(
                TacticalState::Flank,
                0.2 * traits.aggressiveness * traits.teamwork,
            );
            self.set_probability(TacticalState::Strafe, 0.2);
            self.set_probability(TacticalState::Ambush, 0.1 * (1.0 - traits.aggressiveness));
            self.set_probability(TacticalState::TakeCover, 0.1 * traits.cautiousness);
        } else {
            // balanced profile
            self.set_probability(TacticalState::Chase, 0.3 * traits.aggressiveness);
            self.set_probability(TacticalState::Strafe, 0.3);
            self.set_probability(TacticalState::TakeCover, 0.2 * traits.cautiousness);
            self.set_probability(TacticalState::Retreat, 0.1 * traits.cautiousness);
            self.set_probability(TacticalState::Flank, 0.1 * traits.teamwork);
        }

        if distance < ctx.attack_range * 0.5 {
            // too close
            self.scale_probability(TacticalState::Retreat, 1.5);
            self.scale_probability(TacticalState::Strafe, 1.3);
            self.scale_probability(TacticalState::Chase, 0.5);
        } else if distance > ctx.attack_range * 1.5 {
            // too far
            self.scale_probability(TacticalState::Chase, 1.5);
            self.scale_probability(TacticalState::Seek, 1.2);
            self.scale_probability(TacticalState::Strafe, 0.7);
        }

        if !ctx.has_line_of_sight {
            self.scale_probability(TacticalState::Seek, 2.0);
            self.scale_probability(TacticalState::Ambush, 1.5);
            self.scale_probability(TacticalState::Strafe, 0.3);
        }

        self.normalize_probabilities();
    }

    fn set_probability(&mut self, state: TacticalState, value: f32) {
        self.probabilities[state.index()] = value.clamp(0.0, 1.0);
    }

    fn scale_probability(&mut self, state: TacticalState, factor: f32) {
        self.probabilities[state.index()] *= factor;
    }

    fn normalize_probabilities(&mut self) {
        let sum: f32 = self.probabilities.iter().sum();
        if sum > 0.0 {
            for p in &mut self.probabilities {
                *p /= sum;
            }
        }
    }

    /// Weighted-random draw over the normalized mass, walking states in
    /// enum order; an all-zero mass keeps the current state
    fn select_state(&mut self) -> TacticalState {
        let draw: f32 = self.rng.gen();
        let mut cumulative = 0.0;
        for state in TacticalState::ALL {
            cumulative += self.probabilities[state.index()];
            if draw <= cumulative {
                return state;
            }
        }
        self.current
    }

    /// Per-source whitelist filtering the drawn candidate. A rejected
    /// candidate is simply dropped; the machine retries next cycle.
    fn can_transition(&self, from: TacticalState, to: TacticalState) -> bool {
        match from {
            TacticalState::Dead => false,
            TacticalState::Idle => true,
            // ambushing requires concealment, patrolling is overt
            TacticalState::Patrol => to != TacticalState::Ambush,
            TacticalState::Chase => to != TacticalState::Idle && to != TacticalState::Patrol,
            // no counter-attack straight out of a retreat
            TacticalState::Retreat => {
                to != TacticalState::Chase && to != TacticalState::Flank
            }
            // cover must be held briefly before charging out
            TacticalState::TakeCover => {
                to != TacticalState::Chase || self.state_timer > COVER_LOCK_SECS
            }
            _ => true,
        }
    }

    fn apply_transition(&mut self, new_state: TacticalState, ctx: &TickContext, layout: &ArenaLayout) {
        if new_state == self.current {
            return;
        }
        self.on_exit(self.current);
        self.previous = self.current;
        self.current = new_state;
        self.state_timer = 0.0;
        self.on_enter(new_state, ctx, layout);

        tracing::debug!(
            target: "arena_core::ai",
            from = ?self.previous,
            to = ?new_state,
            "state transition"
        );
    }

    fn on_exit(&mut self, state: TacticalState) {
        match state {
            TacticalState::TakeCover | TacticalState::Ambush | TacticalState::Flank => {
                self.planned_point = None;
            }
            _ => {}
        }
    }

    /// Enter hooks pre-compute the target point states will move toward
    fn on_enter(&mut self, state: TacticalState, ctx: &TickContext, layout: &ArenaLayout) {
        match state {
            TacticalState::Patrol => {
                self.patrol_goal = None;
                self.patrol_timer = 0.0;
            }
            TacticalState::Strafe => {
                self.strafe_timer = 0.0;
                self.strafe_side = if self.rng.gen::<f32>() > 0.5 { 1.0 } else { -1.0 };
            }
            TacticalState::TakeCover => {
                let agent_cell = world_to_cell(ctx.agent_pos, layout.tile_size, &layout.grid);
                self.planned_point = self
                    .influence
                    .best_cell_near(&layout.grid, agent_cell, INFLUENCE_WINDOW)
                    .map(|cell| cell_to_world(cell, layout.tile_size));
            }
            TacticalState::Ambush => {
                if let Some(target) = ctx.target_pos {
                    let midpoint = (ctx.agent_pos + target) * 0.5;
                    let mid_cell = world_to_cell(midpoint, layout.tile_size, &layout.grid);
                    self.planned_point = self
                        .influence
                        .best_cell_near(&layout.grid, mid_cell, INFLUENCE_WINDOW)
                        .map(|cell| cell_to_world(cell, layout.tile_size));
                }
            }
            TacticalState::Flank => {
                if let Some(target) = ctx.target_pos {
                    let to_target = flatten(target - ctx.agent_pos).normalize_or_zero();
                    let right = Vec3::Y.cross(to_target);
                    let side = if self.rng.gen::<f32>() > 0.5 { 1.0 } else { -1.0 };
                    self.planned_point =
                        Some(target + right * (side * ctx.attack_range * FLANK_OFFSET_FRACTION));
                }
            }
            _ => {}
        }
    }

    /// Behavior of the current state for this tick
    fn execute(&mut self, ctx: &TickContext, layout: &ArenaLayout) -> Directive {
        match self.current {
            TacticalState::Idle => {
                if self.state_timer >= IDLE_DWELL_SECS {
                    self.apply_transition(TacticalState::Patrol, ctx, layout);
                }
                Directive::default()
            }
            TacticalState::Patrol => {
                self.patrol_timer -= ctx.dt;
                if self.patrol_goal.is_none() || self.patrol_timer <= 0.0 {
                    self.patrol_goal = layout
                        .random_floor_cell(&mut self.rng)
                        .map(|cell| cell_to_world(cell, layout.tile_size));
                    self.patrol_timer = PATROL_REROLL_SECS;
                }
                Directive {
                    destination: self.patrol_goal,
                    fire: false,
                }
            }
            TacticalState::Seek => {
                if self.has_sighted_target(ctx) {
                    self.apply_transition(TacticalState::Chase, ctx, layout);
                    return self.execute_chase(ctx, layout);
                }
                Directive {
                    destination: self.last_known_target,
                    fire: false,
                }
            }
            TacticalState::Chase => self.execute_chase(ctx, layout),
            TacticalState::Strafe => {
                let Some(target) = ctx.target_pos else {
                    return Directive::default();
                };
                self.strafe_timer += ctx.dt;
                if self.strafe_timer >= STRAFE_SWITCH_SECS {
                    self.strafe_timer = 0.0;
                    self.strafe_side = -self.strafe_side;
                }
                let to_target = flatten(target - ctx.agent_pos).normalize_or_zero();
                let right = Vec3::Y.cross(to_target);
                let offset = right * (self.strafe_side * ctx.attack_range * STRAFE_OFFSET_FRACTION);
                Directive {
                    destination: Some(ctx.agent_pos + offset),
                    fire: true,
                }
            }
            TacticalState::Retreat => {
                let Some(target) = ctx.target_pos else {
                    return Directive::default();
                };
                let away = flatten(ctx.agent_pos - target).normalize_or_zero();
                Directive {
                    destination: Some(ctx.agent_pos + away * RETREAT_DISTANCE),
                    fire: false,
                }
            }
            TacticalState::TakeCover => {
                if let Some(point) = self.planned_point {
                    if flat_distance(ctx.agent_pos, point) > ARRIVE_RADIUS {
                        return Directive {
                            destination: Some(point),
                            fire: false,
                        };
                    }
                }
                // in position: hold, peek and shoot opportunistically
                let fire =
                    self.has_sighted_target(ctx) && self.rng.gen::<f32>() < PEEK_FIRE_CHANCE;
                Directive {
                    destination: None,
                    fire,
                }
            }
            TacticalState::Ambush => {
                if let Some(target) = ctx.target_pos {
                    let distance = flat_distance(ctx.agent_pos, target);
                    if ctx.has_line_of_sight
                        && distance < ctx.attack_range * AMBUSH_SPRING_FRACTION
                    {
                        // spring the ambush
                        self.apply_transition(TacticalState::Chase, ctx, layout);
                        return Directive {
                            destination: None,
                            fire: true,
                        };
                    }
                }
                if let Some(point) = self.planned_point {
                    if flat_distance(ctx.agent_pos, point) > ARRIVE_RADIUS {
                        return Directive {
                            destination: Some(point),
                            fire: false,
                        };
                    }
                }
                Directive::default()
            }
            TacticalState::Flank => {
                if let Some(point) = self.planned_point {
                    if flat_distance(ctx.agent_pos, point) <= ARRIVE_RADIUS {
                        self.apply_transition(TacticalState::Chase, ctx, layout);
                        return self.execute_chase(ctx, layout);
                    }
                    return Directive {
                        destination: Some(point),
                        fire: false,
                    };
                }
                Directive::default()
            }
            TacticalState::Dead => Directive::default(),
        }
    }

    /// Move toward a tactically scored cell near the target, firing
    fn execute_chase(&mut self, ctx: &TickContext, layout: &ArenaLayout) -> Directive {
        let Some(target) = ctx.target_pos else {
            return Directive::default();
        };
        let target_cell = world_to_cell(target, layout.tile_size, &layout.grid);
        let destination = self
            .influence
            .best_cell_near(&layout.grid, target_cell, INFLUENCE_WINDOW)
            .map(|cell| cell_to_world(cell, layout.tile_size));
        Directive {
            destination,
            fire: true,
        }
    }

    #[cfg(test)]
    fn force_state(&mut self, state: TacticalState) {
        self.previous = self.current;
        self.current = state;
        self.state_timer = 0.0;
    }
}

fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    flatten(a - b).length()
}
