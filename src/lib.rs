//! Combat Arena - Procedural Core Library
//!
//! This crate provides the deterministic game logic for tile-based combat
//! arenas:
//! - Procedural arena generation (seeded noise, cellular automata, rooms,
//!   corridors, region pruning, traversal costs)
//! - Weighted grid pathfinding (A* over the floor cost grid)
//! - Tactical enemy AI (probabilistic hierarchical FSM + influence map)
//! - Agent composition (health, firing, pluggable movement strategies)
//! - Engine plugin wiring the above into a tick loop
//!
//! Rendering, input, physics resolution and navigation-mesh baking are
//! external collaborators; the core only emits destinations and events.

pub mod agent;
pub mod ai;
pub mod constants;
pub mod engine;
pub mod generation;
pub mod grid;
pub mod logging;
pub mod pathfinding;
