//! Centralized behavior constants for the arena core.
//!
//! Eliminates magic numbers duplicated across the FSM, influence map and
//! agent systems. Per-module tunables that callers are expected to override
//! (arena parameters, agent stats, trait weights) live in their own config
//! structs as the single source of truth.

// =====================================================
// Arena
// =====================================================

/// Minimum arena dimension on either axis
pub const MIN_ARENA_DIMENSION: u32 = 50;

/// Smallest legal room edge
pub const MIN_ROOM_EDGE: u32 = 3;

/// Attempts before `random_floor_cell` gives up
pub const RANDOM_FLOOR_ATTEMPTS: u32 = 1000;

/// Floor-cell traversal cost in the most open terrain
pub const COST_OPEN: f32 = 1.0;

/// Floor-cell traversal cost when fully enclosed by walls
pub const COST_ENCLOSED: f32 = 3.0;

// =====================================================
// Tactical FSM
// =====================================================

/// Seconds an agent idles before auto-advancing to Patrol
pub const IDLE_DWELL_SECS: f32 = 2.0;

/// Seconds between Patrol destination re-rolls
pub const PATROL_REROLL_SECS: f32 = 3.0;

/// Seconds between Strafe side flips
pub const STRAFE_SWITCH_SECS: f32 = 2.0;

/// Strafe offset distance as a fraction of attack range
pub const STRAFE_OFFSET_FRACTION: f32 = 0.6;

/// Retreat destination distance (world units) along the away bearing
pub const RETREAT_DISTANCE: f32 = 8.0;

/// Flank offset as a fraction of attack range
pub const FLANK_OFFSET_FRACTION: f32 = 0.7;

/// Radius at which a Flank/TakeCover destination counts as reached
pub const ARRIVE_RADIUS: f32 = 1.0;

/// Target must close within this fraction of attack range to spring an ambush
pub const AMBUSH_SPRING_FRACTION: f32 = 0.6;

/// Per-tick chance of a peek shot while holding cover
pub const PEEK_FIRE_CHANCE: f32 = 0.15;

/// TakeCover must be held this long before leaving to Chase
pub const COVER_LOCK_SECS: f32 = 2.0;

// =====================================================
// Influence Map
// =====================================================

/// Seconds between influence map refreshes (coarser than FSM evaluation)
pub const INFLUENCE_REFRESH_SECS: f32 = 1.0;

/// Danger falloff radius around the target, in cells
pub const DANGER_RADIUS: f32 = 6.0;

/// Width of the border band that scores as cover, in cells
pub const COVER_EDGE_BAND: i32 = 4;

/// Attack-range band half-width as a fraction of preferred range
pub const RANGE_BAND_FRACTION: f32 = 0.2;

/// Half-extent of the window scanned by best-cell queries, in cells
pub const INFLUENCE_WINDOW: i32 = 6;
