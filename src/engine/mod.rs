//! Engine plugin and tick systems.
//!
//! Wires the arena map, the injected primary target and the agent tick loop
//! into a Bevy app. Regeneration is sequenced strictly before agent ticks so
//! no agent ever consumes a half-replaced arena; agents notice the revision
//! bump and drop their cached paths themselves.

pub mod config;

pub use config::CoreConfig;

use bevy::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::agent::{GridMover, TacticalAgent};
use crate::ai::{GridSight, TacticalState};
use crate::generation::{generate, ArenaMap, ArenaParams, ArenaSeed};
use crate::grid::cell_to_world;

pub struct ArenaCorePlugin;

impl Plugin for ArenaCorePlugin {
    fn build(&self, app: &mut App) {
        match generate(&ArenaParams::default()) {
            Ok(layout) => {
                app.insert_resource(ArenaMap::new(layout));
            }
            Err(err) => {
                tracing::error!(target: "arena_core::engine", %err, "initial arena generation failed");
            }
        }

        app.init_resource::<PrimaryTarget>()
            .add_event::<RegenerateArena>()
            .add_event::<ArenaGenerated>()
            .add_event::<ShotFired>()
            .add_event::<AgentDied>()
            .add_systems(
                Update,
                (regenerate_arena, tick_agents, drive_agents).chain(),
            );
    }
}

/// Injected target provider, typically fed with the player position.
/// `None` degrades agents to idle/patrol behavior.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct PrimaryTarget {
    pub position: Option<Vec3>,
}

/// Request a full arena rebuild with the given parameters
#[derive(Event, Debug, Clone)]
pub struct RegenerateArena {
    pub params: ArenaParams,
}

/// Emitted after a successful rebuild
#[derive(Event, Debug, Clone, Copy)]
pub struct ArenaGenerated {
    pub revision: u64,
    pub region_size: usize,
}

/// A projectile intent for the external combat layer to realize
#[derive(Event, Debug, Clone, Copy)]
pub struct ShotFired {
    pub agent: Entity,
    pub origin: Vec3,
    pub direction: Vec3,
    pub speed: f32,
    pub damage: f32,
}

/// Emitted once when an agent's health reaches zero
#[derive(Event, Debug, Clone, Copy)]
pub struct AgentDied {
    pub agent: Entity,
}

/// Spawn `config.agent_count` agents on random floor cells. Spawn positions
/// and per-agent FSM streams derive from the arena seed, so a full setup is
/// reproducible end to end.
pub fn spawn_agents(commands: &mut Commands, map: &ArenaMap, config: &CoreConfig) -> u32 {
    let seed = ArenaSeed::new(map.layout.seed);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed.stream_hash("spawn"));
    let mut spawned = 0;

    for index in 0..config.agent_count {
        let Some(cell) = map.layout.random_floor_cell(&mut rng) else {
            tracing::warn!(target: "arena_core::engine", index, "no free floor cell for agent");
            continue;
        };
        let position = cell_to_world(cell, map.layout.tile_size);
        let stats = config.agent.clone();
        let mover = GridMover::new(stats.re_path_interval, stats.reach_threshold);
        commands.spawn((
            Transform::from_translation(position),
            TacticalAgent::new(
                stats,
                config.fsm.clone(),
                seed.agent_seed(index),
                Box::new(mover),
                map,
            ),
        ));
        spawned += 1;
    }

    tracing::info!(target: "arena_core::engine", spawned, "agents spawned");
    spawned
}

/// Rebuild the arena on request. A failed rebuild keeps the previous map.
pub fn regenerate_arena(
    mut commands: Commands,
    mut requests: EventReader<RegenerateArena>,
    mut map: Option<ResMut<ArenaMap>>,
    mut generated: EventWriter<ArenaGenerated>,
) {
    for request in requests.read() {
        match generate(&request.params) {
            Ok(layout) => {
                let revision = match map.as_mut() {
                    Some(map) => {
                        map.replace(layout);
                        map.revision
                    }
                    None => {
                        let region_size = layout.region_size;
                        commands.insert_resource(ArenaMap::new(layout));
                        generated.send(ArenaGenerated {
                            revision: 1,
                            region_size,
                        });
                        continue;
                    }
                };
                let region_size = map
                    .as_ref()
                    .map(|m| m.layout.region_size)
                    .unwrap_or_default();
                generated.send(ArenaGenerated {
                    revision,
                    region_size,
                });
            }
            Err(err) => {
                tracing::error!(
                    target: "arena_core::engine",
                    %err,
                    "arena regeneration failed, keeping previous map"
                );
            }
        }
    }
}

/// Advance every agent's FSM by one tick and surface shots and deaths
pub fn tick_agents(
    time: Res<Time>,
    map: Option<Res<ArenaMap>>,
    target: Res<PrimaryTarget>,
    mut agents: Query<(Entity, &Transform, &mut TacticalAgent)>,
    mut shots: EventWriter<ShotFired>,
    mut deaths: EventWriter<AgentDied>,
) {
    let Some(map) = map else {
        return;
    };
    let dt = time.delta_secs();
    let sight = GridSight::new(&map.layout.grid, map.layout.tile_size);

    for (entity, transform, mut agent) in &mut agents {
        let was_dead = agent.state() == TacticalState::Dead;
        let shot = agent.tick(transform.translation, target.position, &sight, dt, &map);

        if let Some(shot) = shot {
            shots.send(ShotFired {
                agent: entity,
                origin: shot.origin,
                direction: shot.direction,
                speed: agent.stats().projectile_speed,
                damage: agent.stats().projectile_damage,
            });
        }
        if !was_dead && agent.state() == TacticalState::Dead {
            deaths.send(AgentDied { agent: entity });
        }
    }
}

/// Minimal movement executor: translate agents toward their cached
/// destination. Embedders with physics or a navigation mesh replace this
/// system with their own.
pub fn drive_agents(time: Res<Time>, mut agents: Query<(&mut Transform, &TacticalAgent)>) {
    let dt = time.delta_secs();
    for (mut transform, agent) in &mut agents {
        if agent.state() == TacticalState::Dead {
            continue;
        }
        let Some(destination) = agent.destination() else {
            continue;
        };
        let mut to_goal = destination - transform.translation;
        to_goal.y = 0.0;
        if to_goal.length_squared() < 0.0001 {
            continue;
        }
        let dir = to_goal.normalize();
        let step = agent.stats().move_speed * dt;
        transform.translation += dir * step.min(to_goal.length());
        let look_target = transform.translation + dir;
        transform.look_at(look_target, Vec3::Y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_builds_and_inserts_map() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins).add_plugins(ArenaCorePlugin);
        assert!(app.world().get_resource::<ArenaMap>().is_some());
        assert!(app.world().get_resource::<PrimaryTarget>().is_some());
    }

    #[test]
    fn test_regeneration_bumps_revision() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins).add_plugins(ArenaCorePlugin);

        let before = app.world().resource::<ArenaMap>().revision;
        app.world_mut().send_event(RegenerateArena {
            params: ArenaParams {
                seed: 777,
                ..ArenaParams::default()
            },
        });
        app.update();

        let map = app.world().resource::<ArenaMap>();
        assert_eq!(map.revision, before + 1);
        assert_eq!(map.layout.seed, 777);
    }

    #[test]
    fn test_failed_regeneration_keeps_previous_map() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins).add_plugins(ArenaCorePlugin);

        let before = app.world().resource::<ArenaMap>().revision;
        app.world_mut().send_event(RegenerateArena {
            params: ArenaParams {
                width: 10,
                ..ArenaParams::default()
            },
        });
        app.update();

        let map = app.world().resource::<ArenaMap>();
        assert_eq!(map.revision, before, "invalid params must not replace the map");
    }

    #[test]
    fn test_spawn_agents_places_on_floor() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins).add_plugins(ArenaCorePlugin);

        let config = CoreConfig::default();
        let spawned = {
            let world = app.world_mut();
            let map_layout = world.resource::<ArenaMap>().layout.clone();
            let map = ArenaMap::new(map_layout);
            let mut commands_queue = bevy::ecs::world::CommandQueue::default();
            let mut commands = Commands::new(&mut commands_queue, world);
            let spawned = spawn_agents(&mut commands, &map, &config);
            commands_queue.apply(world);
            spawned
        };
        assert_eq!(spawned, config.agent_count);

        let world = app.world_mut();
        let map = world.resource::<ArenaMap>();
        let grid = map.layout.grid.clone();
        let tile_size = map.layout.tile_size;
        let mut query = world.query::<(&Transform, &TacticalAgent)>();
        let mut count = 0;
        for (transform, _agent) in query.iter(world) {
            let cell = crate::grid::world_to_cell(transform.translation, tile_size, &grid);
            assert!(grid.is_floor(cell), "agents must spawn on floor cells");
            count += 1;
        }
        assert_eq!(count, config.agent_count);
    }
}
