// Agent pool: spawns exactly `count` pedestrians per configuration, each
// with its own path follower and layer blender, and tears the whole set down
// on every configuration change.
//
// Rebuilds are wholesale. Animation phase and gesture weights do not survive
// an edit; that is the accepted cost of never leaving a stale agent behind.

use std::collections::BTreeMap;

use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::Rng;

use crate::config::AgentConfig;
use crate::engine::components::{Color, MeshRef, Transform};
use crate::engine::host::{MeshDesc, MeshKind, PEDESTRIAN_ASSET, RenderHost};
use crate::scene::blend::{ClipBindings, Layer, LayerBlender};
use crate::scene::locomotion::{Locomotion, LocomotionState};
use crate::scene::path::{PatrolPath, PathFollower};

/// Extents of an unscaled pedestrian, feet at the origin.
pub const PEDESTRIAN_SIZE: Vec3 = Vec3::new(0.6, 1.8, 0.4);
const PEDESTRIAN_COLOR: Color = Color::new(0.25, 0.45, 0.85);

/// Evenly spaced offsets along the spawn axis, centred on zero.
pub fn spawn_offsets(count: u32, spacing: f32) -> Vec<f32> {
    let half_span = count.saturating_sub(1) as f32 * spacing / 2.0;
    (0..count).map(|i| i as f32 * spacing - half_span).collect()
}

/// How agents are placed for one view.
#[derive(Debug, Clone)]
pub struct PoolLayout {
    /// Route walked by moving agents. `None` keeps every agent in place.
    pub path: Option<PatrolPath>,
    /// Where the spawn line is centred when there is no path.
    pub spawn_origin: Vec3,
    /// Distance between neighbouring agents on the spawn line (world X).
    pub spacing: f32,
    /// Heading of agents standing on the spawn line.
    pub facing: f32,
    pub agent_scale: f32,
}

impl Default for PoolLayout {
    fn default() -> Self {
        Self { path: None, spawn_origin: Vec3::ZERO, spacing: 2.0, facing: 0.0, agent_scale: 1.0 }
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Agent {
    pub id: u32,
    /// Pool rebuild that created this agent.
    pub generation: u32,
    /// Lane offset along world X. Walking agents follow the path shifted by it.
    pub spawn_offset: f32,
}

/// Read-only view of one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSnapshot {
    pub id: u32,
    pub generation: u32,
    pub spawn_offset: f32,
    #[cfg(test)]
    pub mesh: crate::engine::host::MeshHandle,
    pub position: Vec3,
    pub heading: f32,
    pub path_progress: f32,
    pub current_segment: usize,
    pub state: Option<LocomotionState>,
    pub animation_weights: BTreeMap<&'static str, f32>,
}

impl AgentSnapshot {
    pub fn weight(&self, layer: Layer) -> f32 {
        self.animation_weights.get(layer.clip_name()).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Default)]
pub struct AgentPool {
    generation: u32,
    next_id: u32,
}

impl AgentPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispose every agent, then spawn `config.count` fresh ones.
    pub fn rebuild<H: RenderHost + ?Sized>(
        &mut self,
        world: &mut World,
        host: &mut H,
        config: &AgentConfig,
        layout: &PoolLayout,
    ) {
        Self::release(world, host);
        self.generation += 1;

        let mut warned = false;
        for offset in spawn_offsets(config.count, layout.spacing) {
            let bindings = self.spawn_agent(world, host, config.state, offset, layout);
            if !warned {
                let missing: Vec<&str> = bindings.missing().map(Layer::clip_name).collect();
                if !missing.is_empty() {
                    log::warn!("pedestrian asset lacks clips {:?}; those layers are skipped", missing);
                }
                warned = true;
            }
        }
        log::info!(
            "agent pool generation {}: {} agents, {:?}",
            self.generation,
            config.count,
            config.state
        );
    }

    fn spawn_agent<H: RenderHost + ?Sized>(
        &mut self,
        world: &mut World,
        host: &mut H,
        state: LocomotionState,
        offset: f32,
        layout: &PoolLayout,
    ) -> ClipBindings {
        let id = self.next_id;
        self.next_id += 1;

        let lane = Vec3::X * offset;
        let follower = PathFollower::default();
        let (anchor, heading) = match &layout.path {
            Some(path) => follower.sample(path),
            None => (layout.spawn_origin, layout.facing),
        };
        let position = anchor + lane;

        let tint = rand::thread_rng().gen_range(0.8..1.0);
        let color = Color::new(PEDESTRIAN_COLOR.r * tint, PEDESTRIAN_COLOR.g * tint, PEDESTRIAN_COLOR.b * tint);
        let desc = MeshDesc {
            kind: MeshKind::Pedestrian,
            position,
            heading,
            size: PEDESTRIAN_SIZE * layout.agent_scale,
            color: color.to_array(),
        };

        let (mesh, bindings) = match host.import_animated_asset(PEDESTRIAN_ASSET, desc) {
            Ok(root) => (root, ClipBindings::resolve(&*host, root)),
            Err(err) => {
                log::warn!("agent {id}: {err}; using an unanimated mesh");
                (host.create_mesh(desc), ClipBindings::default())
            }
        };

        let mut blender = LayerBlender::new(bindings, host);
        let mut locomotion = Locomotion::default();
        locomotion.transition(state, &mut blender, host);

        world.spawn((
            Agent { id, generation: self.generation, spawn_offset: offset },
            Transform { position, heading },
            follower,
            blender,
            locomotion,
            color,
            MeshRef(mesh),
        ));
        bindings
    }

    /// Advance every moving agent along `path`.
    pub fn patrol(world: &mut World, path: Option<&PatrolPath>, dt: f32) {
        let Some(path) = path else {
            return;
        };
        let mut query =
            world.query::<(&Agent, &Locomotion, &mut PathFollower, &mut Transform)>();
        for (agent, locomotion, mut follower, mut transform) in query.iter_mut(world) {
            let speed = locomotion.state().map_or(0.0, LocomotionState::patrol_speed);
            if speed <= 0.0 {
                continue;
            }
            follower.advance(path, speed, dt);
            let (position, heading) = follower.sample(path);
            transform.position = position + Vec3::X * agent.spawn_offset;
            transform.heading = heading;
        }
    }

    /// Route a weight change to every live agent's blender.
    pub fn set_weight(world: &mut World, layer: Layer, value: f32) {
        let mut query = world.query::<&mut LayerBlender>();
        for mut blender in query.iter_mut(world) {
            blender.set_weight(layer, value);
        }
    }

    /// Key down on every live agent.
    pub fn press(world: &mut World, layer: Layer) {
        let mut query = world.query::<&mut LayerBlender>();
        for mut blender in query.iter_mut(world) {
            blender.press(layer);
        }
    }

    /// Key up on every live agent.
    pub fn release_gesture(world: &mut World, layer: Layer) {
        let mut query = world.query::<&mut LayerBlender>();
        for mut blender in query.iter_mut(world) {
            blender.release(layer);
        }
    }

    /// Push blender weights to the animation evaluator.
    pub fn push_weights<H: RenderHost + ?Sized>(world: &mut World, host: &mut H) {
        let mut query = world.query::<&LayerBlender>();
        for blender in query.iter(world) {
            blender.tick(host);
        }
    }

    /// Stop every agent's clips, release its mesh and despawn it.
    pub fn release<H: RenderHost + ?Sized>(world: &mut World, host: &mut H) {
        let mut query = world.query_filtered::<(Entity, &MeshRef), With<Agent>>();
        let doomed: Vec<(Entity, MeshRef)> = query.iter(world).map(|(e, m)| (e, *m)).collect();
        for (entity, mesh) in doomed {
            if let Some(mut blender) = world.get_mut::<LayerBlender>(entity) {
                blender.stop_all(host);
            }
            host.dispose_mesh(mesh.0);
            world.despawn(entity);
        }
    }

    pub fn count(world: &mut World) -> usize {
        world.query::<&Agent>().iter(world).count()
    }

    /// Snapshots of every live agent, ordered by id.
    pub fn agents(world: &mut World) -> Vec<AgentSnapshot> {
        let mut query = world.query::<(
            &Agent,
            &Transform,
            &PathFollower,
            &LayerBlender,
            &Locomotion,
            &MeshRef,
        )>();
        let mut agents: Vec<AgentSnapshot> = query
            .iter(world)
            .map(|(agent, transform, follower, blender, locomotion, _mesh)| AgentSnapshot {
                id: agent.id,
                generation: agent.generation,
                spawn_offset: agent.spawn_offset,
                #[cfg(test)]
                mesh: _mesh.0,
                position: transform.position,
                heading: transform.heading,
                path_progress: follower.progress,
                current_segment: follower.current_segment,
                state: locomotion.state(),
                animation_weights: blender.weights(),
            })
            .collect();
        agents.sort_by_key(|a| a.id);
        agents
    }
}
