// Scene controller: sole owner of one view's world, agent pool and conveyor.
//
// Input handlers and UI panels never touch the controller directly. They hold
// a `ControlSender` and post messages that are drained at the start of the
// next tick. Dropping or disposing the controller closes the channel, so no
// late input can reach a torn-down scene.

use bevy_ecs::prelude::*;
use flume::{Receiver, Sender};
use glam::{Vec2, Vec3};

use crate::config::SceneConfig;
use crate::engine::camera::Ray;
use crate::engine::components::Transform;
use crate::engine::host::{MeshDesc, MeshHandle, MeshKind, RenderHost};
use crate::engine::systems::sync_meshes_system;
use crate::scene::blend::Layer;
use crate::scene::conveyor::{Conveyor, ConveyorLayout};
use crate::scene::path::PatrolPath;
use crate::scene::pool::{Agent, AgentPool, AgentSnapshot, PEDESTRIAN_SIZE, PoolLayout};

const GROUND_COLOR: [f32; 3] = [0.32, 0.36, 0.3];

// ============================================================================
// LAYOUT
// ============================================================================

/// Static arrangement of one view.
#[derive(Debug, Clone)]
pub struct SceneLayout {
    /// Ground plane extents on X/Z, if the view has one.
    pub ground: Option<Vec2>,
    pub conveyor: Option<ConveyorLayout>,
    /// `None` keeps the view free of pedestrians whatever the config says.
    pub agents: Option<PoolLayout>,
}

impl SceneLayout {
    /// Belt plus agents patrolling a 40 x 50 rectangle around it.
    pub fn main() -> Self {
        let conveyor = ConveyorLayout::default();
        let path = PatrolPath::rectangle(Vec3::new(conveyor.lane_x, 0.0, 0.0), 40.0, 50.0).ok();
        Self {
            ground: Some(Vec2::new(120.0, 120.0)),
            conveyor: Some(conveyor),
            agents: Some(PoolLayout { path, spacing: 3.0, agent_scale: 1.5, ..PoolLayout::default() }),
        }
    }

    /// Agents standing in a line facing the camera, no belt.
    pub fn pedestrian_preview() -> Self {
        Self {
            ground: Some(Vec2::new(30.0, 30.0)),
            conveyor: None,
            agents: Some(PoolLayout {
                path: None,
                spawn_origin: Vec3::ZERO,
                spacing: 1.5,
                facing: std::f32::consts::FRAC_PI_2,
                agent_scale: 1.0,
            }),
        }
    }

    /// The belt on its own, centred on the origin and sized to its boxes.
    pub fn conveyor_preview() -> Self {
        Self {
            ground: Some(Vec2::new(60.0, 60.0)),
            conveyor: Some(ConveyorLayout { lane_x: 0.0, fit_to_boxes: true, ..ConveyorLayout::default() }),
            agents: None,
        }
    }
}

// ============================================================================
// MESSAGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlMsg {
    Config(SceneConfig),
    Press(Layer),
    Release(Layer),
    Weight(Layer, f32),
}

/// Cloneable handle for posting input to a controller.
#[derive(Debug, Clone)]
pub struct ControlSender(Sender<ControlMsg>);

impl ControlSender {
    pub fn send(&self, msg: ControlMsg) {
        if let Err(flume::SendError(msg)) = self.0.send(msg) {
            log::debug!("scene already disposed, dropping {msg:?}");
        }
    }

    pub fn press(&self, layer: Layer) {
        self.send(ControlMsg::Press(layer));
    }

    pub fn release(&self, layer: Layer) {
        self.send(ControlMsg::Release(layer));
    }

    pub fn set_weight(&self, layer: Layer, value: f32) {
        self.send(ControlMsg::Weight(layer, value));
    }

    pub fn config(&self, config: SceneConfig) {
        self.send(ControlMsg::Config(config));
    }
}

/// What a pointer click landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickTarget {
    Conveyor,
    Pedestrian(u32),
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct SceneController {
    world: World,
    layout: SceneLayout,
    pool: AgentPool,
    conveyor: Option<Conveyor>,
    /// Last configuration applied to the scene.
    applied: Option<SceneConfig>,
    inbox: Receiver<ControlMsg>,
    outbox: Sender<ControlMsg>,
    /// Ground mesh, if the view has one.
    ground: Option<MeshHandle>,
}

impl SceneController {
    /// Build the ground of `layout`. The belt, its boxes and the agents
    /// appear on the first tick after a `Config` message.
    pub fn new<H: RenderHost + ?Sized>(layout: SceneLayout, host: &mut H) -> Self {
        let ground = layout.ground.map(|size| {
            host.create_mesh(MeshDesc::new(
                MeshKind::Ground,
                Vec3::new(0.0, -0.05, 0.0),
                Vec3::new(size.x, 0.1, size.y),
                GROUND_COLOR,
            ))
        });

        let (outbox, inbox) = flume::unbounded();
        Self {
            world: World::new(),
            conveyor: layout.conveyor.map(Conveyor::new),
            layout,
            pool: AgentPool::new(),
            applied: None,
            inbox,
            outbox,
            ground,
        }
    }

    pub fn sender(&self) -> ControlSender {
        ControlSender(self.outbox.clone())
    }

    /// One frame: drain input, apply the latest config, move everything and
    /// push the result to the host.
    pub fn tick<H: RenderHost + ?Sized>(&mut self, dt: f32, host: &mut H) {
        let mut latest = None;
        for msg in self.inbox.drain() {
            match msg {
                ControlMsg::Config(config) => latest = Some(config),
                ControlMsg::Press(layer) => AgentPool::press(&mut self.world, layer),
                ControlMsg::Release(layer) => AgentPool::release_gesture(&mut self.world, layer),
                ControlMsg::Weight(layer, value) => AgentPool::set_weight(&mut self.world, layer, value),
            }
        }
        if let Some(config) = latest {
            self.apply_config(config, host);
        }

        if let Some(conveyor) = &self.conveyor {
            conveyor.advance(&mut self.world, dt);
        }
        let path = self.layout.agents.as_ref().and_then(|a| a.path.as_ref());
        AgentPool::patrol(&mut self.world, path, dt);
        AgentPool::push_weights(&mut self.world, host);
        sync_meshes_system(&mut self.world, host);
    }

    fn apply_config<H: RenderHost + ?Sized>(&mut self, config: SceneConfig, host: &mut H) {
        if self.applied == Some(config) {
            return;
        }
        if let Some(conveyor) = &mut self.conveyor {
            conveyor.apply(&mut self.world, host, &config.conveyor());
        }
        if let Some(agents) = &self.layout.agents {
            if self.applied.map(|c| c.pedestrian) != Some(config.pedestrian) {
                self.pool.rebuild(&mut self.world, host, &config.pedestrian, agents);
            }
        }
        self.applied = Some(config);
    }

    pub fn agent_count(&mut self) -> usize {
        AgentPool::count(&mut self.world)
    }

    pub fn box_count(&mut self) -> usize {
        Conveyor::box_count(&mut self.world)
    }

    pub fn agents(&mut self) -> Vec<AgentSnapshot> {
        AgentPool::agents(&mut self.world)
    }

    /// Snapshot of the oldest live agent. Every agent receives the same
    /// gesture input, so its weights stand for the whole pool.
    pub fn lead_agent(&mut self) -> Option<AgentSnapshot> {
        self.agents().into_iter().next()
    }

    /// Closest pedestrian or belt under `ray`.
    pub fn pick(&mut self, ray: Ray) -> Option<PickTarget> {
        let mut best: Option<(f32, PickTarget)> = None;
        let mut consider = |hit: Option<f32>, target: PickTarget| {
            if let Some(t) = hit {
                if best.is_none_or(|(closest, _)| t < closest) {
                    best = Some((t, target));
                }
            }
        };

        if let Some(belt) = self.conveyor.as_ref().map(Conveyor::layout) {
            let half = belt.width / 2.0;
            let min = Vec3::new(belt.lane_x - half, 0.0, belt.rear_z);
            let max = Vec3::new(belt.lane_x + half, belt.height + 0.5, belt.forward_z);
            consider(ray.hit_aabb(min, max), PickTarget::Conveyor);
        }

        if let Some(agents) = &self.layout.agents {
            let size = PEDESTRIAN_SIZE * agents.agent_scale;
            // Heading is ignored; the footprint is widened to cover any rotation.
            let half = size.x.max(size.z) / 2.0;
            let mut query = self.world.query::<(&Agent, &Transform)>();
            for (agent, transform) in query.iter(&self.world) {
                let min = transform.position - Vec3::new(half, 0.0, half);
                let max = transform.position + Vec3::new(half, size.y, half);
                consider(ray.hit_aabb(min, max), PickTarget::Pedestrian(agent.id));
            }
        }

        best.map(|(_, target)| target)
    }

    /// Tear the view down: every agent, box and prop is released on `host`.
    pub fn dispose<H: RenderHost + ?Sized>(mut self, host: &mut H) {
        AgentPool::release(&mut self.world, host);
        if let Some(conveyor) = &mut self.conveyor {
            conveyor.release(&mut self.world, host);
        }
        if let Some(mesh) = self.ground.take() {
            host.dispose_mesh(mesh);
        }
        log::info!("scene disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::engine::host::{AssetLibrary, EngineHost};
    use crate::scene::locomotion::LocomotionState;
    use crate::scene::test_host::{HostCall, RecordingHost};

    fn config(count: u32, state: LocomotionState) -> SceneConfig {
        SceneConfig { pedestrian: AgentConfig { state, count }, ..SceneConfig::default() }
    }

    fn start_stop(host: &RecordingHost) -> usize {
        host.count(|c| matches!(c, HostCall::Start(..) | HostCall::Stop(_)))
    }

    #[test]
    fn first_tick_builds_agents_and_boxes() {
        let mut host = RecordingHost::full();
        let mut scene = SceneController::new(SceneLayout::main(), &mut host);
        scene.sender().config(config(3, LocomotionState::Walk));
        assert_eq!(scene.agent_count(), 0);

        scene.tick(0.016, &mut host);
        assert_eq!(scene.agent_count(), 3);
        assert_eq!(scene.box_count(), 5);
        // ground + belt + boxes + agents
        assert_eq!(host.live_meshes(), 2 + 5 + 3);
    }

    #[test]
    fn resending_the_same_config_issues_no_playback_calls() {
        let mut host = RecordingHost::full();
        let mut scene = SceneController::new(SceneLayout::main(), &mut host);
        let sender = scene.sender();
        sender.config(config(2, LocomotionState::Run));
        scene.tick(0.016, &mut host);
        let before = start_stop(&host);

        sender.config(config(2, LocomotionState::Run));
        scene.tick(0.016, &mut host);
        assert_eq!(start_stop(&host), before);
    }

    #[test]
    fn shrink_to_zero_then_grow() {
        let mut host = RecordingHost::full();
        let mut scene = SceneController::new(SceneLayout::main(), &mut host);
        let sender = scene.sender();

        sender.config(config(3, LocomotionState::Walk));
        scene.tick(0.1, &mut host);
        let old: Vec<u32> = scene.agents().iter().map(|a| a.id).collect();

        sender.config(config(0, LocomotionState::Walk));
        scene.tick(0.1, &mut host);
        assert_eq!(scene.agent_count(), 0);

        sender.config(config(5, LocomotionState::Walk));
        scene.tick(0.1, &mut host);
        let agents = scene.agents();
        assert_eq!(agents.len(), 5);
        assert!(agents.iter().all(|a| !old.contains(&a.id)));
        assert_eq!(host.live_of_kind(MeshKind::Pedestrian), 5);
    }

    #[test]
    fn only_the_last_config_of_a_frame_applies() {
        let mut host = RecordingHost::full();
        let mut scene = SceneController::new(SceneLayout::main(), &mut host);
        let sender = scene.sender();
        sender.config(config(4, LocomotionState::Walk));
        sender.config(config(1, LocomotionState::Static));
        scene.tick(0.016, &mut host);

        assert_eq!(scene.agent_count(), 1);
        assert_eq!(host.count(|c| matches!(c, HostCall::Dispose(_))), 0);
    }

    #[test]
    fn box_speed_change_keeps_agents() {
        let mut host = RecordingHost::full();
        let mut scene = SceneController::new(SceneLayout::main(), &mut host);
        let sender = scene.sender();
        let mut cfg = config(2, LocomotionState::Walk);
        sender.config(cfg);
        scene.tick(0.5, &mut host);
        let ids: Vec<u32> = scene.agents().iter().map(|a| a.id).collect();

        cfg.box_speed = 6.0;
        sender.config(cfg);
        scene.tick(0.5, &mut host);
        assert_eq!(scene.agents().iter().map(|a| a.id).collect::<Vec<_>>(), ids);
        assert_eq!(scene.box_count(), 5);
    }

    #[test]
    fn press_and_release_travel_through_the_inbox() {
        let mut host = RecordingHost::full();
        let mut scene = SceneController::new(SceneLayout::pedestrian_preview(), &mut host);
        let sender = scene.sender();
        sender.config(config(2, LocomotionState::Static));
        scene.tick(0.016, &mut host);

        sender.press(Layer::Agree);
        scene.tick(0.016, &mut host);
        assert!(scene.agents().iter().all(|a| a.animation_weights["agree"] == 1.0));

        sender.release(Layer::Agree);
        sender.set_weight(Layer::SadPose, 0.4);
        scene.tick(0.016, &mut host);
        for agent in scene.agents() {
            assert_eq!(agent.animation_weights["agree"], 0.0);
            assert_eq!(agent.animation_weights["sad_pose"], 0.4);
        }
    }

    #[test]
    fn weights_reach_the_evaluator() {
        let mut host = EngineHost::new(AssetLibrary::builtin());
        let mut scene = SceneController::new(SceneLayout::pedestrian_preview(), &mut host);
        scene.sender().config(config(1, LocomotionState::Static));
        scene.tick(0.016, &mut host);
        scene.sender().set_weight(Layer::HeadShake, 0.75);
        scene.tick(0.016, &mut host);

        let agent = &scene.agents()[0];
        let clip = host.find_animation_by_name(agent.mesh, "headShake").unwrap();
        let player = host.clip(clip).unwrap();
        assert!(player.playing);
        assert_eq!(player.weight, 0.75);
    }

    #[test]
    fn dispose_releases_everything() {
        let mut host = EngineHost::new(AssetLibrary::builtin());
        let mut scene = SceneController::new(SceneLayout::main(), &mut host);
        let sender = scene.sender();
        sender.config(config(4, LocomotionState::Run));
        scene.tick(0.016, &mut host);
        assert!(host.clip_count() > 0);

        scene.dispose(&mut host);
        assert_eq!(host.mesh_count(), 0);
        assert_eq!(host.clip_count(), 0);

        // Late input after teardown is dropped quietly.
        sender.press(Layer::Agree);
    }

    #[test]
    fn lead_agent_reflects_key_input_and_rebuild_resets() {
        let mut host = RecordingHost::full();
        let mut scene = SceneController::new(SceneLayout::pedestrian_preview(), &mut host);
        let sender = scene.sender();
        sender.config(config(2, LocomotionState::Static));
        scene.tick(0.016, &mut host);

        sender.set_weight(Layer::SadPose, 0.8);
        sender.press(Layer::HeadShake);
        scene.tick(0.016, &mut host);
        let lead = scene.lead_agent().unwrap();
        assert_eq!(lead.weight(Layer::SadPose), 0.8);
        assert_eq!(lead.weight(Layer::HeadShake), 1.0);

        // A count edit rebuilds the pool and zeroes every gesture.
        sender.config(config(3, LocomotionState::Static));
        scene.tick(0.016, &mut host);
        let lead = scene.lead_agent().unwrap();
        assert!(Layer::ADDITIVE.iter().all(|l| lead.weight(*l) == 0.0));
    }

    #[test]
    fn conveyor_view_fits_belt_to_boxes() {
        let mut host = RecordingHost::full();
        let mut scene = SceneController::new(SceneLayout::conveyor_preview(), &mut host);
        let cfg = SceneConfig { num_boxes: 20, box_spacing: 2.5, ..SceneConfig::default() };
        scene.sender().config(cfg);
        scene.tick(0.0, &mut host);

        // Belt spans z in [-25, 25]; a ray near the far end still hits it.
        let ray = Ray::new(Vec3::new(0.0, 30.0, 24.0), Vec3::NEG_Y);
        assert_eq!(scene.pick(ray), Some(PickTarget::Conveyor));
        assert_eq!(host.live_of_kind(MeshKind::Belt), 1);
    }

    #[test]
    fn conveyor_view_never_spawns_agents() {
        let mut host = RecordingHost::full();
        let mut scene = SceneController::new(SceneLayout::conveyor_preview(), &mut host);
        scene.sender().config(config(3, LocomotionState::Walk));
        scene.tick(0.016, &mut host);
        assert_eq!(scene.agent_count(), 0);
        assert_eq!(scene.box_count(), 5);
    }

    #[test]
    fn pick_prefers_the_nearest_hit() {
        let mut host = RecordingHost::full();
        let mut scene = SceneController::new(SceneLayout::main(), &mut host);
        scene.sender().config(config(1, LocomotionState::Static));
        scene.tick(0.016, &mut host);

        let down = Ray::new(Vec3::new(30.0, 50.0, 0.0), Vec3::NEG_Y);
        assert_eq!(scene.pick(down), Some(PickTarget::Conveyor));

        let agent = &scene.agents()[0];
        let above_agent = Ray::new(agent.position + Vec3::Y * 20.0, Vec3::NEG_Y);
        assert_eq!(scene.pick(above_agent), Some(PickTarget::Pedestrian(agent.id)));

        let sky = Ray::new(Vec3::new(30.0, 50.0, 0.0), Vec3::Y);
        assert_eq!(scene.pick(sky), None);
    }

    #[test]
    fn pick_finds_a_standing_pedestrian() {
        let mut host = RecordingHost::full();
        let mut scene = SceneController::new(SceneLayout::pedestrian_preview(), &mut host);
        scene.sender().config(config(1, LocomotionState::Static));
        scene.tick(0.016, &mut host);

        let id = scene.agents()[0].id;
        let ray = Ray::new(Vec3::new(0.0, 1.0, 10.0), Vec3::NEG_Z);
        assert_eq!(scene.pick(ray), Some(PickTarget::Pedestrian(id)));
    }
}
