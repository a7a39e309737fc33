// Conveyor kinematics: boxes slide along +Z and wrap from the forward end of
// the belt back to the rear end.
//
// A fixed belt keeps its length and tightens the spacing when the boxes would
// not fit. A fitted belt (the preview) is resized to `count * spacing` so the
// gap across the wrap seam matches the gap between neighbours.

use bevy_ecs::prelude::*;
use glam::Vec3;

use crate::config::ConveyorConfig;
use crate::engine::components::{Color, MeshRef, Transform};
use crate::engine::host::{MeshDesc, MeshHandle, MeshKind, RenderHost};
use crate::engine::systems::wrap_axis;

const BOX_COLOR: Color = Color::new(0.9, 0.9, 0.9);
const BOX_SIZE: f32 = 1.0;
const BELT_COLOR: [f32; 3] = [0.15, 0.15, 0.17];
const BELT_THICKNESS: f32 = 0.5;

/// Where the belt lies in the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConveyorLayout {
    /// X coordinate of the belt's centre line.
    pub lane_x: f32,
    pub rear_z: f32,
    pub forward_z: f32,
    /// Height of box centres.
    pub height: f32,
    /// Belt width along X, used for the belt mesh and picking.
    pub width: f32,
    /// Resize the belt around z = 0 to fit the configured box set.
    pub fit_to_boxes: bool,
}

impl Default for ConveyorLayout {
    fn default() -> Self {
        Self { lane_x: 30.0, rear_z: -20.0, forward_z: 20.0, height: 1.0, width: 10.0, fit_to_boxes: false }
    }
}

impl ConveyorLayout {
    pub fn length(&self) -> f32 {
        self.forward_z - self.rear_z
    }

    pub fn center(&self) -> Vec3 {
        Vec3::new(self.lane_x, 0.5, (self.rear_z + self.forward_z) / 2.0)
    }

    /// Layout for `count` boxes `spacing` apart. A fitted belt is
    /// recentred to span `count * spacing`; a fixed belt is returned as is.
    pub fn fitted(&self, count: u32, spacing: f32) -> Self {
        if !self.fit_to_boxes {
            return *self;
        }
        let half = count as f32 * spacing / 2.0;
        Self { rear_z: -half, forward_z: half, ..*self }
    }

    /// Distance between neighbouring boxes. Never more than `length / count`,
    /// so a crowded fixed belt spreads its boxes instead of stacking them.
    pub fn effective_spacing(&self, count: u32, spacing: f32) -> f32 {
        if count == 0 {
            return spacing;
        }
        spacing.min(self.length().max(0.0) / count as f32)
    }

    /// Initial z of box `index`. Boxes on a fitted belt sit half a gap in
    /// from each end.
    pub fn initial_z(&self, index: u32, spacing: f32) -> f32 {
        let lead = if self.fit_to_boxes { spacing / 2.0 } else { 0.0 };
        self.rear_z + lead + index as f32 * spacing
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConveyorBox {
    pub index: u32,
}

/// Owns the box set for one belt.
#[derive(Debug)]
pub struct Conveyor {
    layout: ConveyorLayout,
    speed: f32,
    /// Count and spacing the current box set was built with.
    built: Option<(u32, f32)>,
    belt: Option<MeshHandle>,
}

impl Conveyor {
    pub fn new(layout: ConveyorLayout) -> Self {
        Self { layout, speed: 0.0, built: None, belt: None }
    }

    /// Current belt extents, after any fitting.
    pub fn layout(&self) -> &ConveyorLayout {
        &self.layout
    }

    /// Apply a config snapshot. Speed is taken live; a count or spacing
    /// change recreates the whole box set. Returns true on recreation.
    pub fn apply<H: RenderHost + ?Sized>(
        &mut self,
        world: &mut World,
        host: &mut H,
        config: &ConveyorConfig,
    ) -> bool {
        self.speed = config.speed;
        let wanted = (config.box_count, config.spacing);
        if self.built == Some(wanted) {
            return false;
        }

        self.clear_boxes(world, host);
        let resized = self.layout.fitted(config.box_count, config.spacing);
        if self.belt.is_none() || resized != self.layout {
            self.layout = resized;
            self.place_belt(host);
        }

        let spacing = self.layout.effective_spacing(config.box_count, config.spacing);
        if spacing < config.spacing {
            log::warn!(
                "{} boxes do not fit {:.1} apart on a {:.1} belt, spacing them {:.2} apart",
                config.box_count,
                config.spacing,
                self.layout.length(),
                spacing
            );
        }
        for index in 0..config.box_count {
            let z = self.layout.initial_z(index, spacing);
            let position = Vec3::new(self.layout.lane_x, self.layout.height, z);
            let mesh = host.create_mesh(MeshDesc::new(
                MeshKind::Box,
                position,
                Vec3::splat(BOX_SIZE),
                BOX_COLOR.to_array(),
            ));
            world.spawn((ConveyorBox { index }, Transform::from_position(position), BOX_COLOR, MeshRef(mesh)));
        }
        self.built = Some(wanted);
        log::info!("rebuilt conveyor: {} boxes, spacing {:.2}", config.box_count, config.spacing);
        true
    }

    /// Move every box by `speed * dt` and wrap at the belt ends.
    pub fn advance(&self, world: &mut World, dt: f32) {
        let step = self.speed * dt;
        if !step.is_finite() {
            return;
        }
        let mut query = world.query_filtered::<&mut Transform, With<ConveyorBox>>();
        for mut transform in query.iter_mut(world) {
            transform.position.z =
                wrap_axis(transform.position.z + step, self.layout.rear_z, self.layout.forward_z);
        }
    }

    fn place_belt<H: RenderHost + ?Sized>(&mut self, host: &mut H) {
        if let Some(mesh) = self.belt.take() {
            host.dispose_mesh(mesh);
        }
        let layout = &self.layout;
        self.belt = Some(host.create_mesh(MeshDesc::new(
            MeshKind::Belt,
            Vec3::new(layout.lane_x, BELT_THICKNESS / 2.0, layout.center().z),
            Vec3::new(layout.width, BELT_THICKNESS, layout.length()),
            BELT_COLOR,
        )));
    }

    /// Dispose the belt, every box and their meshes.
    pub fn release<H: RenderHost + ?Sized>(&mut self, world: &mut World, host: &mut H) {
        self.clear_boxes(world, host);
        if let Some(mesh) = self.belt.take() {
            host.dispose_mesh(mesh);
        }
    }

    fn clear_boxes<H: RenderHost + ?Sized>(&mut self, world: &mut World, host: &mut H) {
        let mut query = world.query_filtered::<(Entity, &MeshRef), With<ConveyorBox>>();
        let doomed: Vec<(Entity, MeshRef)> = query.iter(world).map(|(e, m)| (e, *m)).collect();
        for (entity, mesh) in doomed {
            host.dispose_mesh(mesh.0);
            world.despawn(entity);
        }
        self.built = None;
    }

    pub fn box_count(world: &mut World) -> usize {
        world.query::<&ConveyorBox>().iter(world).count()
    }

    /// Box z positions ordered by box index.
    #[cfg(test)]
    pub fn box_positions(world: &mut World) -> Vec<f32> {
        let mut boxes: Vec<(u32, f32)> = world
            .query::<(&ConveyorBox, &Transform)>()
            .iter(world)
            .map(|(b, t)| (b.index, t.position.z))
            .collect();
        boxes.sort_by_key(|(index, _)| *index);
        boxes.into_iter().map(|(_, z)| z).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::test_host::RecordingHost;

    fn config(box_count: u32, speed: f32, spacing: f32) -> ConveyorConfig {
        ConveyorConfig { box_count, speed, spacing }
    }

    #[test]
    fn builds_requested_box_count() {
        let mut world = World::new();
        let mut host = RecordingHost::full();
        let mut conveyor = Conveyor::new(ConveyorLayout::default());

        assert!(conveyor.apply(&mut world, &mut host, &config(5, 3.0, 2.5)));
        assert_eq!(Conveyor::box_count(&mut world), 5);
        assert_eq!(Conveyor::box_positions(&mut world), vec![-20.0, -17.5, -15.0, -12.5, -10.0]);
        assert_eq!(host.live_of_kind(MeshKind::Box), 5);
    }

    #[test]
    fn crossing_forward_bound_resumes_at_rear() {
        let mut world = World::new();
        let mut host = RecordingHost::full();
        let mut conveyor = Conveyor::new(ConveyorLayout::default());
        conveyor.apply(&mut world, &mut host, &config(1, 3.0, 1.0));

        // 13 frames of 1s at 3 u/s: -20 → 19, then one more crosses 20.
        for _ in 0..13 {
            conveyor.advance(&mut world, 1.0);
        }
        assert_eq!(Conveyor::box_positions(&mut world), vec![19.0]);
        conveyor.advance(&mut world, 1.0);
        assert_eq!(Conveyor::box_positions(&mut world), vec![-20.0]);
    }

    #[test]
    fn negative_speed_wraps_the_other_way() {
        let mut world = World::new();
        let mut host = RecordingHost::full();
        let mut conveyor = Conveyor::new(ConveyorLayout::default());
        conveyor.apply(&mut world, &mut host, &config(1, -2.0, 1.0));
        conveyor.advance(&mut world, 0.5);
        assert_eq!(Conveyor::box_positions(&mut world), vec![20.0]);
    }

    #[test]
    fn speed_change_keeps_boxes() {
        let mut world = World::new();
        let mut host = RecordingHost::full();
        let mut conveyor = Conveyor::new(ConveyorLayout::default());
        conveyor.apply(&mut world, &mut host, &config(3, 1.0, 2.0));
        conveyor.advance(&mut world, 1.0);

        assert!(!conveyor.apply(&mut world, &mut host, &config(3, 4.0, 2.0)));
        assert_eq!(Conveyor::box_positions(&mut world), vec![-19.0, -17.0, -15.0]);
        conveyor.advance(&mut world, 1.0);
        assert_eq!(Conveyor::box_positions(&mut world), vec![-15.0, -13.0, -11.0]);
    }

    #[test]
    fn count_or_spacing_change_recreates_boxes() {
        let mut world = World::new();
        let mut host = RecordingHost::full();
        let mut conveyor = Conveyor::new(ConveyorLayout::default());
        conveyor.apply(&mut world, &mut host, &config(3, 1.0, 2.0));
        conveyor.advance(&mut world, 1.0);

        assert!(conveyor.apply(&mut world, &mut host, &config(2, 1.0, 2.0)));
        assert_eq!(Conveyor::box_positions(&mut world), vec![-20.0, -18.0]);
        assert!(conveyor.apply(&mut world, &mut host, &config(2, 1.0, 4.0)));
        assert_eq!(Conveyor::box_positions(&mut world), vec![-20.0, -16.0]);
        assert_eq!(host.live_of_kind(MeshKind::Box), 2);
    }

    fn gaps(mut zs: Vec<f32>) -> Vec<f32> {
        zs.sort_by(f32::total_cmp);
        zs.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[test]
    fn crowded_fixed_belt_spreads_boxes() {
        let mut world = World::new();
        let mut host = RecordingHost::full();
        let mut conveyor = Conveyor::new(ConveyorLayout::default());
        conveyor.apply(&mut world, &mut host, &config(20, 1.0, 2.5));

        let zs = Conveyor::box_positions(&mut world);
        assert_eq!(zs.len(), 20);
        assert_eq!(zs[0], -20.0);
        assert!(gaps(zs).iter().all(|g| (g - 2.0).abs() < 1e-4));
    }

    #[test]
    fn fitted_belt_grows_with_the_box_set() {
        let mut world = World::new();
        let mut host = RecordingHost::full();
        let layout = ConveyorLayout { lane_x: 0.0, fit_to_boxes: true, ..ConveyorLayout::default() };
        let mut conveyor = Conveyor::new(layout);
        conveyor.apply(&mut world, &mut host, &config(20, 1.0, 2.5));

        assert_eq!(conveyor.layout().rear_z, -25.0);
        assert_eq!(conveyor.layout().forward_z, 25.0);
        let zs = Conveyor::box_positions(&mut world);
        assert_eq!(zs[0], -23.75);
        assert!(gaps(zs.clone()).iter().all(|g| (g - 2.5).abs() < 1e-4));

        // A wrap drops at most one step of travel, so boxes never close up.
        for _ in 0..200 {
            conveyor.advance(&mut world, 0.3);
        }
        let zs = Conveyor::box_positions(&mut world);
        assert!(gaps(zs).iter().all(|g| *g > 2.0));

        let belts: Vec<f32> = host.descs_of_kind(MeshKind::Belt).iter().map(|d| d.size.z).collect();
        assert_eq!(belts, vec![50.0]);
    }

    #[test]
    fn release_disposes_belt_and_boxes() {
        let mut world = World::new();
        let mut host = RecordingHost::full();
        let mut conveyor = Conveyor::new(ConveyorLayout::default());
        conveyor.apply(&mut world, &mut host, &config(4, 1.0, 2.0));
        assert_eq!(host.live_of_kind(MeshKind::Belt), 1);

        conveyor.release(&mut world, &mut host);
        assert_eq!(host.live_meshes(), 0);
        assert_eq!(Conveyor::box_count(&mut world), 0);
    }
}
