// ECS systems shared by the scene.
// Each takes the world plus whatever frame data it needs and runs once per tick.

use bevy_ecs::prelude::*;

use super::components::*;
use super::host::RenderHost;

/// Copy every entity's transform onto its render mesh.
pub fn sync_meshes_system<H: RenderHost + ?Sized>(world: &mut World, host: &mut H) {
    let mut query = world.query::<(&Transform, &MeshRef)>();
    for (transform, mesh) in query.iter(world) {
        host.set_transform(mesh.0, transform.position, transform.heading);
    }
}

/// Ring-buffer wrap of one coordinate between `rear` and `forward`.
///
/// Passing the forward bound resumes exactly at the rear bound (and the
/// reverse for negative motion). Values inside the range are untouched.
pub fn wrap_axis(value: f32, rear: f32, forward: f32) -> f32 {
    if value > forward {
        rear
    } else if value < rear {
        forward
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_resumes_exactly_at_rear() {
        assert_eq!(wrap_axis(20.03, -20.0, 20.0), -20.0);
        assert_eq!(wrap_axis(-20.5, -20.0, 20.0), 20.0);
        assert_eq!(wrap_axis(20.0, -20.0, 20.0), 20.0);
        assert_eq!(wrap_axis(3.25, -20.0, 20.0), 3.25);
    }
}
