// Core ECS components shared by every scene entity.

use bevy_ecs::prelude::*;
use glam::Vec3;

use super::host::MeshHandle;

/// Position of an entity on the ground plane plus its facing.
///
/// `heading` is in radians, measured as `atan2(dz, dx)`: 0 faces +X.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub heading: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            heading: 0.0,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self { position, heading: 0.0 }
    }
}

/// RGB color for rendering
#[derive(Component, Debug, Clone, Copy)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Render resource owned by this entity. Released by whoever despawns it.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshRef(pub MeshHandle);
