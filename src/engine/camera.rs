// Orbit camera and picking rays.
//
// Camera model:
//   - A target point the camera looks at
//   - Pitch (elevation) and yaw (horizontal rotation) around the target
//   - Zoom by adjusting distance along the look vector
//   - Right mouse drag orbits, WASD pans the target on XZ, wheel zooms

use glam::{Mat4, Vec2, Vec3};
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use super::input::InputState;

/// Half-line used for pointer picking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction: direction.normalize_or_zero() }
    }

    /// Distance to the first hit with an axis-aligned box, if any (slab test).
    pub fn hit_aabb(&self, min: Vec3, max: Vec3) -> Option<f32> {
        let inv = self.direction.recip();
        let t0 = (min - self.origin) * inv;
        let t1 = (max - self.origin) * inv;
        let near = t0.min(t1).max_element();
        let far = t0.max(t1).min_element();
        if near.is_nan() || far.is_nan() || far < near.max(0.0) {
            return None;
        }
        Some(near.max(0.0))
    }
}

pub struct OrbitCamera {
    pub target: Vec3,

    /// Private: always clamped to [min_distance, max_distance] in update().
    distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,

    /// Elevation angle in radians (0 = horizontal, PI/2 = straight down)
    pub pitch: f32,

    /// Horizontal rotation in radians (0 = eye on +Z looking toward -Z)
    pub yaw: f32,

    pub fov: f32,
    pub near: f32,
    pub far: f32,

    /// WASD pan speed in world units per second
    pub move_speed: f32,

    /// Zoom change (in distance units) per scroll line
    pub zoom_speed: f32,

    /// Radians of rotation per dragged pixel
    pub orbit_speed: f32,
}

impl OrbitCamera {
    pub fn new(target: Vec3, distance: f32, pitch_deg: f32) -> Self {
        Self {
            target,
            distance,
            min_distance: distance * 0.25,
            max_distance: distance * 3.0,
            pitch: pitch_deg.to_radians(),
            yaw: 0.0,
            fov: 45.0_f32.to_radians(),
            near: 0.1,
            far: 500.0,
            move_speed: 20.0,
            zoom_speed: distance * 0.05,
            orbit_speed: 0.005,
        }
    }

    /// Update camera position based on input. Call once per frame before rendering.
    pub fn update(&mut self, input: &InputState, dt: f32) {
        if input.is_button_held(MouseButton::Right) {
            let (dx, dy) = input.mouse_delta;
            self.yaw -= dx * self.orbit_speed;
            self.pitch = (self.pitch + dy * self.orbit_speed).clamp(0.05, 1.5);
        }

        let forward = Vec2::new(-self.yaw.sin(), -self.yaw.cos());
        let right = Vec2::new(self.yaw.cos(), -self.yaw.sin());
        let mut move_dir = Vec2::ZERO;
        if input.is_key_held(KeyCode::KeyW) { move_dir += forward; }
        if input.is_key_held(KeyCode::KeyS) { move_dir -= forward; }
        if input.is_key_held(KeyCode::KeyD) { move_dir += right; }
        if input.is_key_held(KeyCode::KeyA) { move_dir -= right; }
        if move_dir != Vec2::ZERO {
            let step = move_dir.normalize() * self.move_speed * dt;
            self.target += Vec3::new(step.x, 0.0, step.y);
        }

        // Scroll up (positive delta) zooms in
        self.distance -= input.scroll_delta * self.zoom_speed;
        self.distance = self.distance.clamp(self.min_distance, self.max_distance);
    }

    /// World-space position of the camera eye.
    pub fn camera_position(&self) -> Vec3 {
        self.target + self.eye_offset()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.camera_position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
    }

    /// Combined view-projection matrix ready to upload to the GPU.
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Ray through a window pixel (origin top-left).
    pub fn screen_ray(&self, pixel: (f32, f32), window_size: (u32, u32)) -> Ray {
        let (w, h) = (window_size.0.max(1) as f32, window_size.1.max(1) as f32);
        let ndc = Vec2::new(2.0 * pixel.0 / w - 1.0, 1.0 - 2.0 * pixel.1 / h);
        let inverse = self.view_projection(w / h).inverse();
        let near = inverse.project_point3(ndc.extend(0.0));
        let far = inverse.project_point3(ndc.extend(1.0));
        Ray::new(near, far - near)
    }

    fn eye_offset(&self) -> Vec3 {
        Vec3::new(
            self.yaw.sin() * self.pitch.cos() * self.distance,
            self.pitch.sin() * self.distance,
            self.yaw.cos() * self.pitch.cos() * self.distance,
        )
    }
}
