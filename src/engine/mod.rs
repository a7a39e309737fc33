// Engine module: rendering host, camera, input and shared ECS pieces.
// Nothing in here knows about conveyors or pedestrians.

pub mod camera;
pub mod components;
pub mod host;
pub mod input;
pub mod mesh;
pub mod overlay;
pub mod renderer;
pub mod systems;
