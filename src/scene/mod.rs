// Scene core: agent movement, animation blending and belt kinematics.
// Talks to the renderer only through `engine::host::RenderHost`.

pub mod blend;
pub mod controller;
pub mod conveyor;
pub mod keymap;
pub mod locomotion;
pub mod path;
pub mod pool;

#[cfg(test)]
pub(crate) mod test_host;

pub use controller::{PickTarget, SceneController, SceneLayout};
