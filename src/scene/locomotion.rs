// Pedestrian locomotion state → base animation layer.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::host::RenderHost;
use crate::scene::blend::{Layer, LayerBlender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocomotionState {
    /// No base clip plays; the rig holds its bind pose.
    #[default]
    Static,
    Walk,
    Run,
}

impl LocomotionState {
    pub const ALL: [LocomotionState; 3] =
        [LocomotionState::Static, LocomotionState::Walk, LocomotionState::Run];

    pub fn base_layer(self) -> Option<Layer> {
        match self {
            LocomotionState::Static => None,
            LocomotionState::Walk => Some(Layer::Walk),
            LocomotionState::Run => Some(Layer::Run),
        }
    }

    /// Patrol speed in world units per second.
    pub fn patrol_speed(self) -> f32 {
        match self {
            LocomotionState::Static => 0.0,
            LocomotionState::Walk => 5.0,
            LocomotionState::Run => 10.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LocomotionState::Static => "Static",
            LocomotionState::Walk => "Walk",
            LocomotionState::Run => "Run",
        }
    }
}

/// Current locomotion state of one agent. Starts unset so the first
/// transition always applies.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Locomotion {
    current: Option<LocomotionState>,
}

impl Locomotion {
    pub fn state(&self) -> Option<LocomotionState> {
        self.current
    }

    /// Switch to `next`. Returns false (and touches nothing) when already there.
    pub fn transition<H: RenderHost + ?Sized>(
        &mut self,
        next: LocomotionState,
        blender: &mut LayerBlender,
        host: &mut H,
    ) -> bool {
        if self.current == Some(next) {
            return false;
        }
        blender.select_base(next.base_layer(), host);
        log::debug!("locomotion {:?} -> {:?}", self.current, next);
        self.current = Some(next);
        true
    }
}
