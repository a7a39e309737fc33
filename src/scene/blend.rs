// Animation layer blending for one agent.
//
// Base locomotion layers are mutually exclusive and switched by start/stop;
// their weight is not used. Additive layers are started once, looped, and
// stay playing for the agent's whole life; only their weight changes.

use std::collections::BTreeMap;

use bevy_ecs::prelude::*;

use crate::engine::host::{ClipHandle, MeshHandle, RenderHost};

/// Every animation layer the pedestrian rig can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    Idle,
    Walk,
    Run,
    SadPose,
    SneakPose,
    HeadShake,
    Agree,
}

const LAYER_COUNT: usize = 7;

impl Layer {
    pub const ALL: [Layer; LAYER_COUNT] = [
        Layer::Idle,
        Layer::Walk,
        Layer::Run,
        Layer::SadPose,
        Layer::SneakPose,
        Layer::HeadShake,
        Layer::Agree,
    ];

    pub const BASE: [Layer; 3] = [Layer::Idle, Layer::Walk, Layer::Run];

    pub const ADDITIVE: [Layer; 4] =
        [Layer::SadPose, Layer::SneakPose, Layer::HeadShake, Layer::Agree];

    /// Name of the clip inside the imported asset.
    pub fn clip_name(self) -> &'static str {
        match self {
            Layer::Idle => "idle",
            Layer::Walk => "walk",
            Layer::Run => "run",
            Layer::SadPose => "sad_pose",
            Layer::SneakPose => "sneak_pose",
            Layer::HeadShake => "headShake",
            Layer::Agree => "agree",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Layer::Idle => "Idle",
            Layer::Walk => "Walk",
            Layer::Run => "Run",
            Layer::SadPose => "Sad Pose",
            Layer::SneakPose => "Sneak Pose",
            Layer::HeadShake => "Head Shake",
            Layer::Agree => "Agree",
        }
    }

    pub fn is_additive(self) -> bool {
        !matches!(self, Layer::Idle | Layer::Walk | Layer::Run)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Layer → clip handle, resolved once when the agent's asset is imported.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClipBindings {
    clips: [Option<ClipHandle>; LAYER_COUNT],
}

impl ClipBindings {
    pub fn resolve<H: RenderHost + ?Sized>(host: &H, root: MeshHandle) -> Self {
        let mut bindings = Self::default();
        for layer in Layer::ALL {
            bindings.clips[layer.index()] = host.find_animation_by_name(root, layer.clip_name());
        }
        bindings
    }

    pub fn get(&self, layer: Layer) -> Option<ClipHandle> {
        self.clips[layer.index()]
    }

    pub fn missing(&self) -> impl Iterator<Item = Layer> + '_ {
        Layer::ALL.into_iter().filter(|l| self.get(*l).is_none())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationLayer {
    pub layer: Layer,
    pub weight: f32,
    playing: bool,
}

impl AnimationLayer {
    pub fn name(&self) -> &'static str {
        self.layer.clip_name()
    }

    #[cfg(test)]
    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

/// Per-agent layer state. Owned by exactly one agent.
#[derive(Component, Debug, Clone)]
pub struct LayerBlender {
    bindings: ClipBindings,
    layers: [AnimationLayer; LAYER_COUNT],
    selected_base: Option<Layer>,
}

impl LayerBlender {
    /// Start every bound additive clip looped at weight 0.
    pub fn new<H: RenderHost + ?Sized>(bindings: ClipBindings, host: &mut H) -> Self {
        let mut layers = Layer::ALL.map(|layer| AnimationLayer { layer, weight: 0.0, playing: false });
        for layer in Layer::ADDITIVE {
            if let Some(clip) = bindings.get(layer) {
                host.set_additive_weight(clip, 0.0);
                host.start_loop(clip, true);
                layers[layer.index()].playing = true;
            }
        }
        Self { bindings, layers, selected_base: None }
    }

    /// Store a weight clamped to [0, 1]. NaN counts as 0. Returns the stored value.
    pub fn set_weight(&mut self, layer: Layer, value: f32) -> f32 {
        let weight = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        self.layers[layer.index()].weight = weight;
        weight
    }

    /// Discrete input: key down.
    pub fn press(&mut self, layer: Layer) -> f32 {
        self.set_weight(layer, 1.0)
    }

    /// Discrete input: key up.
    pub fn release(&mut self, layer: Layer) -> f32 {
        self.set_weight(layer, 0.0)
    }

    /// Make `base` the only playing base layer, or stop all of them for `None`.
    ///
    /// Host calls are only issued for layers whose playing state changes.
    pub fn select_base<H: RenderHost + ?Sized>(&mut self, base: Option<Layer>, host: &mut H) {
        if let Some(layer) = base {
            if layer.is_additive() {
                log::warn!("{} is additive and cannot be selected as a base layer", layer.clip_name());
                return;
            }
        }
        if base == self.selected_base {
            return;
        }

        for layer in Layer::BASE {
            let slot = &mut self.layers[layer.index()];
            if Some(layer) != base && slot.playing {
                if let Some(clip) = self.bindings.get(layer) {
                    host.stop_loop(clip);
                }
                slot.playing = false;
            }
        }

        if let Some(layer) = base {
            match self.bindings.get(layer) {
                Some(clip) if !self.layers[layer.index()].playing => {
                    host.start_loop(clip, true);
                    self.layers[layer.index()].playing = true;
                }
                Some(_) => {}
                None => log::debug!("no {} clip bound, base layer skipped", layer.clip_name()),
            }
        }
        self.selected_base = base;
    }

    /// Push every bound additive weight to the evaluator.
    pub fn tick<H: RenderHost + ?Sized>(&self, host: &mut H) {
        for layer in Layer::ADDITIVE {
            if let Some(clip) = self.bindings.get(layer) {
                host.set_additive_weight(clip, self.layers[layer.index()].weight);
            }
        }
    }

    /// Layer name → weight, as exposed on the agent.
    pub fn weights(&self) -> BTreeMap<&'static str, f32> {
        self.layers.iter().map(|l| (l.name(), l.weight)).collect()
    }

    /// Stop everything still playing. The clips themselves are released with
    /// the owning mesh.
    pub fn stop_all<H: RenderHost + ?Sized>(&mut self, host: &mut H) {
        for slot in &mut self.layers {
            if slot.playing {
                if let Some(clip) = self.bindings.get(slot.layer) {
                    host.stop_loop(clip);
                }
                slot.playing = false;
            }
        }
        self.selected_base = None;
    }
}

// Inspection used by the blender and locomotion tests.
#[cfg(test)]
impl LayerBlender {
    pub fn weight(&self, layer: Layer) -> f32 {
        self.layers[layer.index()].weight
    }

    pub fn layer(&self, layer: Layer) -> &AnimationLayer {
        &self.layers[layer.index()]
    }

    pub fn selected_base(&self) -> Option<Layer> {
        self.selected_base
    }
}
