// Rendering-engine boundary.
//
// The scene core only ever talks to `RenderHost`. `EngineHost` is the
// in-process implementation used by the app: a CPU-side store of mesh
// instances and clip players that the wgpu renderer reads every frame to
// build its instance buffer. It never touches GPU resources itself.

use std::collections::HashMap;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::errors::AssetError;

// ============================================================================
// HANDLES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipHandle(u32);

#[cfg(test)]
impl MeshHandle {
    pub(crate) fn from_raw(id: u32) -> Self {
        Self(id)
    }
}

#[cfg(test)]
impl ClipHandle {
    pub(crate) fn from_raw(id: u32) -> Self {
        Self(id)
    }
}

/// What a mesh instance represents. Drives its base color and pose handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshKind {
    Ground,
    Belt,
    Box,
    Pedestrian,
}

/// Everything needed to place a new mesh instance.
#[derive(Debug, Clone, Copy)]
pub struct MeshDesc {
    pub kind: MeshKind,
    pub position: Vec3,
    pub heading: f32,
    /// Full extents of the box that stands in for the mesh.
    pub size: Vec3,
    pub color: [f32; 3],
}

impl MeshDesc {
    pub fn new(kind: MeshKind, position: Vec3, size: Vec3, color: [f32; 3]) -> Self {
        Self { kind, position, heading: 0.0, size, color }
    }
}

// ============================================================================
// HOST TRAIT
// ============================================================================

/// Narrow contract the scene core consumes.
///
/// Clip handles returned by `find_animation_by_name` belong to the root mesh
/// they were imported with and die with it in `dispose_mesh`.
pub trait RenderHost {
    fn create_mesh(&mut self, desc: MeshDesc) -> MeshHandle;

    /// Instantiate a named animated asset. Every call yields a fresh root
    /// mesh with its own clip instances.
    fn import_animated_asset(&mut self, asset: &str, desc: MeshDesc) -> Result<MeshHandle, AssetError>;

    fn find_animation_by_name(&self, root: MeshHandle, name: &str) -> Option<ClipHandle>;

    fn start_loop(&mut self, clip: ClipHandle, looped: bool);

    fn stop_loop(&mut self, clip: ClipHandle);

    fn set_additive_weight(&mut self, clip: ClipHandle, weight: f32);

    fn set_transform(&mut self, mesh: MeshHandle, position: Vec3, heading: f32);

    /// Release the mesh and every clip imported with it.
    fn dispose_mesh(&mut self, mesh: MeshHandle);
}

// ============================================================================
// ASSET MANIFEST
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSpec {
    pub name: String,
    /// Loop length in seconds.
    pub duration: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub name: String,
    pub clips: Vec<ClipSpec>,
}

/// Animated assets known to the host, keyed by file name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetLibrary {
    pub assets: Vec<AssetSpec>,
}

pub const PEDESTRIAN_ASSET: &str = "Xbot.glb";

impl AssetLibrary {
    /// The pedestrian rig shipped with the app.
    pub fn builtin() -> Self {
        let clip = |name: &str, duration: f32| ClipSpec { name: name.to_string(), duration };
        Self {
            assets: vec![AssetSpec {
                name: PEDESTRIAN_ASSET.to_string(),
                clips: vec![
                    clip("idle", 2.4),
                    clip("walk", 1.1),
                    clip("run", 0.7),
                    clip("sad_pose", 1.0),
                    clip("sneak_pose", 1.0),
                    clip("headShake", 1.6),
                    clip("agree", 1.3),
                ],
            }],
        }
    }

    pub fn from_json(json: &str) -> Result<Self, AssetError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn get(&self, name: &str) -> Option<&AssetSpec> {
        self.assets.iter().find(|a| a.name == name)
    }
}

// ============================================================================
// CLIP PLAYER
// ============================================================================

/// Playback state of one clip instance.
#[derive(Debug, Clone)]
pub struct ClipPlayer {
    pub name: String,
    pub duration: f32,
    pub time: f32,
    pub weight: f32,
    pub playing: bool,
    pub looped: bool,
}

impl ClipPlayer {
    fn new(name: String, duration: f32) -> Self {
        Self { name, duration, time: 0.0, weight: 1.0, playing: false, looped: false }
    }

    /// Advance the clip clock. Weight does not matter here: an additive clip
    /// at weight 0 keeps its phase.
    pub fn advance(&mut self, dt: f32) {
        if !self.playing || self.duration <= 0.0 {
            return;
        }
        self.time += dt;
        if self.time >= self.duration {
            if self.looped {
                self.time %= self.duration;
            } else {
                self.time = self.duration;
                self.playing = false;
            }
        }
    }

    /// Normalised phase in [0, 1).
    pub fn phase(&self) -> f32 {
        if self.duration > 0.0 { self.time / self.duration } else { 0.0 }
    }
}

// ============================================================================
// ENGINE HOST
// ============================================================================

#[derive(Debug, Clone)]
pub struct MeshInstance {
    pub desc: MeshDesc,
    pub clips: Vec<ClipHandle>,
}

/// One box to draw, already posed.
#[derive(Debug, Clone, Copy)]
pub struct DrawInstance {
    pub position: Vec3,
    pub heading: f32,
    pub scale: Vec3,
    pub color: [f32; 3],
}

pub struct EngineHost {
    library: AssetLibrary,
    meshes: HashMap<MeshHandle, MeshInstance>,
    clips: HashMap<ClipHandle, ClipPlayer>,
    next_id: u32,
}

impl EngineHost {
    pub fn new(library: AssetLibrary) -> Self {
        Self { library, meshes: HashMap::new(), clips: HashMap::new(), next_id: 1 }
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    #[cfg(test)]
    pub fn clip(&self, handle: ClipHandle) -> Option<&ClipPlayer> {
        self.clips.get(&handle)
    }

    /// Advance every playing clip by one frame.
    pub fn advance(&mut self, dt: f32) {
        for clip in self.clips.values_mut() {
            clip.advance(dt);
        }
    }

    /// Build the draw list, applying clip poses to pedestrian meshes.
    pub fn draw_instances(&self) -> Vec<DrawInstance> {
        let mut out = Vec::with_capacity(self.meshes.len());
        for mesh in self.meshes.values() {
            let desc = &mesh.desc;
            let mut draw = DrawInstance {
                position: desc.position,
                heading: desc.heading,
                scale: desc.size,
                color: desc.color,
            };
            if desc.kind == MeshKind::Pedestrian {
                let pose = self.sample_pose(mesh);
                draw.position.y += pose.lift;
                draw.heading += pose.sway;
                draw.scale.y *= pose.squash;
                // Pedestrian boxes are anchored at the feet.
                draw.position.y += draw.scale.y * 0.5;
            }
            out.push(draw);
        }
        out
    }

    fn sample_pose(&self, mesh: &MeshInstance) -> PoseSample {
        let mut pose = PoseSample { lift: 0.0, sway: 0.0, squash: 1.0 };
        for clip in mesh.clips.iter().filter_map(|h| self.clips.get(h)) {
            if !clip.playing {
                continue;
            }
            let wave = (clip.phase() * std::f32::consts::TAU).sin();
            match clip.name.as_str() {
                "walk" => pose.lift += wave.abs() * 0.06 * clip.weight,
                "run" => pose.lift += wave.abs() * 0.15 * clip.weight,
                "idle" => pose.squash *= 1.0 + wave * 0.01 * clip.weight,
                "headShake" => pose.sway += wave * 0.35 * clip.weight,
                "agree" => pose.lift += wave.abs() * 0.05 * clip.weight,
                "sad_pose" => pose.squash *= 1.0 - 0.12 * clip.weight,
                "sneak_pose" => pose.squash *= 1.0 - 0.25 * clip.weight,
                _ => {}
            }
        }
        pose
    }
}

struct PoseSample {
    lift: f32,
    sway: f32,
    squash: f32,
}

impl RenderHost for EngineHost {
    fn create_mesh(&mut self, desc: MeshDesc) -> MeshHandle {
        let handle = MeshHandle(self.next());
        self.meshes.insert(handle, MeshInstance { desc, clips: Vec::new() });
        handle
    }

    fn import_animated_asset(&mut self, asset: &str, desc: MeshDesc) -> Result<MeshHandle, AssetError> {
        let spec = self
            .library
            .get(asset)
            .cloned()
            .ok_or_else(|| AssetError::UnknownAsset(asset.to_string()))?;

        let root = self.create_mesh(desc);
        let mut handles = Vec::with_capacity(spec.clips.len());
        for clip in spec.clips {
            let handle = ClipHandle(self.next());
            self.clips.insert(handle, ClipPlayer::new(clip.name, clip.duration));
            handles.push(handle);
        }
        if let Some(mesh) = self.meshes.get_mut(&root) {
            mesh.clips = handles;
        }
        Ok(root)
    }

    fn find_animation_by_name(&self, root: MeshHandle, name: &str) -> Option<ClipHandle> {
        let mesh = self.meshes.get(&root)?;
        mesh.clips
            .iter()
            .copied()
            .find(|h| self.clips.get(h).is_some_and(|c| c.name == name))
    }

    fn start_loop(&mut self, clip: ClipHandle, looped: bool) {
        if let Some(player) = self.clips.get_mut(&clip) {
            player.playing = true;
            player.looped = looped;
        }
    }

    fn stop_loop(&mut self, clip: ClipHandle) {
        if let Some(player) = self.clips.get_mut(&clip) {
            player.playing = false;
            player.time = 0.0;
        }
    }

    fn set_additive_weight(&mut self, clip: ClipHandle, weight: f32) {
        if let Some(player) = self.clips.get_mut(&clip) {
            player.weight = weight;
        }
    }

    fn set_transform(&mut self, mesh: MeshHandle, position: Vec3, heading: f32) {
        if let Some(instance) = self.meshes.get_mut(&mesh) {
            instance.desc.position = position;
            instance.desc.heading = heading;
        }
    }

    fn dispose_mesh(&mut self, mesh: MeshHandle) {
        if let Some(instance) = self.meshes.remove(&mesh) {
            for clip in instance.clips {
                self.clips.remove(&clip);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pedestrian_desc() -> MeshDesc {
        MeshDesc::new(MeshKind::Pedestrian, Vec3::ZERO, Vec3::new(0.6, 1.8, 0.4), [1.0; 3])
    }

    #[test]
    fn import_creates_independent_clip_sets() {
        let mut host = EngineHost::new(AssetLibrary::builtin());
        let a = host.import_animated_asset(PEDESTRIAN_ASSET, pedestrian_desc()).unwrap();
        let b = host.import_animated_asset(PEDESTRIAN_ASSET, pedestrian_desc()).unwrap();

        let walk_a = host.find_animation_by_name(a, "walk").unwrap();
        let walk_b = host.find_animation_by_name(b, "walk").unwrap();
        assert_ne!(walk_a, walk_b);
        assert_eq!(host.clip_count(), 14);
    }

    #[test]
    fn unknown_asset_is_an_error() {
        let mut host = EngineHost::new(AssetLibrary::builtin());
        let result = host.import_animated_asset("Ybot.glb", pedestrian_desc());
        assert!(matches!(result, Err(AssetError::UnknownAsset(name)) if name == "Ybot.glb"));
        assert_eq!(host.mesh_count(), 0);
    }

    #[test]
    fn dispose_releases_clips() {
        let mut host = EngineHost::new(AssetLibrary::builtin());
        let root = host.import_animated_asset(PEDESTRIAN_ASSET, pedestrian_desc()).unwrap();
        host.dispose_mesh(root);
        assert_eq!(host.mesh_count(), 0);
        assert_eq!(host.clip_count(), 0);
        assert!(host.find_animation_by_name(root, "walk").is_none());
    }

    #[test]
    fn zero_weight_clip_keeps_advancing() {
        let mut host = EngineHost::new(AssetLibrary::builtin());
        let root = host.import_animated_asset(PEDESTRIAN_ASSET, pedestrian_desc()).unwrap();
        let agree = host.find_animation_by_name(root, "agree").unwrap();
        host.start_loop(agree, true);
        host.set_additive_weight(agree, 0.0);
        host.advance(0.5);
        assert!((host.clip(agree).unwrap().time - 0.5).abs() < 1e-6);
    }

    #[test]
    fn looped_clip_wraps() {
        let mut host = EngineHost::new(AssetLibrary::builtin());
        let root = host.import_animated_asset(PEDESTRIAN_ASSET, pedestrian_desc()).unwrap();
        let run = host.find_animation_by_name(root, "run").unwrap();
        host.start_loop(run, true);
        host.advance(1.0);
        let player = host.clip(run).unwrap();
        assert!(player.playing);
        assert!((player.time - 0.3).abs() < 1e-5);
    }

    #[test]
    fn manifest_parses_from_json() {
        let json = r#"{"assets":[{"name":"Xbot.glb","clips":[{"name":"walk","duration":1.0}]}]}"#;
        let library = AssetLibrary::from_json(json).unwrap();
        assert_eq!(library.get("Xbot.glb").unwrap().clips.len(), 1);
    }

    #[test]
    fn bundled_manifest_matches_builtin() {
        let library = AssetLibrary::from_json(include_str!("../../assets/pedestrian.json")).unwrap();
        assert_eq!(library.assets, AssetLibrary::builtin().assets);
    }
}
