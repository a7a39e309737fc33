// RenderHost double that records every playback call.

use std::collections::HashMap;

use glam::Vec3;

use crate::engine::host::{ClipHandle, MeshDesc, MeshHandle, MeshKind, RenderHost};
use crate::errors::AssetError;
use crate::scene::blend::Layer;

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Create(MeshHandle, MeshKind),
    Start(ClipHandle, bool),
    Stop(ClipHandle),
    Weight(ClipHandle, f32),
    Dispose(MeshHandle),
}

pub struct RecordingHost {
    next_id: u32,
    clip_names: Vec<String>,
    fail_imports: bool,
    meshes: HashMap<MeshHandle, (MeshDesc, Vec<(String, ClipHandle)>)>,
    calls: Vec<HostCall>,
}

impl RecordingHost {
    /// Host whose asset carries every layer clip.
    pub fn full() -> Self {
        Self::with_clips(&Layer::ALL.map(Layer::clip_name))
    }

    pub fn with_clips(names: &[&str]) -> Self {
        Self {
            next_id: 1,
            clip_names: names.iter().map(|n| n.to_string()).collect(),
            fail_imports: false,
            meshes: HashMap::new(),
            calls: Vec::new(),
        }
    }

    /// Host that knows no animated assets at all.
    pub fn failing() -> Self {
        let mut host = Self::with_clips(&[]);
        host.fail_imports = true;
        host
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Import a pedestrian carrying exactly `names`, bypassing the default set.
    pub fn import_with_clips(&mut self, names: &[&str]) -> MeshHandle {
        let saved = std::mem::replace(
            &mut self.clip_names,
            names.iter().map(|n| n.to_string()).collect(),
        );
        let desc = MeshDesc::new(MeshKind::Pedestrian, Vec3::ZERO, Vec3::ONE, [1.0; 3]);
        let root = self.import_animated_asset("test", desc);
        self.clip_names = saved;
        root.expect("recording host import")
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn live_of_kind(&self, kind: MeshKind) -> usize {
        self.meshes.values().filter(|(d, _)| d.kind == kind).count()
    }

    /// Current descriptions of every live mesh of `kind`.
    pub fn descs_of_kind(&self, kind: MeshKind) -> Vec<MeshDesc> {
        self.meshes.values().map(|(d, _)| *d).filter(|d| d.kind == kind).collect()
    }
}

impl RenderHost for RecordingHost {
    fn create_mesh(&mut self, desc: MeshDesc) -> MeshHandle {
        let handle = MeshHandle::from_raw(self.next());
        self.meshes.insert(handle, (desc, Vec::new()));
        self.calls.push(HostCall::Create(handle, desc.kind));
        handle
    }

    fn import_animated_asset(&mut self, asset: &str, desc: MeshDesc) -> Result<MeshHandle, AssetError> {
        if self.fail_imports {
            return Err(AssetError::UnknownAsset(asset.to_string()));
        }
        let root = self.create_mesh(desc);
        let names = self.clip_names.clone();
        let clips = names
            .into_iter()
            .map(|name| (name, ClipHandle::from_raw(self.next())))
            .collect();
        if let Some(entry) = self.meshes.get_mut(&root) {
            entry.1 = clips;
        }
        Ok(root)
    }

    fn find_animation_by_name(&self, root: MeshHandle, name: &str) -> Option<ClipHandle> {
        self.meshes
            .get(&root)?
            .1
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, h)| *h)
    }

    fn start_loop(&mut self, clip: ClipHandle, looped: bool) {
        self.calls.push(HostCall::Start(clip, looped));
    }

    fn stop_loop(&mut self, clip: ClipHandle) {
        self.calls.push(HostCall::Stop(clip));
    }

    fn set_additive_weight(&mut self, clip: ClipHandle, weight: f32) {
        self.calls.push(HostCall::Weight(clip, weight));
    }

    fn set_transform(&mut self, mesh: MeshHandle, position: Vec3, heading: f32) {
        if let Some((desc, _)) = self.meshes.get_mut(&mesh) {
            desc.position = position;
            desc.heading = heading;
        }
    }

    fn dispose_mesh(&mut self, mesh: MeshHandle) {
        if self.meshes.remove(&mesh).is_some() {
            self.calls.push(HostCall::Dispose(mesh));
        }
    }
}
