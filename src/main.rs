// Conveyor belt with patrolling, animated pedestrians.
// One scene controller is alive at a time; switching views disposes it and
// builds the next one against the same render host.

mod config;
mod engine;
mod errors;
mod scene;
mod ui;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use winit::{
    event::{ElementState, Event as WinitEvent, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use config::{ConfigStore, SceneConfig, load_config};
use engine::camera::OrbitCamera;
use engine::host::{AssetLibrary, EngineHost};
use engine::input::{InputState, key_symbol};
use engine::renderer::Renderer;
use errors::AppError;
use scene::keymap::KeyMap;
use scene::{PickTarget, SceneController, SceneLayout};
use ui::{Stats, UiAction, UiState, View};

const ASSET_MANIFEST: &str = "assets/pedestrian.json";

// Largest step fed to the simulation, so a stalled frame does not teleport agents.
const MAX_FRAME_DT: f32 = 0.1;

// ============================================================================
// APPLICATION STATE
// ============================================================================

struct App {
    window: Arc<Window>,
    renderer: Renderer,
    host: EngineHost,
    store: ConfigStore,
    /// Store revision last posted to the live scene.
    sent_revision: u64,
    view: View,
    scene: Option<SceneController>,
    camera: OrbitCamera,
    input: InputState,
    ui: UiState,
    keymap: KeyMap,
    stats: Stats,
    last_update: Instant,
    frame_count: u32,
    last_fps_update: Instant,
}

impl App {
    fn new(window: Arc<Window>, renderer: Renderer, library: AssetLibrary, config: SceneConfig) -> Self {
        let size = window.inner_size();
        let mut app = Self {
            window,
            renderer,
            host: EngineHost::new(library),
            store: ConfigStore::new(config),
            sent_revision: 0,
            view: View::Main,
            scene: None,
            camera: camera_for(View::Main),
            input: InputState::new((size.width, size.height)),
            ui: UiState::new(config),
            keymap: KeyMap::default(),
            stats: Stats::default(),
            last_update: Instant::now(),
            frame_count: 0,
            last_fps_update: Instant::now(),
        };
        app.switch_view(View::Main);
        app
    }

    /// Dispose the current scene and build `view` in its place.
    fn switch_view(&mut self, view: View) {
        if let Some(scene) = self.scene.take() {
            scene.dispose(&mut self.host);
        }

        let layout = match view {
            View::Main => SceneLayout::main(),
            View::ConveyorConfig => SceneLayout::conveyor_preview(),
            View::PedestrianConfig => SceneLayout::pedestrian_preview(),
        };
        let scene = SceneController::new(layout, &mut self.host);
        scene.sender().config(self.store.snapshot());
        self.sent_revision = self.store.revision();

        self.scene = Some(scene);
        self.camera = camera_for(view);
        self.view = view;
        self.ui.sync(self.store.snapshot());
        self.ui.observe(None);
        log::info!("view: {}", view.title());
    }

    fn shutdown(&mut self) {
        if let Some(scene) = self.scene.take() {
            scene.dispose(&mut self.host);
        }
        log::info!(
            "shut down with {} meshes and {} clips left on the host",
            self.host.mesh_count(),
            self.host.clip_count()
        );
    }

    /// Turn this frame's key edges and clicks into scene messages.
    /// Returns the view a click asked to open, if any.
    fn route_input(&mut self) -> Option<View> {
        let scene = self.scene.as_mut()?;
        let sender = scene.sender();

        if !self.renderer.overlay.wants_keyboard() {
            for key in self.input.pressed_keys() {
                if let Some(layer) = key_symbol(*key).and_then(|c| self.keymap.layer_for(c)) {
                    sender.press(layer);
                }
            }
        }
        // Releases always go through so a gesture can't stick at 1.
        for key in self.input.released_keys() {
            if let Some(layer) = key_symbol(*key).and_then(|c| self.keymap.layer_for(c)) {
                sender.release(layer);
            }
        }

        if self.view != View::Main || self.renderer.overlay.wants_pointer() {
            return None;
        }
        let pixel = self.input.click()?;
        let ray = self.camera.screen_ray(pixel, self.input.window_size);
        match scene.pick(ray)? {
            PickTarget::Conveyor => Some(View::ConveyorConfig),
            PickTarget::Pedestrian(id) => {
                log::debug!("picked pedestrian {id}");
                Some(View::PedestrianConfig)
            }
        }
    }

    fn apply(&mut self, action: UiAction) {
        match action {
            UiAction::Navigate(view) => {
                if view != self.view {
                    self.switch_view(view);
                }
            }
            UiAction::Config(config) => self.store.set(config),
            UiAction::Weight(layer, value) => {
                if let Some(scene) = &self.scene {
                    scene.sender().set_weight(layer, value);
                }
            }
        }
    }

    /// Update and draw one frame. Returns false when the app should exit.
    fn frame(&mut self) -> bool {
        let now = Instant::now();
        let dt = (now - self.last_update).as_secs_f32().min(MAX_FRAME_DT);
        self.last_update = now;

        if let Some(view) = self.route_input() {
            self.switch_view(view);
        }
        self.camera.update(&self.input, dt);

        if let Some(scene) = &mut self.scene {
            if self.store.revision() != self.sent_revision {
                scene.sender().config(self.store.snapshot());
                self.sent_revision = self.store.revision();
            }
            scene.tick(dt, &mut self.host);
            self.ui.observe(scene.lead_agent());
            self.stats.agents = scene.agent_count();
            self.stats.boxes = scene.box_count();
        }
        self.host.advance(dt);

        let draws = self.host.draw_instances();
        let view_proj = self.camera.view_projection(self.renderer.aspect());
        let mut actions = Vec::new();
        let (view, stats, ui_state) = (self.view, self.stats, &mut self.ui);
        let result = self.renderer.render(&self.window, &draws, view_proj, |ctx| {
            ui::draw(ctx, view, ui_state, &stats, &mut actions);
        });
        match result {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.renderer.resize(self.renderer.size)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("surface out of memory");
                return false;
            }
            Err(e) => log::warn!("{e:?}"),
        }

        for action in actions {
            self.apply(action);
        }
        self.input.end_frame();

        self.frame_count += 1;
        if (now - self.last_fps_update).as_secs_f32() >= 1.0 {
            self.stats.fps = self.frame_count;
            log::debug!(
                "FPS: {} | agents: {} | boxes: {} | meshes: {}",
                self.frame_count,
                self.stats.agents,
                self.stats.boxes,
                self.host.mesh_count()
            );
            self.frame_count = 0;
            self.last_fps_update = now;
        }
        true
    }
}

fn camera_for(view: View) -> OrbitCamera {
    match view {
        View::Main => OrbitCamera::new(Vec3::new(30.0, 0.0, 0.0), 90.0, 40.0),
        View::ConveyorConfig => OrbitCamera::new(Vec3::ZERO, 55.0, 35.0),
        View::PedestrianConfig => OrbitCamera::new(Vec3::new(0.0, 1.0, 0.0), 9.0, 12.0),
    }
}

// ============================================================================
// MAIN
// ============================================================================

#[allow(deprecated)]
fn main() -> Result<(), AppError> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("loading config from {path}");
            load_config(&path)?
        }
        None => SceneConfig::default(),
    };
    let library = if Path::new(ASSET_MANIFEST).exists() {
        AssetLibrary::load(ASSET_MANIFEST)?
    } else {
        log::info!("{ASSET_MANIFEST} not found, using the built-in pedestrian rig");
        AssetLibrary::builtin()
    };

    let event_loop = EventLoop::new()?;

    let window_attributes = Window::default_attributes()
        .with_title("Conveyor Patrol")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let renderer = pollster::block_on(Renderer::new(window.clone()))?;
    let mut app = App::new(window.clone(), renderer, library, config);

    event_loop.run(move |event, control_flow| {
        match event {
            WinitEvent::WindowEvent {
                ref event,
                window_id,
            } if window_id == window.id() => {
                let _ = app.renderer.overlay.handle_window_event(&window, event);
                app.input.process_event(event);

                match event {
                    WindowEvent::CloseRequested => {
                        app.shutdown();
                        control_flow.exit();
                    }
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(KeyCode::Escape),
                                ..
                            },
                        ..
                    } => {
                        if app.view == View::Main {
                            app.shutdown();
                            control_flow.exit();
                        } else {
                            app.switch_view(View::Main);
                        }
                    }
                    WindowEvent::Resized(physical_size) => {
                        app.renderer.resize(*physical_size);
                    }
                    WindowEvent::RedrawRequested => {
                        if !app.frame() {
                            app.shutdown();
                            control_flow.exit();
                        }
                    }
                    _ => {}
                }
            }
            WinitEvent::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
