// egui panels for the three views.
//
// Panels never mutate the scene. Every edit comes back as a `UiAction` that
// the app routes to the config store, the scene's message inbox or the view
// switcher after the frame is drawn.

use crate::config::{ConfigDraft, SceneConfig};
use crate::scene::blend::Layer;
use crate::scene::locomotion::LocomotionState;
use crate::scene::pool::AgentSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Main,
    ConveyorConfig,
    PedestrianConfig,
}

impl View {
    pub fn title(self) -> &'static str {
        match self {
            View::Main => "Main",
            View::ConveyorConfig => "Conveyor",
            View::PedestrianConfig => "Pedestrian",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiAction {
    Navigate(View),
    Config(SceneConfig),
    Weight(Layer, f32),
}

/// Numbers shown in the status panel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub fps: u32,
    pub agents: usize,
    pub boxes: usize,
}

/// Editable state that outlives a single frame.
pub struct UiState {
    draft: ConfigDraft,
    error: Option<String>,
    /// Lead agent as of the last tick. Gesture sliders show its weights.
    lead: Option<AgentSnapshot>,
}

impl UiState {
    pub fn new(config: SceneConfig) -> Self {
        Self { draft: ConfigDraft::from(config), error: None, lead: None }
    }

    /// Mirror the scene after its tick, so key input and pool rebuilds show
    /// up on the sliders.
    pub fn observe(&mut self, lead: Option<AgentSnapshot>) {
        self.lead = lead;
    }

    fn gesture(&self, layer: Layer) -> f32 {
        self.lead.as_ref().map_or(0.0, |agent| agent.weight(layer))
    }

    /// Resync the form with the accepted config.
    pub fn sync(&mut self, config: SceneConfig) {
        self.draft = ConfigDraft::from(config);
        self.error = None;
    }

    fn submit(&mut self, actions: &mut Vec<UiAction>) {
        match self.draft.validate() {
            Ok(config) => {
                self.error = None;
                actions.push(UiAction::Config(config));
            }
            Err(err) => {
                log::warn!("rejected config edit: {err}");
                self.error = Some(err.to_string());
            }
        }
    }
}

pub fn draw(ctx: &egui::Context, view: View, state: &mut UiState, stats: &Stats, actions: &mut Vec<UiAction>) {
    match view {
        View::Main => main_panel(ctx, stats, actions),
        View::ConveyorConfig => conveyor_panel(ctx, state, actions),
        View::PedestrianConfig => pedestrian_panel(ctx, state, actions),
    }
}

fn main_panel(ctx: &egui::Context, stats: &Stats, actions: &mut Vec<UiAction>) {
    egui::Window::new("Scene")
        .anchor(egui::Align2::LEFT_TOP, [10.0, 10.0])
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui| {
            ui.label(format!("FPS: {}", stats.fps));
            ui.label(format!("Pedestrians: {}", stats.agents));
            ui.label(format!("Boxes: {}", stats.boxes));
            ui.separator();
            ui.label("Click the belt or a pedestrian to configure it.");
            ui.label("Hold 1-4 for gestures, right-drag to orbit.");
            ui.horizontal(|ui| {
                if ui.button("Conveyor").clicked() {
                    actions.push(UiAction::Navigate(View::ConveyorConfig));
                }
                if ui.button("Pedestrian").clicked() {
                    actions.push(UiAction::Navigate(View::PedestrianConfig));
                }
            });
        });
}

fn back_button(ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
    if ui.button("Back to scene").clicked() {
        actions.push(UiAction::Navigate(View::Main));
    }
}

fn error_line(ui: &mut egui::Ui, error: &Option<String>) {
    if let Some(message) = error {
        ui.colored_label(egui::Color32::from_rgb(255, 120, 110), message);
    }
}

fn conveyor_panel(ctx: &egui::Context, state: &mut UiState, actions: &mut Vec<UiAction>) {
    egui::Window::new("Conveyor")
        .anchor(egui::Align2::RIGHT_TOP, [-10.0, 10.0])
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui| {
            let mut changed = false;
            egui::Grid::new("conveyor_grid").num_columns(2).show(ui, |ui| {
                ui.label("Boxes");
                changed |= ui.add(egui::DragValue::new(&mut state.draft.num_boxes).speed(0.1)).changed();
                ui.end_row();

                ui.label("Speed");
                changed |= ui
                    .add(egui::DragValue::new(&mut state.draft.box_speed).speed(0.05).suffix(" u/s"))
                    .changed();
                ui.end_row();

                ui.label("Spacing");
                changed |= ui.add(egui::DragValue::new(&mut state.draft.box_spacing).speed(0.05)).changed();
                ui.end_row();
            });
            if changed {
                state.submit(actions);
            }
            error_line(ui, &state.error);
            ui.separator();
            back_button(ui, actions);
        });
}

fn pedestrian_panel(ctx: &egui::Context, state: &mut UiState, actions: &mut Vec<UiAction>) {
    egui::Window::new("Pedestrian")
        .anchor(egui::Align2::RIGHT_TOP, [-10.0, 10.0])
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui| {
            let mut changed = false;
            ui.horizontal(|ui| {
                for locomotion in LocomotionState::ALL {
                    changed |= ui
                        .radio_value(&mut state.draft.pedestrian.state, locomotion, locomotion.label())
                        .changed();
                }
            });
            ui.horizontal(|ui| {
                ui.label("Count");
                changed |= ui
                    .add(egui::DragValue::new(&mut state.draft.pedestrian.count).speed(0.1))
                    .changed();
            });
            if changed {
                state.submit(actions);
            }
            error_line(ui, &state.error);

            ui.separator();
            ui.label("Gestures");
            for layer in Layer::ADDITIVE {
                let mut value = state.gesture(layer);
                if ui.add(egui::Slider::new(&mut value, 0.0..=1.0).text(layer.label())).changed() {
                    actions.push(UiAction::Weight(layer, value));
                }
            }
            if let Some(agent) = &state.lead {
                ui.separator();
                agent_details(ui, agent);
            }
            ui.separator();
            back_button(ui, actions);
        });
}

fn agent_details(ui: &mut egui::Ui, agent: &AgentSnapshot) {
    ui.label(format!("Agent #{} (generation {})", agent.id, agent.generation));
    let state = agent.state.map_or("none", LocomotionState::label);
    ui.label(format!("State: {state}, lane {:+.1}", agent.spawn_offset));
    let p = agent.position;
    ui.label(format!("Position: ({:.1}, {:.1}, {:.1})", p.x, p.y, p.z));
    ui.label(format!(
        "Heading {:.0}°, segment {} at {:.1}",
        agent.heading.to_degrees(),
        agent.current_segment,
        agent.path_progress
    ));
}
