// Input state tracking for keyboard and mouse
// Abstracts winit events into a queryable per-frame snapshot

use std::collections::HashSet;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Pointer travel (pixels) beyond which a press-release is a drag, not a click.
const CLICK_SLOP: f32 = 4.0;

pub struct InputState {
    keys_held: HashSet<KeyCode>,
    // Edges seen since the last end_frame(), in arrival order.
    keys_pressed: Vec<KeyCode>,
    keys_released: Vec<KeyCode>,

    buttons_held: HashSet<MouseButton>,
    pub mouse_position: (f32, f32),
    mouse_prev_position: (f32, f32),
    pub mouse_delta: (f32, f32),
    press_position: Option<(f32, f32)>,
    click: Option<(f32, f32)>,

    // Scroll: accumulated vertical scroll this frame, reset in end_frame()
    pub scroll_delta: f32,

    pub window_size: (u32, u32),
}

impl InputState {
    pub fn new(window_size: (u32, u32)) -> Self {
        Self {
            keys_held: HashSet::new(),
            keys_pressed: Vec::new(),
            keys_released: Vec::new(),
            buttons_held: HashSet::new(),
            mouse_position: (0.0, 0.0),
            mouse_prev_position: (0.0, 0.0),
            mouse_delta: (0.0, 0.0),
            press_position: None,
            click: None,
            scroll_delta: 0.0,
            window_size,
        }
    }

    /// Feed a winit WindowEvent into the input state.
    pub fn process_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => {
                            // OS key repeat arrives as further Pressed events.
                            if self.keys_held.insert(key) {
                                self.keys_pressed.push(key);
                            }
                        }
                        ElementState::Released => {
                            if self.keys_held.remove(&key) {
                                self.keys_released.push(key);
                            }
                        }
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => {
                    self.buttons_held.insert(*button);
                    if *button == MouseButton::Left {
                        self.press_position = Some(self.mouse_position);
                    }
                }
                ElementState::Released => {
                    self.buttons_held.remove(button);
                    if *button == MouseButton::Left {
                        if let Some(start) = self.press_position.take() {
                            let (dx, dy) = (self.mouse_position.0 - start.0, self.mouse_position.1 - start.1);
                            if dx.hypot(dy) <= CLICK_SLOP {
                                self.click = Some(self.mouse_position);
                            }
                        }
                    }
                }
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_position = (position.x as f32, position.y as f32);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                };
                self.scroll_delta += y;
            }
            WindowEvent::Resized(size) => {
                self.window_size = (size.width, size.height);
            }
            // Keys held while focus leaves would otherwise never release.
            WindowEvent::Focused(false) => {
                self.keys_released.extend(self.keys_held.drain());
                self.buttons_held.clear();
                self.press_position = None;
            }
            _ => {}
        }
    }

    /// Call once per frame after the frame has consumed input.
    pub fn end_frame(&mut self) {
        self.scroll_delta = 0.0;
        self.keys_pressed.clear();
        self.keys_released.clear();
        self.click = None;
        self.mouse_delta = (
            self.mouse_position.0 - self.mouse_prev_position.0,
            self.mouse_position.1 - self.mouse_prev_position.1,
        );
        self.mouse_prev_position = self.mouse_position;
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    pub fn is_button_held(&self, button: MouseButton) -> bool {
        self.buttons_held.contains(&button)
    }

    pub fn pressed_keys(&self) -> &[KeyCode] {
        &self.keys_pressed
    }

    pub fn released_keys(&self) -> &[KeyCode] {
        &self.keys_released
    }

    /// Pixel of a left click completed this frame.
    pub fn click(&self) -> Option<(f32, f32)> {
        self.click
    }
}

/// Printable symbol of a digit key, top row or keypad.
pub fn key_symbol(key: KeyCode) -> Option<char> {
    let digit = match key {
        KeyCode::Digit0 | KeyCode::Numpad0 => 0,
        KeyCode::Digit1 | KeyCode::Numpad1 => 1,
        KeyCode::Digit2 | KeyCode::Numpad2 => 2,
        KeyCode::Digit3 | KeyCode::Numpad3 => 3,
        KeyCode::Digit4 | KeyCode::Numpad4 => 4,
        KeyCode::Digit5 | KeyCode::Numpad5 => 5,
        KeyCode::Digit6 | KeyCode::Numpad6 => 6,
        KeyCode::Digit7 | KeyCode::Numpad7 => 7,
        KeyCode::Digit8 | KeyCode::Numpad8 => 8,
        KeyCode::Digit9 | KeyCode::Numpad9 => 9,
        _ => return None,
    };
    char::from_digit(digit, 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_keys_have_symbols() {
        assert_eq!(key_symbol(KeyCode::Digit1), Some('1'));
        assert_eq!(key_symbol(KeyCode::Numpad4), Some('4'));
        assert_eq!(key_symbol(KeyCode::KeyW), None);
    }
}
