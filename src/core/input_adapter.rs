use std::collections::HashSet;

use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use crate::core::input_router::InputRouter;
use crate::scene::SceneGraph;
use crate::traits::{Button, Controller, DrawSurface};

/// Adapter that bridges Winit events to the [`InputRouter`]
///
/// Tracks pressed buttons, the cursor and the window scale factor so that
/// physical-pixel events can be handed on in logical pixels.
#[derive(Debug, Clone)]
pub struct WinitInput {
    /// Currently pressed buttons
    pressed_keys: HashSet<Button>,
    /// Cursor position in logical pixels
    mouse_position: Option<(f32, f32)>,
    scale_factor: f64,
    physical_size: (u32, u32),
}

impl WinitInput {
    pub fn new(scale_factor: f64, physical_size: (u32, u32)) -> Self {
        Self {
            pressed_keys: HashSet::new(),
            mouse_position: None,
            scale_factor,
            physical_size,
        }
    }

    /// Route one window event; returns true when it was understood
    pub fn process_event(
        &mut self,
        event: &WindowEvent,
        router: &mut InputRouter,
        scene: &mut SceneGraph,
        surface: &mut dyn DrawSurface,
    ) -> bool {
        match event {
            WindowEvent::Resized(size) => {
                self.physical_size = (size.width, size.height);
                self.apply_size(router, scene, surface);
                true
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.scale_factor = *scale_factor;
                self.apply_size(router, scene, surface);
                true
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.set_button(Button::Control, modifiers.state().control_key());
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                match Self::mouse_button_to_button(*button) {
                    Some(btn) => {
                        self.set_button(btn, *state == ElementState::Pressed);
                        true
                    }
                    None => false,
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let logical = position.to_logical::<f64>(self.scale_factor);
                self.pointer_moved(logical.x as f32, logical.y as f32, router, scene);
                true
            }
            WindowEvent::CursorLeft { .. } => {
                self.mouse_position = None;
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                match *delta {
                    MouseScrollDelta::LineDelta(_, y) => self.wheel(y, None, router, scene),
                    MouseScrollDelta::PixelDelta(pos) => {
                        let logical = pos.to_logical::<f64>(self.scale_factor);
                        self.wheel(0.0, Some(logical.y as f32), router, scene)
                    }
                }
                true
            }
            _ => false,
        }
    }

    /// Cursor moved to `(x, y)` logical pixels
    pub fn pointer_moved(&mut self, x: f32, y: f32, router: &mut InputRouter, scene: &mut SceneGraph) {
        if let Some((old_x, old_y)) = self.mouse_position {
            let (dx, dy) = (x - old_x, y - old_y);
            if self.is_down(Button::MouseLeft) {
                router.drag_rotate(dx, dy);
            } else if self.is_down(Button::MouseRight) || self.is_down(Button::MouseMiddle) {
                router.drag_pan(scene, dx, dy);
            }
        }
        self.mouse_position = Some((x, y));
    }

    /// Wheel turned by `lines`, or by `pixels` for precise touchpads
    ///
    /// With control held the wheel zooms the camera instead of scrolling.
    pub fn wheel(&mut self, lines: f32, pixels: Option<f32>, router: &mut InputRouter, scene: &mut SceneGraph) {
        if self.is_down(Button::Control) {
            let amount = pixels.map(|p| p / 40.0).unwrap_or(lines);
            router.dolly(-amount);
            return;
        }
        match pixels {
            Some(pixels) => router.wheel(scene, pixels),
            None => router.wheel_lines(scene, lines),
        }
    }

    pub fn set_button(&mut self, button: Button, down: bool) {
        if down {
            self.pressed_keys.insert(button);
        } else {
            self.pressed_keys.remove(&button);
        }
    }

    /// Logical window size at the current scale factor
    pub fn logical_size(&self) -> (u32, u32) {
        let (w, h) = self.physical_size;
        let scale = if self.scale_factor > 0.0 { self.scale_factor } else { 1.0 };
        (
            (w as f64 / scale).round() as u32,
            (h as f64 / scale).round() as u32,
        )
    }

    fn apply_size(&self, router: &mut InputRouter, scene: &mut SceneGraph, surface: &mut dyn DrawSurface) {
        let (width, height) = self.logical_size();
        router.resize(scene, surface, width, height, self.scale_factor as f32);
    }

    /// Map Winit MouseButton to Button
    fn mouse_button_to_button(button: MouseButton) -> Option<Button> {
        match button {
            MouseButton::Left => Some(Button::MouseLeft),
            MouseButton::Right => Some(Button::MouseRight),
            MouseButton::Middle => Some(Button::MouseMiddle),
            _ => None,
        }
    }
}

impl Default for WinitInput {
    fn default() -> Self {
        Self::new(1.0, (0, 0))
    }
}

impl Controller for WinitInput {
    fn is_down(&self, button: Button) -> bool {
        self.pressed_keys.contains(&button)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrbitConfig;

    // Winit events are awkward to construct in tests; these drive the
    // adapter through the same entry points process_event uses.

    fn router() -> InputRouter {
        InputRouter::new(
            Default::default(),
            OrbitConfig {
                damping: false,
                ..OrbitConfig::default()
            },
        )
    }

    #[test]
    fn test_new_input_empty() {
        let input = WinitInput::default();
        assert!(!input.is_down(Button::MouseLeft));
        assert!(!input.is_down(Button::Control));
    }

    #[test]
    fn test_button_press_and_release() {
        let mut input = WinitInput::default();
        input.set_button(Button::MouseLeft, true);
        input.set_button(Button::MouseLeft, true);
        assert!(input.is_down(Button::MouseLeft));

        input.set_button(Button::MouseLeft, false);
        assert!(!input.is_down(Button::MouseLeft));
    }

    #[test]
    fn test_hover_does_not_orbit() {
        let mut input = WinitInput::default();
        let mut router = router();
        let mut scene = SceneGraph::default();
        scene.camera.position = glam::Vec3::new(0.0, 0.0, 50.0);

        input.pointer_moved(10.0, 10.0, &mut router, &mut scene);
        input.pointer_moved(200.0, 10.0, &mut router, &mut scene);
        assert!(!router.update(&mut scene));
    }

    #[test]
    fn test_left_drag_orbits() {
        let mut input = WinitInput::new(1.0, (800, 600));
        let mut router = router();
        let mut scene = SceneGraph::default();
        scene.camera.position = glam::Vec3::new(0.0, 0.0, 50.0);
        let mut surface = NullSurface;
        router.resize(&mut scene, &mut surface, 800, 600, 1.0);

        input.pointer_moved(10.0, 10.0, &mut router, &mut scene);
        input.set_button(Button::MouseLeft, true);
        input.pointer_moved(200.0, 10.0, &mut router, &mut scene);
        assert!(router.update(&mut scene));
    }

    #[test]
    fn test_ctrl_wheel_zooms_instead_of_scrolling() {
        let mut input = WinitInput::default();
        let mut router = router();
        let mut scene = SceneGraph::default();
        scene.camera.position = glam::Vec3::new(0.0, 0.0, 50.0);

        input.set_button(Button::Control, true);
        input.wheel(1.0, None, &mut router, &mut scene);
        assert_eq!(router.page_offset(), 0.0);
        router.update(&mut scene);
        assert!(scene.camera.position.z < 50.0);

        input.set_button(Button::Control, false);
        input.wheel(-1.0, None, &mut router, &mut scene);
        assert!(router.page_offset() > 0.0);
    }

    #[test]
    fn test_logical_size_divides_by_scale() {
        let input = WinitInput::new(2.0, (1600, 1200));
        assert_eq!(input.logical_size(), (800, 600));
    }

    struct NullSurface;

    impl DrawSurface for NullSurface {
        fn set_size(&mut self, _width: u32, _height: u32) {}
        fn set_pixel_ratio(&mut self, _ratio: f32) {}
    }
}
