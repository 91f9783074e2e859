use crate::config::{OrbitConfig, ScrollConfig, MAX_PIXEL_RATIO};
use crate::core::orbit::OrbitControls;
use crate::scene::{SceneGraph, Tracked};
use crate::traits::DrawSurface;

/// Last observed vertical page offset, never negative
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollState {
    pub last: f32,
}

/// Routes window-level input into scene mutations
///
/// Holds no scene state of its own besides the scroll bookkeeping and the
/// orbit controller; the scene is lent to every handler.
#[derive(Debug, Clone)]
pub struct InputRouter {
    pub orbit: OrbitControls,
    scroll: ScrollState,
    config: ScrollConfig,
    page_offset: f32,
    viewport: (u32, u32),
}

impl InputRouter {
    pub fn new(scroll: ScrollConfig, orbit: OrbitConfig) -> Self {
        Self {
            orbit: OrbitControls::new(orbit),
            scroll: ScrollState::default(),
            config: scroll,
            page_offset: 0.0,
            viewport: (0, 0),
        }
    }

    pub fn scroll_state(&self) -> ScrollState {
        self.scroll
    }

    /// Current virtual page offset produced by the wheel
    pub fn page_offset(&self) -> f32 {
        self.page_offset
    }

    /// Logical viewport size from the last accepted resize
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Match camera and surface to a new logical window size
    ///
    /// Returns false for zero-sized events (a minimized window), which are
    /// ignored.
    pub fn resize(
        &mut self,
        scene: &mut SceneGraph,
        surface: &mut dyn DrawSurface,
        width: u32,
        height: u32,
        device_pixel_ratio: f32,
    ) -> bool {
        if width == 0 || height == 0 {
            log::debug!("Ignoring zero-sized resize {}x{}", width, height);
            return false;
        }

        scene.camera.aspect = width as f32 / height as f32;
        scene.camera.update_projection();

        surface.set_size(width, height);
        surface.set_pixel_ratio(clamp_pixel_ratio(device_pixel_ratio));

        self.viewport = (width, height);
        log::debug!(
            "Resized to {}x{} @ {:.2}x (aspect {:.3})",
            width,
            height,
            device_pixel_ratio,
            scene.camera.aspect
        );
        true
    }

    /// React to the page scroll position `offset`
    ///
    /// Scrolling down turns the spinner by the configured step about both
    /// axes and raises the particle cloud; anything else applies the exact
    /// inverse. Nothing moves until the spinner has loaded, but the offset
    /// is recorded regardless.
    pub fn scroll(&mut self, scene: &mut SceneGraph, offset: f32) {
        if !offset.is_finite() {
            log::warn!("Ignoring non-finite scroll offset {}", offset);
            return;
        }

        let increased = offset > self.scroll.last;

        if scene.tracked(Tracked::Spinner).is_some() {
            let step = self.config.rotation_step;
            let [first, second] = self.config.axes;
            if let Some(spinner) = scene.tracked_mut(Tracked::Spinner) {
                if increased {
                    spinner.transform.rotate_local(first, step);
                    spinner.transform.rotate_local(second, step);
                } else {
                    spinner.transform.rotate_local(second, -step);
                    spinner.transform.rotate_local(first, -step);
                }
            }

            let rise = if increased {
                self.config.particle_step
            } else {
                -self.config.particle_step
            };
            if let Some(particles) = scene.tracked_mut(Tracked::Particles) {
                particles.transform.position.y += rise;
            }
        }

        self.scroll.last = offset.max(0.0);
    }

    /// Wheel motion in pixels, positive away from the user
    ///
    /// Moves a virtual page that cannot scroll above its top; motion that
    /// does not change the page produces no scroll event.
    pub fn wheel(&mut self, scene: &mut SceneGraph, delta_pixels: f32) {
        let offset = (self.page_offset - delta_pixels).max(0.0);
        if offset == self.page_offset {
            return;
        }
        self.page_offset = offset;
        self.scroll(scene, offset);
    }

    /// Wheel motion in lines, converted with the configured line height
    pub fn wheel_lines(&mut self, scene: &mut SceneGraph, lines: f32) {
        self.wheel(scene, lines * self.config.line_height);
    }

    /// Orbit drag, in logical pixels
    pub fn drag_rotate(&mut self, dx: f32, dy: f32) {
        self.orbit.rotate(dx, dy, self.viewport.1 as f32);
    }

    /// Pan drag, in logical pixels
    pub fn drag_pan(&mut self, scene: &SceneGraph, dx: f32, dy: f32) {
        self.orbit.pan(dx, dy, self.viewport.1 as f32, &scene.camera);
    }

    /// Zoom in for negative lines (wheel away from the user), out for positive
    pub fn dolly(&mut self, lines: f32) {
        self.orbit.dolly(lines);
    }

    /// Advance damped orbit motion; called once per frame
    pub fn update(&mut self, scene: &mut SceneGraph) -> bool {
        self.orbit.update(&mut scene.camera)
    }
}

impl Default for InputRouter {
    fn default() -> Self {
        Self::new(ScrollConfig::default(), OrbitConfig::default())
    }
}

/// Pixel ratio the surface is allowed to render at
pub fn clamp_pixel_ratio(device_pixel_ratio: f32) -> f32 {
    if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio.min(MAX_PIXEL_RATIO)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_ratio_is_capped() {
        assert_eq!(clamp_pixel_ratio(1.0), 1.0);
        assert_eq!(clamp_pixel_ratio(1.5), 1.5);
        assert_eq!(clamp_pixel_ratio(3.0), 2.0);
        assert_eq!(clamp_pixel_ratio(f32::NAN), 1.0);
    }

    #[test]
    fn test_scroll_records_offset_without_spinner() {
        let mut scene = SceneGraph::default();
        let mut router = InputRouter::default();

        router.scroll(&mut scene, 120.0);
        assert_eq!(router.scroll_state().last, 120.0);

        router.scroll(&mut scene, -15.0);
        assert_eq!(router.scroll_state().last, 0.0);
    }

    #[test]
    fn test_wheel_stops_at_page_top() {
        let mut scene = SceneGraph::default();
        let mut router = InputRouter::default();

        router.wheel_lines(&mut scene, -2.0);
        assert_eq!(router.page_offset(), 80.0);

        router.wheel_lines(&mut scene, 5.0);
        assert_eq!(router.page_offset(), 0.0);
        assert_eq!(router.scroll_state().last, 0.0);
    }
}
