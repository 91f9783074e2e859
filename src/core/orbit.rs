use std::f32::consts::PI;

use glam::Vec3;

use crate::camera::Camera;
use crate::config::OrbitConfig;

/// Keeps the polar angle away from the poles where the view basis degenerates
const POLAR_EPSILON: f32 = 1e-6;

/// Radius and angles around the orbit target
///
/// `phi` is measured from +Y, `theta` around Y starting at +Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    pub phi: f32,
    pub theta: f32,
}

impl Spherical {
    pub fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self {
                radius,
                phi: 0.0,
                theta: 0.0,
            };
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    pub fn to_offset(self) -> Vec3 {
        let sin_phi = self.phi.sin();
        Vec3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        )
    }
}

/// Damped drag-to-orbit camera manipulation around `camera.target`
///
/// Input methods only accumulate deltas; [`OrbitControls::update`] applies
/// them to the camera. With damping enabled each update consumes a fraction
/// of the pending motion, so the camera glides to rest over several frames.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub enabled: bool,
    config: OrbitConfig,
    delta_theta: f32,
    delta_phi: f32,
    pan_offset: Vec3,
    scale: f32,
}

impl OrbitControls {
    pub fn new(config: OrbitConfig) -> Self {
        Self {
            enabled: true,
            config,
            delta_theta: 0.0,
            delta_phi: 0.0,
            pan_offset: Vec3::ZERO,
            scale: 1.0,
        }
    }

    /// Drag by `(dx, dy)` pixels in a viewport `height` pixels tall
    pub fn rotate(&mut self, dx: f32, dy: f32, height: f32) {
        if !self.enabled || height <= 0.0 {
            return;
        }
        let speed = self.config.rotate_speed;
        self.delta_theta -= 2.0 * PI * dx / height * speed;
        self.delta_phi -= 2.0 * PI * dy / height * speed;
    }

    /// Translate the target parallel to the view plane
    pub fn pan(&mut self, dx: f32, dy: f32, height: f32, camera: &Camera) {
        if !self.enabled || height <= 0.0 {
            return;
        }
        // Scale so the point under the cursor follows it at the target depth
        let distance = (camera.position - camera.target).length()
            * (camera.fov.to_radians() * 0.5).tan();
        let speed = self.config.pan_speed;
        let left = -camera.right() * (2.0 * dx * distance / height * speed);
        let up = camera.up() * (2.0 * dy * distance / height * speed);
        self.pan_offset += left + up;
    }

    /// Wheel-style zoom; positive `delta_y` moves away from the target
    pub fn dolly(&mut self, delta_y: f32) {
        if !self.enabled || delta_y == 0.0 {
            return;
        }
        let zoom = 0.95_f32.powf(self.config.zoom_speed);
        if delta_y > 0.0 {
            self.scale /= zoom;
        } else {
            self.scale *= zoom;
        }
    }

    /// True while damped motion is still settling
    pub fn is_moving(&self) -> bool {
        const REST: f32 = 1e-6;
        self.delta_theta.abs() > REST
            || self.delta_phi.abs() > REST
            || self.pan_offset.length_squared() > REST * REST
            || (self.scale - 1.0).abs() > REST
    }

    /// Apply pending motion to the camera; returns whether it moved
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let offset = camera.position - camera.target;
        let mut spherical = Spherical::from_offset(offset);

        let factor = if self.config.damping {
            self.config.damping_factor
        } else {
            1.0
        };

        spherical.theta += self.delta_theta * factor;
        spherical.phi += self.delta_phi * factor;
        spherical.phi = spherical.phi.clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        spherical.radius = (spherical.radius * self.scale)
            .clamp(self.config.min_distance, self.config.max_distance);

        let target = camera.target + self.pan_offset * factor;
        let position = target + spherical.to_offset();

        if self.config.damping {
            self.delta_theta *= 1.0 - factor;
            self.delta_phi *= 1.0 - factor;
            self.pan_offset *= 1.0 - factor;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        if !position.is_finite() || !target.is_finite() {
            log::warn!("Orbit update produced a non-finite camera, discarding");
            return false;
        }

        let moved = position.distance_squared(camera.position) > 1e-12
            || target.distance_squared(camera.target) > 1e-12;
        camera.position = position;
        camera.target = target;
        moved
    }
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new(OrbitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_at(z: f32) -> Camera {
        let mut camera = Camera::default();
        camera.position = Vec3::new(0.0, 0.0, z);
        camera
    }

    fn undamped() -> OrbitControls {
        OrbitControls::new(OrbitConfig {
            damping: false,
            ..OrbitConfig::default()
        })
    }

    #[test]
    fn test_spherical_round_trip() {
        let offset = Vec3::new(3.0, -4.0, 12.0);
        let back = Spherical::from_offset(offset).to_offset();
        assert!(back.abs_diff_eq(offset, 1e-4));
    }

    #[test]
    fn test_idle_update_keeps_camera() {
        let mut camera = camera_at(50.0);
        let mut orbit = OrbitControls::default();
        assert!(!orbit.update(&mut camera));
        assert!(camera.position.abs_diff_eq(Vec3::new(0.0, 0.0, 50.0), 1e-4));
    }

    #[test]
    fn test_rotate_keeps_radius() {
        let mut camera = camera_at(50.0);
        let mut orbit = undamped();

        orbit.rotate(100.0, 40.0, 600.0);
        assert!(orbit.update(&mut camera));
        assert!((camera.position.length() - 50.0).abs() < 1e-3);
        assert!(camera.position.x.abs() > 1.0);
    }

    #[test]
    fn test_damping_spreads_motion_over_frames() {
        let mut damped_camera = camera_at(50.0);
        let mut damped = OrbitControls::default();
        damped.rotate(100.0, 0.0, 600.0);
        damped.update(&mut damped_camera);
        assert!(damped.is_moving());

        let mut direct_camera = camera_at(50.0);
        let mut direct = undamped();
        direct.rotate(100.0, 0.0, 600.0);
        direct.update(&mut direct_camera);
        assert!(!direct.is_moving());

        // First damped step covers only a fraction of the full sweep
        assert!(damped_camera.position.x.abs() < direct_camera.position.x.abs());

        for _ in 0..400 {
            damped.update(&mut damped_camera);
        }
        assert!(damped_camera.position.abs_diff_eq(direct_camera.position, 1e-2));
    }

    #[test]
    fn test_polar_angle_is_clamped() {
        let mut camera = camera_at(50.0);
        let mut orbit = undamped();

        orbit.rotate(0.0, 10_000.0, 100.0);
        orbit.update(&mut camera);
        assert!(camera.position.is_finite());
        assert!(camera.forward().cross(Vec3::Y).length() > 0.0);
    }

    #[test]
    fn test_dolly_respects_distance_limits() {
        let mut camera = camera_at(50.0);
        let mut orbit = OrbitControls::new(OrbitConfig {
            damping: false,
            min_distance: 10.0,
            max_distance: 60.0,
            ..OrbitConfig::default()
        });

        for _ in 0..100 {
            orbit.dolly(1.0);
            orbit.update(&mut camera);
        }
        assert!((camera.position.length() - 60.0).abs() < 1e-3);

        for _ in 0..200 {
            orbit.dolly(-1.0);
            orbit.update(&mut camera);
        }
        assert!((camera.position.length() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_pan_moves_target_and_position_together() {
        let mut camera = camera_at(50.0);
        let mut orbit = undamped();

        orbit.pan(50.0, 0.0, 600.0, &camera.clone());
        orbit.update(&mut camera);
        assert!(camera.target.x < 0.0);
        assert!((camera.position - camera.target).abs_diff_eq(Vec3::new(0.0, 0.0, 50.0), 1e-3));
    }
}
