use glam::{Mat3, Mat4, Quat, Vec3};

/// Local rotation axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }
}

/// Position, orientation and scale of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    /// Rotate about one of the node's own axes (post-multiplied)
    pub fn rotate_local(&mut self, axis: Axis, angle: f32) {
        self.rotation = self.rotation * Quat::from_axis_angle(axis.unit(), angle);
    }

    /// Orient the node so its +Z axis points at `target`
    pub fn look_at(&mut self, target: Vec3) {
        let z = (target - self.position).normalize_or_zero();
        if z == Vec3::ZERO {
            return;
        }
        let up = if z.cross(Vec3::Y).length_squared() < 1e-8 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let x = up.cross(z).normalize();
        let y = z.cross(x);
        self.rotation = Quat::from_mat3(&Mat3::from_cols(x, y, z));
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_local_composes_in_order() {
        let mut t = Transform::identity();
        t.rotate_local(Axis::Y, 0.5);
        t.rotate_local(Axis::Z, 0.25);

        let expected = Quat::from_rotation_y(0.5) * Quat::from_rotation_z(0.25);
        assert!(t.rotation.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_look_at_points_z_axis_at_target() {
        let mut t = Transform::identity();
        t.look_at(Vec3::new(1.0, 0.0, 0.0));

        let z = t.rotation * Vec3::Z;
        assert!(z.abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn test_look_at_self_is_ignored() {
        let mut t = Transform::from_position(Vec3::ONE);
        t.look_at(Vec3::ONE);
        assert_eq!(t.rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_non_finite_detection() {
        let mut t = Transform::identity();
        assert!(t.is_finite());
        t.position.x = f32::NAN;
        assert!(!t.is_finite());
    }
}
