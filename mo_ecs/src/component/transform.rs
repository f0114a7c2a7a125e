use bevy_ecs::prelude::*;
use bevy_math::{Mat3, Mat4, Quat, Vec3};

#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self::from_translation(Vec3::new(x, y, z))
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn looking_at(mut self, target: Vec3, up: Vec3) -> Self {
        self.look_at(target, up);
        self
    }

    /// Rotates so that [`Transform::direction`] points at `target`.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let back = (self.translation - target).normalize_or_zero();
        if back == Vec3::ZERO {
            return;
        }
        let mut right = up.cross(back).normalize_or_zero();
        if right == Vec3::ZERO {
            right = back.any_orthonormal_vector();
        }
        let up = back.cross(right);
        self.rotation = Quat::from_mat3(&Mat3::from_cols(right, up, back));
    }

    /// Forward vector, `-Z` in local space.
    pub fn direction(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_matrix_applies_scale_rotation_translation() {
        let transform = Transform::from_xyz(1.0, 2.0, 3.0)
            .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2))
            .with_scale(Vec3::splat(2.0));

        let p = transform.model_matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(1.0, 2.0, 1.0), 1e-5), "{p}");
    }

    #[test]
    fn looking_at_points_the_forward_vector_at_the_target() {
        let transform = Transform::from_xyz(0.0, 5.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y);
        let expected = (Vec3::ZERO - Vec3::new(0.0, 5.0, 5.0)).normalize();
        assert!(transform.direction().abs_diff_eq(expected, 1e-5));
        assert!(transform.up().y > 0.0);
    }

    #[test]
    fn looking_straight_up_still_yields_a_basis() {
        let transform = Transform::IDENTITY.looking_at(Vec3::Y, Vec3::Y);
        assert!(transform.direction().abs_diff_eq(Vec3::Y, 1e-5));
        assert!(transform.rotation.is_normalized());
    }
}
