use crate::component::Transform;
use bevy_ecs::prelude::*;
use bevy_math::{Mat4, Vec3, Vec4};

/// The orthographic camera size settings. Since we can not fix the screen aspect ratio,
/// we must choose to either set the width or height, or set the minimum width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrthographicCameraSize {
    /// Set a width and calculate height by width / aspect_ratio.
    FixedWidth,
    /// Set a height and calculate width by height * aspect_ratio.
    FixedHeight,
    /// Set a min width and a min height.
    MinWidthHeight,
}

#[derive(Debug, Clone, Copy)]
pub enum CameraSettings {
    Orthographic {
        width: f32,
        height: f32,
        size: OrthographicCameraSize,
        near: f32,
        far: f32,
    },
    Perspective {
        /// The y fov radians.
        fov: f32,
        /// Must be greater than zero.
        near: f32,
        /// Must be greater than zero.
        far: f32,
    },
}

impl CameraSettings {
    pub fn new_orthographic() -> Self {
        CameraSettings::Orthographic {
            width: 20.0,
            height: 20.0,
            size: OrthographicCameraSize::FixedHeight,
            near: 0.1,
            far: 100.0,
        }
    }

    pub fn new_perspective() -> Self {
        CameraSettings::Perspective {
            fov: 45.0_f32.to_radians(),
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Scene camera. Projections map depth to `[0, 1]` and flip Y for Vulkan clip space.
#[derive(Resource)]
pub struct Camera {
    transform: Transform,
    pub settings: CameraSettings,
    aspect: f32,
    view: Mat4,
    proj: Mat4,
    is_dirty: bool,
}

impl Default for Camera {
    fn default() -> Self {
        let mut camera = Camera {
            transform: Transform::default(),
            settings: CameraSettings::new_perspective(),
            aspect: 1.0,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            is_dirty: true,
        };
        camera.resize([1.0, 1.0]);
        camera.refresh_view();
        camera
    }
}

impl Camera {
    pub fn new(transform: Transform, settings: CameraSettings) -> Self {
        let mut camera = Self {
            transform,
            settings,
            ..Default::default()
        };
        camera.resize([1.0, 1.0]);
        camera.refresh_view();
        camera
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.is_dirty = true;
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.transform.look_at(target, Vec3::Y);
        self.is_dirty = true;
    }

    pub fn position(&self) -> Vec3 {
        self.transform.translation
    }

    pub fn direction(&self) -> Vec3 {
        self.transform.direction()
    }

    pub fn near_p(&self) -> f32 {
        match self.settings {
            CameraSettings::Orthographic { near, .. } => near,
            CameraSettings::Perspective { near, .. } => near,
        }
    }

    pub fn far_p(&self) -> f32 {
        match self.settings {
            CameraSettings::Orthographic { far, .. } => far,
            CameraSettings::Perspective { far, .. } => far,
        }
    }

    pub fn projection(&self) -> Mat4 {
        self.proj
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// Calculate the (projection * view) matrix of camera.
    pub fn projection_view(&self) -> Mat4 {
        self.proj * self.view
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// World-space corners of the view frustum, near plane first within each xy pair.
    pub fn frustum_corners(&self) -> [Vec3; 8] {
        let inverse = self.projection_view().inverse();
        let mut corners = [Vec3::ZERO; 8];
        let mut i = 0;
        for x in [-1.0, 1.0] {
            for y in [-1.0, 1.0] {
                for z in [0.0, 1.0] {
                    let corner = inverse * Vec4::new(x, y, z, 1.0);
                    corners[i] = corner.truncate() / corner.w;
                    i += 1;
                }
            }
        }
        corners
    }

    pub fn resize(&mut self, window_size: [f32; 2]) {
        if window_size[0] <= 0.0 || window_size[1] <= 0.0 {
            return;
        }
        self.aspect = window_size[0] / window_size[1];

        let mut projection = match self.settings {
            CameraSettings::Orthographic {
                width,
                height,
                size,
                near,
                far,
            } => {
                let (half_width, half_height) = match size {
                    OrthographicCameraSize::FixedWidth => Self::fixed_width(width, self.aspect),
                    OrthographicCameraSize::FixedHeight => Self::fixed_height(height, self.aspect),
                    OrthographicCameraSize::MinWidthHeight => {
                        if width / height > self.aspect {
                            Self::fixed_width(width, self.aspect)
                        } else {
                            Self::fixed_height(height, self.aspect)
                        }
                    }
                };
                Mat4::orthographic_rh(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    near,
                    far,
                )
            }
            CameraSettings::Perspective { fov, near, far } => {
                Mat4::perspective_rh(fov, self.aspect, near, far)
            }
        };
        projection.y_axis.y *= -1.0;

        self.proj = projection;
    }

    fn fixed_width(width: f32, aspect: f32) -> (f32, f32) {
        let half_width = width / 2.0;
        (half_width, half_width / aspect)
    }

    fn fixed_height(height: f32, aspect: f32) -> (f32, f32) {
        let half_height = height / 2.0;
        (half_height * aspect, half_height)
    }

    fn refresh_view(&mut self) {
        let position = self.transform.translation;
        self.view = Mat4::look_at_rh(
            position,
            position + self.transform.direction(),
            self.transform.up(),
        );
        self.is_dirty = false;
    }

    /// Rebuilds the view matrix after the transform changed.
    pub fn update_camera(mut camera: ResMut<Camera>) {
        if camera.is_dirty {
            camera.refresh_view();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::system::RunSystemOnce;

    fn camera_looking_down_neg_z(near: f32, far: f32) -> Camera {
        let mut camera = Camera::new(
            Transform::IDENTITY,
            CameraSettings::Perspective {
                fov: 90.0_f32.to_radians(),
                near,
                far,
            },
        );
        camera.resize([800.0, 800.0]);
        camera
    }

    #[test]
    fn frustum_corners_span_near_and_far_planes() {
        let camera = camera_looking_down_neg_z(0.5, 10.0);
        let corners = camera.frustum_corners();

        let near: Vec<_> = corners.iter().step_by(2).collect();
        let far: Vec<_> = corners.iter().skip(1).step_by(2).collect();
        for c in near {
            assert!((c.z + 0.5).abs() < 1e-3, "near corner {c}");
            assert!((c.x.abs() - 0.5).abs() < 1e-3);
        }
        for c in far {
            assert!((c.z + 10.0).abs() < 1e-2, "far corner {c}");
            assert!((c.y.abs() - 10.0).abs() < 1e-2);
        }
    }

    #[test]
    fn frustum_corners_follow_the_camera() {
        let mut camera = camera_looking_down_neg_z(1.0, 5.0);
        camera.set_transform(Transform::from_xyz(3.0, 0.0, 0.0));
        let mut world = World::new();
        world.insert_resource(camera);
        world.run_system_once(Camera::update_camera).unwrap();

        let camera = world.resource::<Camera>();
        let center = camera.frustum_corners().iter().sum::<Vec3>() / 8.0;
        assert!((center.x - 3.0).abs() < 1e-3);
    }

    #[test]
    fn orthographic_fixed_height_keeps_height() {
        let mut camera = Camera::new(Transform::IDENTITY, CameraSettings::new_orthographic());
        camera.resize([200.0, 100.0]);
        let corners = camera.frustum_corners();
        let max_y = corners.iter().map(|c| c.y).fold(f32::MIN, f32::max);
        let max_x = corners.iter().map(|c| c.x).fold(f32::MIN, f32::max);
        assert!((max_y - 10.0).abs() < 1e-3);
        assert!((max_x - 20.0).abs() < 1e-3);
    }

    #[test]
    fn zero_sized_window_keeps_the_old_projection() {
        let mut camera = camera_looking_down_neg_z(0.1, 10.0);
        let before = camera.projection();
        camera.resize([0.0, 0.0]);
        assert_eq!(camera.projection(), before);
    }
}
