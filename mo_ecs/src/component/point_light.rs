use bevy_ecs::prelude::*;
use bevy_math::Vec3;

/// Omni light. Its position comes from the entity's [`crate::component::Transform`].
#[derive(Component, Debug, Clone, Copy)]
pub struct PointLight {
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

impl PointLight {
    pub fn new(color: Vec3, intensity: f32) -> Self {
        Self { color, intensity }
    }
}
