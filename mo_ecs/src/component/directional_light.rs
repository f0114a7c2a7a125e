use bevy_ecs::prelude::*;
use bevy_math::prelude::*;

#[derive(Component, Debug, Clone, Copy)]
pub struct DirectionalLight {
    /// Direction the light travels in, world space.
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub is_shadow_caster: bool,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(0.0, -1.0, 0.0),
            color: Vec3::ONE,
            intensity: 1.0,
            is_shadow_caster: false,
        }
    }
}

impl DirectionalLight {
    pub fn new(direction: Vec3, color: Vec3, intensity: f32, is_shadow_caster: bool) -> Self {
        Self {
            direction,
            color,
            intensity,
            is_shadow_caster,
        }
    }

    /// Normalized direction, falling back to straight down for a zero vector.
    pub fn normalized_direction(&self) -> Vec3 {
        self.direction.try_normalize().unwrap_or(Vec3::NEG_Y)
    }
}
