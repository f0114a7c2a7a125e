use bevy_math::prelude::*;
use mo_vk::Texture;
use std::sync::Arc;

/// Surface description of a mesh. Missing maps fall back to the renderer's default textures.
#[derive(Clone)]
pub struct Material {
    pub base_color_factor: Vec4,
    pub diffuse: Option<Arc<Texture>>,
    pub normal: Option<Arc<Texture>>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color_factor: Vec4::ONE,
            diffuse: None,
            normal: None,
        }
    }
}

impl Material {
    pub fn with_diffuse(mut self, texture: Arc<Texture>) -> Self {
        self.diffuse = Some(texture);
        self
    }

    pub fn with_normal(mut self, texture: Arc<Texture>) -> Self {
        self.normal = Some(texture);
        self
    }

    pub fn with_base_color(mut self, color: Vec4) -> Self {
        self.base_color_factor = color;
        self
    }
}
