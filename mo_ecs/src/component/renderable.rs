use crate::model::Model;
use bevy_ecs::prelude::*;
use bevy_math::Vec4;
use std::sync::Arc;

/// Marks an entity for the geometry passes. Entities without a model are skipped.
#[derive(Component, Clone)]
pub struct Renderable {
    pub model: Option<Arc<Model>>,
    /// Multiplied with the material base color.
    pub color: Vec4,
}

impl Renderable {
    pub fn new(model: Arc<Model>) -> Self {
        Self {
            model: Some(model),
            color: Vec4::ONE,
        }
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }
}

impl Default for Renderable {
    fn default() -> Self {
        Self {
            model: None,
            color: Vec4::ONE,
        }
    }
}
