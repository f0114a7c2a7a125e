//! Turns renderable entities into draw records, resolving material textures to bindless slots.

use bevy_ecs::prelude::*;
use bevy_math::{Mat4, Vec4};
use mo_ecs::component::{Renderable, Transform};
use mo_ecs::model::{MeshDesc, Model};
use mo_ecs::resource::TextureReleases;
use mo_vk::{BindlessTextureRegistry, BindlessWriter, Texture, VkResult};
use std::sync::Arc;

/// What the draw planner needs to know about a model.
pub trait MeshSource {
    type Image;

    fn meshes(&self) -> &[MeshDesc];
    fn base_color(&self, material: usize) -> Vec4;
    fn diffuse(&self, material: usize) -> Option<&Self::Image>;
    fn normal(&self, material: usize) -> Option<&Self::Image>;
}

impl MeshSource for Model {
    type Image = Texture;

    fn meshes(&self) -> &[MeshDesc] {
        Model::meshes(self)
    }

    fn base_color(&self, material: usize) -> Vec4 {
        self.material(material).base_color_factor
    }

    fn diffuse(&self, material: usize) -> Option<&Texture> {
        self.material(material).diffuse.as_deref()
    }

    fn normal(&self, material: usize) -> Option<&Texture> {
        self.material(material).normal.as_deref()
    }
}

/// Bindless slots of the textures substituted for missing maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultSlots {
    pub diffuse: u32,
    pub normal: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRecord {
    pub model_matrix: Mat4,
    pub base_color: Vec4,
    pub diffuse_slot: u32,
    pub normal_slot: u32,
    pub mesh: MeshDesc,
}

/// Draws sharing one model, so its buffers are bound once.
pub struct DrawBatch<'a, M> {
    pub model: &'a M,
    pub draws: Vec<DrawRecord>,
}

/// An entity with both `Transform` and `Renderable`.
pub struct RenderableInstance {
    pub model_matrix: Mat4,
    pub tint: Vec4,
    pub model: Option<Arc<Model>>,
}

pub fn gather_renderables(world: &World) -> Vec<RenderableInstance> {
    world
        .iter_entities()
        .filter_map(|entity| {
            let renderable = entity.get::<Renderable>()?;
            let transform = entity.get::<Transform>()?;
            Some(RenderableInstance {
                model_matrix: transform.model_matrix(),
                tint: renderable.color,
                model: renderable.model.clone(),
            })
        })
        .collect()
}

/// Resolves every mesh of every item to a draw record. Items without a model are skipped.
/// Textures are registered on first use; missing maps use `defaults`.
pub fn plan_draws<'a, M, W, I>(
    items: I,
    registry: &mut BindlessTextureRegistry<W>,
    defaults: DefaultSlots,
) -> VkResult<Vec<DrawBatch<'a, M>>>
where
    M: MeshSource<Image = W::Image> + 'a,
    W: BindlessWriter,
    I: IntoIterator<Item = (Mat4, Vec4, Option<&'a M>)>,
{
    let mut batches = Vec::new();
    for (index, (model_matrix, tint, model)) in items.into_iter().enumerate() {
        let Some(model) = model else {
            tracing::trace!("Render - Renderable #{index} has no model, skipped.");
            continue;
        };

        let mut draws = Vec::with_capacity(model.meshes().len());
        for mesh in model.meshes() {
            let diffuse_slot = match model.diffuse(mesh.material_index) {
                Some(image) => registry.add_texture(image)?,
                None => defaults.diffuse,
            };
            let normal_slot = match model.normal(mesh.material_index) {
                Some(image) => registry.add_texture(image)?,
                None => defaults.normal,
            };
            draws.push(DrawRecord {
                model_matrix,
                base_color: model.base_color(mesh.material_index) * tint,
                diffuse_slot,
                normal_slot,
                mesh: *mesh,
            });
        }
        batches.push(DrawBatch { model, draws });
    }
    Ok(batches)
}

/// Frees the bindless slot of every texture queued in `TextureReleases`. Textures that were
/// never registered and the default textures are ignored. Returns the number of slots freed.
pub fn free_released_textures<W>(
    world: &mut World,
    registry: &mut BindlessTextureRegistry<W>,
    defaults: DefaultSlots,
) -> usize
where
    W: BindlessWriter,
    W::Image: Send + Sync + 'static,
{
    let Some(mut releases) = world.get_resource_mut::<TextureReleases<W::Image>>() else {
        return 0;
    };
    if releases.is_empty() {
        return 0;
    }

    let mut freed = 0;
    for image in releases.drain() {
        match registry.slot_of(&*image) {
            Some(slot) if slot == defaults.diffuse || slot == defaults.normal => {
                tracing::warn!("Render - Default texture in slot {slot} cannot be released.");
            }
            Some(_) => {
                registry.free_texture(&*image);
                freed += 1;
            }
            None => {}
        }
    }
    if freed > 0 {
        tracing::debug!("Render - Freed {freed} bindless texture slot(s).");
    }
    freed
}

#[cfg(test)]
#[path = "draw_tests.rs"]
mod tests;
