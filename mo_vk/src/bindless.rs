//! Bindless texture registry.
//!
//! Every pass samples textures through one large combined-image-sampler array. A texture is
//! registered lazily the first time a pass needs it and keeps its slot until it is freed.

use crate::context::VulkanContext;
use crate::error::{VkError, VkResult, VkResultExt};
use crate::slot_allocator::SlotAllocator;
use crate::texture::Texture;
use crate::{BINDLESS_CAPACITY, MAX_FRAMES_IN_FLIGHT};
use foldhash::{HashMap, HashMapExt};
use std::sync::Arc;
use vulkano::descriptor_set::layout::{
    DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateInfo,
    DescriptorType,
};
use vulkano::descriptor_set::allocator::StandardDescriptorSetAllocator;
use vulkano::descriptor_set::{DescriptorSet, WriteDescriptorSet};
use vulkano::image::sampler::Sampler;
use vulkano::image::view::ImageView;
use vulkano::shader::ShaderStages;

/// Key identifying one image inside the registry.
pub type ImageKey = u64;

/// Where slot writes end up. The registry only decides *which* slot; the writer owns the
/// descriptor storage.
pub trait BindlessWriter {
    type Image;

    fn image_key(image: &Self::Image) -> ImageKey;

    fn write_image(&mut self, slot: u32, image: &Self::Image);

    /// Points `slot` back at the neutral fallback image.
    fn write_fallback(&mut self, slot: u32);

    /// Number of slots the writer can store.
    fn max_slots(&self) -> u32 {
        u32::MAX
    }
}

pub struct BindlessTextureRegistry<W: BindlessWriter> {
    slots: SlotAllocator,
    live: HashMap<ImageKey, u32>,
    writer: W,
}

impl<W: BindlessWriter> BindlessTextureRegistry<W> {
    /// `capacity` is clamped to what `writer` can store.
    pub fn new(capacity: u32, writer: W) -> Self {
        let max = writer.max_slots();
        if capacity > max {
            tracing::warn!("Render - Bindless capacity {capacity} exceeds {max}, clamped.");
        }
        Self {
            slots: SlotAllocator::new(capacity.min(max)),
            live: HashMap::new(),
            writer,
        }
    }

    /// Returns the slot of `image`, registering it on first use.
    pub fn add_texture(&mut self, image: &W::Image) -> VkResult<u32> {
        let key = W::image_key(image);
        if let Some(&slot) = self.live.get(&key) {
            return Ok(slot);
        }

        let slot = self.slots.alloc().ok_or(VkError::BindlessCapacityExceeded {
            capacity: self.slots.capacity(),
        })?;
        self.writer.write_image(slot, image);
        self.live.insert(key, slot);
        tracing::trace!("Render - Bindless slot {slot} bound to image {key}.");
        Ok(slot)
    }

    /// Releases the slot of `image`. Unknown images are ignored.
    pub fn free_texture(&mut self, image: &W::Image) {
        let key = W::image_key(image);
        let Some(slot) = self.live.remove(&key) else {
            return;
        };
        // Stragglers still referencing the slot must read valid memory.
        self.writer.write_fallback(slot);
        self.slots.free(slot);
        tracing::trace!("Render - Bindless slot {slot} released.");
    }

    pub fn slot_of(&self, image: &W::Image) -> Option<u32> {
        self.live.get(&W::image_key(image)).copied()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn capacity(&self) -> u32 {
        self.slots.capacity()
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }
}

/// Descriptor storage for the vulkano backend.
///
/// The slot table lives on the CPU. Each frame in flight owns its own descriptor set which is
/// rebuilt from the table when the table changed since that set was last written, so a set
/// that is still in use by the GPU is never mutated.
pub struct BindlessDescriptorTable {
    allocator: Arc<StandardDescriptorSetAllocator>,
    layout: Arc<DescriptorSetLayout>,
    sampler: Arc<Sampler>,
    fallback: Arc<ImageView>,
    views: Vec<Arc<ImageView>>,
    generation: u64,
    frame_sets: Vec<Option<(u64, Arc<DescriptorSet>)>>,
}

impl BindlessDescriptorTable {
    pub fn new(
        ctx: &VulkanContext,
        sampler: Arc<Sampler>,
        fallback: &Texture,
    ) -> VkResult<Self> {
        let binding = DescriptorSetLayoutBinding {
            stages: ShaderStages::FRAGMENT,
            descriptor_count: BINDLESS_CAPACITY,
            ..DescriptorSetLayoutBinding::descriptor_type(DescriptorType::CombinedImageSampler)
        };
        let layout = DescriptorSetLayout::new(
            ctx.device().clone(),
            DescriptorSetLayoutCreateInfo {
                bindings: [(0, binding)].into_iter().collect(),
                ..Default::default()
            },
        )
        .vk_op("create bindless descriptor set layout")?;

        let fallback = fallback.image_view().clone();
        tracing::info!(
            "Render - Bindless texture table with {BINDLESS_CAPACITY} slots successfully created."
        );

        Ok(Self {
            allocator: ctx.descriptor_set_allocator().clone(),
            layout,
            sampler,
            views: vec![fallback.clone(); BINDLESS_CAPACITY as usize],
            fallback,
            generation: 0,
            frame_sets: vec![None; MAX_FRAMES_IN_FLIGHT],
        })
    }

    pub fn layout(&self) -> &Arc<DescriptorSetLayout> {
        &self.layout
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The set to bind for `frame_index`, rebuilt if the table changed since it was written.
    pub fn descriptor_set(&mut self, frame_index: usize) -> VkResult<Arc<DescriptorSet>> {
        let frame = frame_index % self.frame_sets.len();
        if let Some((generation, set)) = &self.frame_sets[frame] {
            if *generation == self.generation {
                return Ok(set.clone());
            }
        }

        let set = DescriptorSet::new(
            self.allocator.clone(),
            self.layout.clone(),
            [WriteDescriptorSet::image_view_sampler_array(
                0,
                0,
                self.views
                    .iter()
                    .map(|view| (view.clone(), self.sampler.clone())),
            )],
            [],
        )
        .vk_op("write bindless descriptor set")?;

        tracing::trace!(
            "Render - Bindless set for frame {frame} rebuilt at generation {}.",
            self.generation
        );
        self.frame_sets[frame] = Some((self.generation, set.clone()));
        Ok(set)
    }
}

impl BindlessWriter for BindlessDescriptorTable {
    type Image = Texture;

    fn image_key(image: &Texture) -> ImageKey {
        image.id().0
    }

    fn write_image(&mut self, slot: u32, image: &Texture) {
        self.views[slot as usize] = image.image_view().clone();
        self.generation += 1;
    }

    fn write_fallback(&mut self, slot: u32) {
        self.views[slot as usize] = self.fallback.clone();
        self.generation += 1;
    }

    fn max_slots(&self) -> u32 {
        self.views.len() as u32
    }
}

#[cfg(test)]
#[path = "bindless_tests.rs"]
mod tests;
