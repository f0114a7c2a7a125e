use crate::draw::{DefaultSlots, free_released_textures};
use crate::error::{PassError, PassResult};
use crate::gbuffer_pass::GBufferPass;
use crate::lighting_pass::LightingPass;
use crate::present_pass::PresentPass;
use crate::shadow_pass::ShadowPass;
use crate::{FrameInfo, PassContext, RenderPassTrait};
use bevy_ecs::prelude::*;
use mo_ecs::resource::{DefaultTextures, GlobalSamplers};
use mo_vk::{
    AcquiredImage, BINDLESS_CAPACITY, BindlessDescriptorTable, FrameScheduler, TextureRegistry,
    VkError, VulkanContext,
};
use std::sync::Arc;
use vulkano::command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer};
use vulkano::render_pass::RenderPass;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererSettings {
    /// Number of bindless slots handed out, at most `BINDLESS_CAPACITY`.
    pub bindless_capacity: u32,
    pub shadow_map_size: u32,
    pub shadow_z_mult: f32,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            bindless_capacity: BINDLESS_CAPACITY,
            shadow_map_size: 2048,
            shadow_z_mult: 10.0,
        }
    }
}

/// The deferred frame graph: shadow, G-buffer, lighting, present.
pub struct DeferredRenderer {
    registry: TextureRegistry,
    default_slots: DefaultSlots,
    shadow: ShadowPass,
    gbuffer: GBufferPass,
    lighting: LightingPass,
    present: PresentPass,
}

impl DeferredRenderer {
    /// Needs the `DefaultTextures` and `GlobalSamplers` resources in `world`.
    pub fn new(
        gpu: &VulkanContext,
        world: &World,
        settings: RendererSettings,
        present_render_pass: &Arc<RenderPass>,
        extent: [u32; 2],
    ) -> PassResult<Self> {
        if settings.bindless_capacity == 0 || settings.bindless_capacity > BINDLESS_CAPACITY {
            return Err(VkError::BindlessCapacityExceeded {
                capacity: BINDLESS_CAPACITY,
            }
            .into());
        }
        let defaults = world
            .get_resource::<DefaultTextures>()
            .ok_or(PassError::MissingResource("DefaultTextures"))?;
        let samplers = world
            .get_resource::<GlobalSamplers>()
            .ok_or(PassError::MissingResource("GlobalSamplers"))?;

        let table = BindlessDescriptorTable::new(gpu, samplers.wrap.clone(), &defaults.white)?;
        let mut registry = TextureRegistry::new(settings.bindless_capacity, table);
        let default_slots = DefaultSlots {
            diffuse: registry.add_texture(&defaults.white)?,
            normal: registry.add_texture(&defaults.flat_normal)?,
        };

        let shadow = ShadowPass::new(gpu, settings.shadow_map_size, settings.shadow_z_mult)?;
        let gbuffer = GBufferPass::new(gpu, registry.writer().layout(), extent)?;
        let mut lighting = LightingPass::new(gpu, samplers, extent)?;
        lighting.set_inputs(gbuffer.targets(), shadow.shadow_map());
        let mut present = PresentPass::new(gpu, samplers, present_render_pass, extent)?;
        present.set_source(lighting.output_image());

        tracing::info!("Render - Deferred renderer successfully created.");

        Ok(Self {
            registry,
            default_slots,
            shadow,
            gbuffer,
            lighting,
            present,
        })
    }

    /// Records the whole frame into `builder`, ending with the swap chain render pass.
    pub fn record_frame(
        &mut self,
        gpu: &VulkanContext,
        world: &World,
        frame: &FrameInfo,
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
        scheduler: &FrameScheduler,
        acquired: &AcquiredImage,
    ) -> PassResult<()> {
        self.shadow.on_update(frame, world)?;
        self.gbuffer.on_update(frame, world)?;
        self.lighting.on_update(frame, world)?;
        self.present.on_update(frame, world)?;

        let mut ctx = PassContext {
            gpu,
            builder,
            registry: &mut self.registry,
            default_slots: self.default_slots,
            frame_index: frame.frame_index,
        };

        self.shadow.draw(&mut ctx, world)?;
        self.lighting
            .set_light_space(self.shadow.light_space().light_space);
        self.gbuffer.draw(&mut ctx, world)?;
        self.lighting.draw(&mut ctx, world)?;

        scheduler.begin_render_pass(ctx.builder, acquired)?;
        self.present.draw(&mut ctx, world)?;
        scheduler.end_render_pass(ctx.builder, acquired)?;
        Ok(())
    }

    /// Recreates every window-sized target. The device must be idle.
    pub fn on_resize(&mut self, gpu: &VulkanContext, extent: [u32; 2]) -> PassResult<()> {
        self.shadow.on_resize(gpu, extent)?;
        self.gbuffer.on_resize(gpu, extent)?;
        self.lighting.on_resize(gpu, extent)?;
        self.lighting
            .set_inputs(self.gbuffer.targets(), self.shadow.shadow_map());
        self.present.on_resize(gpu, extent)?;
        self.present.set_source(self.lighting.output_image());

        tracing::info!("Render - Render targets recreated at {}x{}.", extent[0], extent[1]);
        Ok(())
    }

    /// Returns the slots of textures queued in `TextureReleases` to the registry. Call before
    /// `record_frame` so the freed slots can be reused by this frame's new textures.
    pub fn free_released_textures(&mut self, world: &mut World) -> usize {
        free_released_textures(world, &mut self.registry, self.default_slots)
    }

    pub fn registry(&self) -> &TextureRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TextureRegistry {
        &mut self.registry
    }

    pub fn default_slots(&self) -> DefaultSlots {
        self.default_slots
    }
}
