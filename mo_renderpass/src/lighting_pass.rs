use crate::error::{PassError, PassResult};
use crate::gbuffer_pass::GBufferTargets;
use crate::lights::{LightingUniform, gather_lights};
use crate::pipeline::{
    entry_point, layout_from_stages, uniform_allocator, upload_uniform, viewport,
};
use crate::{FrameInfo, PassContext, RenderPassTrait};
use bevy_ecs::prelude::*;
use bevy_math::{Mat4, Vec3};
use mo_ecs::resource::{Camera, GlobalSamplers};
use mo_vk::{
    AttachmentSet, AttachmentSpec, Texture, TextureCreateInfo, VkError, VkResult, VkResultExt,
    VulkanContext,
};
use std::sync::Arc;
use vulkano::buffer::BufferContents;
use vulkano::buffer::allocator::SubbufferAllocator;
use vulkano::image::sampler::Sampler;
use vulkano::{
    command_buffer::RenderPassBeginInfo,
    descriptor_set::{DescriptorSet, WriteDescriptorSet},
    format::{ClearValue, Format},
    pipeline::{
        DynamicState, GraphicsPipeline, Pipeline, PipelineBindPoint,
        PipelineShaderStageCreateInfo,
        graphics::{
            GraphicsPipelineCreateInfo,
            color_blend::{ColorBlendAttachmentState, ColorBlendState},
            input_assembly::InputAssemblyState,
            multisample::MultisampleState,
            rasterization::RasterizationState,
            vertex_input::VertexInputState,
            viewport::{Viewport, ViewportState},
        },
    },
    render_pass::{Framebuffer, FramebufferCreateInfo, RenderPass, Subpass},
};

pub const COMPOSITE_FORMAT: Format = Format::R16G16B16A16_SFLOAT;

#[derive(BufferContents, Debug, Clone, Copy)]
#[repr(C)]
struct LightSpacePushConstants {
    light_space: [[f32; 4]; 4],
}

/// Images sampled by the composition shader.
struct LightingInputs {
    gbuffer: GBufferTargets,
    shadow_map: Arc<Texture>,
}

/// Shades the G-buffer with the scene lights into the composite image.
pub struct LightingPass {
    attachments: AttachmentSet,
    render_pass: Arc<RenderPass>,
    pipeline: Arc<GraphicsPipeline>,
    composite: Arc<Texture>,
    framebuffer: Arc<Framebuffer>,
    inputs: Option<LightingInputs>,
    gbuffer_sampler: Arc<Sampler>,
    shadow_sampler: Arc<Sampler>,
    uniform_buffer: SubbufferAllocator,
    uniform: LightingUniform,
    light_space: Mat4,
    viewport: Viewport,
}

impl LightingPass {
    pub fn target_description(extent: [u32; 2]) -> TextureCreateInfo {
        TextureCreateInfo::color_target(COMPOSITE_FORMAT, extent)
    }

    pub fn new(
        gpu: &VulkanContext,
        samplers: &GlobalSamplers,
        extent: [u32; 2],
    ) -> PassResult<Self> {
        let device = gpu.device();
        let attachments = AttachmentSet::new(vec![AttachmentSpec::color(COMPOSITE_FORMAT)])?;
        let render_pass = attachments.build_render_pass(device.clone())?;

        let pipeline = {
            let vs = entry_point(fullscreen_vs::load(device.clone()), "fullscreen.vert")?;
            let fs = entry_point(fs::load(device.clone()), "lighting.frag")?;
            let stages = [
                PipelineShaderStageCreateInfo::new(vs),
                PipelineShaderStageCreateInfo::new(fs),
            ];
            let layout = layout_from_stages(device, &stages, &[])?;
            let subpass = Subpass::from(render_pass.clone(), 0).ok_or_else(|| {
                PassError::Vk(VkError::InvalidAttachments(
                    "lighting render pass has no subpass".into(),
                ))
            })?;

            GraphicsPipeline::new(
                device.clone(),
                None,
                GraphicsPipelineCreateInfo {
                    stages: stages.into_iter().collect(),
                    vertex_input_state: Some(VertexInputState::default()),
                    input_assembly_state: Some(InputAssemblyState::default()),
                    viewport_state: Some(ViewportState::default()),
                    rasterization_state: Some(RasterizationState::default()),
                    multisample_state: Some(MultisampleState::default()),
                    color_blend_state: Some(ColorBlendState::with_attachment_states(
                        subpass.num_color_attachments(),
                        ColorBlendAttachmentState::default(),
                    )),
                    dynamic_state: [DynamicState::Viewport].into_iter().collect(),
                    subpass: Some(subpass.into()),
                    ..GraphicsPipelineCreateInfo::layout(layout)
                },
            )
            .vk_op("create lighting pipeline")?
        };

        let composite = Arc::new(Texture::new(gpu, Self::target_description(extent))?);
        let framebuffer = composite_framebuffer(&render_pass, &composite)?;

        tracing::info!("Render - Render pass Lighting Pass successfully created.");

        Ok(Self {
            attachments,
            render_pass,
            pipeline,
            composite,
            framebuffer,
            inputs: None,
            gbuffer_sampler: samplers.nearest.clone(),
            shadow_sampler: samplers.shadow.clone(),
            uniform_buffer: uniform_allocator(gpu),
            uniform: LightingUniform::from_lights(Vec3::ZERO, &Default::default()),
            light_space: Mat4::IDENTITY,
            viewport: viewport(extent),
        })
    }

    /// Must be called again whenever the G-buffer targets are recreated.
    pub fn set_inputs(&mut self, gbuffer: &GBufferTargets, shadow_map: &Arc<Texture>) {
        self.inputs = Some(LightingInputs {
            gbuffer: gbuffer.clone(),
            shadow_map: shadow_map.clone(),
        });
    }

    pub fn set_light_space(&mut self, light_space: Mat4) {
        self.light_space = light_space;
    }

    /// The shaded frame, in `ShaderReadOnlyOptimal` once the pass has run.
    pub fn output_image(&self) -> &Arc<Texture> {
        &self.composite
    }

    pub fn uniform(&self) -> &LightingUniform {
        &self.uniform
    }

    fn input_set(&self, gpu: &VulkanContext, inputs: &LightingInputs) -> VkResult<Arc<DescriptorSet>> {
        let gbuffer = &inputs.gbuffer;
        DescriptorSet::new(
            gpu.descriptor_set_allocator().clone(),
            self.pipeline.layout().set_layouts()[0].clone(),
            [
                WriteDescriptorSet::image_view_sampler(
                    0,
                    gbuffer.position.image_view().clone(),
                    self.gbuffer_sampler.clone(),
                ),
                WriteDescriptorSet::image_view_sampler(
                    1,
                    gbuffer.normal.image_view().clone(),
                    self.gbuffer_sampler.clone(),
                ),
                WriteDescriptorSet::image_view_sampler(
                    2,
                    gbuffer.albedo.image_view().clone(),
                    self.gbuffer_sampler.clone(),
                ),
                WriteDescriptorSet::image_view_sampler(
                    3,
                    gbuffer.specular.image_view().clone(),
                    self.gbuffer_sampler.clone(),
                ),
                WriteDescriptorSet::image_view_sampler(
                    4,
                    inputs.shadow_map.image_view().clone(),
                    self.shadow_sampler.clone(),
                ),
            ],
            [],
        )
        .vk_op("create lighting input descriptor set")
    }
}

fn composite_framebuffer(
    render_pass: &Arc<RenderPass>,
    composite: &Texture,
) -> VkResult<Arc<Framebuffer>> {
    Framebuffer::new(
        render_pass.clone(),
        FramebufferCreateInfo {
            attachments: vec![composite.image_view().clone()],
            ..Default::default()
        },
    )
    .vk_op("create composite framebuffer")
}

impl RenderPassTrait for LightingPass {
    fn on_update(&mut self, _frame: &FrameInfo, world: &World) -> PassResult<()> {
        let camera = world
            .get_resource::<Camera>()
            .ok_or(PassError::MissingResource("Camera"))?;
        self.uniform = LightingUniform::from_lights(camera.position(), &gather_lights(world));
        Ok(())
    }

    fn draw(&mut self, ctx: &mut PassContext<'_>, _world: &World) -> PassResult<()> {
        let inputs = self
            .inputs
            .as_ref()
            .ok_or(PassError::MissingResource("lighting inputs"))?;
        let input_set = self.input_set(ctx.gpu, inputs)?;

        let uniform = upload_uniform(&self.uniform_buffer, self.uniform)?;
        let light_set = DescriptorSet::new(
            ctx.gpu.descriptor_set_allocator().clone(),
            self.pipeline.layout().set_layouts()[1].clone(),
            [WriteDescriptorSet::buffer(0, uniform)],
            [],
        )
        .vk_op("create lighting uniform descriptor set")?;

        ctx.builder
            .begin_render_pass(
                RenderPassBeginInfo {
                    clear_values: vec![Some(ClearValue::Float([0.0, 0.0, 0.0, 1.0]))],
                    ..RenderPassBeginInfo::framebuffer(self.framebuffer.clone())
                },
                Default::default(),
            )
            .vk_op("begin lighting render pass")?
            .bind_pipeline_graphics(self.pipeline.clone())
            .vk_op("bind lighting pipeline")?
            .set_viewport(0, [self.viewport.clone()].into_iter().collect())
            .vk_op("set lighting viewport")?
            .bind_descriptor_sets(
                PipelineBindPoint::Graphics,
                self.pipeline.layout().clone(),
                0,
                vec![input_set, light_set],
            )
            .vk_op("bind lighting descriptor sets")?
            .push_constants(
                self.pipeline.layout().clone(),
                0,
                LightSpacePushConstants {
                    light_space: self.light_space.to_cols_array_2d(),
                },
            )
            .vk_op("push light-space matrix")?;
        unsafe { ctx.builder.draw(3, 1, 0, 0) }.vk_op("record lighting draw")?;
        ctx.builder
            .end_render_pass(Default::default())
            .vk_op("end lighting render pass")?;

        self.attachments.record_final_layouts(&[&*self.composite])?;
        Ok(())
    }

    fn on_resize(&mut self, gpu: &VulkanContext, extent: [u32; 2]) -> PassResult<()> {
        self.composite = Arc::new(Texture::new(gpu, Self::target_description(extent))?);
        self.framebuffer = composite_framebuffer(&self.render_pass, &self.composite)?;
        self.viewport = viewport(extent);
        // The old G-buffer views are stale until the renderer hands in the new ones.
        self.inputs = None;
        Ok(())
    }
}

mod fullscreen_vs {
    vulkano_shaders::shader! {
        ty: "vertex",
        path: "shaders/fullscreen.vert",
    }
}

mod fs {
    vulkano_shaders::shader! {
        ty: "fragment",
        path: "shaders/lighting.frag",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lights::LightState;

    #[test]
    fn composite_round_trips_through_a_resize() {
        let original = LightingPass::target_description([1920, 1080]);
        let resized = LightingPass::target_description([800, 600]);

        assert_eq!(resized.format, original.format);
        assert_eq!(resized.extent, [800, 600, 1]);
        assert_eq!(LightingPass::target_description([1920, 1080]), original);
    }

    #[test]
    fn zero_light_frame_is_ambient_only() {
        let uniform = LightingUniform::from_lights(Vec3::new(0.0, 1.0, 5.0), &LightState::default());

        assert_eq!(uniform.num_point_lights, 0);
        assert!(!uniform.has_directional_light());
        assert!(uniform.ambient[3] > 0.0);
    }

    #[test]
    fn uniform_layout_matches_std140() {
        // 4 vec4 + 2 * 16 vec4 + uint padded to a vec4.
        assert_eq!(size_of::<LightingUniform>(), (4 + 32 + 1) * 16);
        assert_eq!(size_of::<LightSpacePushConstants>(), 64);
    }
}
