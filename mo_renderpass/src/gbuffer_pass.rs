use crate::draw::{gather_renderables, plan_draws};
use crate::error::{PassError, PassResult};
use crate::pipeline::{
    entry_point, layout_from_stages, uniform_allocator, upload_uniform, viewport,
};
use crate::{FrameInfo, PassContext, RenderPassTrait};
use bevy_ecs::prelude::*;
use mo_ecs::model::StaticVertex;
use mo_ecs::resource::Camera;
use mo_vk::{
    AttachmentSet, AttachmentSpec, Texture, TextureCreateInfo, VkResult, VkResultExt,
    VulkanContext,
};
use std::sync::Arc;
use vulkano::buffer::BufferContents;
use vulkano::buffer::allocator::SubbufferAllocator;
use vulkano::descriptor_set::layout::DescriptorSetLayout;
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
            depth_stencil::{CompareOp, DepthState, DepthStencilState},
            input_assembly::InputAssemblyState,
            multisample::MultisampleState,
            rasterization::{CullMode, RasterizationState},
            vertex_input::{Vertex, VertexDefinition},
            viewport::{Viewport, ViewportState},
        },
    },
    render_pass::{Framebuffer, FramebufferCreateInfo, RenderPass, Subpass},
};

/// `CameraData` uniform block of `gbuffer.vert`.
#[derive(BufferContents, Debug, Clone, Copy)]
#[repr(C)]
pub struct CameraUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new(camera: &Camera) -> Self {
        Self {
            view: camera.view().to_cols_array_2d(),
            projection: camera.projection().to_cols_array_2d(),
        }
    }
}

/// `DrawData` push constant block of the G-buffer shaders.
#[derive(BufferContents, Debug, Clone, Copy)]
#[repr(C)]
pub struct DrawPushConstants {
    pub model: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    pub diffuse_slot: u32,
    pub normal_slot: u32,
}

/// The geometry pass outputs, sampled by the lighting pass.
#[derive(Clone)]
pub struct GBufferTargets {
    pub position: Arc<Texture>,
    pub normal: Arc<Texture>,
    pub albedo: Arc<Texture>,
    pub specular: Arc<Texture>,
    pub depth: Arc<Texture>,
}

impl GBufferTargets {
    pub const POSITION_FORMAT: Format = Format::R32G32B32A32_SFLOAT;
    pub const NORMAL_FORMAT: Format = Format::R16G16B16A16_SFLOAT;
    pub const ALBEDO_FORMAT: Format = Format::R8G8B8A8_UNORM;
    pub const SPECULAR_FORMAT: Format = Format::R8G8B8A8_UNORM;
    pub const DEPTH_FORMAT: Format = Format::D32_SFLOAT;

    /// Image descriptions in attachment order: position, normal, albedo, specular, depth.
    pub fn descriptions(extent: [u32; 2]) -> [TextureCreateInfo; 5] {
        [
            TextureCreateInfo::color_target(Self::POSITION_FORMAT, extent),
            TextureCreateInfo::color_target(Self::NORMAL_FORMAT, extent),
            TextureCreateInfo::color_target(Self::ALBEDO_FORMAT, extent),
            TextureCreateInfo::color_target(Self::SPECULAR_FORMAT, extent),
            TextureCreateInfo::depth_target(Self::DEPTH_FORMAT, extent, false),
        ]
    }

    pub fn attachments() -> VkResult<AttachmentSet> {
        AttachmentSet::new(vec![
            AttachmentSpec::color(Self::POSITION_FORMAT),
            AttachmentSpec::color(Self::NORMAL_FORMAT),
            AttachmentSpec::color(Self::ALBEDO_FORMAT),
            AttachmentSpec::color(Self::SPECULAR_FORMAT),
            AttachmentSpec::depth(Self::DEPTH_FORMAT),
        ])
    }

    pub fn new(gpu: &VulkanContext, extent: [u32; 2]) -> VkResult<Self> {
        let [position, normal, albedo, specular, depth] = Self::descriptions(extent);
        Ok(Self {
            position: Arc::new(Texture::new(gpu, position)?),
            normal: Arc::new(Texture::new(gpu, normal)?),
            albedo: Arc::new(Texture::new(gpu, albedo)?),
            specular: Arc::new(Texture::new(gpu, specular)?),
            depth: Arc::new(Texture::new(gpu, depth)?),
        })
    }

    /// All targets in attachment order.
    pub fn all(&self) -> [&Texture; 5] {
        [
            &*self.position,
            &*self.normal,
            &*self.albedo,
            &*self.specular,
            &*self.depth,
        ]
    }

    pub fn extent(&self) -> [u32; 2] {
        self.position.extent()
    }

    fn framebuffer(&self, render_pass: &Arc<RenderPass>) -> VkResult<Arc<Framebuffer>> {
        Framebuffer::new(
            render_pass.clone(),
            FramebufferCreateInfo {
                attachments: self
                    .all()
                    .iter()
                    .map(|texture| texture.image_view().clone())
                    .collect(),
                ..Default::default()
            },
        )
        .vk_op("create G-buffer framebuffer")
    }
}

pub struct GBufferPass {
    attachments: AttachmentSet,
    render_pass: Arc<RenderPass>,
    pipeline: Arc<GraphicsPipeline>,
    targets: GBufferTargets,
    framebuffer: Arc<Framebuffer>,
    uniform_buffer: SubbufferAllocator,
    camera: CameraUniform,
    viewport: Viewport,
}

impl GBufferPass {
    /// `bindless_layout` is the layout of the shared texture table, bound as set 0.
    pub fn new(
        gpu: &VulkanContext,
        bindless_layout: &Arc<DescriptorSetLayout>,
        extent: [u32; 2],
    ) -> PassResult<Self> {
        let device = gpu.device();
        let attachments = GBufferTargets::attachments()?;
        let render_pass = attachments.build_render_pass(device.clone())?;

        let vs = entry_point(vs::load(device.clone()), "gbuffer.vert")?;
        let fs = entry_point(fs::load(device.clone()), "gbuffer.frag")?;

        let pipeline = {
            let vertex_input_state = StaticVertex::per_vertex()
                .definition(&vs)
                .vk_op("match G-buffer vertex input")?;
            let stages = [
                PipelineShaderStageCreateInfo::new(vs),
                PipelineShaderStageCreateInfo::new(fs),
            ];
            let layout = layout_from_stages(device, &stages, &[(0, bindless_layout.clone())])?;
            let subpass = Subpass::from(render_pass.clone(), 0)
                .ok_or_else(|| PassError::Vk(mo_vk::VkError::InvalidAttachments(
                    "G-buffer render pass has no subpass".into(),
                )))?;

            GraphicsPipeline::new(
                device.clone(),
                None,
                GraphicsPipelineCreateInfo {
                    stages: stages.into_iter().collect(),
                    vertex_input_state: Some(vertex_input_state),
                    input_assembly_state: Some(InputAssemblyState::default()),
                    viewport_state: Some(ViewportState::default()),
                    rasterization_state: Some(RasterizationState {
                        cull_mode: CullMode::Back,
                        ..Default::default()
                    }),
                    multisample_state: Some(MultisampleState::default()),
                    color_blend_state: Some(ColorBlendState::with_attachment_states(
                        subpass.num_color_attachments(),
                        ColorBlendAttachmentState::default(),
                    )),
                    depth_stencil_state: Some(DepthStencilState {
                        depth: Some(DepthState {
                            compare_op: CompareOp::LessOrEqual,
                            write_enable: true,
                        }),
                        ..Default::default()
                    }),
                    dynamic_state: [DynamicState::Viewport].into_iter().collect(),
                    subpass: Some(subpass.into()),
                    ..GraphicsPipelineCreateInfo::layout(layout)
                },
            )
            .vk_op("create G-buffer pipeline")?
        };

        let targets = GBufferTargets::new(gpu, extent)?;
        let framebuffer = targets.framebuffer(&render_pass)?;

        tracing::info!("Render - Render pass GBuffer Pass successfully created.");

        Ok(Self {
            attachments,
            render_pass,
            pipeline,
            targets,
            framebuffer,
            uniform_buffer: uniform_allocator(gpu),
            camera: CameraUniform::new(&Camera::default()),
            viewport: viewport(extent),
        })
    }

    pub fn targets(&self) -> &GBufferTargets {
        &self.targets
    }
}

impl RenderPassTrait for GBufferPass {
    fn on_update(&mut self, _frame: &FrameInfo, world: &World) -> PassResult<()> {
        let camera = world
            .get_resource::<Camera>()
            .ok_or(PassError::MissingResource("Camera"))?;
        self.camera = CameraUniform::new(camera);
        Ok(())
    }

    fn draw(&mut self, ctx: &mut PassContext<'_>, world: &World) -> PassResult<()> {
        let renderables = gather_renderables(world);
        let batches = plan_draws(
            renderables
                .iter()
                .map(|r| (r.model_matrix, r.tint, r.model.as_deref())),
            ctx.registry,
            ctx.default_slots,
        )?;
        let bindless_set = ctx.registry.writer_mut().descriptor_set(ctx.frame_index)?;

        let camera_buffer = upload_uniform(&self.uniform_buffer, self.camera)?;
        let camera_set = DescriptorSet::new(
            ctx.gpu.descriptor_set_allocator().clone(),
            self.pipeline.layout().set_layouts()[1].clone(),
            [WriteDescriptorSet::buffer(0, camera_buffer)],
            [],
        )
        .vk_op("create G-buffer camera descriptor set")?;

        ctx.builder
            .begin_render_pass(
                RenderPassBeginInfo {
                    clear_values: vec![
                        Some(ClearValue::Float([0.0, 0.0, 0.0, 0.0])),
                        Some(ClearValue::Float([0.0, 0.0, 0.0, 0.0])),
                        Some(ClearValue::Float([0.0, 0.0, 0.0, 1.0])),
                        Some(ClearValue::Float([0.0, 0.0, 0.0, 0.0])),
                        Some(ClearValue::Depth(1.0)),
                    ],
                    ..RenderPassBeginInfo::framebuffer(self.framebuffer.clone())
                },
                Default::default(),
            )
            .vk_op("begin G-buffer render pass")?
            .bind_pipeline_graphics(self.pipeline.clone())
            .vk_op("bind G-buffer pipeline")?
            .set_viewport(0, [self.viewport.clone()].into_iter().collect())
            .vk_op("set G-buffer viewport")?
            .bind_descriptor_sets(
                PipelineBindPoint::Graphics,
                self.pipeline.layout().clone(),
                0,
                vec![bindless_set, camera_set],
            )
            .vk_op("bind G-buffer descriptor sets")?;

        let mut draw_count = 0;
        for batch in &batches {
            batch.model.bind(ctx.builder)?;
            for draw in &batch.draws {
                ctx.builder
                    .push_constants(
                        self.pipeline.layout().clone(),
                        0,
                        DrawPushConstants {
                            model: draw.model_matrix.to_cols_array_2d(),
                            base_color: draw.base_color.into(),
                            diffuse_slot: draw.diffuse_slot,
                            normal_slot: draw.normal_slot,
                        },
                    )
                    .vk_op("push G-buffer draw constants")?;
                unsafe {
                    ctx.builder.draw_indexed(
                        draw.mesh.index_count,
                        1,
                        draw.mesh.first_index,
                        draw.mesh.vertex_offset,
                        0,
                    )
                }
                .vk_op("record G-buffer draw")?;
                draw_count += 1;
            }
        }

        ctx.builder
            .end_render_pass(Default::default())
            .vk_op("end G-buffer render pass")?;
        self.attachments.record_final_layouts(&self.targets.all())?;

        tracing::trace!("Render - GBuffer Pass recorded {draw_count} draws.");
        Ok(())
    }

    fn on_resize(&mut self, gpu: &VulkanContext, extent: [u32; 2]) -> PassResult<()> {
        self.targets = GBufferTargets::new(gpu, extent)?;
        self.framebuffer = self.targets.framebuffer(&self.render_pass)?;
        self.viewport = viewport(extent);
        Ok(())
    }
}

mod vs {
    vulkano_shaders::shader! {
        ty: "vertex",
        path: "shaders/gbuffer.vert",
    }
}

mod fs {
    vulkano_shaders::shader! {
        ty: "fragment",
        path: "shaders/gbuffer.frag",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vulkano::image::ImageUsage;

    #[test]
    fn targets_round_trip_through_a_resize() {
        let original = GBufferTargets::descriptions([1280, 720]);
        let resized = GBufferTargets::descriptions([640, 480]);
        let restored = GBufferTargets::descriptions([1280, 720]);

        for (before, after) in original.iter().zip(&resized) {
            assert_eq!(before.format, after.format);
            assert_eq!(after.extent, [640, 480, 1]);
        }
        assert_eq!(original, restored);
    }

    #[test]
    fn targets_are_four_colors_and_one_depth() {
        let descriptions = GBufferTargets::descriptions([8, 8]);
        let colors = descriptions
            .iter()
            .filter(|d| d.usage.contains(ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED))
            .count();
        assert_eq!(colors, 4);
        assert!(descriptions[4].usage.contains(ImageUsage::DEPTH_STENCIL_ATTACHMENT));

        let attachments = GBufferTargets::attachments().unwrap();
        assert_eq!(attachments.color_count(), 4);
        assert_eq!(
            attachments.depth().map(|d| d.format),
            Some(GBufferTargets::DEPTH_FORMAT)
        );
    }

    #[test]
    fn push_constants_match_the_shader_block() {
        // mat4 + vec4 + two uints, no trailing padding.
        assert_eq!(size_of::<DrawPushConstants>(), 88);
        assert_eq!(size_of::<CameraUniform>(), 128);
    }
}
