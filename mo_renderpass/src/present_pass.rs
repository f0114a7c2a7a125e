use crate::error::{PassError, PassResult};
use crate::pipeline::{entry_point, layout_from_stages, viewport};
use crate::{FrameInfo, PassContext, RenderPassTrait};
use bevy_ecs::prelude::World;
use mo_ecs::resource::GlobalSamplers;
use mo_vk::{Texture, VkError, VkResultExt, VulkanContext};
use std::sync::Arc;
use vulkano::image::sampler::Sampler;
use vulkano::{
    descriptor_set::{DescriptorSet, WriteDescriptorSet},
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
    render_pass::{RenderPass, Subpass},
};

/// Copies the composite image onto the swap chain image.
///
/// Records inside the swap chain render pass, which the caller begins and ends.
pub struct PresentPass {
    pipeline: Arc<GraphicsPipeline>,
    sampler: Arc<Sampler>,
    source: Option<Arc<Texture>>,
    viewport: Viewport,
}

impl PresentPass {
    pub fn new(
        gpu: &VulkanContext,
        samplers: &GlobalSamplers,
        present_render_pass: &Arc<RenderPass>,
        extent: [u32; 2],
    ) -> PassResult<Self> {
        let device = gpu.device();
        let vs = entry_point(fullscreen_vs::load(device.clone()), "fullscreen.vert")?;
        let fs = entry_point(fs::load(device.clone()), "present.frag")?;
        let stages = [
            PipelineShaderStageCreateInfo::new(vs),
            PipelineShaderStageCreateInfo::new(fs),
        ];
        let layout = layout_from_stages(device, &stages, &[])?;
        let subpass = Subpass::from(present_render_pass.clone(), 0).ok_or_else(|| {
            PassError::Vk(VkError::InvalidAttachments(
                "present render pass has no subpass".into(),
            ))
        })?;

        let pipeline = GraphicsPipeline::new(
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
        .vk_op("create present pipeline")?;

        tracing::info!("Render - Render pass Present Pass successfully created.");

        Ok(Self {
            pipeline,
            sampler: samplers.clamp.clone(),
            source: None,
            viewport: viewport(extent),
        })
    }

    pub fn set_source(&mut self, image: &Arc<Texture>) {
        self.source = Some(image.clone());
    }
}

impl RenderPassTrait for PresentPass {
    fn on_update(&mut self, _frame: &FrameInfo, _world: &World) -> PassResult<()> {
        Ok(())
    }

    fn draw(&mut self, ctx: &mut PassContext<'_>, _world: &World) -> PassResult<()> {
        let source = self
            .source
            .as_ref()
            .ok_or(PassError::MissingResource("present source image"))?;
        let set = DescriptorSet::new(
            ctx.gpu.descriptor_set_allocator().clone(),
            self.pipeline.layout().set_layouts()[0].clone(),
            [WriteDescriptorSet::image_view_sampler(
                0,
                source.image_view().clone(),
                self.sampler.clone(),
            )],
            [],
        )
        .vk_op("create present descriptor set")?;

        ctx.builder
            .bind_pipeline_graphics(self.pipeline.clone())
            .vk_op("bind present pipeline")?
            .set_viewport(0, [self.viewport.clone()].into_iter().collect())
            .vk_op("set present viewport")?
            .bind_descriptor_sets(
                PipelineBindPoint::Graphics,
                self.pipeline.layout().clone(),
                0,
                set,
            )
            .vk_op("bind present descriptor set")?;
        unsafe { ctx.builder.draw(3, 1, 0, 0) }.vk_op("record present draw")?;
        Ok(())
    }

    fn on_resize(&mut self, _gpu: &VulkanContext, extent: [u32; 2]) -> PassResult<()> {
        self.viewport = viewport(extent);
        self.source = None;
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
        path: "shaders/present.frag",
    }
}
