use crate::draw::gather_renderables;
use crate::error::{PassError, PassResult};
use crate::lights::active_directional_light;
use crate::pipeline::{entry_point, layout_from_stages, uniform_allocator, upload_uniform};
use crate::{FrameInfo, PassContext, RenderPassTrait};
use bevy_ecs::prelude::*;
use bevy_math::{Mat4, Vec3};
use mo_ecs::model::StaticVertex;
use mo_ecs::resource::Camera;
use mo_vk::{
    AttachmentSet, AttachmentSpec, Texture, TextureCreateInfo, VkError, VkResultExt,
    VulkanContext,
};
use std::sync::Arc;
use vulkano::buffer::BufferContents;
use vulkano::buffer::allocator::SubbufferAllocator;
use vulkano::{
    command_buffer::RenderPassBeginInfo,
    descriptor_set::{DescriptorSet, WriteDescriptorSet},
    format::{ClearValue, Format},
    image::ImageLayout,
    pipeline::{
        GraphicsPipeline, Pipeline, PipelineBindPoint, PipelineShaderStageCreateInfo,
        graphics::{
            GraphicsPipelineCreateInfo,
            depth_stencil::{CompareOp, DepthState, DepthStencilState},
            input_assembly::InputAssemblyState,
            multisample::MultisampleState,
            rasterization::{CullMode, DepthBiasState, FrontFace, RasterizationState},
            vertex_input::{Vertex, VertexDefinition},
            viewport::ViewportState,
        },
    },
    render_pass::{AttachmentStoreOp, Framebuffer, FramebufferCreateInfo, RenderPass, Subpass},
};

pub const SHADOW_MAP_FORMAT: Format = Format::D32_SFLOAT;

/// Orthographic light camera covering the view frustum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSpace {
    pub view: Mat4,
    pub proj: Mat4,
    /// `proj * view`
    pub light_space: Mat4,
}

impl LightSpace {
    pub const IDENTITY: Self = Self {
        view: Mat4::IDENTITY,
        proj: Mat4::IDENTITY,
        light_space: Mat4::IDENTITY,
    };
}

/// Fits an orthographic light projection around the frustum `corners`.
///
/// `to_light` points from the scene toward the light, the opposite of the direction the light
/// travels. The light looks from `centroid + to_light` at the centroid. Its depth range is
/// widened by `z_mult` on both ends so casters outside the view frustum still land in the map.
pub fn fit_light_to_frustum(corners: &[Vec3; 8], to_light: Vec3, z_mult: f32) -> LightSpace {
    let center = corners.iter().copied().sum::<Vec3>() / corners.len() as f32;

    let mut up = Vec3::NEG_Y;
    if to_light.cross(up).length_squared() < 1e-6 {
        up = Vec3::Z;
    }
    let view = Mat4::look_at_rh(center + to_light, center, up);

    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    for corner in corners {
        let p = view.transform_point3(*corner);
        min = min.min(p);
        max = max.max(p);
    }

    if min.z < 0.0 {
        min.z *= z_mult;
    } else {
        min.z /= z_mult;
    }
    if max.z < 0.0 {
        max.z /= z_mult;
    } else {
        max.z *= z_mult;
    }

    // View space looks down -Z, so the near plane sits at the largest z.
    let proj = Mat4::orthographic_rh(min.x, max.x, min.y, max.y, -max.z, -min.z);

    LightSpace {
        view,
        proj,
        light_space: proj * view,
    }
}

/// Light space of the active directional light fitted to the camera frustum. Identity when
/// no directional light casts shadows.
pub fn shadow_light_space(world: &World, z_mult: f32) -> PassResult<LightSpace> {
    let camera = world
        .get_resource::<Camera>()
        .ok_or(PassError::MissingResource("Camera"))?;

    Ok(match active_directional_light(world) {
        Some(light) if light.is_shadow_caster => fit_light_to_frustum(
            &camera.frustum_corners(),
            -light.normalized_direction(),
            z_mult,
        ),
        _ => LightSpace::IDENTITY,
    })
}

#[derive(BufferContents, Debug, Clone, Copy)]
#[repr(C)]
struct ShadowUniform {
    light_space: [[f32; 4]; 4],
}

#[derive(BufferContents, Debug, Clone, Copy)]
#[repr(C)]
struct ShadowPushConstants {
    model: [[f32; 4]; 4],
}

/// Renders scene depth from the active directional light.
pub struct ShadowPass {
    attachments: AttachmentSet,
    render_pass: Arc<RenderPass>,
    framebuffer: Arc<Framebuffer>,
    pipeline: Arc<GraphicsPipeline>,
    shadow_map: Arc<Texture>,
    uniform_buffer: SubbufferAllocator,
    light_space: LightSpace,
    z_mult: f32,
}

impl ShadowPass {
    pub fn new(gpu: &VulkanContext, map_size: u32, z_mult: f32) -> PassResult<Self> {
        let device = gpu.device();

        let shadow_map = Arc::new(Texture::new(
            gpu,
            TextureCreateInfo::depth_target(SHADOW_MAP_FORMAT, [map_size, map_size], true),
        )?);

        let attachments = AttachmentSet::new(vec![
            AttachmentSpec::depth(SHADOW_MAP_FORMAT)
                .with_store_op(AttachmentStoreOp::Store)
                .with_final_layout(ImageLayout::ShaderReadOnlyOptimal),
        ])?;
        let render_pass = attachments.build_render_pass(device.clone())?;

        let pipeline = {
            let vs = entry_point(vs::load(device.clone()), "shadow.vert")?;
            let vertex_input_state = StaticVertex::per_vertex()
                .definition(&vs)
                .vk_op("match shadow vertex input")?;
            let stages = [PipelineShaderStageCreateInfo::new(vs)];
            let layout = layout_from_stages(device, &stages, &[])?;
            let subpass = Subpass::from(render_pass.clone(), 0).ok_or_else(|| {
                PassError::Vk(VkError::InvalidAttachments(
                    "shadow render pass has no subpass".into(),
                ))
            })?;

            GraphicsPipeline::new(
                device.clone(),
                None,
                GraphicsPipelineCreateInfo {
                    stages: stages.into_iter().collect(),
                    vertex_input_state: Some(vertex_input_state),
                    input_assembly_state: Some(InputAssemblyState::default()),
                    // The light projection is not Y-flipped like the camera's, so the
                    // winding seen here is the reverse of the G-buffer pass.
                    rasterization_state: Some(RasterizationState {
                        cull_mode: CullMode::Front,
                        front_face: FrontFace::Clockwise,
                        depth_bias: Some(DepthBiasState {
                            constant_factor: 2.0,
                            clamp: 0.0,
                            slope_factor: 2.0,
                        }),
                        ..Default::default()
                    }),
                    color_blend_state: None,
                    depth_stencil_state: Some(DepthStencilState {
                        depth: Some(DepthState {
                            compare_op: CompareOp::LessOrEqual,
                            write_enable: true,
                        }),
                        ..Default::default()
                    }),
                    viewport_state: Some(ViewportState {
                        viewports: [crate::pipeline::viewport([map_size, map_size])].into(),
                        ..Default::default()
                    }),
                    multisample_state: Some(MultisampleState::default()),
                    subpass: Some(subpass.into()),
                    ..GraphicsPipelineCreateInfo::layout(layout)
                },
            )
            .vk_op("create shadow pipeline")?
        };

        let framebuffer = Framebuffer::new(
            render_pass.clone(),
            FramebufferCreateInfo {
                attachments: vec![shadow_map.image_view().clone()],
                ..Default::default()
            },
        )
        .vk_op("create shadow framebuffer")?;

        tracing::info!("Render - Render pass Shadow Pass successfully created ({map_size}x{map_size}).");

        Ok(Self {
            attachments,
            render_pass,
            framebuffer,
            pipeline,
            shadow_map,
            uniform_buffer: uniform_allocator(gpu),
            light_space: LightSpace::IDENTITY,
            z_mult,
        })
    }

    pub fn shadow_map(&self) -> &Arc<Texture> {
        &self.shadow_map
    }

    /// Valid after `on_update`; identity when no directional light casts shadows.
    pub fn light_space(&self) -> &LightSpace {
        &self.light_space
    }

    pub fn render_pass(&self) -> &Arc<RenderPass> {
        &self.render_pass
    }
}

impl RenderPassTrait for ShadowPass {
    fn on_update(&mut self, _frame: &FrameInfo, world: &World) -> PassResult<()> {
        self.light_space = shadow_light_space(world, self.z_mult)?;
        Ok(())
    }

    fn draw(&mut self, ctx: &mut PassContext<'_>, world: &World) -> PassResult<()> {
        let uniform = upload_uniform(
            &self.uniform_buffer,
            ShadowUniform {
                light_space: self.light_space.light_space.to_cols_array_2d(),
            },
        )?;
        let set = DescriptorSet::new(
            ctx.gpu.descriptor_set_allocator().clone(),
            self.pipeline.layout().set_layouts()[0].clone(),
            [WriteDescriptorSet::buffer(0, uniform)],
            [],
        )
        .vk_op("create shadow descriptor set")?;

        ctx.builder
            .begin_render_pass(
                RenderPassBeginInfo {
                    clear_values: vec![Some(ClearValue::Depth(1.0))],
                    ..RenderPassBeginInfo::framebuffer(self.framebuffer.clone())
                },
                Default::default(),
            )
            .vk_op("begin shadow render pass")?
            .bind_pipeline_graphics(self.pipeline.clone())
            .vk_op("bind shadow pipeline")?
            .bind_descriptor_sets(
                PipelineBindPoint::Graphics,
                self.pipeline.layout().clone(),
                0,
                set,
            )
            .vk_op("bind shadow descriptor set")?;

        if self.light_space != LightSpace::IDENTITY {
            for renderable in gather_renderables(world) {
                let Some(model) = renderable.model else {
                    continue;
                };
                model.bind(ctx.builder)?;
                ctx.builder
                    .push_constants(
                        self.pipeline.layout().clone(),
                        0,
                        ShadowPushConstants {
                            model: renderable.model_matrix.to_cols_array_2d(),
                        },
                    )
                    .vk_op("push shadow draw constants")?;
                for mesh in model.meshes() {
                    unsafe {
                        ctx.builder.draw_indexed(
                            mesh.index_count,
                            1,
                            mesh.first_index,
                            mesh.vertex_offset,
                            0,
                        )
                    }
                    .vk_op("record shadow draw")?;
                }
            }
        }

        ctx.builder
            .end_render_pass(Default::default())
            .vk_op("end shadow render pass")?;
        self.attachments.record_final_layouts(&[&*self.shadow_map])?;
        Ok(())
    }

    fn on_resize(&mut self, _gpu: &VulkanContext, _extent: [u32; 2]) -> PassResult<()> {
        // The shadow map does not follow the window size.
        Ok(())
    }
}

mod vs {
    vulkano_shaders::shader! {
        ty: "vertex",
        path: "shaders/shadow.vert",
    }
}

#[cfg(test)]
#[path = "shadow_pass_tests.rs"]
mod tests;
